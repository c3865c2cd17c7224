//! Description model client
//!
//! The model is an external collaborator behind [`DescriptionModel`]. The
//! shipped implementation talks to any OpenAI-compatible chat-completions
//! endpoint.

use crate::catalog::ColumnMetadata;
use crate::config::ModelConfig;
use crate::error::AppError;
use crate::governance::item::ObjectPath;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sample rows shown in a table prompt
const TABLE_PROMPT_ROWS: usize = 3;
/// Sample values shown in a column prompt
const COLUMN_PROMPT_VALUES: usize = 5;

/// What the model is asked to describe
#[derive(Debug, Clone)]
pub enum DescriptionContext {
    Table {
        path: ObjectPath,
        columns: Vec<ColumnMetadata>,
        sample_rows: Vec<serde_json::Value>,
    },
    Column {
        path: ObjectPath,
        data_type: String,
        sample_values: Vec<serde_json::Value>,
    },
}

impl DescriptionContext {
    pub fn path(&self) -> &ObjectPath {
        match self {
            DescriptionContext::Table { path, .. } | DescriptionContext::Column { path, .. } => path,
        }
    }

    /// Render the user prompt
    pub fn prompt(&self) -> String {
        match self {
            DescriptionContext::Table {
                path,
                columns,
                sample_rows,
            } => {
                let columns_info = columns
                    .iter()
                    .map(|c| format!("  - {} ({})", c.column_name, c.data_type))
                    .collect::<Vec<_>>()
                    .join("\n");

                let mut sample_info = String::new();
                if !sample_rows.is_empty() {
                    let shown: Vec<&serde_json::Value> =
                        sample_rows.iter().take(TABLE_PROMPT_ROWS).collect();
                    let rendered = serde_json::to_string_pretty(&shown).unwrap_or_default();
                    sample_info = format!(
                        "\n\nSample data (first {} rows):\n{}",
                        shown.len(),
                        rendered
                    );
                }

                format!(
                    "You are a data documentation expert. Generate a clear, concise description \
                     for this database table.\n\n\
                     Table: {}\n\n\
                     Columns:\n{}\n{}\n\n\
                     Generate a 1-2 sentence description explaining:\n\
                     1. What data this table contains\n\
                     2. The primary purpose or use case\n\n\
                     Description:",
                    path, columns_info, sample_info
                )
            }
            DescriptionContext::Column {
                path,
                data_type,
                sample_values,
            } => {
                let values: Vec<String> = sample_values
                    .iter()
                    .filter(|v| !v.is_null())
                    .take(COLUMN_PROMPT_VALUES)
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                let sample_info = if values.is_empty() {
                    String::new()
                } else {
                    format!("\n\nSample values: {}", values.join(", "))
                };

                format!(
                    "You are a data documentation expert. Generate a clear, concise description \
                     for this database column.\n\n\
                     Table: {}\n\
                     Column: {}\n\
                     Data Type: {}\n{}\n\n\
                     Generate a brief 1-sentence description explaining what this column \
                     represents and its purpose.\n\n\
                     Description:",
                    path.table_path(),
                    path.column.as_deref().unwrap_or_default(),
                    data_type,
                    sample_info
                )
            }
        }
    }
}

/// Text generator for catalog object descriptions
#[async_trait]
pub trait DescriptionModel: Send + Sync {
    /// Identifier recorded on every item as `modelUsed`
    fn model_id(&self) -> &str;

    /// Generate a description. Empty output is an error.
    async fn generate_description(&self, context: &DescriptionContext) -> Result<String, AppError>;
}

// =============================================================================
// CHAT COMPLETIONS
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI-compatible chat-completions model
pub struct ChatCompletionsModel {
    client: Client,
    config: ModelConfig,
}

impl ChatCompletionsModel {
    pub fn new(config: ModelConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build model client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn extract_text(response: ChatResponse) -> Result<String, AppError> {
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AppError::External("Model returned an empty description".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl DescriptionModel for ChatCompletionsModel {
    fn model_id(&self) -> &str {
        &self.config.model_name
    }

    async fn generate_description(&self, context: &DescriptionContext) -> Result<String, AppError> {
        let request = ChatRequest {
            model: &self.config.model_name,
            messages: vec![ChatMessage {
                role: "user",
                content: context.prompt(),
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut builder = self.client.post(&self.config.endpoint).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::External(format!("Model request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AppError::External(format!(
                "Model endpoint returned {}: {}",
                status, message
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Invalid model response: {}", e)))?;

        let text = Self::extract_text(parsed)?;
        debug!("Generated {} chars for {}", text.len(), context.path());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str, data_type: &str) -> ColumnMetadata {
        ColumnMetadata {
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            comment: None,
            ordinal_position: 1,
        }
    }

    #[test]
    fn test_table_prompt_lists_columns_and_three_rows() {
        let context = DescriptionContext::Table {
            path: ObjectPath::parse("main.sales.orders").unwrap(),
            columns: vec![column("id", "bigint"), column("amount", "numeric(10,2)")],
            sample_rows: (0..5).map(|i| json!({ "id": i })).collect(),
        };
        let prompt = context.prompt();

        assert!(prompt.contains("Table: main.sales.orders"));
        assert!(prompt.contains("  - amount (numeric(10,2))"));
        assert!(prompt.contains("Sample data (first 3 rows)"));
        assert!(!prompt.contains("\"id\": 3"));
    }

    #[test]
    fn test_column_prompt_skips_null_samples() {
        let context = DescriptionContext::Column {
            path: ObjectPath::parse("main.sales.orders.status").unwrap(),
            data_type: "text".to_string(),
            sample_values: vec![json!("open"), json!(null), json!("closed")],
        };
        let prompt = context.prompt();

        assert!(prompt.contains("Table: main.sales.orders\nColumn: status"));
        assert!(prompt.contains("Sample values: open, closed"));
    }

    #[test]
    fn test_extract_text_trims_and_rejects_empty() {
        let ok: ChatResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "content": "  Orders placed by customers. \n" } }]
        }))
        .unwrap();
        assert_eq!(
            ChatCompletionsModel::extract_text(ok).unwrap(),
            "Orders placed by customers."
        );

        let empty: ChatResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(ChatCompletionsModel::extract_text(empty).unwrap_err().is_external());
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi".to_string(),
            }],
            max_tokens: 200,
            temperature: 0.3,
        })
        .unwrap();
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 200);
    }
}
