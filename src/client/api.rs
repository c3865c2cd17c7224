//! HTTP backend for the review queue

use crate::auth::FORWARDED_EMAIL;
use crate::client::queue::ReviewBackend;
use crate::error::AppError;
use crate::governance::{Decision, DescriptionItem, Page};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Talks to a running governance server
#[derive(Clone)]
pub struct HttpReviewBackend {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewBody<'a> {
    decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    approved_description: Option<&'a str>,
    reviewer: &'a str,
}

#[derive(Deserialize)]
struct ItemEnvelope {
    item: DescriptionItem,
}

/// Error body produced by the server's error responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

impl HttpReviewBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        url::Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid server URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: HeaderMap::new(),
        })
    }

    /// Act as `email` on every request
    pub fn with_principal(mut self, email: &str) -> Result<Self, AppError> {
        let value = HeaderValue::from_str(email)
            .map_err(|e| AppError::Config(format!("Invalid principal header: {}", e)))?;
        self.headers
            .insert(HeaderName::from_static(FORWARDED_EMAIL), value);
        Ok(self)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::External(format!("Failed to read response: {}", e)))?;

        if status.is_success() {
            return serde_json::from_str(&text)
                .map_err(|e| AppError::External(format!("Unexpected response body: {}", e)));
        }

        Err(error_from_status(status, &text))
    }
}

/// Map an error response back onto the error it was rendered from
fn error_from_status(status: StatusCode, text: &str) -> AppError {
    let body = serde_json::from_str::<ErrorBody>(text).ok();
    let message = body
        .as_ref()
        .map(|b| b.message.clone())
        .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), text));

    match (status, body) {
        (StatusCode::CONFLICT, _) => AppError::NotFound(message),
        (StatusCode::BAD_REQUEST, Some(body)) => AppError::Validation {
            field: body.field.unwrap_or_default(),
            message,
        },
        (StatusCode::FORBIDDEN, Some(body)) => AppError::Permission {
            message,
            errors: body.errors,
        },
        _ => AppError::External(message),
    }
}

#[async_trait]
impl ReviewBackend for HttpReviewBackend {
    async fn fetch_pending(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Page<DescriptionItem>, AppError> {
        debug!("GET /api/pending page={} perPage={}", page, per_page);
        let response = self
            .client
            .get(self.url("/api/pending"))
            .headers(self.headers.clone())
            .query(&[("page", page), ("perPage", per_page)])
            .send()
            .await
            .map_err(|e| AppError::External(format!("Request failed: {}", e)))?;

        Self::parse_response(response).await
    }

    async fn submit_review(
        &self,
        id: Uuid,
        decision: Decision,
        edited_text: Option<&str>,
        reviewer: &str,
    ) -> Result<DescriptionItem, AppError> {
        debug!("POST /api/review/{} {:?}", id, decision);
        let body = ReviewBody {
            decision,
            approved_description: edited_text,
            reviewer,
        };
        let response = self
            .client
            .post(self.url(&format!("/api/review/{}", id)))
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Request failed: {}", e)))?;

        let envelope: ItemEnvelope = Self::parse_response(response).await?;
        Ok(envelope.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_mapping() {
        let conflict = error_from_status(
            StatusCode::CONFLICT,
            &json!({"success": false, "message": "Item already reviewed"}).to_string(),
        );
        assert!(matches!(conflict, AppError::NotFound(ref m) if m == "Item already reviewed"));

        let validation = error_from_status(
            StatusCode::BAD_REQUEST,
            &json!({"success": false, "message": "Reviewer is required", "field": "reviewer"})
                .to_string(),
        );
        assert!(matches!(validation, AppError::Validation { ref field, .. } if field == "reviewer"));

        let denied = error_from_status(
            StatusCode::FORBIDDEN,
            &json!({"success": false, "message": "Denied", "errors": ["Missing USAGE"]})
                .to_string(),
        );
        assert!(matches!(denied, AppError::Permission { ref errors, .. } if errors.len() == 1));

        let gateway = error_from_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(gateway, AppError::External(ref m) if m.contains("502")));
    }

    #[test]
    fn test_review_body_shape() {
        let body = ReviewBody {
            decision: Decision::Approve,
            approved_description: None,
            reviewer: "ana",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"decision": "APPROVE", "reviewer": "ana"})
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpReviewBackend::new("not a url", Duration::from_secs(5)).is_err());
        let backend = HttpReviewBackend::new("http://localhost:8080/", Duration::from_secs(5))
            .unwrap()
            .with_principal("ana@example.com")
            .unwrap();
        assert_eq!(backend.url("/api/pending"), "http://localhost:8080/api/pending");
    }
}
