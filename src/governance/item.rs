//! Description items and their lifecycle
//!
//! A `DescriptionItem` is the unit of governance. Its status only ever moves
//! along PENDING -> APPROVED -> APPLIED or PENDING -> REJECTED; every mutation
//! goes through [`DescriptionItem::apply_transition`].

use crate::error::{validation_error, AppError};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]{1,255}$").expect("identifier regex is valid"));

/// Validate a catalog, schema, table or column name before it reaches SQL
pub fn validate_identifier(field: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(validation_error(field, format!("{} cannot be empty", field)));
    }
    if value.len() > 255 {
        return Err(validation_error(
            field,
            format!("{} too long (max 255 characters)", field),
        ));
    }
    if !IDENTIFIER.is_match(value) {
        return Err(validation_error(
            field,
            format!("Invalid {}: contains illegal characters", field),
        ));
    }
    Ok(())
}

// =============================================================================
// ENUMS
// =============================================================================

/// Kind of catalog object an item documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Table,
    Column,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Table => "TABLE",
            ObjectType::Column => "COLUMN",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TABLE" => Ok(ObjectType::Table),
            "COLUMN" => Ok(ObjectType::Column),
            other => Err(validation_error(
                "objectType",
                format!("Unknown object type: {}", other),
            )),
        }
    }
}

/// Lifecycle state of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// Generated, waiting for a reviewer
    Pending,
    /// Accepted by a reviewer, waiting to be written to the catalog
    Approved,
    /// Declined by a reviewer; kept for audit
    Rejected,
    /// Written to the catalog
    Applied,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Approved => "APPROVED",
            ItemStatus::Rejected => "REJECTED",
            ItemStatus::Applied => "APPLIED",
        }
    }

    /// The only edges of the lifecycle graph
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Pending, ItemStatus::Approved)
                | (ItemStatus::Pending, ItemStatus::Rejected)
                | (ItemStatus::Approved, ItemStatus::Applied)
        )
    }

    /// Open items block re-generation for the same object
    pub fn is_open(&self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Approved)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ItemStatus::Pending),
            "APPROVED" => Ok(ItemStatus::Approved),
            "REJECTED" => Ok(ItemStatus::Rejected),
            "APPLIED" => Ok(ItemStatus::Applied),
            other => Err(validation_error(
                "status",
                format!("Invalid status: {}", other),
            )),
        }
    }
}

// =============================================================================
// OBJECT PATH
// =============================================================================

/// Fully-qualified `catalog.schema.table[.column]` path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPath {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl ObjectPath {
    pub fn table(catalog: &str, schema: &str, table: &str) -> Result<Self, AppError> {
        validate_identifier("catalog", catalog)?;
        validate_identifier("schema", schema)?;
        validate_identifier("table", table)?;
        Ok(Self {
            catalog: catalog.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            column: None,
        })
    }

    pub fn column(catalog: &str, schema: &str, table: &str, column: &str) -> Result<Self, AppError> {
        validate_identifier("column", column)?;
        let mut path = Self::table(catalog, schema, table)?;
        path.column = Some(column.to_string());
        Ok(path)
    }

    /// Parse a dotted path with three (table) or four (column) segments
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let parts: Vec<&str> = raw.trim().split('.').collect();
        match parts.as_slice() {
            [catalog, schema, table] => Self::table(catalog, schema, table),
            [catalog, schema, table, column] => Self::column(catalog, schema, table, column),
            _ => Err(validation_error(
                "objectPath",
                format!("Expected catalog.schema.table[.column], got '{}'", raw),
            )),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        if self.column.is_some() {
            ObjectType::Column
        } else {
            ObjectType::Table
        }
    }

    /// Path of the table this object belongs to
    pub fn table_path(&self) -> ObjectPath {
        ObjectPath {
            column: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.schema, self.table)?;
        if let Some(column) = &self.column {
            write!(f, ".{}", column)?;
        }
        Ok(())
    }
}

// =============================================================================
// DESCRIPTION ITEM
// =============================================================================

/// AI-proposed documentation for one catalog object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionItem {
    pub id: Uuid,
    pub object_type: ObjectType,
    pub object_path: String,
    pub catalog_name: String,
    pub schema_name: String,
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_data_type: Option<String>,
    pub ai_generated_description: String,
    pub approved_description: Option<String>,
    pub status: ItemStatus,
    pub model_used: String,
    pub generated_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,
    pub reviewer: Option<String>,
    pub apply_error: Option<String>,
}

impl DescriptionItem {
    /// Create a freshly generated item in PENDING state
    pub fn new_pending(
        path: &ObjectPath,
        column_data_type: Option<String>,
        ai_generated_description: String,
        model_used: String,
    ) -> Self {
        let column_data_type = match path.object_type() {
            ObjectType::Column => column_data_type,
            ObjectType::Table => None,
        };
        Self {
            id: Uuid::new_v4(),
            object_type: path.object_type(),
            object_path: path.to_string(),
            catalog_name: path.catalog.clone(),
            schema_name: path.schema.clone(),
            table_name: path.table.clone(),
            column_name: path.column.clone(),
            column_data_type,
            ai_generated_description,
            approved_description: None,
            status: ItemStatus::Pending,
            model_used,
            generated_at: Utc::now(),
            reviewed_at: None,
            applied_at: None,
            reviewer: None,
            apply_error: None,
        }
    }

    pub fn path(&self) -> ObjectPath {
        ObjectPath {
            catalog: self.catalog_name.clone(),
            schema: self.schema_name.clone(),
            table: self.table_name.clone(),
            column: self.column_name.clone(),
        }
    }

    /// Apply a lifecycle transition in place.
    ///
    /// Fails with `NotFound` when the item is no longer in the transition's
    /// source state, and with `Validation` when the transition's own inputs
    /// are unusable. On error the item is left untouched.
    pub fn apply_transition(
        &mut self,
        transition: &Transition,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let target = transition.target();
        if self.status != transition.source() || !self.status.can_transition_to(target) {
            return Err(AppError::NotFound(format!(
                "No {} item with id {} (current status {})",
                transition.source(),
                self.id,
                self.status
            )));
        }

        match transition {
            Transition::Approve { text, reviewer } => {
                let reviewer = required_reviewer(reviewer)?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(validation_error(
                        "approvedDescription",
                        "Approved description cannot be empty",
                    ));
                }
                self.approved_description = Some(text.to_string());
                self.reviewer = Some(reviewer);
                self.reviewed_at = Some(at);
                self.apply_error = None;
            }
            Transition::Reject { reviewer } => {
                let reviewer = required_reviewer(reviewer)?;
                self.approved_description = None;
                self.reviewer = Some(reviewer);
                self.reviewed_at = Some(at);
            }
            Transition::Apply => {
                self.applied_at = Some(at);
                self.apply_error = None;
            }
        }

        self.status = target;
        Ok(())
    }
}

fn required_reviewer(reviewer: &str) -> Result<String, AppError> {
    let reviewer = reviewer.trim();
    if reviewer.is_empty() {
        return Err(validation_error("reviewer", "Reviewer is required"));
    }
    Ok(reviewer.to_string())
}

/// A requested lifecycle move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Approve { text: String, reviewer: String },
    Reject { reviewer: String },
    Apply,
}

impl Transition {
    pub fn source(&self) -> ItemStatus {
        match self {
            Transition::Approve { .. } | Transition::Reject { .. } => ItemStatus::Pending,
            Transition::Apply => ItemStatus::Approved,
        }
    }

    pub fn target(&self) -> ItemStatus {
        match self {
            Transition::Approve { .. } => ItemStatus::Approved,
            Transition::Reject { .. } => ItemStatus::Rejected,
            Transition::Apply => ItemStatus::Applied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pending_column() -> DescriptionItem {
        let path = ObjectPath::parse("main.sales.orders.amount").unwrap();
        DescriptionItem::new_pending(
            &path,
            Some("decimal(10,2)".to_string()),
            "Order amount in USD".to_string(),
            "test-model".to_string(),
        )
    }

    const ALL: [ItemStatus; 4] = [
        ItemStatus::Pending,
        ItemStatus::Approved,
        ItemStatus::Rejected,
        ItemStatus::Applied,
    ];

    #[test]
    fn test_only_three_edges_are_reachable() {
        let mut edges = Vec::new();
        for from in ALL {
            for to in ALL {
                if from.can_transition_to(to) {
                    edges.push((from, to));
                }
            }
        }
        assert_eq!(
            edges,
            vec![
                (ItemStatus::Pending, ItemStatus::Approved),
                (ItemStatus::Pending, ItemStatus::Rejected),
                (ItemStatus::Approved, ItemStatus::Applied),
            ]
        );
    }

    #[test]
    fn test_parse_paths() {
        let table = ObjectPath::parse("main.sales.orders").unwrap();
        assert_eq!(table.object_type(), ObjectType::Table);
        assert_eq!(table.to_string(), "main.sales.orders");

        let column = ObjectPath::parse("main.sales.orders.amount").unwrap();
        assert_eq!(column.object_type(), ObjectType::Column);
        assert_eq!(column.table_path(), table);

        assert!(ObjectPath::parse("main.sales").is_err());
        assert!(ObjectPath::parse("main.sales.orders; DROP TABLE x").is_err());
    }

    #[test]
    fn test_new_pending_drops_type_for_tables() {
        let path = ObjectPath::parse("main.sales.orders").unwrap();
        let item = DescriptionItem::new_pending(
            &path,
            Some("bigint".to_string()),
            "Orders".to_string(),
            "m".to_string(),
        );
        assert_eq!(item.column_data_type, None);
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.reviewer.is_none() && item.reviewed_at.is_none());
    }

    #[test]
    fn test_approve_with_edited_text() {
        let mut item = pending_column();
        let now = Utc::now();
        item.apply_transition(
            &Transition::Approve {
                text: "  Gross order amount  ".to_string(),
                reviewer: "ana@example.com".to_string(),
            },
            now,
        )
        .unwrap();

        assert_eq!(item.status, ItemStatus::Approved);
        assert_eq!(item.approved_description.as_deref(), Some("Gross order amount"));
        assert_eq!(item.ai_generated_description, "Order amount in USD");
        assert_eq!(item.reviewer.as_deref(), Some("ana@example.com"));
        assert_eq!(item.reviewed_at, Some(now));
    }

    #[test]
    fn test_reject_clears_approved_text() {
        let mut item = pending_column();
        item.apply_transition(
            &Transition::Reject {
                reviewer: "ana".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(item.status, ItemStatus::Rejected);
        assert_eq!(item.approved_description, None);
        assert!(item.reviewed_at.is_some());
    }

    #[test]
    fn test_blank_reviewer_is_validation_error() {
        let mut item = pending_column();
        let before = item.clone();
        let err = item
            .apply_transition(
                &Transition::Reject {
                    reviewer: "   ".to_string(),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "reviewer"));
        assert_eq!(item, before);
    }

    #[test]
    fn test_rejected_item_cannot_be_applied_or_re_reviewed() {
        let mut item = pending_column();
        item.apply_transition(
            &Transition::Reject {
                reviewer: "ana".to_string(),
            },
            Utc::now(),
        )
        .unwrap();

        assert!(matches!(
            item.apply_transition(&Transition::Apply, Utc::now()),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            item.apply_transition(
                &Transition::Approve {
                    text: "x".to_string(),
                    reviewer: "bob".to_string()
                },
                Utc::now()
            ),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(item.status, ItemStatus::Rejected);
    }

    #[test]
    fn test_apply_sets_applied_at_once() {
        let mut item = pending_column();
        item.apply_transition(
            &Transition::Approve {
                text: "Amount".to_string(),
                reviewer: "ana".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        item.apply_error = Some("timeout".to_string());
        item.apply_transition(&Transition::Apply, Utc::now()).unwrap();
        let applied_at = item.applied_at;

        assert_eq!(item.status, ItemStatus::Applied);
        assert_eq!(item.apply_error, None);
        assert!(item.apply_transition(&Transition::Apply, Utc::now()).is_err());
        assert_eq!(item.applied_at, applied_at);
    }
}
