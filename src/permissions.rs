//! Permission gate
//!
//! Answers whether a principal may read and modify a catalog/schema. Checks
//! are evaluated fresh on every call and never fail the caller: evaluation
//! problems come back as `can_modify = false` with the reason in `errors`.

use crate::catalog::queries::{CURRENT_CATALOG, ROLE_EXISTS, SCHEMA_EXISTS, SCHEMA_PRIVILEGES};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of a permission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub can_modify: bool,
    pub can_select: bool,
    pub user: String,
    pub errors: Vec<String>,
}

impl Capability {
    pub fn denied(user: &str, error: impl Into<String>) -> Self {
        Self {
            can_modify: false,
            can_select: false,
            user: user.to_string(),
            errors: vec![error.into()],
        }
    }
}

#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn check(&self, principal: &str, catalog: &str, schema: &str) -> Capability;
}

/// Gate that denies everything; used when no catalog is configured
pub struct DenyAllGate;

#[async_trait]
impl PermissionGate for DenyAllGate {
    async fn check(&self, principal: &str, _catalog: &str, _schema: &str) -> Capability {
        Capability::denied(principal, "No catalog connection configured")
    }
}

/// Gate backed by PostgreSQL schema privileges
pub struct PgPermissionGate {
    pool: Pool,
}

impl PgPermissionGate {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn evaluate(
        &self,
        principal: &str,
        catalog: &str,
        schema: &str,
    ) -> Result<Capability, String> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| format!("Catalog unreachable: {}", e))?;

        let current: String = client
            .query_one(CURRENT_CATALOG, &[])
            .await
            .map_err(|e| e.to_string())?
            .get(0);
        if current != catalog {
            return Ok(Capability::denied(
                principal,
                format!("Catalog '{}' does not exist", catalog),
            ));
        }

        let schema_exists: bool = client
            .query_one(SCHEMA_EXISTS, &[&schema])
            .await
            .map_err(|e| e.to_string())?
            .get(0);
        if !schema_exists {
            return Ok(Capability::denied(
                principal,
                format!("Schema '{}.{}' does not exist", catalog, schema),
            ));
        }

        let role_exists: bool = client
            .query_one(ROLE_EXISTS, &[&principal])
            .await
            .map_err(|e| e.to_string())?
            .get(0);

        let mut errors = Vec::new();
        let role = if role_exists {
            principal.to_string()
        } else {
            // Unknown principals are evaluated as the connection role but never granted modify
            errors.push(format!(
                "Principal '{}' is not a known role; evaluated as the connection role",
                principal
            ));
            client
                .query_one("SELECT current_user::text", &[])
                .await
                .map_err(|e| e.to_string())?
                .get(0)
        };

        let row = client
            .query_one(SCHEMA_PRIVILEGES, &[&role, &schema])
            .await
            .map_err(|e| e.to_string())?;
        let can_select: bool = row.get("can_select");
        let mut can_modify: bool = row.get("can_modify");

        if !role_exists {
            can_modify = false;
        } else {
            if !can_select {
                errors.push(format!("Missing USAGE privilege on schema '{}'", schema));
            }
            if !can_modify {
                errors.push(format!("Missing CREATE privilege on schema '{}'", schema));
            }
        }

        Ok(Capability {
            can_modify: can_modify && can_select,
            can_select,
            user: principal.to_string(),
            errors,
        })
    }
}

#[async_trait]
impl PermissionGate for PgPermissionGate {
    async fn check(&self, principal: &str, catalog: &str, schema: &str) -> Capability {
        match self.evaluate(principal, catalog, schema).await {
            Ok(capability) => {
                debug!(
                    "Permission check {} on {}.{}: modify={} select={}",
                    principal, catalog, schema, capability.can_modify, capability.can_select
                );
                capability
            }
            Err(reason) => {
                warn!(
                    "Permission check failed for {} on {}.{}: {}",
                    principal, catalog, schema, reason
                );
                Capability::denied(principal, format!("Permission check failed: {}", reason))
            }
        }
    }
}
