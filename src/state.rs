//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::governance::Governance;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Governance workflow over the configured store, catalog, gate and model
    pub governance: Governance,

    /// Principal used when a request carries no identity header
    pub default_principal: String,
}

impl AppState {
    pub fn new(governance: Governance, default_principal: impl Into<String>) -> Self {
        Self {
            governance,
            default_principal: default_principal.into(),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
