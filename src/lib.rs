//! Description Governance
//!
//! AI-proposed catalog descriptions, reviewed by humans before they are
//! written back as table and column comments.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod governance;
pub mod model;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod state;

#[cfg(test)]
mod testing;

pub use routes::create_router;
