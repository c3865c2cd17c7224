//! Review queue client
//!
//! A local working set of PENDING items that is updated optimistically and
//! reconciled against the server, plus the HTTP backend it talks to.

pub mod api;
pub mod queue;

pub use api::HttpReviewBackend;
pub use queue::{ReviewBackend, ReviewQueue};
