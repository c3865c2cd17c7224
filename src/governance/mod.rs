//! Description governance workflow
//!
//! Generation -> review -> apply, with statistics derived from the item set.

pub mod apply;
pub mod generate;
pub mod item;
pub mod operations;
pub mod pg_store;
pub mod review;
pub mod service;
pub mod stats;
pub mod store;

pub use apply::{ApplyFailure, ApplyResult};
pub use generate::{GenerationFailure, GenerationRequest, GenerationResult, GenerationTarget};
pub use item::{DescriptionItem, ItemStatus, ObjectPath, ObjectType, Transition};
pub use operations::{OperationInfo, OperationKind, OperationState};
pub use pg_store::PgItemStore;
pub use review::{BulkReviewOutcome, Decision};
pub use service::{Governance, ReviewActivityReport};
pub use stats::BucketWindow;
pub use store::{ItemQuery, ItemStore, MemoryItemStore, Page};
