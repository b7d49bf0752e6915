//! Progress-tree model and aggregation for background job tracking.
//!
//! - [`progress`]: the per-job [`ProgressNode`](progress::ProgressNode)
//!   document and its sub-item states.
//! - [`tree`]: [`ProgressTree`](tree::ProgressTree), the incrementally
//!   rebuilt forest of nodes, including orphan handling.
//! - [`aggregate`]: recursive item collection and status counting.
//! - [`summary`]: job-type-aware, human-readable status summaries.
//!
//! Everything here is pure data and pure functions: no I/O, no clocks
//! beyond the timestamps carried inside the documents.

pub mod aggregate;
pub mod error;
pub mod progress;
pub mod summary;
pub mod tree;
pub mod types;
