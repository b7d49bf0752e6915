//! Progress documents reported by the job-execution system.
//!
//! A [`ProgressNode`] is the latest known state of one job. Nodes form a
//! forest through the weak `parent_id` reference; the `children` map is
//! only populated on materialised views (see [`crate::tree`]) or on
//! tree-shaped documents returned by a progress query.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ItemId, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Job type
// ---------------------------------------------------------------------------

/// Which aggregation rule applies to a job.
///
/// Serialized as a snake_case tag. Tags this build does not know about are
/// preserved in [`JobType::Other`] so they still get a generic summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobType {
    BatchReprocess,
    SourceIngestion,
    AllSourcesIngestion,
    DomainFetch,
    ScheduleFetch,
    Translation,
    Distillation,
    ContextCollection,
    Other(String),
}

impl JobType {
    /// Wire tag for this job type.
    pub fn as_str(&self) -> &str {
        match self {
            JobType::BatchReprocess => "batch_reprocess",
            JobType::SourceIngestion => "source_ingestion",
            JobType::AllSourcesIngestion => "all_sources_ingestion",
            JobType::DomainFetch => "domain_fetch",
            JobType::ScheduleFetch => "schedule_fetch",
            JobType::Translation => "translation",
            JobType::Distillation => "distillation",
            JobType::ContextCollection => "context_collection",
            JobType::Other(tag) => tag,
        }
    }
}

impl From<&str> for JobType {
    fn from(tag: &str) -> Self {
        match tag {
            "batch_reprocess" => JobType::BatchReprocess,
            "source_ingestion" => JobType::SourceIngestion,
            "all_sources_ingestion" => JobType::AllSourcesIngestion,
            "domain_fetch" => JobType::DomainFetch,
            "schedule_fetch" => JobType::ScheduleFetch,
            "translation" => JobType::Translation,
            "distillation" => JobType::Distillation,
            "context_collection" => JobType::ContextCollection,
            other => JobType::Other(other.to_string()),
        }
    }
}

impl From<String> for JobType {
    fn from(tag: String) -> Self {
        JobType::from(tag.as_str())
    }
}

impl From<JobType> for String {
    fn from(job_type: JobType) -> Self {
        match job_type {
            JobType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Lifecycle status of a job. `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// Status of a single item inside a batch-tracking job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Fetching,
    Fetched,
    Distilling,
    Completed,
    Error,
}

impl ItemStatus {
    /// True once the item's content has been downloaded, including every
    /// later phase.
    pub fn is_fetched(self) -> bool {
        matches!(
            self,
            ItemStatus::Fetched | ItemStatus::Distilling | ItemStatus::Completed
        )
    }
}

/// Per-item progress reported by fetch and reprocess jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProgressState {
    pub item_id: ItemId,
    pub title: String,
    pub status: ItemStatus,
    pub changed_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemProgressState {
    pub fn new(
        item_id: impl Into<ItemId>,
        title: impl Into<String>,
        status: ItemStatus,
        changed_at: Timestamp,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            title: title.into(),
            status,
            changed_at,
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Type-specific counters and payload.
///
/// Flattened into the node document; each job type fills in the subset it
/// reports and leaves the rest absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entry_progress: BTreeMap<ItemId, ItemProgressState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_entries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_entries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries_created: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries_distilled: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeds_completed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeds_total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeds_processed: Option<u32>,
    /// Translation provider key, e.g. `"deepl"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_extractions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_extractions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries_enriched: Option<u32>,
}

// ---------------------------------------------------------------------------
// ProgressNode
// ---------------------------------------------------------------------------

fn default_visible() -> bool {
    true
}

/// Latest known progress of one job instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNode {
    pub id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<JobId>,
    /// Internal jobs set this to `false` so they never raise a notification.
    #[serde(default = "default_visible")]
    pub visible_as_toast: bool,
    #[serde(flatten)]
    pub metrics: JobMetrics,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<JobId, ProgressNode>,
}

impl ProgressNode {
    /// Create a node with the required fields; `started_at` and
    /// `updated_at` both start at `at`.
    pub fn new(id: impl Into<JobId>, job_type: JobType, status: JobStatus, at: Timestamp) -> Self {
        Self {
            id: id.into(),
            job_type,
            status,
            current_step: None,
            message: None,
            started_at: at,
            updated_at: at,
            error: None,
            parent_id: None,
            visible_as_toast: true,
            metrics: JobMetrics::default(),
            children: BTreeMap::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<JobId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.current_step = Some(step.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_metrics(mut self, metrics: JobMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Insert (or replace) one tracked item in `entry_progress`.
    pub fn with_item(mut self, item: ItemProgressState) -> Self {
        self.metrics
            .entry_progress
            .insert(item.item_id.clone(), item);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible_as_toast = false;
        self
    }
}

// ---------------------------------------------------------------------------
// Active job listing
// ---------------------------------------------------------------------------

/// One row of the progress query's "list active jobs" response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveJob {
    pub id: JobId,
    pub job_type: JobType,
    pub start_time: Timestamp,
    #[serde(default)]
    pub progress: Option<ProgressNode>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
