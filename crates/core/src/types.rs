/// Opaque job identifier assigned by the job-execution system.
pub type JobId = String;

/// Identifier of a sub-item (feed entry) tracked inside a job.
pub type ItemId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
