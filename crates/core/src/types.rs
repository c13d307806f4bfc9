/// All relational primary keys are SQLite INTEGER PRIMARY KEY rowids.
pub type DbId = i64;

/// Blob identifiers are random UUIDs assigned by the blob store on creation.
pub type BlobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
