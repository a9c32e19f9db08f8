//! Contract of the wide-column record store the certificate store persists to.
//!
//! Rows are addressed by a byte key inside a column family and hold named
//! columns. The backend offers point reads of a single column, ordered range
//! scans over keys restricted to a set of columns, and batched multi-column
//! writes that are atomic per row.

use async_trait::async_trait;
use thiserror::Error;

/// Failure categories reported by a column backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("not found")]
    NotFound,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unavailable")]
    Unavailable,

    #[error("timed out")]
    TimedOut,

    #[error("transport: {0}")]
    Transport(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// How many replicas must take part in an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyLevel {
    One,
    Quorum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub value: Vec<u8>,
    /// Write time in microseconds since the epoch; the newest write wins
    pub timestamp: i64,
}

impl Column {
    pub fn new(name: &str, value: Vec<u8>, timestamp: i64) -> Self {
        Self {
            name: name.to_string(),
            value,
            timestamp,
        }
    }
}

/// One row returned by a range scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySlice {
    pub key: Vec<u8>,
    pub columns: Vec<Column>,
}

/// Key bounds of a range scan. Empty keys leave that side unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    pub count: usize,
}

/// All columns written to one row in one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMutation {
    pub column_family: String,
    pub key: Vec<u8>,
    pub columns: Vec<Column>,
}

#[async_trait]
pub trait ColumnBackend: Send + Sync {
    /// Read a single column of a single row.
    async fn get(
        &self,
        column_family: &str,
        key: &[u8],
        column: &str,
        consistency: ConsistencyLevel,
    ) -> BackendResult<Column>;

    /// Scan rows in ascending key order, returning only the named columns.
    /// Rows holding none of them are still returned, with no columns.
    async fn get_range_slices(
        &self,
        column_family: &str,
        columns: &[&str],
        range: &KeyRange,
        consistency: ConsistencyLevel,
    ) -> BackendResult<Vec<KeySlice>>;

    /// Apply every mutation; each row is updated atomically.
    async fn batch_mutate(
        &self,
        mutations: Vec<RowMutation>,
        consistency: ConsistencyLevel,
    ) -> BackendResult<()>;
}
