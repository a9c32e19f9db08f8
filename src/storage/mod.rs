pub mod backend;
pub mod memory;

use crate::cert::metadata::{from_unix_seconds, unix_seconds};
use crate::cert::{serial, Certificate, CertificateRecord, CertificateSummary};
use crate::utils::errors::{KeyServerError, Result};
use backend::{Column, KeyRange, KeySlice, RowMutation};
use chrono::Utc;
use std::sync::Arc;

pub use backend::{BackendError, ColumnBackend, ConsistencyLevel};
pub use memory::MemoryBackend;

/// Column family holding one row per certificate.
pub const CERTIFICATE_FAMILY: &str = "certificate";

pub const COLUMN_SUBJECT: &str = "subject";
pub const COLUMN_ISSUER: &str = "issuer";
pub const COLUMN_EXPIRES: &str = "expires";
pub const COLUMN_DER: &str = "der_certificate";

/// Columns returned when listing certificates. The DER payload is left out to
/// keep list responses small.
const DISPLAY_COLUMNS: [&str; 3] = [COLUMN_SUBJECT, COLUMN_ISSUER, COLUMN_EXPIRES];

/// Maps certificate indices to rows of the column backend.
pub struct CertificateStore {
    backend: Arc<dyn ColumnBackend>,
}

impl CertificateStore {
    pub fn new(backend: Arc<dyn ColumnBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by a fresh in-memory backend
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Write all fields of a record as one atomic row mutation.
    ///
    /// An existing record at the same index is overwritten.
    pub async fn put(&self, record: &CertificateRecord) -> Result<()> {
        let timestamp = Utc::now().timestamp_micros();
        // Expiry before the epoch is stored as 0
        let expires = unix_seconds(&record.expires_at);

        let mutation = RowMutation {
            column_family: CERTIFICATE_FAMILY.to_string(),
            key: serial::index_to_key(record.index).to_vec(),
            columns: vec![
                Column::new(COLUMN_SUBJECT, record.subject.as_bytes().to_vec(), timestamp),
                Column::new(COLUMN_ISSUER, record.issuer.as_bytes().to_vec(), timestamp),
                Column::new(COLUMN_EXPIRES, expires.to_be_bytes().to_vec(), timestamp),
                Column::new(COLUMN_DER, record.der.clone(), timestamp),
            ],
        };

        self.backend
            .batch_mutate(vec![mutation], ConsistencyLevel::Quorum)
            .await?;

        tracing::debug!(
            "Stored certificate {} (key {})",
            record.index,
            hex::encode(serial::index_to_key(record.index))
        );
        Ok(())
    }

    /// Store every field of a parsed certificate
    pub async fn add_certificate(&self, certificate: &Certificate) -> Result<()> {
        self.put(&certificate.to_record()).await
    }

    /// Fetch the raw DER bytes stored at an index
    pub async fn get(&self, index: u64) -> Result<Vec<u8>> {
        let key = serial::index_to_key(index);
        tracing::debug!("Fetching DER for certificate {}", index);

        let column = self
            .backend
            .get(CERTIFICATE_FAMILY, &key, COLUMN_DER, ConsistencyLevel::One)
            .await
            .map_err(|e| match KeyServerError::from(e) {
                KeyServerError::NotFound(_) => {
                    KeyServerError::NotFound(format!("No certificate with index {index}"))
                }
                other => other,
            })?;

        Ok(column.value)
    }

    /// Fetch and parse the certificate stored at an index
    pub async fn retrieve_certificate(&self, index: u64) -> Result<Certificate> {
        let der = self.get(index).await?;
        Certificate::from_der(der)
    }

    /// List up to `count` certificates with an index of at least
    /// `start_index`, in ascending index order.
    pub async fn list(&self, start_index: u64, count: i32) -> Result<Vec<CertificateSummary>> {
        let count = usize::try_from(count).map_err(|_| {
            KeyServerError::InvalidRequest(format!("Negative certificate count: {count}"))
        })?;

        let start_key = if start_index > 0 {
            serial::index_to_key(start_index).to_vec()
        } else {
            Vec::new()
        };
        let range = KeyRange {
            start_key,
            end_key: Vec::new(),
            count,
        };

        let slices = self
            .backend
            .get_range_slices(
                CERTIFICATE_FAMILY,
                &DISPLAY_COLUMNS,
                &range,
                ConsistencyLevel::One,
            )
            .await?;

        tracing::debug!(
            "Listed {} certificates starting at {}",
            slices.len(),
            start_index
        );
        slices.iter().map(Self::summary_from_slice).collect()
    }

    fn summary_from_slice(slice: &KeySlice) -> Result<CertificateSummary> {
        let index = serial::index_from_key(&slice.key)
            .map_err(|e| KeyServerError::InvalidRequest(format!("Malformed row key: {e}")))?;

        let mut subject = String::new();
        let mut issuer = String::new();
        let mut expires = 0u64;

        for column in &slice.columns {
            match column.name.as_str() {
                COLUMN_SUBJECT => subject = Self::text_column(index, column)?,
                COLUMN_ISSUER => issuer = Self::text_column(index, column)?,
                COLUMN_EXPIRES => {
                    let bytes: [u8; 8] = column.value.as_slice().try_into().map_err(|_| {
                        KeyServerError::InvalidRequest(format!(
                            "Malformed expiry for certificate {index}"
                        ))
                    })?;
                    expires = u64::from_be_bytes(bytes);
                }
                other => {
                    return Err(KeyServerError::InvalidRequest(format!(
                        "Unexpected column: {other}"
                    )))
                }
            }
        }

        Ok(CertificateSummary {
            index,
            subject,
            issuer,
            expires_at: from_unix_seconds(expires)?,
        })
    }

    fn text_column(index: u64, column: &Column) -> Result<String> {
        String::from_utf8(column.value.clone()).map_err(|_| {
            KeyServerError::InvalidRequest(format!(
                "Column {} of certificate {index} is not valid UTF-8",
                column.name
            ))
        })
    }
}
