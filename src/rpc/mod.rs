//! Remote interface of the key server.
//!
//! Two operations are exposed: listing the display fields of a range of
//! certificates and retrieving one certificate, DER payload included, by
//! index. Messages travel as JSON over HTTP; DER bytes are base64 encoded.

pub mod client;
pub mod server;
pub mod service;

use crate::cert::metadata::from_unix_seconds;
use crate::cert::{Certificate, CertificateSummary};
use crate::utils::errors::{ErrorKind, KeyServerError};
use serde::{Deserialize, Serialize};

pub use client::{HttpKeyTransport, KeySource};
pub use server::{create_router, serve, serve_listener};
pub use service::KeyService;

/// Page size used when a list request does not specify one.
pub const DEFAULT_LIST_COUNT: i32 = 20;

pub const LIST_PATH: &str = "/v1/certificates";
pub const CERTIFICATE_PATH: &str = "/v1/certificates/:index";
pub const CERTIFICATE_DER_PATH: &str = "/v1/certificates/:index/der";
pub const HEALTH_PATH: &str = "/v1/health";

fn default_list_count() -> i32 {
    DEFAULT_LIST_COUNT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDataListRequest {
    #[serde(default)]
    pub start_index: u64,
    #[serde(default = "default_list_count")]
    pub count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDataRequest {
    pub index: u64,
}

/// One certificate as seen by remote callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyData {
    pub index: u64,
    pub subject: String,
    pub issuer: String,
    /// Unix seconds
    pub expires: u64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub der_certificate: Option<Vec<u8>>,
}

impl From<&CertificateSummary> for KeyData {
    fn from(summary: &CertificateSummary) -> Self {
        Self {
            index: summary.index,
            subject: summary.subject.clone(),
            issuer: summary.issuer.clone(),
            expires: summary.expires(),
            der_certificate: None,
        }
    }
}

impl From<&Certificate> for KeyData {
    fn from(cert: &Certificate) -> Self {
        Self {
            index: cert.index,
            subject: cert.subject.clone(),
            issuer: cert.issuer.clone(),
            expires: cert.expires(),
            der_certificate: Some(cert.der().to_vec()),
        }
    }
}

impl TryFrom<&KeyData> for CertificateSummary {
    type Error = KeyServerError;

    fn try_from(data: &KeyData) -> Result<Self, Self::Error> {
        Ok(Self {
            index: data.index,
            subject: data.subject.clone(),
            issuer: data.issuer.clone(),
            expires_at: from_unix_seconds(data.expires)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyDataList {
    pub records: Vec<KeyData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

mod base64_bytes {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&general_purpose::STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| {
                general_purpose::STANDARD
                    .decode(text)
                    .map_err(de::Error::custom)
            })
            .transpose()
    }
}
