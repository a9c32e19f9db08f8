use crate::utils::errors::{KeyServerError, Result};
use crate::utils::output::GetColumnValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A parsed X.509 certificate, owned and immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Issuer-assigned serial number
    pub index: u64,
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    der: Vec<u8>,
}

impl Certificate {
    pub(crate) fn new(
        index: u64,
        subject: String,
        issuer: String,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
        der: Vec<u8>,
    ) -> Self {
        Self {
            index,
            subject,
            issuer,
            not_before,
            not_after,
            der,
        }
    }

    /// Parse a DER encoded certificate
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        crate::cert::CertificateParser::parse_der(der)
    }

    /// Parse a certificate from either a PEM block or raw DER bytes
    pub fn from_pem_or_der(data: &[u8]) -> Result<Self> {
        crate::cert::CertificateParser::parse_pem_or_der(data)
    }

    /// Raw DER encoding, byte-identical to what was parsed
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Expiry as Unix seconds
    pub fn expires(&self) -> u64 {
        unix_seconds(&self.not_after)
    }

    /// Build the storage record describing this certificate
    pub fn to_record(&self) -> CertificateRecord {
        CertificateRecord {
            index: self.index,
            subject: self.subject.clone(),
            issuer: self.issuer.clone(),
            expires_at: self.not_after,
            der: self.der.clone(),
        }
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Index: {}, Subject: {}, Expires: {}",
            self.index,
            self.subject,
            self.not_after.format("%Y-%m-%d %H:%M")
        )
    }
}

/// Everything the store keeps about one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub index: u64,
    pub subject: String,
    pub issuer: String,
    pub expires_at: DateTime<Utc>,
    pub der: Vec<u8>,
}

/// Display fields of a stored certificate, without the DER payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub index: u64,
    pub subject: String,
    pub issuer: String,
    pub expires_at: DateTime<Utc>,
}

impl CertificateSummary {
    pub fn expires(&self) -> u64 {
        unix_seconds(&self.expires_at)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Unix seconds for a timestamp, clamping anything before the epoch to 0.
pub(crate) fn unix_seconds(time: &DateTime<Utc>) -> u64 {
    u64::try_from(time.timestamp()).unwrap_or(0)
}

/// Timestamp for Unix seconds carried on the wire or in the store.
pub(crate) fn from_unix_seconds(seconds: u64) -> Result<DateTime<Utc>> {
    i64::try_from(seconds)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| {
            KeyServerError::InvalidRequest(format!("Timestamp out of range: {seconds}"))
        })
}

#[derive(Debug, Clone)]
pub enum RecordColumn {
    Index,
    Subject,
    Issuer,
    Expires,
    Expired,
}

impl FromStr for RecordColumn {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "index" | "serial" => Ok(Self::Index),
            "subject" => Ok(Self::Subject),
            "issuer" => Ok(Self::Issuer),
            "expires" | "not_after" => Ok(Self::Expires),
            "expired" | "e" => Ok(Self::Expired),
            _ => Err(format!("Invalid column: {s}")),
        }
    }
}

impl RecordColumn {
    pub fn defaults() -> Vec<Self> {
        vec![Self::Index, Self::Subject, Self::Issuer, Self::Expires]
    }

    pub fn header(&self) -> &'static str {
        match self {
            Self::Index => "Index",
            Self::Subject => "Subject",
            Self::Issuer => "Issuer",
            Self::Expires => "Expires",
            Self::Expired => "E",
        }
    }
}

impl GetColumnValue for CertificateSummary {
    fn get_column_value(&self, column: &RecordColumn) -> String {
        match column {
            RecordColumn::Index => self.index.to_string(),
            RecordColumn::Subject => self.subject.clone(),
            RecordColumn::Issuer => self.issuer.clone(),
            RecordColumn::Expires => self.expires_at.format("%Y-%m-%d %H:%M").to_string(),
            RecordColumn::Expired => {
                if self.is_expired() {
                    "✗".to_string()
                } else {
                    " ".to_string()
                }
            }
        }
    }
}
