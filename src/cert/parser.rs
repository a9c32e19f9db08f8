use crate::cert::metadata::Certificate;
use crate::cert::name::format_distinguished_name;
use crate::cert::serial;
use crate::utils::errors::{KeyServerError, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

pub struct CertificateParser;

impl CertificateParser {
    /// Parse a DER certificate into an owned certificate value
    pub fn parse_der(der: Vec<u8>) -> Result<Certificate> {
        let (index, subject, issuer, not_before, not_after) = {
            let (rest, cert) = X509Certificate::from_der(&der)
                .map_err(|e| KeyServerError::Parse(format!("DER parsing error: {e}")))?;

            if !rest.is_empty() {
                return Err(KeyServerError::Parse(format!(
                    "{} trailing bytes after certificate",
                    rest.len()
                )));
            }

            let index = serial::index_from_serial(cert.tbs_certificate.raw_serial())
                .map_err(|e| KeyServerError::Parse(format!("Serial number error: {e}")))?;

            (
                index,
                format_distinguished_name(cert.subject()),
                format_distinguished_name(cert.issuer()),
                Self::to_datetime(cert.validity().not_before.timestamp())?,
                Self::to_datetime(cert.validity().not_after.timestamp())?,
            )
        };

        Ok(Certificate::new(
            index, subject, issuer, not_before, not_after, der,
        ))
    }

    /// Parse certificate data that is either a PEM block or raw DER
    pub fn parse_pem_or_der(data: &[u8]) -> Result<Certificate> {
        match std::str::from_utf8(data) {
            Ok(text) if text.contains(PEM_BEGIN) => Self::parse_pem(text),
            _ => Self::parse_der(data.to_vec()),
        }
    }

    /// Parse the first certificate of PEM data
    pub fn parse_pem(pem_data: &str) -> Result<Certificate> {
        let cert_data = Self::extract_cert_from_pem(pem_data)?;

        let der_bytes = general_purpose::STANDARD
            .decode(&cert_data)
            .map_err(|e| KeyServerError::Parse(format!("Base64 decode error: {e}")))?;

        Self::parse_der(der_bytes)
    }

    /// Extract the base64 body of the first certificate block
    fn extract_cert_from_pem(pem_data: &str) -> Result<String> {
        let mut in_cert = false;
        let mut cert_lines = Vec::new();

        for line in pem_data.lines() {
            let line = line.trim();
            if line == PEM_BEGIN {
                in_cert = true;
                continue;
            } else if line == PEM_END {
                break;
            } else if in_cert {
                cert_lines.push(line);
            }
        }

        if cert_lines.is_empty() {
            return Err(KeyServerError::Parse(
                "No certificate data found in PEM".to_string(),
            ));
        }

        Ok(cert_lines.join(""))
    }

    fn to_datetime(timestamp: i64) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| KeyServerError::Parse(format!("Validity out of range: {timestamp}")))
    }
}
