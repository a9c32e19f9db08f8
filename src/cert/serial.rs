//! Conversions between certificate serial numbers, numeric indices and
//! store row keys.
//!
//! The index of a certificate is its issuer-assigned serial number read as an
//! unsigned 64-bit integer. Row keys are the 8-byte big-endian encoding of the
//! index so that byte order and numeric order agree.

use thiserror::Error;

/// Width of an encoded row key.
pub const KEY_LEN: usize = 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SerialNumberParseError {
    #[error("Empty serial number")]
    EmptyString,

    #[error("Negative serial number")]
    Negative,

    #[error("Serial number is {0} bytes wide, at most 8 are supported")]
    TooWide(usize),

    #[error("Invalid key length: expected 8 bytes, got {0}")]
    InvalidKeyLength(usize),
}

pub type Result<T> = std::result::Result<T, SerialNumberParseError>;

/// Read the raw DER INTEGER content of a serial number as an index.
pub fn index_from_serial(raw: &[u8]) -> Result<u64> {
    let first = *raw.first().ok_or(SerialNumberParseError::EmptyString)?;
    if first & 0x80 != 0 {
        return Err(SerialNumberParseError::Negative);
    }

    let start = raw.iter().position(|b| *b != 0).unwrap_or(raw.len());
    let significant = &raw[start..];
    if significant.len() > KEY_LEN {
        return Err(SerialNumberParseError::TooWide(significant.len()));
    }

    Ok(significant
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
}

/// Encode an index as a row key.
pub fn index_to_key(index: u64) -> [u8; KEY_LEN] {
    index.to_be_bytes()
}

/// Decode a row key back into an index.
pub fn index_from_key(key: &[u8]) -> Result<u64> {
    let bytes: [u8; KEY_LEN] = key
        .try_into()
        .map_err(|_| SerialNumberParseError::InvalidKeyLength(key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}
