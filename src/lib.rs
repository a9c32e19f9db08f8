pub mod cert;
pub mod cli;
pub mod client;
pub mod config;
pub mod rpc;
pub mod storage;
pub mod utils;

pub use cert::{Certificate, CertificateParser, CertificateSummary, RecordColumn};
pub use client::{CertificateCache, KeyClient, StatsSnapshot};
pub use config::{ClientConfig, ServerConfig};
pub use rpc::{HttpKeyTransport, KeyService, KeySource};
pub use storage::{CertificateStore, ColumnBackend, MemoryBackend};
pub use utils::errors::{ErrorKind, KeyServerError, Result};
