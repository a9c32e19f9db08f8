pub mod metadata;
pub mod name;
pub mod parser;
pub mod serial;

pub use metadata::{Certificate, CertificateRecord, CertificateSummary, RecordColumn};
pub use name::format_distinguished_name;
pub use parser::CertificateParser;
