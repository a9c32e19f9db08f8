use crate::rpc::{KeyData, KeyDataList, KeyDataListRequest, KeyDataRequest};
use crate::storage::CertificateStore;
use crate::utils::errors::Result;
use std::sync::Arc;

/// Server side of the key server interface.
///
/// Holds no state besides the store; every call is delegated and every store
/// error is passed through unchanged.
#[derive(Clone)]
pub struct KeyService {
    store: Arc<CertificateStore>,
}

impl KeyService {
    pub fn new(store: Arc<CertificateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    /// List the display fields of the certificates following the start index
    pub async fn list_certificates(&self, request: &KeyDataListRequest) -> Result<KeyDataList> {
        let summaries = self
            .store
            .list(request.start_index, request.count)
            .await?;

        Ok(KeyDataList {
            records: summaries.iter().map(KeyData::from).collect(),
        })
    }

    /// Retrieve the certificate with the given index, DER included
    pub async fn retrieve_certificate_by_index(&self, request: &KeyDataRequest) -> Result<KeyData> {
        let cert = self.store.retrieve_certificate(request.index).await?;
        Ok(KeyData::from(&cert))
    }
}
