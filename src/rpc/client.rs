use crate::rpc::{
    ErrorBody, KeyData, KeyDataList, KeyDataListRequest, KeyDataRequest, KeyService, LIST_PATH,
};
use crate::utils::errors::{KeyServerError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

/// Anything that can answer the two key server calls.
///
/// The caching client only talks to this trait, so it works the same over
/// HTTP and against an in-process service.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn retrieve_certificate_by_index(&self, index: u64) -> Result<KeyData>;

    async fn list_certificates(&self, start_index: u64, count: i32) -> Result<KeyDataList>;
}

#[async_trait]
impl KeySource for KeyService {
    async fn retrieve_certificate_by_index(&self, index: u64) -> Result<KeyData> {
        KeyService::retrieve_certificate_by_index(self, &KeyDataRequest { index }).await
    }

    async fn list_certificates(&self, start_index: u64, count: i32) -> Result<KeyDataList> {
        KeyService::list_certificates(self, &KeyDataListRequest { start_index, count }).await
    }
}

/// HTTP transport to a remote key server
pub struct HttpKeyTransport {
    client: Client,
    base_url: String,
}

impl HttpKeyTransport {
    pub fn new(server: &Url, timeout: Duration) -> Result<Self> {
        let client = create_http_client(timeout)?;
        Ok(Self {
            client,
            base_url: server.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(error) => Err(KeyServerError::from_remote(
                error.error.kind,
                error.error.message,
            )),
            Err(_) => Err(KeyServerError::Transport(format!(
                "Unexpected response: {status} - {body}"
            ))),
        }
    }
}

/// Create the HTTP client used to reach a key server
fn create_http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .use_rustls_tls()
        .build()?)
}

#[async_trait]
impl KeySource for HttpKeyTransport {
    async fn retrieve_certificate_by_index(&self, index: u64) -> Result<KeyData> {
        let url = format!("{}{}/{}", self.base_url, LIST_PATH, index);
        tracing::trace!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn list_certificates(&self, start_index: u64, count: i32) -> Result<KeyDataList> {
        let url = format!("{}{}", self.base_url, LIST_PATH);
        tracing::trace!("GET {} start={} count={}", url, start_index, count);

        let response = self
            .client
            .get(&url)
            .query(&KeyDataListRequest { start_index, count })
            .send()
            .await?;
        Self::decode(response).await
    }
}
