use crate::config::ServerConfig;
use crate::rpc::{
    ErrorBody, ErrorDetail, KeyData, KeyDataList, KeyDataListRequest, KeyDataRequest, KeyService,
    CERTIFICATE_DER_PATH, CERTIFICATE_PATH, HEALTH_PATH, LIST_PATH,
};
use crate::utils::errors::{ErrorKind, KeyServerError, Result};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::future::Future;
use tokio::net::TcpListener;

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::TimedOut => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Parse => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Transport => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for KeyServerError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = ErrorBody {
            error: ErrorDetail {
                kind,
                message: self.to_string(),
            },
        };
        (kind.status_code(), Json(body)).into_response()
    }
}

/// Build the HTTP routes of the key service
pub fn create_router(service: KeyService) -> Router {
    Router::new()
        .route(LIST_PATH, get(list_certificates))
        .route(CERTIFICATE_PATH, get(retrieve_certificate))
        .route(CERTIFICATE_DER_PATH, get(download_der))
        .route(HEALTH_PATH, get(health))
        .with_state(service)
}

/// Serve the key service until Ctrl-C is received
pub async fn serve(config: &ServerConfig, service: KeyService) -> Result<()> {
    let listener = TcpListener::bind(config.bind).await?;
    serve_listener(listener, service, shutdown_signal()).await
}

/// Serve the key service on an already bound listener until `shutdown`
/// completes
pub async fn serve_listener<F>(listener: TcpListener, service: KeyService, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("Key server listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(service))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Key server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn list_certificates(
    State(service): State<KeyService>,
    query: std::result::Result<Query<KeyDataListRequest>, QueryRejection>,
) -> Result<Json<KeyDataList>> {
    let Query(request) =
        query.map_err(|rejection| KeyServerError::InvalidRequest(rejection.body_text()))?;
    tracing::debug!(
        "ListCertificates start={} count={}",
        request.start_index,
        request.count
    );
    Ok(Json(service.list_certificates(&request).await?))
}

async fn retrieve_certificate(
    State(service): State<KeyService>,
    Path(index): Path<String>,
) -> Result<Json<KeyData>> {
    let request = KeyDataRequest {
        index: parse_index(&index)?,
    };
    tracing::debug!("RetrieveCertificateByIndex index={}", request.index);
    Ok(Json(service.retrieve_certificate_by_index(&request).await?))
}

async fn download_der(
    State(service): State<KeyService>,
    Path(index): Path<String>,
) -> Result<Response> {
    let index = parse_index(&index)?;
    let der = service.store().get(index).await?;

    let disposition = format!("attachment; filename={index}.der");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pkix-cert".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        der,
    )
        .into_response())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn parse_index(raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|e| KeyServerError::InvalidRequest(format!("Invalid index '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::Certificate;
    use crate::storage::CertificateStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    const LEAF_DERS: [&[u8]; 3] = [
        include_bytes!("../../tests/fixtures/leaf-1.der"),
        include_bytes!("../../tests/fixtures/leaf-2.der"),
        include_bytes!("../../tests/fixtures/leaf-3.der"),
    ];

    async fn app() -> Router {
        let store = Arc::new(CertificateStore::in_memory());
        for der in LEAF_DERS {
            let cert = Certificate::from_der(der.to_vec()).unwrap();
            store.add_certificate(&cert).await.unwrap();
        }
        create_router(KeyService::new(store))
    }

    async fn get_request(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_list_endpoint() {
        let (status, body) = get_request(app().await, "/v1/certificates?startIndex=2&count=5").await;
        assert_eq!(status, StatusCode::OK);

        let list: KeyDataList = serde_json::from_slice(&body).unwrap();
        let indices: Vec<u64> = list.records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_list_endpoint_defaults() {
        let (status, body) = get_request(app().await, "/v1/certificates").await;
        assert_eq!(status, StatusCode::OK);
        let list: KeyDataList = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.records.len(), 3);
    }

    #[tokio::test]
    async fn test_retrieve_endpoint() {
        let (status, body) = get_request(app().await, "/v1/certificates/1").await;
        assert_eq!(status, StatusCode::OK);

        let data: KeyData = serde_json::from_slice(&body).unwrap();
        assert_eq!(data.index, 1);
        assert_eq!(data.der_certificate.as_deref(), Some(LEAF_DERS[0]));
    }

    #[tokio::test]
    async fn test_retrieve_missing_maps_to_404() {
        let (status, body) = get_request(app().await, "/v1/certificates/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let error: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_bad_index_is_invalid_request() {
        let (status, body) = get_request(app().await, "/v1/certificates/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let error: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error.kind, ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_negative_count_is_invalid_request() {
        let (status, _) = get_request(app().await, "/v1/certificates?count=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_query_is_json_invalid_request() {
        for uri in [
            "/v1/certificates?count=abc",
            "/v1/certificates?startIndex=-1",
            "/v1/certificates?count=3000000000",
        ] {
            let (status, body) = get_request(app().await, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");

            let error: ErrorBody = serde_json::from_slice(&body).unwrap();
            assert_eq!(error.error.kind, ErrorKind::InvalidRequest, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_der_download() {
        let (status, body) = get_request(app().await, "/v1/certificates/3/der").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, LEAF_DERS[2]);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_request(app().await, "/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "ok");
    }
}
