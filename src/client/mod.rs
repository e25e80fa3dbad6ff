//! HTTP client for the file endpoints, plus the download/save actions built on it.

mod actions;
mod saver;

pub use actions::{DownloadOutcome, FileActions, Notifier, TracingNotifier, DOWNLOAD_FAILED};
pub use saver::{BlobSaver, DirectorySaver};

use bytes::Bytes;
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::auth::dto::PublicUser;
use crate::files::FileRecord;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API base url: {0}")]
    BaseUrl(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            api_base_url: std::env::var("API_BASE_URL")?,
        })
    }
}

#[derive(Clone)]
pub struct FileClient {
    http: reqwest::Client,
    base: Url,
}

impl FileClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.api_base_url)
            .map_err(|e| ClientError::BaseUrl(format!("{}: {}", config.api_base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::BaseUrl(config.api_base_url.clone()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    /// Base url with `segments` appended, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::BaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(%status, "request rejected");
            return Err(ClientError::Status { status, body });
        }
        Ok(resp)
    }

    #[instrument(skip(self, token))]
    pub async fn list_files(
        &self,
        token: &str,
        category: Option<&str>,
    ) -> Result<Vec<FileRecord>, ClientError> {
        let mut url = self.endpoint(&["files"])?;
        if let Some(c) = category {
            url.query_pairs_mut().append_pair("category", c);
        }
        let resp = self.send(self.http.get(url).bearer_auth(token)).await?;
        Ok(resp.json().await?)
    }

    /// GET `files/download/{filename}` with the bearer token; the raw body on 2xx.
    #[instrument(skip(self, token))]
    pub async fn download(&self, token: &str, filename: &str) -> Result<Bytes, ClientError> {
        let url = self.endpoint(&["files", "download", filename])?;
        let resp = self.send(self.http.get(url).bearer_auth(token)).await?;
        Ok(resp.bytes().await?)
    }

    #[instrument(skip(self, token))]
    pub async fn delete_file(&self, token: &str, filename: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["files", filename])?;
        self.send(self.http.delete(url).bearer_auth(token)).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    pub async fn me(&self, token: &str) -> Result<PublicUser, ClientError> {
        let url = self.endpoint(&["me"])?;
        let resp = self.send(self.http.get(url).bearer_auth(token)).await?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{delete, get},
        Json, Router,
    };
    use time::macros::datetime;
    use uuid::Uuid;

    use crate::auth::{dto::PublicUser, Role};
    use crate::files::{dto::CategoryQuery, FileRecord};

    pub const TOKEN: &str = "good-token";

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            == Some(&format!("Bearer {}", TOKEN)[..])
    }

    async fn download(headers: HeaderMap, Path(filename): Path<String>) -> impl IntoResponse {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response();
        }
        if filename == "missing.pdf" {
            return (StatusCode::NOT_FOUND, "File not found").into_response();
        }
        format!("body of {}", filename).into_response()
    }

    async fn list(headers: HeaderMap, Query(q): Query<CategoryQuery>) -> impl IntoResponse {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Json(vec![FileRecord {
            filename: format!("{}_permit.pdf", q.category()),
            file_id: Uuid::nil(),
            file_number: "001".into(),
            last_modified: datetime!(2024-02-01 10:00:00 UTC),
        }])
        .into_response()
    }

    async fn remove(headers: HeaderMap, Path(_filename): Path<String>) -> StatusCode {
        if authorized(&headers) {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        }
    }

    async fn me(headers: HeaderMap) -> impl IntoResponse {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Json(PublicUser {
            id: Uuid::nil(),
            username: "clerk".into(),
            email: "clerk@example.com".into(),
            name: None,
            display_name: None,
            role: Some(Role::User),
            zone: None,
            branch: None,
            registered_modules: vec![],
        })
        .into_response()
    }

    /// Serves a stub API on an ephemeral port and returns its `/api/v1` base url.
    pub async fn spawn() -> String {
        let api = Router::new()
            .route("/files", get(list))
            .route("/files/:filename", delete(remove))
            .route("/files/download/:filename", get(download))
            .route("/me", get(me));
        let app = Router::new().nest("/api/v1", api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/v1", addr)
    }

    /// A base url nothing listens on.
    pub async fn dead_base() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/api/v1", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> FileClient {
        FileClient::new(&ClientConfig {
            api_base_url: base.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn endpoint_escapes_filename_as_single_segment() {
        let c = client("http://localhost:8080/api/v1/");
        let url = c
            .endpoint(&["files", "download", "Annual Report_2023/v2.PDF"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v1/files/download/Annual%20Report_2023%2Fv2.PDF"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        let err = FileClient::new(&ClientConfig {
            api_base_url: "not a url".into(),
        })
        .err()
        .unwrap();
        assert!(matches!(err, ClientError::BaseUrl(_)));

        let err = FileClient::new(&ClientConfig {
            api_base_url: "mailto:x@example.com".into(),
        })
        .err()
        .unwrap();
        assert!(matches!(err, ClientError::BaseUrl(_)));
    }

    #[tokio::test]
    async fn download_sends_bearer_and_returns_body() {
        let c = client(&test_server::spawn().await);
        let body = c
            .download(test_server::TOKEN, "Annual Report_2023.PDF")
            .await
            .unwrap();
        assert_eq!(&body[..], b"body of Annual Report_2023.PDF");
    }

    #[tokio::test]
    async fn download_surfaces_non_success_status() {
        let c = client(&test_server::spawn().await);

        let err = c.download("wrong", "a.pdf").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status, .. } if status == StatusCode::UNAUTHORIZED));

        let err = c.download(test_server::TOKEN, "missing.pdf").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn download_surfaces_transport_errors() {
        let c = client(&test_server::dead_base().await);
        let err = c.download(test_server::TOKEN, "a.pdf").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn list_files_passes_category() {
        let c = client(&test_server::spawn().await);
        let files = c.list_files(test_server::TOKEN, Some("trade")).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "trade_permit.pdf");
        assert_eq!(files[0].file_number, "001");
    }

    #[tokio::test]
    async fn me_and_delete() {
        let c = client(&test_server::spawn().await);
        let me = c.me(test_server::TOKEN).await.unwrap();
        assert_eq!(me.username, "clerk");
        assert_eq!(me.role, Some(crate::auth::Role::User));

        let err = c.delete_file(test_server::TOKEN, "a.pdf").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status, .. } if status == StatusCode::FORBIDDEN));
    }
}
