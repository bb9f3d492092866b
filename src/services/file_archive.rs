use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, StatusCode};

use crate::core::config::Settings;
use crate::core::errors::{QuizError, QuizResult};
use crate::services::storage::S3Archive;

const SERVICE: &str = "file storage";
pub(crate) const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArchivedFile {
    pub(crate) bytes: Vec<u8>,
    pub(crate) content_type: String,
}

/// Keeps uploaded source documents, keyed by quiz id.
#[async_trait]
pub(crate) trait FileArchive: Send + Sync {
    async fn store(&self, id: &str, filename: &str, bytes: &[u8]) -> QuizResult<()>;

    async fn fetch(&self, id: &str) -> QuizResult<ArchivedFile>;

    /// Removing a file that is not there succeeds.
    async fn remove(&self, id: &str) -> QuizResult<()>;
}

/// Picks the configured backend: the HTTP file service first, then S3.
pub(crate) async fn archive_from_settings(
    settings: &Settings,
) -> anyhow::Result<Arc<dyn FileArchive>> {
    if let Some(base_url) = &settings.archive().file_storage_url {
        let archive = HttpFileArchive::new(base_url, settings.archive().timeout_seconds)?;
        tracing::info!(backend = "http", base_url = %base_url, "File archive configured");
        return Ok(Arc::new(archive));
    }

    if let Some(archive) = S3Archive::from_settings(settings).await? {
        tracing::info!(backend = "s3", bucket = %settings.s3().bucket, "File archive configured");
        return Ok(Arc::new(archive));
    }

    anyhow::bail!("no file archive configured; set FILE_STORAGE_URL or S3_ACCESS_KEY/S3_SECRET_KEY")
}

/// Multipart file service: `POST {base}/files` and `GET {base}/files/{id}`.
#[derive(Debug, Clone)]
pub(crate) struct HttpFileArchive {
    client: Client,
    base_url: String,
}

impl HttpFileArchive {
    pub(crate) fn new(base_url: &str, timeout_seconds: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to build file storage HTTP client")?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl FileArchive for HttpFileArchive {
    async fn store(&self, id: &str, filename: &str, bytes: &[u8]) -> QuizResult<()> {
        let part = Part::bytes(bytes.to_vec()).file_name(filename.to_string());
        let form = Form::new().text("id_file", id.to_string()).part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|err| QuizError::upstream_transport(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuizError::upstream_status(SERVICE, status.as_u16(), &body));
        }

        tracing::debug!(file_id = %id, filename = %filename, size = bytes.len(), "Source file archived");
        Ok(())
    }

    async fn fetch(&self, id: &str) -> QuizResult<ArchivedFile> {
        let response = self
            .client
            .get(format!("{}/files/{id}", self.base_url))
            .send()
            .await
            .map_err(|err| QuizError::upstream_transport(SERVICE, err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(QuizError::NotFound(format!("archived file {id}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuizError::upstream_status(SERVICE, status.as_u16(), &body));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| QuizError::upstream_transport(SERVICE, err))?
            .to_vec();

        Ok(ArchivedFile { bytes, content_type })
    }

    async fn remove(&self, id: &str) -> QuizResult<()> {
        let response = self
            .client
            .delete(format!("{}/files/{id}", self.base_url))
            .send()
            .await
            .map_err(|err| QuizError::upstream_transport(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(QuizError::upstream_status(SERVICE, status.as_u16(), &body));
        }

        tracing::debug!(file_id = %id, "Archived source removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{one_shot_http, one_shot_http_with_headers};
    use axum::http::Method;

    #[tokio::test]
    async fn store_posts_multipart_with_id_field() {
        let (base_url, request) = one_shot_http(201, "{}".to_string()).await;
        let archive = HttpFileArchive::new(&base_url, 5).expect("archive");

        archive.store("quiz-123", "notes.txt", b"source text").await.expect("stored");

        let request = request.await.expect("request captured");
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/files");
        assert!(request.header("content-type").is_some_and(|value| value.starts_with("multipart/form-data")));
        assert!(request.body.contains("name=\"id_file\""));
        assert!(request.body.contains("quiz-123"));
        assert!(request.body.contains("filename=\"notes.txt\""));
        assert!(request.body.contains("source text"));
    }

    #[tokio::test]
    async fn store_failure_is_an_upstream_error() {
        let (base_url, _request) = one_shot_http(500, "disk full".to_string()).await;
        let archive = HttpFileArchive::new(&base_url, 5).expect("archive");

        let err = archive.store("quiz-1", "a.pdf", b"%PDF").await.expect_err("failed");
        assert!(matches!(err, QuizError::Upstream { status: Some(500), .. }));
    }

    #[tokio::test]
    async fn fetch_returns_bytes_and_content_type() {
        let (base_url, request) =
            one_shot_http_with_headers(200, &[("Content-Type", "text/plain")], "hello".into()).await;
        let archive = HttpFileArchive::new(&base_url, 5).expect("archive");

        let file = archive.fetch("quiz-9").await.expect("fetched");

        assert_eq!(file.bytes, b"hello");
        assert_eq!(file.content_type, "text/plain");
        let request = request.await.expect("request");
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "/files/quiz-9");
    }

    #[tokio::test]
    async fn fetch_without_content_type_defaults_to_pdf() {
        let (base_url, _request) = one_shot_http_with_headers(200, &[], "%PDF".into()).await;
        let archive = HttpFileArchive::new(&base_url, 5).expect("archive");

        let file = archive.fetch("quiz-9").await.expect("fetched");
        assert_eq!(file.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn fetch_missing_file_is_not_found() {
        let (base_url, _request) = one_shot_http(404, "missing".into()).await;
        let archive = HttpFileArchive::new(&base_url, 5).expect("archive");

        assert!(matches!(archive.fetch("nope").await, Err(QuizError::NotFound(_))));
    }

    #[tokio::test]
    async fn remove_sends_delete_and_tolerates_missing_file() {
        let (base_url, request) = one_shot_http(204, String::new()).await;
        let archive = HttpFileArchive::new(&base_url, 5).expect("archive");
        archive.remove("quiz-7").await.expect("removed");
        let request = request.await.expect("request");
        assert_eq!(request.method, Method::DELETE);
        assert_eq!(request.path, "/files/quiz-7");

        let (base_url, _request) = one_shot_http(404, "missing".into()).await;
        let archive = HttpFileArchive::new(&base_url, 5).expect("archive");
        archive.remove("quiz-7").await.expect("already gone");
    }
}
