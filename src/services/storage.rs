use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use sha2::{Digest, Sha256};

use crate::core::config::Settings;
use crate::core::errors::{QuizError, QuizResult};
use crate::services::content_extraction::detect_mime_type;
use crate::services::file_archive::{ArchivedFile, FileArchive, DEFAULT_CONTENT_TYPE};

const SERVICE: &str = "object storage";

/// S3-compatible bucket holding one object per quiz under `{prefix}/{quiz_id}`.
#[derive(Debug, Clone)]
pub(crate) struct S3Archive {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Archive {
    pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        if !settings.s3().is_configured() {
            return Ok(None);
        }

        let creds = Credentials::new(
            settings.s3().access_key.clone(),
            settings.s3().secret_key.clone(),
            None,
            None,
            "quizzo-static",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(settings.s3().endpoint.clone())
            .region(aws_config::Region::new(settings.s3().region.clone()))
            .credentials_provider(creds)
            .load()
            .await;

        Ok(Some(Self {
            client: Client::new(&config),
            bucket: settings.s3().bucket.clone(),
            prefix: settings.s3().prefix.trim_matches('/').to_string(),
        }))
    }

    pub(crate) fn object_key(&self, id: &str) -> String {
        if self.prefix.is_empty() {
            id.to_string()
        } else {
            format!("{}/{id}", self.prefix)
        }
    }
}

#[async_trait]
impl FileArchive for S3Archive {
    async fn store(&self, id: &str, filename: &str, bytes: &[u8]) -> QuizResult<()> {
        let key = self.object_key(id);
        let content_type = detect_mime_type(bytes, filename);
        let hash_hex = hex::encode(Sha256::digest(bytes));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .metadata("filename", filename)
            .metadata("sha256", &hash_hex)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|err| QuizError::upstream_transport(SERVICE, err))?;

        tracing::debug!(key = %key, size = bytes.len(), sha256 = %hash_hex, "Source file archived");
        Ok(())
    }

    async fn fetch(&self, id: &str) -> QuizResult<ArchivedFile> {
        let key = self.object_key(id);
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().map(|service| service.is_no_such_key()).unwrap_or(false) {
                    QuizError::NotFound(format!("archived file {id}"))
                } else {
                    QuizError::upstream_transport(SERVICE, err)
                }
            })?;

        let content_type = output
            .content_type()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|err| QuizError::upstream_transport(SERVICE, err))?
            .into_bytes()
            .to_vec();

        Ok(ArchivedFile { bytes, content_type })
    }

    async fn remove(&self, id: &str) -> QuizResult<()> {
        let key = self.object_key(id);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|err| QuizError::upstream_transport(SERVICE, err))?;

        tracing::debug!(key = %key, "Archived source removed");
        Ok(())
    }
}
