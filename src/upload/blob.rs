// Blob stores - durable homes for uploaded image bytes

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error};

use crate::clock;
use crate::error::{upload, GalleryError};

/// A blob already held by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub url: String,
    /// Name within the store
    pub pathname: String,
    /// RFC 3339
    pub uploaded_at: String,
}

/// Stores bytes and returns a durable URL for them.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String, GalleryError>;

    /// Every blob currently held, in no particular order.
    async fn list(&self) -> Result<Vec<StoredBlob>, GalleryError>;
}

/// Content-addressed blob name: `<sha256 prefix>-<sanitised file name>`.
///
/// Same bytes under the same name always map to the same blob.
pub fn blob_name(file_name: &str, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", &digest[..16], sanitize_file_name(file_name))
}

fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .take(100)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Writes blobs into a local directory served under `public_base_url`.
pub struct LocalBlobStore {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(dir: PathBuf, public_base_url: &str) -> Self {
        Self {
            dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        name: &str,
        _content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String, GalleryError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(upload("Failed to create blob directory"))?;

        let path = self.dir.join(name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(upload("Failed to write blob"))?;

        debug!("Gallery/Blob: wrote {} bytes to {:?}", bytes.len(), path);
        Ok(format!("{}/{}", self.public_base_url, name))
    }

    async fn list(&self) -> Result<Vec<StoredBlob>, GalleryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(upload("Failed to read blob directory")(e)),
        };

        let mut blobs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(upload("Failed to read blob directory"))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let metadata = entry.metadata().await.map_err(upload("Failed to stat blob"))?;
            if !metadata.is_file() || name.starts_with('.') {
                continue;
            }

            let modified: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            blobs.push(StoredBlob {
                url: format!("{}/{}", self.public_base_url, name),
                pathname: name,
                uploaded_at: clock::format_timestamp(modified),
            });
        }

        Ok(blobs)
    }
}

#[derive(Deserialize)]
struct PutBlobResponse {
    url: String,
}

#[derive(Deserialize)]
struct ListBlobsResponse {
    blobs: Vec<StoredBlob>,
}

/// PUTs blobs to a remote object store that answers with `{ "url": ... }`.
pub struct HttpBlobStore {
    endpoint: String,
    token: Option<String>,
    client: Client,
}

impl HttpBlobStore {
    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration) -> Result<Self, GalleryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(upload("Failed to build blob HTTP client"))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String, GalleryError> {
        let mut request = self
            .client
            .put(format!("{}/{}", self.endpoint, name))
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(bytes);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(upload("Blob store request failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Gallery/Blob: store returned {}: {}", status, body);
            return Err(GalleryError::Upload(format!("Blob store returned {}", status)));
        }

        let stored: PutBlobResponse = response
            .json()
            .await
            .map_err(upload("Malformed blob store response"))?;
        Ok(stored.url)
    }

    async fn list(&self) -> Result<Vec<StoredBlob>, GalleryError> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(upload("Blob store request failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Gallery/Blob: listing returned {}: {}", status, body);
            return Err(GalleryError::Upload(format!("Blob store returned {}", status)));
        }

        let listed: ListBlobsResponse = response
            .json()
            .await
            .map_err(upload("Malformed blob listing"))?;
        Ok(listed.blobs)
    }
}
