// GalleryApi - the read calls the gallery client makes, in-process or over HTTP

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::artworks::ArtworkFilter;
use crate::error::{storage, GalleryError};
use crate::gallery::{GalleryPage, GalleryQuery, ImagesResponse, ProjectCountSummary};
use crate::http::ErrorBody;
use crate::projects::Project;

/// Read operations backing `GalleryClient`.
#[async_trait]
pub trait GalleryApi: Send + Sync {
    /// One page of images. `offset` 0 is the first page.
    async fn images(
        &self,
        filter: &ArtworkFilter,
        limit: Option<i64>,
        offset: usize,
    ) -> Result<GalleryPage, GalleryError>;

    async fn projects(&self) -> Result<Vec<Project>, GalleryError>;

    async fn project_counts(&self) -> Result<ProjectCountSummary, GalleryError>;
}

#[async_trait]
impl GalleryApi for GalleryQuery {
    async fn images(
        &self,
        filter: &ArtworkFilter,
        limit: Option<i64>,
        offset: usize,
    ) -> Result<GalleryPage, GalleryError> {
        self.get_gallery_images(filter, limit, Some(offset as i64)).await
    }

    async fn projects(&self) -> Result<Vec<Project>, GalleryError> {
        self.get_gallery_projects().await
    }

    async fn project_counts(&self) -> Result<ProjectCountSummary, GalleryError> {
        self.get_project_count_summary().await
    }
}

/// `GalleryApi` over the gallery's HTTP endpoints.
pub struct HttpGalleryApi {
    base_url: String,
    client: Client,
}

impl HttpGalleryApi {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GalleryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(storage("Failed to build HTTP client"))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GalleryError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(storage("Gallery request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(storage("Malformed gallery response"))
    }
}

/// Query parameters for an images request. `offset` is omitted when zero.
pub fn images_query(filter: &ArtworkFilter, limit: Option<i64>, offset: usize) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    match filter {
        ArtworkFilter::All => {}
        ArtworkFilter::Unassigned => query.push(("unassigned", "true".to_string())),
        ArtworkFilter::Project(id) => query.push(("projectId", id.clone())),
    }
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }
    if offset > 0 {
        query.push(("offset", offset.to_string()));
    }
    query
}

/// Map a non-success response back onto the error it was rendered from.
fn error_for_status(status: StatusCode, body: &str) -> GalleryError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("HTTP {}", status));

    match status {
        StatusCode::BAD_REQUEST => GalleryError::Validation(message),
        StatusCode::UNAUTHORIZED => GalleryError::Auth(message),
        StatusCode::NOT_FOUND => GalleryError::NotFound(message),
        _ => GalleryError::Storage(message),
    }
}

#[async_trait]
impl GalleryApi for HttpGalleryApi {
    async fn images(
        &self,
        filter: &ArtworkFilter,
        limit: Option<i64>,
        offset: usize,
    ) -> Result<GalleryPage, GalleryError> {
        let response: ImagesResponse = self
            .get_json("/images", &images_query(filter, limit, offset))
            .await?;
        response.into_page()
    }

    async fn projects(&self) -> Result<Vec<Project>, GalleryError> {
        self.get_json("/projects", &[]).await
    }

    async fn project_counts(&self) -> Result<ProjectCountSummary, GalleryError> {
        self.get_json("/projects/counts", &[]).await
    }
}
