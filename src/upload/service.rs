use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::artworks::{Artwork, ArtworkMetadata, ArtworkStore, NewArtwork};
use crate::clock::{self, within};
use crate::error::GalleryError;
use crate::projects::{NewProject, Project, ProjectStore};
use super::auth::AuthVerifier;
use super::blob::{blob_name, BlobStore, StoredBlob};

/// An uploaded file as received from the client.
#[derive(Debug, Clone, Default)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Outcome of importing blobs that have no artwork row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Authenticated write path: blob write then row insert for uploads,
/// metadata overwrite for edits, and project creation.
pub struct UploadService {
    artworks: Arc<dyn ArtworkStore>,
    projects: Arc<dyn ProjectStore>,
    blobs: Arc<dyn BlobStore>,
    auth: Arc<dyn AuthVerifier>,
    timeout: Duration,
}

impl UploadService {
    pub fn new(
        artworks: Arc<dyn ArtworkStore>,
        projects: Arc<dyn ProjectStore>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn AuthVerifier>,
        timeout: Duration,
    ) -> Self {
        Self { artworks, projects, blobs, auth, timeout }
    }

    fn store_timeout(&self, what: &str) -> GalleryError {
        GalleryError::Storage(format!("{} timed out after {}s", what, self.timeout.as_secs_f32()))
    }

    /// Check a bearer token; a missing or rejected token is `Auth`.
    pub async fn authorize(&self, token: Option<&str>) -> Result<(), GalleryError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GalleryError::Auth("Missing bearer token".to_string()))?;

        if self.auth.verify(token).await {
            Ok(())
        } else {
            Err(GalleryError::Auth("Invalid bearer token".to_string()))
        }
    }

    /// A referenced project must exist at write time.
    async fn check_project(&self, project_id: Option<&str>) -> Result<(), GalleryError> {
        let Some(project_id) = project_id else {
            return Ok(());
        };

        let found = within(self.timeout, self.projects.get(project_id), || {
            self.store_timeout("Project lookup")
        })
        .await?;

        match found {
            Some(_) => Ok(()),
            None => Err(GalleryError::NotFound(format!("Project {} not found", project_id))),
        }
    }

    /// Store the file, then record the artwork.
    ///
    /// Nothing reaches the blob store unless auth, file and title checks
    /// pass. A blob failure leaves the database untouched; a database
    /// failure after a successful blob write leaves the blob behind.
    pub async fn upload_artwork(
        &self,
        file: Option<UploadFile>,
        metadata: ArtworkMetadata,
        token: Option<&str>,
    ) -> Result<Artwork, GalleryError> {
        self.authorize(token).await?;

        let file = file
            .filter(|f| !f.bytes.is_empty())
            .ok_or_else(|| GalleryError::Validation("A file is required".to_string()))?;
        metadata.validate()?;
        let metadata = metadata.normalized();
        self.check_project(metadata.project_id.as_deref()).await?;

        let name = blob_name(&file.file_name, &file.bytes);
        let size = file.bytes.len();
        let url = within(
            self.timeout,
            self.blobs.put(&name, file.content_type.as_deref(), file.bytes),
            || GalleryError::Upload(format!("Blob write timed out after {}s", self.timeout.as_secs_f32())),
        )
        .await?;

        let created = within(
            self.timeout,
            self.artworks.create(NewArtwork { url: url.clone(), metadata, created_at: None }),
            || self.store_timeout("Artwork insert"),
        )
        .await;

        match created {
            Ok(artwork) => {
                info!("Gallery/Upload: stored artwork {} ({} bytes) at {}", artwork.id, size, url);
                Ok(artwork)
            }
            Err(e) => {
                warn!("Gallery/Upload: insert failed, blob left orphaned at {}: {}", url, e);
                Err(e)
            }
        }
    }

    /// Overwrite an artwork's title, description, project and tags.
    pub async fn update_artwork_metadata(
        &self,
        id: &str,
        metadata: ArtworkMetadata,
        token: Option<&str>,
    ) -> Result<Artwork, GalleryError> {
        self.authorize(token).await?;
        metadata.validate()?;
        let metadata = metadata.normalized();
        self.check_project(metadata.project_id.as_deref()).await?;

        let updated_at = clock::now_rfc3339();
        let updated = within(
            self.timeout,
            self.artworks.update_metadata(id, metadata, &updated_at),
            || self.store_timeout("Artwork update"),
        )
        .await?;

        let artwork = updated.ok_or_else(|| GalleryError::NotFound(format!("Artwork {} not found", id)))?;
        info!("Gallery/Upload: updated metadata for {}", artwork.id);
        Ok(artwork)
    }

    pub async fn create_project(
        &self,
        input: NewProject,
        token: Option<&str>,
    ) -> Result<Project, GalleryError> {
        self.authorize(token).await?;
        let input = input.validated()?;

        let project = within(self.timeout, self.projects.create(input), || {
            self.store_timeout("Project insert")
        })
        .await?;

        info!("Gallery/Upload: created project {} ({})", project.id, project.name);
        Ok(project)
    }

    /// Record an artwork for every stored blob whose URL no artwork uses yet.
    ///
    /// The blob name becomes the title and its upload time the creation
    /// time. Running it again imports nothing new. Operator command; no
    /// token involved.
    pub async fn import_blobs(&self) -> Result<ImportReport, GalleryError> {
        let mut blobs = within(self.timeout, self.blobs.list(), || {
            GalleryError::Upload(format!("Blob listing timed out after {}s", self.timeout.as_secs_f32()))
        })
        .await?;
        info!("Gallery/Import: found {} blobs", blobs.len());

        // Oldest first, so imported rows keep their upload order
        blobs.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then_with(|| a.url.cmp(&b.url)));

        let mut report = ImportReport::default();
        for blob in blobs {
            let exists = within(self.timeout, self.artworks.exists_with_url(&blob.url), || {
                self.store_timeout("Artwork url lookup")
            })
            .await?;
            if exists {
                debug!("Gallery/Import: skipping existing {}", blob.url);
                report.skipped += 1;
                continue;
            }

            let artwork = within(self.timeout, self.artworks.create(imported_artwork(blob)), || {
                self.store_timeout("Artwork insert")
            })
            .await?;
            info!("Gallery/Import: imported {} as {}", artwork.url, artwork.id);
            report.imported += 1;
        }

        Ok(report)
    }
}

fn imported_artwork(blob: StoredBlob) -> NewArtwork {
    let created_at = match DateTime::parse_from_rfc3339(&blob.uploaded_at) {
        Ok(at) => clock::format_timestamp(at.with_timezone(&Utc)),
        Err(e) => {
            warn!("Gallery/Import: unreadable upload time {:?} for {}: {}", blob.uploaded_at, blob.url, e);
            clock::now_rfc3339()
        }
    };

    NewArtwork {
        url: blob.url,
        metadata: ArtworkMetadata { title: blob.pathname, ..Default::default() }.normalized(),
        created_at: Some(created_at),
    }
}
