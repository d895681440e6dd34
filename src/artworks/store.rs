use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::GalleryError;

/// Project id value that selects artworks without a project.
pub const UNASSIGNED: &str = "unassigned";

/// A single uploaded image and its display metadata.
///
/// On the wire the editable fields and timestamps are nested under
/// `metadata`: `{ id, url, metadata: { title, description, projectId,
/// tags, created_at, updated_at } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ArtworkWire", from = "ArtworkWire")]
pub struct Artwork {
    /// Unique identifier (UUID v4), assigned by the store
    pub id: String,

    /// Durable URL produced by the blob store
    pub url: String,

    pub title: String,

    pub description: Option<String>,

    /// Owning project; `None` means unassigned
    pub project_id: Option<String>,

    pub tags: Vec<String>,

    /// RFC 3339, fixed at creation
    pub created_at: String,

    /// RFC 3339, refreshed on every metadata edit
    pub updated_at: String,
}

#[derive(Serialize, Deserialize)]
struct ArtworkWire {
    id: String,
    url: String,
    metadata: ArtworkWireMetadata,
}

#[derive(Serialize, Deserialize)]
struct ArtworkWireMetadata {
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "projectId", default, skip_serializing_if = "Option::is_none")]
    project_id: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    created_at: String,
    updated_at: String,
}

impl From<Artwork> for ArtworkWire {
    fn from(artwork: Artwork) -> Self {
        Self {
            id: artwork.id,
            url: artwork.url,
            metadata: ArtworkWireMetadata {
                title: artwork.title,
                description: artwork.description,
                project_id: artwork.project_id,
                tags: artwork.tags,
                created_at: artwork.created_at,
                updated_at: artwork.updated_at,
            },
        }
    }
}

impl From<ArtworkWire> for Artwork {
    fn from(wire: ArtworkWire) -> Self {
        let metadata = wire.metadata;
        Self {
            id: wire.id,
            url: wire.url,
            title: metadata.title,
            description: metadata.description,
            project_id: metadata.project_id,
            tags: metadata.tags,
            created_at: metadata.created_at,
            updated_at: metadata.updated_at,
        }
    }
}

/// Editable metadata. Used for uploads and full-overwrite edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ArtworkMetadata {
    /// Reject metadata whose title is blank.
    pub fn validate(&self) -> Result<(), GalleryError> {
        if self.title.trim().is_empty() {
            return Err(GalleryError::Validation("Artwork title is required".to_string()));
        }
        Ok(())
    }

    /// Trim fields, turn blank optionals (and the `"unassigned"` project
    /// marker) into `None` and de-duplicate tags keeping the first occurrence.
    pub fn normalized(self) -> Self {
        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        Self {
            title: self.title.trim().to_string(),
            description: non_blank(self.description),
            project_id: non_blank(self.project_id).filter(|p| p != UNASSIGNED),
            tags,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Input for inserting an artwork row.
#[derive(Debug, Clone)]
pub struct NewArtwork {
    pub url: String,
    pub metadata: ArtworkMetadata,
    /// Creation time override (imports, tests). `None` stamps the current time.
    pub created_at: Option<String>,
}

/// Which artworks a read selects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ArtworkFilter {
    #[default]
    All,
    /// Artworks with no project reference
    Unassigned,
    Project(String),
}

impl ArtworkFilter {
    /// Interpret a raw project id: blank selects everything, the literal
    /// `"unassigned"` selects artworks without a project.
    pub fn from_project_id(project_id: Option<&str>) -> Self {
        match project_id.map(str::trim) {
            None | Some("") => ArtworkFilter::All,
            Some(UNASSIGNED) => ArtworkFilter::Unassigned,
            Some(id) => ArtworkFilter::Project(id.to_string()),
        }
    }
}

/// Storage interface for artworks - implementations are swappable
#[async_trait]
pub trait ArtworkStore: Send + Sync {
    /// Insert a new artwork. Assigns id and timestamps.
    async fn create(&self, input: NewArtwork) -> Result<Artwork, GalleryError>;

    /// Get an artwork by ID
    async fn get(&self, id: &str) -> Result<Option<Artwork>, GalleryError>;

    /// List artworks matching `filter`, ordered by created_at DESC then id DESC.
    /// `limit = None` returns every row after `offset`.
    async fn list(
        &self,
        filter: &ArtworkFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Artwork>, GalleryError>;

    /// Count artworks matching `filter`.
    async fn count(&self, filter: &ArtworkFilter) -> Result<usize, GalleryError>;

    /// Whether any artwork already points at `url`.
    async fn exists_with_url(&self, url: &str) -> Result<bool, GalleryError>;

    /// Overwrite title/description/project/tags and stamp `updated_at`.
    /// Returns `None` when no artwork has this id.
    async fn update_metadata(
        &self,
        id: &str,
        metadata: ArtworkMetadata,
        updated_at: &str,
    ) -> Result<Option<Artwork>, GalleryError>;
}
