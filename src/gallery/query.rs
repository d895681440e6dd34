use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artworks::{Artwork, ArtworkFilter, ArtworkStore};
use crate::clock::within;
use crate::error::GalleryError;
use crate::projects::{Project, ProjectCount, ProjectStore};
use super::page::{GalleryPage, PageLimits, PageRequest};

/// Per-project artwork counts plus unassigned and total counts.
///
/// A point-in-time snapshot: the three parts are read independently, so a
/// concurrent write may skew them against each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCountSummary {
    pub projects: Vec<ProjectCount>,
    pub unassigned: usize,
    pub total: usize,
}

impl ProjectCountSummary {
    /// Sum of per-project counts plus unassigned.
    pub fn assigned_plus_unassigned(&self) -> usize {
        self.projects.iter().map(|p| p.count).sum::<usize>() + self.unassigned
    }
}

/// Read side of the gallery: filtered, paginated views over the artwork and
/// project stores. Stateless between calls.
pub struct GalleryQuery {
    artworks: Arc<dyn ArtworkStore>,
    projects: Arc<dyn ProjectStore>,
    limits: PageLimits,
    timeout: Duration,
}

impl GalleryQuery {
    pub fn new(
        artworks: Arc<dyn ArtworkStore>,
        projects: Arc<dyn ProjectStore>,
        limits: PageLimits,
        timeout: Duration,
    ) -> Self {
        Self { artworks, projects, limits, timeout }
    }

    fn timed_out(&self, what: &str) -> GalleryError {
        GalleryError::Storage(format!(
            "{} timed out after {}s",
            what,
            self.timeout.as_secs_f32()
        ))
    }

    /// One page of images, newest first.
    ///
    /// Fetches `limit + 1` rows to decide `has_more`; see `PageRequest::resolve`
    /// for how limit and offset are normalised.
    pub async fn get_gallery_images(
        &self,
        filter: &ArtworkFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<GalleryPage, GalleryError> {
        let request = PageRequest::resolve(limit, offset, self.limits);
        debug!(
            "Gallery/Query: images filter={:?} limit={:?} offset={}",
            filter, request.limit, request.offset
        );

        let rows = within(
            self.timeout,
            self.artworks.list(filter, request.fetch_limit(), request.offset),
            || self.timed_out("Artwork listing"),
        )
        .await?;

        Ok(request.into_page(rows))
    }

    /// All projects ordered by name.
    pub async fn get_gallery_projects(&self) -> Result<Vec<Project>, GalleryError> {
        within(self.timeout, self.projects.list(), || self.timed_out("Project listing")).await
    }

    /// Per-project, unassigned and total counts, read concurrently.
    pub async fn get_project_count_summary(&self) -> Result<ProjectCountSummary, GalleryError> {
        let (projects, unassigned, total) = tokio::try_join!(
            within(self.timeout, self.projects.artwork_counts(), || {
                self.timed_out("Project counts")
            }),
            within(self.timeout, self.artworks.count(&ArtworkFilter::Unassigned), || {
                self.timed_out("Unassigned count")
            }),
            within(self.timeout, self.artworks.count(&ArtworkFilter::All), || {
                self.timed_out("Total count")
            }),
        )?;

        Ok(ProjectCountSummary { projects, unassigned, total })
    }

    pub async fn get_artwork(&self, id: &str) -> Result<Artwork, GalleryError> {
        within(self.timeout, self.artworks.get(id), || self.timed_out("Artwork lookup"))
            .await?
            .ok_or_else(|| GalleryError::NotFound(format!("Artwork {} not found", id)))
    }

    pub async fn get_project(&self, id: &str) -> Result<Project, GalleryError> {
        within(self.timeout, self.projects.get(id), || self.timed_out("Project lookup"))
            .await?
            .ok_or_else(|| GalleryError::NotFound(format!("Project {} not found", id)))
    }
}
