use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::artworks::{Artwork, ArtworkFilter};
use crate::error::GalleryError;
use crate::projects::Project;
use super::api::GalleryApi;
use super::state::{FetchMode, FetchOptions, FetchOutcome, FetchTicket, GalleryState, InitialGallery};

/// Drives a `GalleryState` against a `GalleryApi`.
///
/// Cheap to clone; clones share the same state. The state lock is never held
/// across an await, so fetches from different clones interleave safely and
/// the state machine decides which results land.
#[derive(Clone)]
pub struct GalleryClient {
    api: Arc<dyn GalleryApi>,
    state: Arc<Mutex<GalleryState>>,
}

impl GalleryClient {
    pub fn new(api: Arc<dyn GalleryApi>, initial: InitialGallery) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(GalleryState::new(initial))),
        }
    }

    fn state(&self) -> MutexGuard<'_, GalleryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state for rendering.
    pub fn snapshot(&self) -> GalleryState {
        self.state().clone()
    }

    /// Fetch images per `options`. Append requests that arrive while another
    /// fetch is in flight, or when nothing more exists, return `Ignored`.
    pub async fn fetch_images(&self, options: FetchOptions) -> FetchOutcome {
        let ticket = self.state().begin_fetch(options);
        match ticket {
            Some(ticket) => self.run_fetch(ticket).await,
            None => FetchOutcome::Ignored,
        }
    }

    /// Switch filters and load the first page for the new one.
    pub async fn select_project(&self, filter: ArtworkFilter) -> FetchOutcome {
        debug!("Gallery/Client: select {:?}", filter);
        let ticket = self.state().select_project(filter);
        match ticket {
            Some(ticket) => self.run_fetch(ticket).await,
            None => FetchOutcome::Ignored,
        }
    }

    /// Load the next page of the selected filter, starting after the
    /// visible images.
    pub async fn load_more(&self) -> FetchOutcome {
        let ticket = {
            let mut state = self.state();
            let offset = state.images().len();
            state.begin_fetch(FetchOptions {
                filter: None,
                limit: None,
                offset: Some(offset),
                mode: FetchMode::Append,
            })
        };
        match ticket {
            Some(ticket) => self.run_fetch(ticket).await,
            None => FetchOutcome::Ignored,
        }
    }

    async fn run_fetch(&self, ticket: FetchTicket) -> FetchOutcome {
        let result = self.api.images(&ticket.filter, ticket.limit, ticket.offset).await;
        let outcome = self.state().complete_fetch(&ticket, result);

        match &outcome {
            FetchOutcome::Applied { mode: FetchMode::Replace, .. } => {
                self.refresh_project_counts().await;
            }
            FetchOutcome::Failed(e) => {
                warn!("Gallery/Client: image fetch failed ({}): {}", e.kind(), e);
            }
            FetchOutcome::Stale => {
                debug!("Gallery/Client: dropped stale result for {:?}", ticket.filter);
            }
            _ => {}
        }

        outcome
    }

    /// Reload the per-project counts. Failures are logged and leave the
    /// previous counts in place; returns whether the refresh landed.
    pub async fn refresh_project_counts(&self) -> bool {
        match self.api.project_counts().await {
            Ok(counts) => {
                self.state().set_project_counts(counts);
                true
            }
            Err(e) => {
                warn!("Gallery/Client: failed to refresh project counts: {}", e);
                false
            }
        }
    }

    /// Reload the project list.
    pub async fn fetch_projects(&self) -> Result<(), GalleryError> {
        let projects = self.api.projects().await.map_err(|e| {
            warn!("Gallery/Client: failed to load projects: {}", e);
            e
        })?;
        self.state().set_projects(projects);
        Ok(())
    }

    /// Show a freshly uploaded artwork first and refresh counts once.
    pub async fn add_image(&self, artwork: Artwork) {
        self.state().add_image(artwork);
        self.refresh_project_counts().await;
    }

    pub fn add_project(&self, project: Project) {
        self.state().add_project(project);
    }

    /// Stop applying results; the view is going away.
    pub fn detach(&self) {
        self.state().detach();
    }
}
