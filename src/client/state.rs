use std::collections::HashSet;

use serde::Serialize;

use crate::artworks::{Artwork, ArtworkFilter};
use crate::error::GalleryError;
use crate::gallery::{GalleryPage, ProjectCountSummary};
use crate::projects::Project;

/// Label shown for an artwork whose project reference no longer resolves.
pub const UNKNOWN_PROJECT: &str = "Unknown Project";

/// Where the image list is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadPhase {
    Idle,
    LoadingInitial,
    LoadingMore,
    Error,
}

/// How fetched images merge into the visible list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Discard the visible list and show the fetched page
    #[default]
    Replace,
    /// Keep the visible list and add unseen images after it
    Append,
}

/// Options for `fetch_images`.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Filter to fetch; `None` uses the selected filter.
    pub filter: Option<ArtworkFilter>,
    pub limit: Option<i64>,
    /// For `Append` this should be the visible image count.
    pub offset: Option<usize>,
    pub mode: FetchMode,
}

/// Server-rendered data the state starts from.
#[derive(Debug, Clone, Default)]
pub struct InitialGallery {
    pub images: Vec<Artwork>,
    pub projects: Vec<Project>,
    pub project_counts: ProjectCountSummary,
    pub has_more: bool,
}

/// A fetch that `begin_fetch` admitted. Hand it back to `complete_fetch`
/// together with the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    pub mode: FetchMode,
    pub filter: ArtworkFilter,
    pub limit: Option<i64>,
    pub offset: usize,
}

/// What happened to a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Merged into the visible list. `added` counts images that were not already visible.
    Applied { mode: FetchMode, received: usize, added: usize },
    /// Not issued: nothing more to load, or another fetch is in flight.
    Ignored,
    /// Resolved after being superseded (filter change, detach); result dropped.
    Stale,
    /// The read failed; the visible list is untouched.
    Failed(GalleryError),
}

/// In-memory gallery window for one client session.
///
/// All mutation goes through the named operations below; fetch I/O happens
/// outside, between `begin_fetch` and `complete_fetch`.
#[derive(Debug, Clone)]
pub struct GalleryState {
    images: Vec<Artwork>,
    projects: Vec<Project>,
    project_counts: ProjectCountSummary,
    selected: ArtworkFilter,
    has_more_images: bool,
    phase: LoadPhase,
    last_error: Option<GalleryError>,
    // Bumped whenever in-flight results must be discarded
    generation: u64,
    attached: bool,
}

impl GalleryState {
    pub fn new(initial: InitialGallery) -> Self {
        Self {
            images: initial.images,
            projects: initial.projects,
            project_counts: initial.project_counts,
            selected: ArtworkFilter::All,
            has_more_images: initial.has_more,
            phase: LoadPhase::Idle,
            last_error: None,
            generation: 0,
            attached: true,
        }
    }

    pub fn images(&self) -> &[Artwork] {
        &self.images
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project_counts(&self) -> &ProjectCountSummary {
        &self.project_counts
    }

    pub fn selected(&self) -> &ArtworkFilter {
        &self.selected
    }

    pub fn has_more_images(&self) -> bool {
        self.has_more_images
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&GalleryError> {
        self.last_error.as_ref()
    }

    pub fn is_fetching(&self) -> bool {
        matches!(self.phase, LoadPhase::LoadingInitial | LoadPhase::LoadingMore)
    }

    /// Admit a fetch, moving to a loading phase.
    ///
    /// Replace always proceeds and supersedes anything in flight. Append is
    /// refused (returns `None`) unless more images exist and nothing is in
    /// flight; overlapping requests are dropped, not queued.
    pub fn begin_fetch(&mut self, options: FetchOptions) -> Option<FetchTicket> {
        if !self.attached {
            return None;
        }

        match options.mode {
            FetchMode::Replace => {
                self.generation += 1;
                self.phase = LoadPhase::LoadingInitial;
            }
            FetchMode::Append => {
                if self.is_fetching() || !self.has_more_images {
                    return None;
                }
                self.phase = LoadPhase::LoadingMore;
            }
        }

        Some(FetchTicket {
            generation: self.generation,
            mode: options.mode,
            filter: options.filter.unwrap_or_else(|| self.selected.clone()),
            limit: options.limit,
            offset: options.offset.unwrap_or(0),
        })
    }

    /// Change the filter. Always starts a replace fetch from offset 0 and
    /// forgets `has_more_images` from the previous filter.
    pub fn select_project(&mut self, filter: ArtworkFilter) -> Option<FetchTicket> {
        self.selected = filter;
        self.has_more_images = false;
        self.begin_fetch(FetchOptions {
            filter: None,
            limit: None,
            offset: Some(0),
            mode: FetchMode::Replace,
        })
    }

    /// Apply the result of an admitted fetch.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<GalleryPage, GalleryError>,
    ) -> FetchOutcome {
        if !self.attached || ticket.generation != self.generation {
            return FetchOutcome::Stale;
        }

        match result {
            Ok(page) => {
                let received = page.images.len();
                let added = match ticket.mode {
                    FetchMode::Replace => {
                        self.images = page.images;
                        received
                    }
                    FetchMode::Append => append_unique(&mut self.images, page.images),
                };
                self.has_more_images = page.has_more;
                self.phase = LoadPhase::Idle;
                self.last_error = None;
                FetchOutcome::Applied { mode: ticket.mode, received, added }
            }
            Err(e) => {
                self.phase = LoadPhase::Error;
                self.last_error = Some(e.clone());
                FetchOutcome::Failed(e)
            }
        }
    }

    /// Optimistically show a new artwork first, whatever the current filter.
    pub fn add_image(&mut self, artwork: Artwork) {
        self.images.retain(|a| a.id != artwork.id);
        self.images.insert(0, artwork);
    }

    pub fn add_project(&mut self, project: Project) {
        self.projects.push(project);
    }

    pub fn set_projects(&mut self, projects: Vec<Project>) {
        self.projects = projects;
    }

    pub fn set_project_counts(&mut self, counts: ProjectCountSummary) {
        self.project_counts = counts;
    }

    /// Stop accepting results; anything in flight resolves as `Stale`.
    pub fn detach(&mut self) {
        self.attached = false;
        self.generation += 1;
        if self.is_fetching() {
            self.phase = LoadPhase::Idle;
        }
    }

    /// Display name of an artwork's project: `None` when unassigned,
    /// `UNKNOWN_PROJECT` when the reference does not resolve.
    pub fn project_label(&self, artwork: &Artwork) -> Option<&str> {
        let project_id = artwork.project_id.as_deref()?;
        let name = self
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .map(|p| p.name.as_str())
            .or_else(|| {
                self.project_counts
                    .projects
                    .iter()
                    .find(|p| p.id == project_id)
                    .map(|p| p.name.as_str())
            });
        Some(name.unwrap_or(UNKNOWN_PROJECT))
    }
}

/// Append fetched images whose id is not already visible, keeping the
/// visible order followed by the fetched order. Returns how many were added.
pub fn append_unique(visible: &mut Vec<Artwork>, fetched: Vec<Artwork>) -> usize {
    let mut seen: HashSet<String> = visible.iter().map(|a| a.id.clone()).collect();
    let before = visible.len();
    for artwork in fetched {
        if seen.insert(artwork.id.clone()) {
            visible.push(artwork);
        }
    }
    visible.len() - before
}
