use serde::{Deserialize, Serialize};
use crate::artworks::Artwork;
use crate::error::GalleryError;

/// Default number of images per gallery page.
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Hard cap on an explicitly requested page size.
pub const MAX_PAGE_SIZE: usize = 60;

/// Page size bounds, normally taken from `GallerySettings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_SIZE,
            max_limit: MAX_PAGE_SIZE,
        }
    }
}

/// A resolved limit/offset pair.
///
/// `limit = None` means "every matching row"; in that mode `has_more` is
/// always false. Otherwise one extra row is fetched to detect a next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl PageRequest {
    /// Resolve caller-supplied values:
    /// - absent limit uses the default page size
    /// - a limit of zero or less means no limit (callers pass 0 as a sentinel)
    /// - a positive limit is clamped to the maximum
    /// - absent or negative offsets become 0
    pub fn resolve(limit: Option<i64>, offset: Option<i64>, limits: PageLimits) -> Self {
        let limit = match limit {
            None => Some(limits.default_limit),
            Some(l) if l <= 0 => None,
            Some(l) => Some((l as u64).min(limits.max_limit as u64) as usize),
        };
        let offset = offset.filter(|o| *o > 0).map(|o| o as usize).unwrap_or(0);

        Self { limit, offset }
    }

    /// Row count to request from the store (one past the page when paging).
    pub fn fetch_limit(&self) -> Option<usize> {
        self.limit.map(|l| l + 1)
    }

    /// Truncate an over-fetched result to the page and compute `has_more`.
    pub fn into_page(self, mut rows: Vec<Artwork>) -> GalleryPage {
        let has_more = match self.limit {
            Some(limit) if rows.len() > limit => {
                rows.truncate(limit);
                true
            }
            _ => false,
        };

        GalleryPage { images: rows, has_more }
    }
}

/// One window of gallery images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryPage {
    pub images: Vec<Artwork>,
    pub has_more: bool,
}

/// Wire format version of `ImagesResponse`.
pub const IMAGES_RESPONSE_VERSION: u32 = 1;

/// `GalleryPage` as served over HTTP, tagged with a format version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesResponse {
    pub version: u32,
    pub images: Vec<Artwork>,
    pub has_more: bool,
}

impl From<GalleryPage> for ImagesResponse {
    fn from(page: GalleryPage) -> Self {
        Self {
            version: IMAGES_RESPONSE_VERSION,
            images: page.images,
            has_more: page.has_more,
        }
    }
}

impl ImagesResponse {
    /// Unwrap into a page, rejecting any version this build does not know.
    pub fn into_page(self) -> Result<GalleryPage, GalleryError> {
        if self.version != IMAGES_RESPONSE_VERSION {
            return Err(GalleryError::Storage(format!(
                "Unsupported images response version {}",
                self.version
            )));
        }
        Ok(GalleryPage { images: self.images, has_more: self.has_more })
    }
}
