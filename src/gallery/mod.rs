//! Gallery query layer: filtered, paginated reads and count aggregation.

pub mod page;
pub mod query;

pub use page::{
    GalleryPage, ImagesResponse, PageLimits, PageRequest, DEFAULT_PAGE_SIZE,
    IMAGES_RESPONSE_VERSION, MAX_PAGE_SIZE,
};
pub use query::{GalleryQuery, ProjectCountSummary};
