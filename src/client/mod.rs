//! Client-side gallery state: the visible image window, pagination and
//! optimistic additions after upload.

pub mod api;
pub mod controller;
pub mod state;

pub use api::{GalleryApi, HttpGalleryApi};
pub use controller::GalleryClient;
pub use state::{
    FetchMode, FetchOptions, FetchOutcome, FetchTicket, GalleryState, InitialGallery, LoadPhase,
    UNKNOWN_PROJECT,
};
