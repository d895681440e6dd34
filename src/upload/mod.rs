//! Authenticated write path: token verification, blob storage and the
//! upload/edit service that sequences them with the stores.

pub mod auth;
pub mod blob;
pub mod service;

pub use auth::{AuthVerifier, HmacTokenVerifier};
pub use blob::{blob_name, BlobStore, HttpBlobStore, LocalBlobStore, StoredBlob};
pub use service::{ImportReport, UploadFile, UploadService};
