pub mod store;
pub mod sqlite_store;

pub use store::{Artwork, ArtworkFilter, ArtworkMetadata, ArtworkStore, NewArtwork, UNASSIGNED};
pub use sqlite_store::SqliteArtworkStore;
