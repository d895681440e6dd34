pub mod manager;


pub use manager::{
    gallery_home, BlobSettings, GallerySettings, Secrets, ServerSettings, Settings, SettingsError,
    SettingsManager, StorageSettings,
};
