// Module declarations
pub mod artworks;
pub mod client;
pub mod clock;
pub mod error;
pub mod gallery;
pub mod http;
pub mod logging;
pub mod projects;
pub mod settings;
pub mod upload;

use std::sync::Arc;

use tracing::info;

use artworks::SqliteArtworkStore;
use error::GalleryError;
use gallery::GalleryQuery;
use http::AppState;
use projects::SqliteProjectStore;
use settings::{Secrets, Settings};
use upload::{BlobStore, HmacTokenVerifier, HttpBlobStore, ImportReport, LocalBlobStore, UploadService};

/// Open the stores and wire the query layer and upload service together.
pub fn build_state(settings: &Settings, secrets: &Secrets) -> Result<AppState, GalleryError> {
    let timeout = settings.request_timeout();

    let artworks = Arc::new(SqliteArtworkStore::new(&settings.database_path())?);
    let projects = Arc::new(SqliteProjectStore::new(artworks.get_conn())?);
    info!("Gallery: database at {}", settings.database_path().display());

    let blobs: Arc<dyn BlobStore>;
    let blob_dir;
    match settings.blob.backend.as_str() {
        "http" => {
            let endpoint = settings.blob.endpoint.as_deref().unwrap_or_default();
            blobs = Arc::new(HttpBlobStore::new(endpoint, secrets.blob_token.clone(), timeout)?);
            blob_dir = None;
            info!("Gallery: blobs go to {}", endpoint);
        }
        _ => {
            let dir = settings.blob_dir();
            info!("Gallery: blobs stored under {}", dir.display());
            blobs = Arc::new(LocalBlobStore::new(dir.clone(), &settings.blob.public_base_url));
            blob_dir = Some(dir);
        }
    }

    if secrets.admin_secret.is_none() {
        tracing::warn!("Gallery: ADMIN_SECRET is not set; all authenticated requests will be rejected");
    }
    let auth = Arc::new(HmacTokenVerifier::new(secrets.admin_secret.clone()));

    let query = GalleryQuery::new(artworks.clone(), projects.clone(), settings.page_limits(), timeout);
    let uploads = UploadService::new(artworks, projects, blobs, auth, timeout);

    Ok(AppState {
        query: Arc::new(query),
        uploads: Arc::new(uploads),
        blob_dir,
    })
}

/// Serve the gallery API until the process is stopped.
pub async fn run(settings: Settings, secrets: Secrets) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(&settings, &secrets)?;
    let app = http::router(state, settings.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr).await?;
    info!("Gallery: listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Add artwork rows for blobs already in the configured blob store.
pub async fn import_blobs(settings: &Settings, secrets: &Secrets) -> Result<ImportReport, GalleryError> {
    let state = build_state(settings, secrets)?;
    let report = state.uploads.import_blobs().await?;
    info!(
        "Gallery: import finished, {} imported, {} already present",
        report.imported, report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{BlobSettings, StorageSettings};

    #[tokio::test]
    async fn test_build_state_with_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            storage: StorageSettings { database_path: Some(dir.path().join("db").join("gallery.db")) },
            blob: BlobSettings { local_dir: Some(dir.path().join("blobs")), ..Default::default() },
            ..Default::default()
        };

        let state = build_state(&settings, &Secrets::default()).expect("state should build");

        assert_eq!(state.blob_dir, Some(dir.path().join("blobs")));
        assert!(dir.path().join("db").join("gallery.db").exists());
        let summary = state.query.get_project_count_summary().await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(matches!(
            state.uploads.authorize(Some("a.b.c")).await,
            Err(GalleryError::Auth(_))
        ));
    }

    #[test]
    fn test_build_state_with_http_backend_has_no_blob_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            storage: StorageSettings { database_path: Some(dir.path().join("gallery.db")) },
            blob: BlobSettings {
                backend: "http".to_string(),
                endpoint: Some("https://blobs.example.com".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let state = build_state(&settings, &Secrets::default()).unwrap();
        assert!(state.blob_dir.is_none());
    }

    #[tokio::test]
    async fn test_import_blobs_picks_up_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = dir.path().join("blobs");
        std::fs::create_dir_all(&blobs).unwrap();
        std::fs::write(blobs.join("0123456789abcdef-heron.png"), b"pixels").unwrap();
        let settings = Settings {
            storage: StorageSettings { database_path: Some(dir.path().join("gallery.db")) },
            blob: BlobSettings { local_dir: Some(blobs), ..Default::default() },
            ..Default::default()
        };

        let first = import_blobs(&settings, &Secrets::default()).await.unwrap();
        assert_eq!(first, ImportReport { imported: 1, skipped: 0 });

        let second = import_blobs(&settings, &Secrets::default()).await.unwrap();
        assert_eq!(second, ImportReport { imported: 0, skipped: 1 });

        let state = build_state(&settings, &Secrets::default()).unwrap();
        let page = state.query.get_gallery_images(&artworks::ArtworkFilter::All, None, None).await.unwrap();
        assert_eq!(page.images.len(), 1);
        assert_eq!(page.images[0].title, "0123456789abcdef-heron.png");
        assert_eq!(page.images[0].url, "http://localhost:3000/blobs/0123456789abcdef-heron.png");
    }
}
