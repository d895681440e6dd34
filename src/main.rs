use std::path::PathBuf;

use gallery_app_lib::settings::{Secrets, SettingsManager};
use gallery_app_lib::{import_blobs, logging, run};

#[tokio::main]
async fn main() {
    let logs_dir = logging::logs_dir().unwrap_or_else(|| PathBuf::from("logs"));
    logging::init(&logs_dir);

    let manager = match std::env::var_os("GALLERY_SETTINGS") {
        Some(path) => SettingsManager::new_with_path(PathBuf::from(path)),
        None => SettingsManager::new(),
    };
    let manager = match manager {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!("Gallery: {}", e);
            std::process::exit(1);
        }
    };

    let settings = manager.effective();
    if let Err(e) = SettingsManager::validate(&settings) {
        tracing::error!("Gallery: {} ({})", e, manager.path().display());
        std::process::exit(1);
    }

    let secrets = Secrets::from_env();
    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => {
            if let Err(e) = run(settings, secrets).await {
                tracing::error!("Gallery: server stopped: {}", e);
                std::process::exit(1);
            }
        }
        Some("import-blobs") => {
            if let Err(e) = import_blobs(&settings, &secrets).await {
                tracing::error!("Gallery: import failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(other) => {
            tracing::error!("Gallery: unknown command {:?} (expected serve or import-blobs)", other);
            std::process::exit(2);
        }
    }
}
