use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::gallery::{PageLimits, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Settings-layer failures. Kept apart from `GalleryError`, which only
/// describes request outcomes.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid settings: {0}")]
    Invalid(String),

    #[error("Settings I/O failed: {0}")]
    Io(String),
}

/// Main settings structure containing all application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub gallery: GallerySettings,
    #[serde(default)]
    pub blob: BlobSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// `None` means `~/.gallery/gallery.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GallerySettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

/// Where uploaded image bytes go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobSettings {
    /// "local" or "http"
    #[serde(default = "default_blob_backend")]
    pub backend: String,
    /// Local backend directory; `None` means `~/.gallery/blobs`
    #[serde(default)]
    pub local_dir: Option<PathBuf>,
    /// Prefix for URLs of locally stored blobs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Upload endpoint for the http backend
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_blob_backend() -> String {
    "local".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:3000/blobs".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for BlobSettings {
    fn default() -> Self {
        Self {
            backend: default_blob_backend(),
            local_dir: None,
            public_base_url: default_public_base_url(),
            endpoint: None,
        }
    }
}

/// `~/.gallery`, or `./.gallery` when there is no home directory
pub fn gallery_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gallery")
}

impl Settings {
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| gallery_home().join("gallery.db"))
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.blob
            .local_dir
            .clone()
            .unwrap_or_else(|| gallery_home().join("blobs"))
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_limit: self.gallery.page_size,
            max_limit: self.gallery.max_page_size,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Apply `GALLERY_BIND_ADDR` / `GALLERY_DATABASE_PATH` from `lookup`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup("GALLERY_BIND_ADDR").filter(|v| !v.trim().is_empty()) {
            self.server.bind_addr = addr.trim().to_string();
        }
        if let Some(path) = lookup("GALLERY_DATABASE_PATH").filter(|v| !v.trim().is_empty()) {
            self.storage.database_path = Some(PathBuf::from(path.trim()));
        }
        self
    }
}

/// Credentials read from the environment only; never persisted.
#[derive(Clone, Default)]
pub struct Secrets {
    pub admin_secret: Option<String>,
    pub blob_token: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            admin_secret: non_empty("ADMIN_SECRET"),
            blob_token: non_empty("BLOB_READ_WRITE_TOKEN"),
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Secrets")
            .field("admin_secret", &redact(&self.admin_secret))
            .field("blob_token", &redact(&self.blob_token))
            .finish()
    }
}

/// Manages settings persistence and provides thread-safe access
pub struct SettingsManager {
    settings_path: PathBuf,
    current_settings: Arc<RwLock<Settings>>,
}

impl SettingsManager {
    /// Creates a new SettingsManager backed by `~/.gallery/settings.json`
    ///
    /// If the settings file doesn't exist, creates it with default values.
    pub fn new() -> Result<Self, SettingsError> {
        Self::new_with_path(gallery_home().join("settings.json"))
    }

    /// Creates a new SettingsManager with a custom settings path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The settings directory cannot be created
    /// - The settings file cannot be read or written
    pub fn new_with_path(settings_path: PathBuf) -> Result<Self, SettingsError> {
        if let Some(parent) = settings_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SettingsError::Io(format!("Failed to create settings directory: {}", e)))?;
            }
        }

        let manager = Self {
            settings_path,
            current_settings: Arc::new(RwLock::new(Settings::default())),
        };

        let settings = if manager.settings_path.exists() {
            manager.load_from_file()?
        } else {
            let defaults = Settings::default();
            manager.save_to_file(&defaults)?;
            info!("Settings: created {:?} with defaults", manager.settings_path);
            defaults
        };

        *manager.current_settings.write().unwrap_or_else(PoisonError::into_inner) = settings;

        Ok(manager)
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    /// Returns a clone of the persisted settings
    pub fn get(&self) -> Settings {
        self.current_settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The persisted settings with process environment overrides applied.
    pub fn effective(&self) -> Settings {
        self.get().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Validates, persists to disk, then swaps the in-memory copy.
    ///
    /// If an error occurs, in-memory state remains unchanged.
    pub fn update(&self, settings: Settings) -> Result<(), SettingsError> {
        Self::validate(&settings)?;
        self.save_to_file(&settings)?;

        *self.current_settings.write().unwrap_or_else(PoisonError::into_inner) = settings;

        Ok(())
    }

    /// Validates settings schema and constraints
    pub fn validate(settings: &Settings) -> Result<(), SettingsError> {
        let invalid = |msg: String| Err(SettingsError::Invalid(msg));

        if settings.server.bind_addr.parse::<SocketAddr>().is_err() {
            return invalid(format!(
                "Bind address must be host:port, got '{}'",
                settings.server.bind_addr
            ));
        }

        if settings.server.max_upload_bytes < 1 {
            return invalid("Max upload size must be at least 1 byte".to_string());
        }

        if !(1..=120).contains(&settings.server.request_timeout_secs) {
            return invalid(format!(
                "Request timeout must be between 1 and 120 seconds, got {}",
                settings.server.request_timeout_secs
            ));
        }

        if settings.gallery.page_size < 1 {
            return invalid("Page size must be at least 1".to_string());
        }

        if settings.gallery.max_page_size < settings.gallery.page_size {
            return invalid(format!(
                "Max page size ({}) must not be below page size ({})",
                settings.gallery.max_page_size, settings.gallery.page_size
            ));
        }

        match settings.blob.backend.as_str() {
            "local" => {}
            "http" => {
                let endpoint = settings.blob.endpoint.as_deref().unwrap_or("");
                if endpoint.trim().is_empty() {
                    return invalid("The http blob backend requires an endpoint".to_string());
                }
            }
            other => {
                return invalid(format!("Blob backend must be 'local' or 'http', got '{}'", other));
            }
        }

        Ok(())
    }

    /// Loads settings from disk
    ///
    /// Invalid JSON logs a warning and yields defaults.
    fn load_from_file(&self) -> Result<Settings, SettingsError> {
        let contents = std::fs::read_to_string(&self.settings_path)
            .map_err(|e| SettingsError::Io(format!("Failed to read settings file: {}", e)))?;

        match serde_json::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("Settings: failed to parse {:?}: {}. Using defaults.", self.settings_path, e);
                Ok(Settings::default())
            }
        }
    }

    /// Saves settings to disk atomically (temp file + rename)
    fn save_to_file(&self, settings: &Settings) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| SettingsError::Io(format!("Failed to serialize settings: {}", e)))?;

        let temp_path = self.settings_path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)
            .map_err(|e| SettingsError::Io(format!("Failed to write temporary settings file: {}", e)))?;

        std::fs::rename(&temp_path, &self.settings_path)
            .map_err(|e| SettingsError::Io(format!("Failed to rename settings file: {}", e)))?;

        Ok(())
    }
}
