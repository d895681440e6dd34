// Structured logging: stderr plus a timestamped log file per launch.
//
//   <data dir>/gallery/logs/gallery-2026-03-01_14-30-00.log
//
// Keeps the last 5 log files, deletes older ones.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

const LOG_PREFIX: &str = "gallery-";
const KEEP_LOGS: usize = 5;

/// Install the global subscriber. Safe to call more than once; only the
/// first call has any effect.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. If the log file
/// cannot be opened, logging continues on stderr alone.
pub fn init(logs_dir: &Path) {
    INIT.call_once(|| {
        let opened = open_log_file(logs_dir);

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let file_layer = opened
            .as_ref()
            .ok()
            .and_then(|(file, _)| file.try_clone().ok())
            .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr))
            .with(file_layer)
            .try_init();

        if installed.is_err() {
            return;
        }

        match opened {
            Ok((_, path)) => info!("Logging: writing to {}", path.display()),
            Err(e) => warn!("Logging: file logging disabled: {}", e),
        }
    });
}

fn open_log_file(logs_dir: &Path) -> io::Result<(File, PathBuf)> {
    fs::create_dir_all(logs_dir)?;
    rotate_logs(logs_dir, KEEP_LOGS - 1)?;

    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = logs_dir.join(format!("{}{}.log", LOG_PREFIX, timestamp));
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    Ok((file, path))
}

/// Delete old log files, keeping the most recent `keep` files.
pub fn rotate_logs(logs_dir: &Path, keep: usize) -> io::Result<usize> {
    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

    for entry in fs::read_dir(logs_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_ours = path.extension().and_then(|e| e.to_str()) == Some("log")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(LOG_PREFIX))
                .unwrap_or(false);

        if is_ours {
            if let Ok(metadata) = entry.metadata() {
                let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
                log_files.push((path, modified));
            }
        }
    }

    // Newest first; names carry the launch time, so they break mtime ties
    log_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        if fs::remove_file(path).is_ok() {
            removed += 1;
        }
    }

    Ok(removed)
}

/// Get the logs directory path.
pub fn logs_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("gallery").join("logs"))
}
