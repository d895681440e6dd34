use chrono::{DateTime, SecondsFormat, Utc};
use std::future::Future;
use std::time::Duration;
use crate::error::GalleryError;

/// Current time as a fixed-precision RFC 3339 UTC string.
///
/// Always microseconds with a `Z` suffix, so stored timestamps compare
/// lexicographically in time order.
pub fn now_rfc3339() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Run `fut` with a deadline; on expiry return the error built by `on_timeout`.
pub async fn within<T, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce() -> GalleryError,
) -> Result<T, GalleryError>
where
    F: Future<Output = Result<T, GalleryError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
