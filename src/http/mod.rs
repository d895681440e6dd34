//! HTTP boundary: JSON endpoints over the gallery query layer and the
//! upload service.

pub mod handlers;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::GalleryError;
use crate::gallery::GalleryQuery;
use crate::upload::UploadService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub query: Arc<GalleryQuery>,
    pub uploads: Arc<UploadService>,
    /// Directory served under `/blobs` when the local blob backend is in use.
    pub blob_dir: Option<PathBuf>,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl GalleryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GalleryError::Validation(_) => StatusCode::BAD_REQUEST,
            GalleryError::Auth(_) => StatusCode::UNAUTHORIZED,
            GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
            GalleryError::Storage(_) | GalleryError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Gallery/Http: {} error: {}", self.kind(), self);
        }
        (status, Json(ErrorBody { error: self.message().to_string() })).into_response()
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/verify", get(handlers::verify_token))
        .route("/images", get(handlers::list_images))
        .route(
            "/images/:id",
            get(handlers::get_image).patch(handlers::update_image),
        )
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route("/projects/counts", get(handlers::project_counts))
        .route("/projects/:id", get(handlers::get_project))
        .route("/upload", post(handlers::upload))
        .route("/blobs/:name", get(handlers::get_blob))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
