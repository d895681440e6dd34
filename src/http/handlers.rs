use axum::extract::{Multipart, Path, Query, State};
use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artworks::{Artwork, ArtworkFilter, ArtworkMetadata};
use crate::clock;
use crate::error::GalleryError;
use crate::gallery::{ImagesResponse, ProjectCountSummary};
use crate::projects::{NewProject, Project};
use crate::upload::UploadFile;
use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: clock::now_rfc3339(),
    })
}

/// The token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

pub async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<VerifyResponse>, GalleryError> {
    state.uploads.authorize(bearer_token(&headers)).await?;
    Ok(Json(VerifyResponse { valid: true }))
}

/// Raw `/images` query. Numbers are parsed by hand so a bad value becomes a
/// `Validation` error rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesParams {
    pub project_id: Option<String>,
    pub unassigned: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ImagesParams {
    /// `unassigned=true` takes precedence over any `projectId`.
    pub fn filter(&self) -> ArtworkFilter {
        if self.unassigned.as_deref() == Some("true") {
            ArtworkFilter::Unassigned
        } else {
            ArtworkFilter::from_project_id(self.project_id.as_deref())
        }
    }
}

fn parse_int(name: &str, value: Option<&str>) -> Result<Option<i64>, GalleryError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| GalleryError::Validation(format!("{} must be an integer, got {:?}", name, raw))),
    }
}

pub async fn list_images(
    State(state): State<AppState>,
    Query(params): Query<ImagesParams>,
) -> Result<Json<ImagesResponse>, GalleryError> {
    let limit = parse_int("limit", params.limit.as_deref())?;
    let offset = parse_int("offset", params.offset.as_deref())?;

    let page = state
        .query
        .get_gallery_images(&params.filter(), limit, offset)
        .await?;
    Ok(Json(ImagesResponse::from(page)))
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Artwork>, GalleryError> {
    Ok(Json(state.query.get_artwork(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateImageRequest {
    pub metadata: ArtworkMetadata,
}

pub async fn update_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<UpdateImageRequest>, JsonRejection>,
) -> Result<Json<Artwork>, GalleryError> {
    let token = bearer_token(&headers);
    state.uploads.authorize(token).await?;

    let Json(request) = body.map_err(|e| GalleryError::Validation(format!("Invalid metadata: {}", e.body_text())))?;
    let artwork = state
        .uploads
        .update_artwork_metadata(&id, request.metadata, token)
        .await?;
    Ok(Json(artwork))
}

pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, GalleryError> {
    Ok(Json(state.query.get_gallery_projects().await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Project>, GalleryError> {
    Ok(Json(state.query.get_project(&id).await?))
}

pub async fn create_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewProject>, JsonRejection>,
) -> Result<Json<Project>, GalleryError> {
    let token = bearer_token(&headers);
    state.uploads.authorize(token).await?;

    let Json(input) = body.map_err(|e| GalleryError::Validation(format!("Invalid project: {}", e.body_text())))?;
    Ok(Json(state.uploads.create_project(input, token).await?))
}

pub async fn project_counts(
    State(state): State<AppState>,
) -> Result<Json<ProjectCountSummary>, GalleryError> {
    Ok(Json(state.query.get_project_count_summary().await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub url: String,
}

/// `multipart/form-data` with a `file` part and a `metadata` part holding
/// the metadata as a JSON string.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, GalleryError> {
    let token = bearer_token(&headers);
    state.uploads.authorize(token).await?;

    let mut file = None;
    let mut metadata = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GalleryError::Validation(format!("Malformed upload: {}", e.body_text())))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| GalleryError::Validation(format!("Malformed upload: {}", e.body_text())))?;
                file = Some(UploadFile { file_name, content_type, bytes: bytes.to_vec() });
            }
            Some("metadata") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| GalleryError::Validation(format!("Malformed upload: {}", e.body_text())))?;
                let parsed: ArtworkMetadata = serde_json::from_str(&text)
                    .map_err(|e| GalleryError::Validation(format!("Invalid metadata: {}", e)))?;
                metadata = Some(parsed);
            }
            other => debug!("Gallery/Http: ignoring upload field {:?}", other),
        }
    }

    let artwork = state
        .uploads
        .upload_artwork(file, metadata.unwrap_or_default(), token)
        .await?;
    Ok(Json(UploadResponse { id: artwork.id, url: artwork.url }))
}

fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Serve a blob written by the local blob backend.
pub async fn get_blob(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, GalleryError> {
    let not_found = || GalleryError::NotFound(format!("Blob {} not found", name));
    let dir = state.blob_dir.as_ref().ok_or_else(not_found)?;
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(not_found());
    }

    let bytes = tokio::fs::read(dir.join(&name)).await.map_err(|_| not_found())?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type_for(&name))], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn test_unassigned_flag_overrides_project_id() {
        let params = ImagesParams {
            project_id: Some("p1".to_string()),
            unassigned: Some("true".to_string()),
            ..Default::default()
        };
        assert_eq!(params.filter(), ArtworkFilter::Unassigned);

        let params = ImagesParams { unassigned: Some("false".to_string()), project_id: Some("p1".to_string()), ..Default::default() };
        assert_eq!(params.filter(), ArtworkFilter::Project("p1".to_string()));
        assert_eq!(ImagesParams::default().filter(), ArtworkFilter::All);
    }

    #[test]
    fn test_parse_int_rejects_non_integers() {
        assert_eq!(parse_int("limit", None), Ok(None));
        assert_eq!(parse_int("limit", Some("")), Ok(None));
        assert_eq!(parse_int("limit", Some("-1")), Ok(Some(-1)));
        assert!(matches!(parse_int("limit", Some("ten")), Err(GalleryError::Validation(_))));
        assert!(matches!(parse_int("offset", Some("1.5")), Err(GalleryError::Validation(_))));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("abc-heron.PNG"), "image/png");
        assert_eq!(content_type_for("abc-sketch.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("abc-notes"), "application/octet-stream");
    }
}
