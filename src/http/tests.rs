use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;

use super::*;
use crate::artworks::sqlite_store::tests::insert_at;
use crate::artworks::{ArtworkFilter, ArtworkStore, SqliteArtworkStore};
use crate::client::{FetchOutcome, GalleryApi, GalleryClient, HttpGalleryApi, InitialGallery};
use crate::gallery::query::tests::fixture;
use crate::upload::auth::tests::admin_token;
use crate::upload::{HmacTokenVerifier, LocalBlobStore};

const SECRET: &str = "http-test-secret";

struct TestServer {
    base: String,
    artworks: Arc<SqliteArtworkStore>,
    http: reqwest::Client,
    _blob_dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let base = format!("http://{}", addr);

        let fx = fixture();
        let blob_dir = TempDir::new().expect("blob dir");
        let blobs = LocalBlobStore::new(blob_dir.path().to_path_buf(), &format!("{}/blobs", base));
        let uploads = UploadService::new(
            fx.artworks.clone(),
            fx.projects.clone(),
            Arc::new(blobs),
            Arc::new(HmacTokenVerifier::new(Some(SECRET.to_string()))),
            Duration::from_secs(5),
        );
        let state = AppState {
            query: Arc::new(fx.query),
            uploads: Arc::new(uploads),
            blob_dir: Some(blob_dir.path().to_path_buf()),
        };

        let app = router(state, 1024 * 1024);
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve") });

        Self {
            base,
            artworks: fx.artworks,
            http: reqwest::Client::new(),
            _blob_dir: blob_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self.http.get(self.url(path)).send().await.expect("request");
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn create_project(&self, name: &str) -> Value {
        let response = self
            .http
            .post(self.url("/projects"))
            .bearer_auth(admin_token(SECRET))
            .json(&json!({ "name": name }))
            .send()
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.expect("project json")
    }

    async fn upload(&self, token: Option<&str>, metadata: Value) -> reqwest::Response {
        let form = Form::new()
            .part(
                "file",
                Part::bytes(b"fake png bytes".to_vec())
                    .file_name("heron.png")
                    .mime_str("image/png")
                    .expect("mime"),
            )
            .text("metadata", metadata.to_string());
        let mut request = self.http.post(self.url("/upload")).multipart(form);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("request")
    }
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_images_pages_with_version_tag() {
    let server = TestServer::start().await;
    for minute in 1..=5 {
        insert_at(&server.artworks, &format!("a{}", minute), None, minute).await;
    }

    let (status, body) = server.get("/images?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 1);
    assert_eq!(body["hasMore"], true);
    let titles: Vec<&str> = body["images"].as_array().unwrap().iter().map(|a| a["metadata"]["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["a5", "a4"]);

    let (_, body) = server.get("/images?limit=2&offset=4").await;
    assert_eq!(body["images"].as_array().unwrap().len(), 1);
    assert_eq!(body["hasMore"], false);

    let (_, body) = server.get("/images?limit=0").await;
    assert_eq!(body["images"].as_array().unwrap().len(), 5);
    assert_eq!(body["hasMore"], false);
}

#[tokio::test]
async fn test_non_integer_limit_is_bad_request() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/images?limit=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn test_unassigned_flag_overrides_project_id() {
    let server = TestServer::start().await;
    let birds = server.create_project("Birds").await;
    let birds_id = birds["id"].as_str().unwrap();
    insert_at(&server.artworks, "heron", Some(birds_id), 1).await;
    insert_at(&server.artworks, "loose", None, 2).await;

    let (_, body) = server.get(&format!("/images?projectId={}&unassigned=true", birds_id)).await;
    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["metadata"]["title"], "loose");

    let (_, body) = server.get(&format!("/images?projectId={}", birds_id)).await;
    assert_eq!(body["images"][0]["metadata"]["title"], "heron");
}

#[tokio::test]
async fn test_upload_requires_token() {
    let server = TestServer::start().await;

    let response = server.upload(None, json!({ "title": "Heron" })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = admin_token("not-the-secret");
    let response = server.upload(Some(&forged), json!({ "title": "Heron" })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.artworks.count(&ArtworkFilter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn test_upload_then_read_back() {
    let server = TestServer::start().await;
    let token = admin_token(SECRET);

    let response = server
        .upload(Some(&token), json!({ "title": "Heron", "tags": ["bird", "bird"] }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap();
    let url = created["url"].as_str().unwrap();
    assert!(url.starts_with(&server.url("/blobs/")));

    let (status, artwork) = server.get(&format!("/images/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(artwork["id"], id);
    assert_eq!(artwork["metadata"]["title"], "Heron");
    assert_eq!(artwork["metadata"]["tags"], json!(["bird"]));
    assert_eq!(artwork["metadata"]["projectId"], Value::Null);
    assert!(artwork["metadata"]["created_at"].is_string());
    assert!(artwork["metadata"]["updated_at"].is_string());

    let blob = server.http.get(url).send().await.unwrap();
    assert_eq!(blob.status(), StatusCode::OK);
    assert_eq!(blob.headers()["content-type"], "image/png");
    assert_eq!(blob.bytes().await.unwrap().as_ref(), b"fake png bytes");
}

#[tokio::test]
async fn test_upload_blank_title_is_bad_request() {
    let server = TestServer::start().await;
    let response = server.upload(Some(&admin_token(SECRET)), json!({ "title": "" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patch_metadata() {
    let server = TestServer::start().await;
    let token = admin_token(SECRET);
    let art = insert_at(&server.artworks, "draft", None, 1).await;
    let birds = server.create_project("Birds").await;

    let missing = server
        .http
        .patch(server.url("/images/missing-id"))
        .bearer_auth(&token)
        .json(&json!({ "metadata": { "title": "X" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("missing-id"));

    let response = server
        .http
        .patch(server.url(&format!("/images/{}", art.id)))
        .bearer_auth(&token)
        .json(&json!({ "metadata": { "title": "Heron", "projectId": birds["id"] } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["metadata"]["title"], "Heron");
    assert_eq!(updated["metadata"]["projectId"], birds["id"]);

    let malformed = server
        .http
        .patch(server.url(&format!("/images/{}", art.id)))
        .bearer_auth(&token)
        .json(&json!({ "title": "no wrapper" }))
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_projects_and_counts() {
    let server = TestServer::start().await;
    let birds = server.create_project("Birds").await;
    server.create_project("Abstract").await;
    insert_at(&server.artworks, "heron", birds["id"].as_str(), 1).await;
    insert_at(&server.artworks, "loose", None, 2).await;

    let (_, projects) = server.get("/projects").await;
    let names: Vec<&str> = projects.as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Abstract", "Birds"]);

    let (status, counts) = server.get("/projects/counts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counts["unassigned"], 1);
    assert_eq!(counts["total"], 2);

    let (status, project) = server.get(&format!("/projects/{}", birds["id"].as_str().unwrap())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["name"], "Birds");
    assert!(project["created_at"].is_string());

    let (status, _) = server.get("/projects/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let anonymous = server
        .http
        .post(server.url("/projects"))
        .json(&json!({ "name": "Sneaky" }))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_verify() {
    let server = TestServer::start().await;
    let ok = server
        .http
        .get(server.url("/auth/verify"))
        .bearer_auth(admin_token(SECRET))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let (status, _) = server.get("/auth/verify").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_client_pages_over_http() {
    let server = TestServer::start().await;
    for minute in 1..=5 {
        insert_at(&server.artworks, &format!("a{}", minute), None, minute).await;
    }

    let api = Arc::new(HttpGalleryApi::new(&server.base, Duration::from_secs(5)).unwrap());
    let first = api.images(&ArtworkFilter::All, Some(2), 0).await.unwrap();
    assert!(first.has_more);

    let client = GalleryClient::new(
        api,
        InitialGallery { images: first.images, has_more: first.has_more, ..Default::default() },
    );

    // Default page size covers the remaining three
    assert!(matches!(client.load_more().await, FetchOutcome::Applied { added: 3, .. }));
    assert_eq!(client.load_more().await, FetchOutcome::Ignored);

    let titles: Vec<String> = client.snapshot().images().iter().map(|a| a.title.clone()).collect();
    assert_eq!(titles, vec!["a5", "a4", "a3", "a2", "a1"]);
}

#[tokio::test]
async fn test_http_api_maps_errors() {
    let server = TestServer::start().await;
    let api = HttpGalleryApi::new(&server.base, Duration::from_secs(5)).unwrap();

    let counts = api.project_counts().await.unwrap();
    assert_eq!(counts.total, 0);

    let unreachable = HttpGalleryApi::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    assert!(matches!(unreachable.projects().await, Err(GalleryError::Storage(_))));
}
