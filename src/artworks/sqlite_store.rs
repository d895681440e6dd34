use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{storage, GalleryError};

/// SQLite-backed artwork store. Owns the gallery database; the project store
/// shares its connection via `get_conn()`.
pub struct SqliteArtworkStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteArtworkStore {
    /// Open (or create) the gallery database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self, GalleryError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(storage("Failed to create database directory"))?;
        }

        let conn = Connection::open(db_path).map_err(storage("Failed to open database"))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize in-memory store for testing
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, GalleryError> {
        let conn = Connection::open_in_memory()
            .map_err(storage("Failed to open in-memory database"))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.initialize_schema()?;
        Ok(store)
    }

    /// Get a clone of the database connection for sharing with other stores
    pub fn get_conn(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, GalleryError> {
        self.conn.lock().map_err(storage("Failed to acquire lock"))
    }

    fn initialize_schema(&self) -> Result<(), GalleryError> {
        let conn = self.lock()?;

        // project_id is not a foreign key; orphaned references still read
        // back and paginate.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS artworks (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                project_id TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_artworks_created ON artworks(created_at DESC, id DESC);
            CREATE INDEX IF NOT EXISTS idx_artworks_project ON artworks(project_id);",
        )
        .map_err(storage("Failed to create artworks table"))?;

        Ok(())
    }
}

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;
use crate::artworks::store::{Artwork, ArtworkFilter, ArtworkMetadata, ArtworkStore, NewArtwork};
use crate::clock;

const ARTWORK_COLUMNS: &str =
    "id, url, title, description, project_id, tags, created_at, updated_at";

/// Run `f` against the shared connection on tokio's blocking pool.
///
/// Waiting for the lock and running the query both happen off the async
/// workers, so a caller's deadline can expire while the connection is busy.
pub(crate) async fn with_conn<T, F>(conn: &Arc<Mutex<Connection>>, f: F) -> Result<T, GalleryError>
where
    F: FnOnce(&Connection) -> Result<T, GalleryError> + Send + 'static,
    T: Send + 'static,
{
    let conn = conn.clone();
    tokio::task::spawn_blocking(move || {
        let guard = conn.lock().map_err(storage("Failed to acquire lock"))?;
        f(&guard)
    })
    .await
    .map_err(storage("Database task failed"))?
}

impl SqliteArtworkStore {
    fn row_to_artwork(row: &rusqlite::Row) -> rusqlite::Result<Artwork> {
        // Tags are a JSON array in a TEXT column; unreadable values degrade to no tags
        let tags: Vec<String> = row
            .get::<_, Option<String>>(5)?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        Ok(Artwork {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            project_id: row.get(4)?,
            tags,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    /// WHERE clause and its bound parameters for a filter.
    fn filter_clause(filter: &ArtworkFilter) -> (&'static str, Vec<Box<dyn rusqlite::types::ToSql>>) {
        match filter {
            ArtworkFilter::All => ("", Vec::new()),
            ArtworkFilter::Unassigned => ("WHERE project_id IS NULL", Vec::new()),
            ArtworkFilter::Project(id) => ("WHERE project_id = ?1", vec![Box::new(id.clone())]),
        }
    }

    fn select_by_id(conn: &Connection, id: &str) -> Result<Option<Artwork>, GalleryError> {
        conn.query_row(
            &format!("SELECT {} FROM artworks WHERE id = ?1", ARTWORK_COLUMNS),
            params![id],
            Self::row_to_artwork,
        )
        .optional()
        .map_err(storage("Failed to query artwork"))
    }
}

fn tags_json(tags: &[String]) -> Result<String, GalleryError> {
    serde_json::to_string(tags).map_err(storage("Failed to serialize tags"))
}

#[async_trait]
impl ArtworkStore for SqliteArtworkStore {
    async fn create(&self, input: NewArtwork) -> Result<Artwork, GalleryError> {
        with_conn(&self.conn, move |conn| {
            let id = Uuid::new_v4().to_string();
            let created_at = input.created_at.unwrap_or_else(clock::now_rfc3339);
            let metadata = input.metadata;

            conn.execute(
                "INSERT INTO artworks (id, url, title, description, project_id, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    input.url,
                    metadata.title,
                    metadata.description,
                    metadata.project_id,
                    tags_json(&metadata.tags)?,
                    created_at,
                    created_at,
                ],
            )
            .map_err(storage("Failed to insert artwork"))?;

            Ok(Artwork {
                id,
                url: input.url,
                title: metadata.title,
                description: metadata.description,
                project_id: metadata.project_id,
                tags: metadata.tags,
                created_at: created_at.clone(),
                updated_at: created_at,
            })
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<Artwork>, GalleryError> {
        let id = id.to_string();
        with_conn(&self.conn, move |conn| Self::select_by_id(conn, &id)).await
    }

    async fn list(
        &self,
        filter: &ArtworkFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Artwork>, GalleryError> {
        let filter = filter.clone();
        with_conn(&self.conn, move |conn| {
            let (where_clause, mut params) = Self::filter_clause(&filter);
            let limit_index = params.len() + 1;
            let sql = format!(
                "SELECT {} FROM artworks {}
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?{} OFFSET ?{}",
                ARTWORK_COLUMNS,
                where_clause,
                limit_index,
                limit_index + 1
            );

            // SQLite treats a negative LIMIT as "no limit"
            params.push(Box::new(limit.map(|l| l as i64).unwrap_or(-1)));
            params.push(Box::new(offset as i64));

            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();
            let mut stmt = conn.prepare(&sql).map_err(storage("Failed to prepare list query"))?;

            let artworks = stmt
                .query_map(param_refs.as_slice(), Self::row_to_artwork)
                .map_err(storage("Failed to query artworks"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(storage("Failed to collect artworks"))?;

            Ok(artworks)
        })
        .await
    }

    async fn count(&self, filter: &ArtworkFilter) -> Result<usize, GalleryError> {
        let filter = filter.clone();
        with_conn(&self.conn, move |conn| {
            let (where_clause, params) = Self::filter_clause(&filter);
            let sql = format!("SELECT COUNT(*) FROM artworks {}", where_clause);
            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();

            let count: i64 = conn
                .query_row(&sql, param_refs.as_slice(), |row| row.get(0))
                .map_err(storage("Failed to count artworks"))?;

            Ok(count as usize)
        })
        .await
    }

    async fn exists_with_url(&self, url: &str) -> Result<bool, GalleryError> {
        let url = url.to_string();
        with_conn(&self.conn, move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM artworks WHERE url = ?1)",
                params![url],
                |row| row.get(0),
            )
            .map_err(storage("Failed to look up artwork url"))
        })
        .await
    }

    async fn update_metadata(
        &self,
        id: &str,
        metadata: ArtworkMetadata,
        updated_at: &str,
    ) -> Result<Option<Artwork>, GalleryError> {
        let id = id.to_string();
        let updated_at = updated_at.to_string();
        with_conn(&self.conn, move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE artworks
                     SET title = ?1, description = ?2, project_id = ?3, tags = ?4, updated_at = ?5
                     WHERE id = ?6",
                    params![
                        metadata.title,
                        metadata.description,
                        metadata.project_id,
                        tags_json(&metadata.tags)?,
                        updated_at,
                        id,
                    ],
                )
                .map_err(storage("Failed to update artwork"))?;

            if rows_affected == 0 {
                return Ok(None);
            }

            Self::select_by_id(conn, &id)
        })
        .await
    }
}
