use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;
use crate::artworks::sqlite_store::with_conn;
use crate::clock;
use crate::error::{storage, GalleryError};
use super::store::*;

/// SQLite-backed project store. Shares gallery.db with SqliteArtworkStore.
pub struct SqliteProjectStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProjectStore {
    /// Create a new SqliteProjectStore sharing the existing database connection.
    ///
    /// Creates the projects table if it doesn't exist. Count queries join
    /// against the artworks table, which the artwork store owns.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Result<Self, GalleryError> {
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, GalleryError> {
        self.conn.lock().map_err(storage("Failed to acquire lock"))
    }

    fn initialize_schema(&self) -> Result<(), GalleryError> {
        let conn = self.lock()?;

        conn.execute_batch("
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_projects_name ON projects(name);
        ").map_err(storage("Failed to create projects table"))?;

        Ok(())
    }

    fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

#[async_trait::async_trait]
impl ProjectStore for SqliteProjectStore {
    async fn create(&self, input: NewProject) -> Result<Project, GalleryError> {
        with_conn(&self.conn, move |conn| {
            let id = Uuid::new_v4().to_string();
            let now = clock::now_rfc3339();

            conn.execute(
                "INSERT INTO projects (id, name, description, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, input.name, input.description, now],
            ).map_err(storage("Failed to create project"))?;

            Ok(Project {
                id,
                name: input.name,
                description: input.description,
                created_at: now,
            })
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<Project>, GalleryError> {
        let id = id.to_string();
        with_conn(&self.conn, move |conn| {
            conn.query_row(
                "SELECT id, name, description, created_at FROM projects WHERE id = ?1",
                params![id],
                Self::row_to_project,
            )
            .optional()
            .map_err(storage("Failed to get project"))
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Project>, GalleryError> {
        with_conn(&self.conn, |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, created_at
                 FROM projects
                 ORDER BY name COLLATE NOCASE ASC, id ASC"
            ).map_err(storage("Failed to prepare list query"))?;

            let projects = stmt.query_map([], Self::row_to_project)
                .map_err(storage("Failed to query projects"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(storage("Failed to collect projects"))?;

            Ok(projects)
        })
        .await
    }

    async fn artwork_counts(&self) -> Result<Vec<ProjectCount>, GalleryError> {
        with_conn(&self.conn, |conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.name, COUNT(a.id) AS artwork_count
                 FROM projects p
                 LEFT JOIN artworks a ON a.project_id = p.id
                 GROUP BY p.id, p.name
                 ORDER BY p.name COLLATE NOCASE ASC, p.id ASC"
            ).map_err(storage("Failed to prepare count query"))?;

            let counts = stmt.query_map([], |row| {
                Ok(ProjectCount {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    count: row.get::<_, i64>(2)? as usize,
                })
            })
            .map_err(storage("Failed to count project artworks"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage("Failed to collect project counts"))?;

            Ok(counts)
        })
        .await
    }
}
