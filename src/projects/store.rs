use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::GalleryError;

/// A project: a named grouping of artworks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Unique by convention, not enforced
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String, // RFC 3339
}

/// Input for creating a project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewProject {
    /// Trim the name and description; a blank name is rejected.
    pub fn validated(self) -> Result<Self, GalleryError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(GalleryError::Validation("Project name is required".to_string()));
        }
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok(Self { name, description })
    }
}

/// Artwork count for one project (derived, never stored).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCount {
    pub id: String,
    pub name: String,
    pub count: usize,
}

/// Backend-agnostic project store.
///
/// Projects are never deleted; counts are computed on read.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Create a new project. Sets id and created_at automatically.
    async fn create(&self, input: NewProject) -> Result<Project, GalleryError>;

    /// Get a project by ID.
    async fn get(&self, id: &str) -> Result<Option<Project>, GalleryError>;

    /// List all projects, ordered by name (case-insensitive).
    async fn list(&self) -> Result<Vec<Project>, GalleryError>;

    /// Artwork count per project (projects with no artworks report 0), ordered like `list`.
    async fn artwork_counts(&self) -> Result<Vec<ProjectCount>, GalleryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_wire_uses_snake_case_timestamp() {
        let project = Project {
            id: "p-1".to_string(),
            name: "Birds".to_string(),
            description: None,
            created_at: "2024-03-15T14:00:00.000000Z".to_string(),
        };

        let value = serde_json::to_value(&project).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "id": "p-1", "name": "Birds", "created_at": "2024-03-15T14:00:00.000000Z" })
        );
    }
}
