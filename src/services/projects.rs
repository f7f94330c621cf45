use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::database::models::{project, Project, ProjectStatus};
use crate::database::{Repository, RowQuery};
use crate::error::ApiError;
use crate::state::AppState;

pub const NOT_FOUND: &str = "Project not found or access denied";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
}

#[derive(Serialize)]
struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<ProjectStatus>,
    updated_at: DateTime<Utc>,
}

/// Projects scoped to their owner. A project owned by someone else is
/// indistinguishable from an absent one.
pub struct ProjectService {
    projects: Repository<Project>,
}

impl ProjectService {
    pub fn new(state: &AppState) -> Self {
        Self {
            projects: Repository::new(project::TABLE, state.rows.clone()),
        }
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<Project>, ApiError> {
        let query = RowQuery::new()
            .eq("owner_id", owner_id)
            .order_by("created_at", true);
        Ok(self.projects.select_any(query).await?)
    }

    pub async fn create(&self, owner_id: &str, input: CreateProject) -> Result<Project, ApiError> {
        let now = Utc::now();
        let record = Project {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let created = self.projects.insert(&record).await?;
        info!("Created project {} for {}", created.id, owner_id);
        Ok(created)
    }

    pub async fn get(&self, owner_id: &str, id: &str) -> Result<Option<Project>, ApiError> {
        let query = RowQuery::new().eq("id", id).eq("owner_id", owner_id);
        Ok(self.projects.select_one(query).await?)
    }

    pub async fn update(&self, owner_id: &str, id: &str, input: UpdateProject) -> Result<Project, ApiError> {
        self.get(owner_id, id)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

        let patch = ProjectPatch {
            name: input.name.map(|n| n.trim().to_string()),
            description: input.description,
            status: input.status,
            updated_at: Utc::now(),
        };
        self.projects
            .update_by_id(id, &patch)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }

    pub async fn delete(&self, owner_id: &str, id: &str) -> Result<Project, ApiError> {
        let existing = self
            .get(owner_id, id)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
        if !self.projects.delete_by_id(id).await? {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        info!("Deleted project {}", id);
        Ok(existing)
    }
}
