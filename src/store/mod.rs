//! Keyed CRUD store for projects and generation tasks.
//!
//! Persistence proper is an external collaborator; the pipeline only depends
//! on this trait. The in-memory implementation backs the CLI and tests.

use crate::error::{Error, Result};
use crate::models::{GenerationTask, Project, ProjectStatus, Storyboard};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_project(&self, project: Project) -> Result<Project>;
    async fn get_project(&self, id: Uuid) -> Result<Option<Project>>;
    async fn update_project(&self, project: Project) -> Result<Project>;

    async fn create_task(&self, task: GenerationTask) -> Result<GenerationTask>;
    async fn update_task(&self, task: GenerationTask) -> Result<GenerationTask>;
    async fn get_task(&self, id: Uuid) -> Result<Option<GenerationTask>>;
    /// Latest task for a project; the authoritative one for status queries.
    async fn latest_task(&self, project_id: Uuid) -> Result<Option<GenerationTask>>;
}

/// Convenience updates shared by the orchestrator.
pub async fn update_project_status(
    store: &dyn Store,
    project_id: Uuid,
    status: ProjectStatus,
    error: Option<String>,
) -> Result<()> {
    let mut project = store
        .get_project(project_id)
        .await?
        .ok_or_else(|| Error::validation(format!("project not found: {project_id}")))?;
    project.status = status;
    project.error_message = error;
    project.updated_at = chrono::Utc::now();
    store.update_project(project).await?;
    Ok(())
}

pub async fn update_project_storyboard(
    store: &dyn Store,
    project_id: Uuid,
    storyboard: Storyboard,
) -> Result<Project> {
    let mut project = store
        .get_project(project_id)
        .await?
        .ok_or_else(|| Error::validation(format!("project not found: {project_id}")))?;
    project.storyboard = Some(storyboard);
    project.updated_at = chrono::Utc::now();
    store.update_project(project).await
}

pub async fn set_project_output(
    store: &dyn Store,
    project_id: Uuid,
    output: &Path,
) -> Result<()> {
    let mut project = store
        .get_project(project_id)
        .await?
        .ok_or_else(|| Error::validation(format!("project not found: {project_id}")))?;
    project.video_output_path = Some(output.to_path_buf());
    project.status = ProjectStatus::Completed;
    project.error_message = None;
    project.updated_at = chrono::Utc::now();
    store.update_project(project).await?;
    Ok(())
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<Uuid, Project>>,
    tasks: RwLock<HashMap<Uuid, GenerationTask>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_project(&self, project: Project) -> Result<Project> {
        self.projects.write().insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        Ok(self.projects.read().get(&id).cloned())
    }

    async fn update_project(&self, project: Project) -> Result<Project> {
        let mut projects = self.projects.write();
        if !projects.contains_key(&project.id) {
            return Err(Error::validation(format!(
                "project not found: {}",
                project.id
            )));
        }
        projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn create_task(&self, task: GenerationTask) -> Result<GenerationTask> {
        self.tasks.write().insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, task: GenerationTask) -> Result<GenerationTask> {
        self.tasks.write().insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<GenerationTask>> {
        Ok(self.tasks.read().get(&id).cloned())
    }

    async fn latest_task(&self, project_id: Uuid) -> Result<Option<GenerationTask>> {
        Ok(self
            .tasks
            .read()
            .values()
            .filter(|t| t.project_id == project_id)
            .max_by_key(|t| t.created_at)
            .cloned())
    }
}
