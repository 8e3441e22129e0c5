use chrono::Utc;
use serde::Serialize;

use crate::formats::{GenerateResponse, Project};
use crate::persistence::{API_CALLS_KEY, PersistenceManager};

pub const RECENT_PROJECTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub active_projects: usize,
    pub generated_sdks: usize,
    pub total_endpoints: usize,
    pub api_calls: u64,
}

/// The stored project collection, newest first.
#[derive(Debug, Clone)]
pub struct ProjectCatalog {
    persistence: PersistenceManager,
}

impl ProjectCatalog {
    pub fn new(persistence: PersistenceManager) -> Self {
        Self { persistence }
    }

    pub fn list(&self) -> Vec<Project> {
        self.persistence
            .load(self.persistence.collection_key(), Vec::new())
    }

    pub fn recent(&self) -> Vec<Project> {
        let mut projects = self.list();
        projects.truncate(RECENT_PROJECTS);
        projects
    }

    pub fn get(&self, id: &str) -> Option<Project> {
        self.list().into_iter().find(|project| project.id == id)
    }

    /// Builds a project from a generation result and stores it at the head.
    ///
    /// The project is returned even when it could not be persisted; the flag
    /// reports whether the save succeeded.
    pub fn create(
        &self,
        name: Option<&str>,
        source_url: &str,
        generated: GenerateResponse,
    ) -> (Project, bool) {
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or(generated.name);
        let project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            source_url: source_url.to_string(),
            spec: generated.spec,
            sdk_code: generated.sdk_code,
            created_at: Utc::now(),
            version: generated.version,
            is_mock: generated.is_mock,
            source: generated.source,
        };

        let mut projects = self.list();
        projects.insert(0, project.clone());
        let saved = self
            .persistence
            .save(self.persistence.collection_key(), &projects);
        if saved {
            tracing::info!(project_id = %project.id, name = %project.name, "project saved");
        } else {
            tracing::warn!(project_id = %project.id, "project could not be persisted");
        }
        (project, saved)
    }

    pub fn clear_all(&self) {
        self.persistence.clear(self.persistence.collection_key());
    }

    pub fn api_call_count(&self) -> u64 {
        self.persistence
            .load_text(API_CALLS_KEY)
            .and_then(|text| text.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn record_api_call(&self) -> u64 {
        let count = self.api_call_count().saturating_add(1);
        if !self.persistence.save_text(API_CALLS_KEY, &count.to_string()) {
            tracing::warn!(count, "api call count could not be persisted");
        }
        count
    }

    pub fn stats(&self) -> DashboardStats {
        let projects = self.list();
        DashboardStats {
            active_projects: projects.len(),
            generated_sdks: projects.len(),
            total_endpoints: projects.iter().map(|p| p.spec.endpoints.len()).sum(),
            api_calls: self.api_call_count(),
        }
    }
}
