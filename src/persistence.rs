//! Quota-aware save/load facade over a [`KeyValueStore`].
//!
//! Writes to the project collection that hit the store's capacity are retried
//! in a degraded form: every project is shrunk first, then the oldest projects
//! are evicted one at a time until the collection fits or a single project is
//! left.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::formats::{Endpoint, Project};
use crate::store::{KeyValueStore, StoreError};

pub const PROJECTS_KEY: &str = "ag_projects";
pub const API_CALLS_KEY: &str = "ag_api_calls";

pub const MAX_SDK_CODE_CHARS: usize = 500;
pub const MAX_DEGRADED_ENDPOINTS: usize = 5;
pub const TRUNCATION_MARKER: &str = "\n... (Truncated due to storage limits) ...";

#[derive(Clone)]
pub struct PersistenceManager {
    store: Arc<dyn KeyValueStore>,
    collection_key: String,
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("collection_key", &self.collection_key)
            .finish_non_exhaustive()
    }
}

impl PersistenceManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_collection_key(store, PROJECTS_KEY)
    }

    /// Uses `collection_key` as the only key eligible for degradation.
    pub fn with_collection_key(store: Arc<dyn KeyValueStore>, collection_key: &str) -> Self {
        Self {
            store,
            collection_key: collection_key.to_string(),
        }
    }

    pub fn collection_key(&self) -> &str {
        &self.collection_key
    }

    /// Serializes `value` and writes it under `key`.
    ///
    /// Strings are written verbatim, everything else as JSON. Returns `false`
    /// when the value could not be stored, even after degradation.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(key, %err, "serialize value for storage");
                return false;
            }
        };
        let text = match &json {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };

        match self.store.write(key, &text) {
            Ok(()) => true,
            Err(err) if err.is_quota_exceeded() => {
                tracing::warn!(key, %err, "storage quota exceeded; attempting to degrade");
                self.save_degraded(key, json)
            }
            Err(err) => {
                tracing::error!(key, %err, "storage write failed");
                false
            }
        }
    }

    pub fn save_text(&self, key: &str, text: &str) -> bool {
        self.save(key, text)
    }

    /// Reads `key`, falling back to `default` when it is absent or unreadable.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(text) = self.load_text(key) else {
            return default;
        };
        if text.is_empty() {
            return default;
        }

        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => match serde_json::from_value(serde_json::Value::String(text)) {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!(key, %err, "stored value could not be decoded; using default");
                    default
                }
            },
        }
    }

    pub fn load_text(&self, key: &str) -> Option<String> {
        match self.store.read(key) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(key, %err, "storage read failed");
                None
            }
        }
    }

    pub fn clear(&self, key: &str) {
        if let Err(err) = self.store.remove(key) {
            tracing::error!(key, %err, "storage remove failed");
        }
    }

    fn save_degraded(&self, key: &str, json: serde_json::Value) -> bool {
        if key != self.collection_key {
            return false;
        }
        let projects: Vec<Project> = match serde_json::from_value(json) {
            Ok(projects) => projects,
            Err(err) => {
                tracing::error!(key, %err, "value under collection key is not a project list");
                return false;
            }
        };

        let mut projects = shrink_projects(projects);
        loop {
            match self.write_projects(key, &projects) {
                Ok(()) => {
                    tracing::info!(
                        key,
                        retained = projects.len(),
                        "saved degraded project collection"
                    );
                    return true;
                }
                Err(err) if err.is_quota_exceeded() && projects.len() > 1 => {
                    if let Some(evicted) = projects.pop() {
                        tracing::warn!(
                            key,
                            project_id = %evicted.id,
                            remaining = projects.len(),
                            "degraded collection still too large; evicted oldest project"
                        );
                    }
                }
                Err(err) => {
                    tracing::error!(key, %err, retained = projects.len(), "degraded write failed");
                    return false;
                }
            }
        }
    }

    fn write_projects(&self, key: &str, projects: &[Project]) -> Result<(), StoreError> {
        let text = serde_json::to_string(projects)
            .map_err(|err| StoreError::Unavailable(format!("serialize projects: {err}")))?;
        self.store.write(key, &text)
    }
}

pub fn shrink_projects(projects: Vec<Project>) -> Vec<Project> {
    projects.into_iter().map(shrink_project).collect()
}

/// Cuts one project down to its degraded representation.
///
/// Applying it twice yields the same project as applying it once.
pub fn shrink_project(mut project: Project) -> Project {
    project.sdk_code = truncate_sdk_code(&project.sdk_code);
    project.spec.endpoints = project
        .spec
        .endpoints
        .into_iter()
        .take(MAX_DEGRADED_ENDPOINTS)
        .map(|endpoint| Endpoint {
            method: endpoint.method,
            path: endpoint.path,
            summary: endpoint.summary,
            description: None,
            parameters: Default::default(),
        })
        .collect();
    project.spec.truncated = true;
    project
}

fn truncate_sdk_code(code: &str) -> String {
    match code.char_indices().nth(MAX_SDK_CODE_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &code[..cut]),
        None => code.to_string(),
    }
}
