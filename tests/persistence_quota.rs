use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone as _, Utc};
use docsdk::formats::{ApiSpec, Endpoint, HttpMethod, ParameterDescriptor, Project};
use docsdk::persistence::{
    MAX_DEGRADED_ENDPOINTS, MAX_SDK_CODE_CHARS, PROJECTS_KEY, PersistenceManager,
    TRUNCATION_MARKER, shrink_projects,
};
use docsdk::store::{KeyValueStore as _, MemoryStore};

fn sample_project(index: usize, code_len: usize, endpoints: usize) -> Project {
    let parameters = BTreeMap::from([(
        "query".to_string(),
        vec![ParameterDescriptor {
            name: "limit".to_string(),
            param_type: "integer".to_string(),
            required: false,
            description: Some("Page size".to_string()),
        }],
    )]);
    Project {
        id: format!("project-{index}"),
        name: format!("API {index}"),
        source_url: format!("https://docs.example.com/{index}"),
        spec: ApiSpec {
            name: Some(format!("API {index}")),
            version: Some("1.0.0".to_string()),
            base_url: "https://api.example.com/v1".to_string(),
            endpoints: (0..endpoints)
                .map(|i| Endpoint {
                    method: HttpMethod::Get,
                    path: format!("/resources/{i}"),
                    summary: Some(format!("List resource {i}")),
                    description: Some("Returns a page of resources.".repeat(4)),
                    parameters: parameters.clone(),
                })
                .collect(),
            truncated: false,
        },
        sdk_code: "a".repeat(code_len),
        created_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
            - Duration::minutes(index as i64),
        version: Some("1.0.0".to_string()),
        is_mock: false,
        source: None,
    }
}

fn assert_degraded(project: &Project) {
    let kept = project
        .sdk_code
        .strip_suffix(TRUNCATION_MARKER)
        .unwrap_or(&project.sdk_code);
    assert!(kept.chars().count() <= MAX_SDK_CODE_CHARS);
    assert!(project.spec.endpoints.len() <= MAX_DEGRADED_ENDPOINTS);
    assert!(project.spec.truncated);
    for endpoint in &project.spec.endpoints {
        assert!(endpoint.parameters.is_empty());
        assert!(endpoint.description.is_none());
    }
}

#[test]
fn two_hundred_large_projects_fit_after_degradation() {
    let projects: Vec<Project> = (0..200).map(|i| sample_project(i, 10_000, 12)).collect();
    let store = Arc::new(MemoryStore::new(64 * 1024));
    let manager = PersistenceManager::new(store.clone());

    assert!(manager.save(PROJECTS_KEY, &projects));
    assert!(store.used_bytes() <= store.capacity());

    let loaded: Vec<Project> = manager.load(PROJECTS_KEY, Vec::new());
    assert!(!loaded.is_empty());
    assert!(loaded.len() < projects.len());
    for project in &loaded {
        assert_degraded(project);
    }

    // Retained projects are the newest ones, in their original order.
    let expected_ids: Vec<_> = projects[..loaded.len()].iter().map(|p| &p.id).collect();
    let loaded_ids: Vec<_> = loaded.iter().map(|p| &p.id).collect();
    assert_eq!(loaded_ids, expected_ids);
}

#[test]
fn saved_collection_is_a_truncated_prefix_of_the_input() {
    let projects: Vec<Project> = (0..10).map(|i| sample_project(i, 2_000, 8)).collect();
    let shrunk = shrink_projects(projects.clone());
    let store = Arc::new(MemoryStore::new(8 * 1024));
    let manager = PersistenceManager::new(store);

    assert!(manager.save(PROJECTS_KEY, &projects));
    let loaded: Vec<Project> = manager.load(PROJECTS_KEY, Vec::new());
    assert_eq!(loaded, shrunk[..loaded.len()].to_vec());
}

#[test]
fn collection_that_fits_is_stored_untouched() {
    let projects: Vec<Project> = (0..3).map(|i| sample_project(i, 1_000, 8)).collect();
    let manager = PersistenceManager::new(Arc::new(MemoryStore::new(1024 * 1024)));

    assert!(manager.save(PROJECTS_KEY, &projects));
    let loaded: Vec<Project> = manager.load(PROJECTS_KEY, Vec::new());
    assert_eq!(loaded, projects);
}

#[test]
fn single_project_over_quota_reports_failure_and_keeps_previous_value() {
    let store = Arc::new(MemoryStore::new(1024));
    let manager = PersistenceManager::new(store.clone());
    assert!(manager.save(PROJECTS_KEY, &Vec::<Project>::new()));

    let mut huge = sample_project(0, 10_000, 3);
    huge.name = "n".repeat(4_096);
    assert!(!manager.save(PROJECTS_KEY, &vec![huge]));

    assert_eq!(store.read(PROJECTS_KEY).unwrap().as_deref(), Some("[]"));
}

#[test]
fn other_keys_share_the_quota_with_the_collection() {
    let store = Arc::new(MemoryStore::new(16 * 1024));
    let manager = PersistenceManager::new(store.clone());
    assert!(manager.save_text("filler", &"f".repeat(12 * 1024)));

    let projects: Vec<Project> = (0..20).map(|i| sample_project(i, 3_000, 8)).collect();
    assert!(manager.save(PROJECTS_KEY, &projects));
    assert!(store.used_bytes() <= store.capacity());
    assert_eq!(
        manager.load_text("filler").map(|text| text.len()),
        Some(12 * 1024)
    );
}
