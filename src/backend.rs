use anyhow::Context as _;

use crate::formats::{
    CreateProjectRequest, ErrorBody, ExecuteRequest, ExecuteResponse, GenerateRequest,
    GenerateResponse, PlaygroundTestRequest, PlaygroundTestResponse, RemoteProject,
};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Client for the SDK generation backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    api_url: String,
}

impl BackendClient {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let api_url = self.api_url.trim_end_matches('/');
        format!("{api_url}/{path}")
    }

    pub async fn generate(&self, source_url: &str) -> anyhow::Result<GenerateResponse> {
        let request = GenerateRequest {
            source_url: source_url.to_string(),
        };
        self.post_json("generate", &request).await
    }

    pub async fn execute(&self, request: &ExecuteRequest) -> anyhow::Result<ExecuteResponse> {
        self.post_json("playground/execute", request).await
    }

    pub async fn list_projects(&self) -> anyhow::Result<Vec<RemoteProject>> {
        self.get_json("projects").await
    }

    pub async fn get_project(&self, id: &str) -> anyhow::Result<RemoteProject> {
        self.get_json(&format!("projects/{id}")).await
    }

    pub async fn create_project(
        &self,
        request: &CreateProjectRequest,
    ) -> anyhow::Result<RemoteProject> {
        self.post_json("projects", request).await
    }

    pub async fn playground_test(
        &self,
        request: &PlaygroundTestRequest,
    ) -> anyhow::Result<PlaygroundTestResponse> {
        self.post_json("playground/test", request).await
    }

    async fn get_json<T>(&self, path: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let endpoint = self.endpoint(path);
        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .with_context(|| format!("GET {endpoint}"))?;
        read_json(&endpoint, response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> anyhow::Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let endpoint = self.endpoint(path);
        let response = self
            .client
            .post(&endpoint)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {endpoint}"))?;
        read_json(&endpoint, response).await
    }
}

async fn read_json<T>(endpoint: &str, response: reqwest::Response) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    let raw = response.text().await.context("read backend response body")?;
    if !status.is_success() {
        let message = parse_error_message(&raw).unwrap_or(raw);
        anyhow::bail!("backend error ({status}): {message}");
    }

    serde_json::from_str(&raw).with_context(|| format!("parse response from {endpoint}"))
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(raw_json).ok()?;
    Some(body.message())
}
