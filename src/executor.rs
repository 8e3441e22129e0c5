use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::BackendClient;
use crate::formats::{
    Endpoint, ExecuteRequest, HEADER_PARAMETERS, HttpMethod, PATH_PARAMETERS, ParameterDescriptor,
};

/// Normalized result of one playground request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    Success { status: u16, body: String },
    Failure { message: String },
}

impl RequestOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The body decoded as JSON, or as a JSON string when it is plain text.
    pub fn body_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Success { body, .. } => Some(
                serde_json::from_str(body)
                    .unwrap_or_else(|_| serde_json::Value::String(body.clone())),
            ),
            Self::Failure { .. } => None,
        }
    }
}

/// A fully resolved request, ready for a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub json_body: Option<serde_json::Value>,
}

impl PreparedRequest {
    pub fn url(&self) -> String {
        join_url(&self.base_url, &self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> anyhow::Result<TransportResponse>;
}

pub fn join_url(base_url: &str, path: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base_url}/{path}")
}

/// Substitutes declared path parameters into `template`.
///
/// Placeholders without a supplied value are left as literal `{name}` text.
/// The template is scanned once; substituted values are never rescanned.
pub fn resolve_path(
    template: &str,
    path_parameters: &[ParameterDescriptor],
    values: &HashMap<String, String>,
) -> String {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|offset| open + offset) else {
            break;
        };
        let name = &rest[open + 1..close];
        path.push_str(&rest[..open]);

        let value = path_parameters
            .iter()
            .any(|parameter| parameter.name == name)
            .then(|| values.get(name))
            .flatten()
            .filter(|v| !v.is_empty());
        match value {
            Some(value) => path.push_str(value),
            None => path.push_str(&rest[open..=close]),
        }
        rest = &rest[close + 1..];
    }
    path.push_str(rest);
    path
}

/// Resolves everything needed to dispatch `endpoint` without touching the network.
pub fn prepare_request(
    base_url: &str,
    endpoint: &Endpoint,
    values: &HashMap<String, String>,
    raw_body: Option<&str>,
) -> anyhow::Result<PreparedRequest> {
    let path = resolve_path(
        &endpoint.path,
        endpoint.parameters_in(PATH_PARAMETERS),
        values,
    );

    let mut query = BTreeMap::new();
    let mut headers = BTreeMap::new();
    for (location, group) in &endpoint.parameters {
        if location == PATH_PARAMETERS {
            continue;
        }
        let target = if location == HEADER_PARAMETERS {
            &mut headers
        } else {
            &mut query
        };
        for parameter in group {
            if let Some(value) = values.get(&parameter.name).filter(|v| !v.is_empty()) {
                target.insert(parameter.name.clone(), value.clone());
            }
        }
    }

    let json_body = match raw_body.map(str::trim) {
        Some(raw) if !raw.is_empty() && !endpoint.has_structured_parameters() => {
            Some(serde_json::from_str(raw).context("parse request body as JSON")?)
        }
        _ => None,
    };

    Ok(PreparedRequest {
        base_url: base_url.to_string(),
        path,
        method: endpoint.method,
        query,
        headers,
        json_body,
    })
}

pub struct Executor {
    transport: Arc<dyn Transport>,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn execute(
        &self,
        base_url: &str,
        endpoint: &Endpoint,
        values: &HashMap<String, String>,
        raw_body: Option<&str>,
    ) -> RequestOutcome {
        let request = match prepare_request(base_url, endpoint, values, raw_body) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(path = %endpoint.path, ?err, "request not dispatched");
                return RequestOutcome::failure(format!("{err:#}"));
            }
        };

        tracing::debug!(method = %request.method, url = %request.url(), "dispatching request");
        match self.transport.send(&request).await {
            Ok(response) => RequestOutcome::Success {
                status: response.status,
                body: response.body,
            },
            Err(err) => {
                tracing::warn!(method = %request.method, url = %request.url(), ?err, "request failed");
                RequestOutcome::failure(format!("{err:#}"))
            }
        }
    }
}

/// Sends requests straight to the target API.
#[derive(Debug, Clone, Default)]
pub struct DirectTransport {
    client: reqwest::Client,
}

impl DirectTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn send(&self, request: &PreparedRequest) -> anyhow::Result<TransportResponse> {
        let url = request.url();
        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("{} {url}", request.method))?;
        let status = response.status().as_u16();
        let body = response.text().await.context("read response body")?;
        Ok(TransportResponse { status, body })
    }
}

/// Relays requests through the backend's playground endpoint.
#[derive(Debug, Clone)]
pub struct PlaygroundTransport {
    backend: BackendClient,
}

impl PlaygroundTransport {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Transport for PlaygroundTransport {
    async fn send(&self, request: &PreparedRequest) -> anyhow::Result<TransportResponse> {
        let relay = ExecuteRequest {
            base_url: request.base_url.clone(),
            path: request.path.clone(),
            method: request.method,
            params: (!request.query.is_empty()).then(|| request.query.clone()),
            headers: (!request.headers.is_empty()).then(|| request.headers.clone()),
            json_body: request.json_body.clone(),
        };
        let response = self.backend.execute(&relay).await?;
        let body = match response.response {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };
        Ok(TransportResponse {
            status: response.status_code,
            body,
        })
    }
}
