use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct BackendStubConfig {
    pub sdk_code_len: usize,
    pub endpoint_count: usize,
}

impl Default for BackendStubConfig {
    fn default() -> Self {
        Self {
            sdk_code_len: 64,
            endpoint_count: 2,
        }
    }
}

/// Serves the `/api/v1` backend routes and doubles as the generated API under `/petstore`.
pub struct BackendStub {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BackendStub {
    pub fn spawn(config: BackendStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start backend stub server");
        let base_url = format!("http://{}", server.server_addr());
        let api_base_url = format!("{base_url}/petstore");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let url = request.url().to_string();
                let method = request.method().to_string();
                let (status, payload) = if url == "/api/v1/generate" {
                    generate_response(&body, &api_base_url, &config)
                } else if url == "/api/v1/projects" && method == "GET" {
                    (200, json!([remote_project(false)]).to_string())
                } else if url == "/api/v1/projects" && method == "POST" {
                    create_project_response(&body)
                } else if url == "/api/v1/projects/remote-1" {
                    (200, remote_project(true).to_string())
                } else if url == "/api/v1/playground/test" {
                    playground_test_response(&body)
                } else if url.starts_with("/petstore/") {
                    let echo = json!({
                        "method": method,
                        "url": url,
                        "body": serde_json::from_str::<Value>(&body).ok(),
                    });
                    (200, echo.to_string())
                } else {
                    (404, json!({"detail": "Not Found"}).to_string())
                };

                let _ = request
                    .respond(tiny_http::Response::from_string(payload).with_status_code(status));
            }
        });

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn api_url(&self) -> String {
        format!("{}/api/v1", self.base_url)
    }
}

impl Drop for BackendStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn generate_response(body: &str, api_base_url: &str, config: &BackendStubConfig) -> (u16, String) {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return (422, json!({"detail": "invalid json"}).to_string()),
    };
    let Some(source_url) = parsed.get("source_url").and_then(|v| v.as_str()) else {
        return (422, json!({"detail": "missing source_url"}).to_string());
    };
    if source_url.contains("broken") {
        return (400, json!({"detail": "could not parse documentation"}).to_string());
    }

    let mut endpoints = vec![
        json!({
            "method": "GET",
            "path": "/pets/{petId}",
            "summary": "Find pet by id",
            "parameters": {
                "path": [{"name": "petId", "type": "integer", "required": true}],
                "query": [{"name": "fields", "type": "string", "required": false}]
            }
        }),
        json!({
            "method": "POST",
            "path": "/pets",
            "summary": "Create pet",
            "parameters": {}
        }),
    ];
    for i in endpoints.len()..config.endpoint_count {
        endpoints.push(json!({
            "method": "GET",
            "path": format!("/extra/{i}"),
            "summary": format!("Extra endpoint {i}"),
            "description": "Filler endpoint used to grow the stored spec.",
        }));
    }

    let response = json!({
        "name": "Petstore",
        "version": "1.0.0",
        "spec": {
            "name": "Petstore",
            "version": "1.0.0",
            "base_url": api_base_url,
            "endpoints": endpoints,
        },
        "sdk_code": "#".repeat(config.sdk_code_len),
        "is_mock": false,
        "source": "direct_openapi_parser",
    });
    (200, response.to_string())
}

fn remote_project(with_endpoints: bool) -> Value {
    let mut project = json!({
        "id": "remote-1",
        "name": "Remote Petstore",
        "source_url": "https://docs.example.com/petstore",
        "source_type": "openapi",
        "created_at": "2026-01-02T03:04:05",
    });
    if with_endpoints {
        project["endpoints"] = json!([
            {"method": "GET", "path": "/pets/{petId}", "summary": "Find pet by id", "parameters": null}
        ]);
    }
    project
}

fn create_project_response(body: &str) -> (u16, String) {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return (422, json!({"detail": "invalid json"}).to_string());
    };
    let response = json!({
        "id": "remote-2",
        "name": parsed["name"],
        "source_url": parsed["source_url"],
        "source_type": parsed["source_type"],
    });
    (200, response.to_string())
}

fn playground_test_response(body: &str) -> (u16, String) {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return (422, json!({"detail": "invalid json"}).to_string());
    };
    let response = json!({
        "status": "success",
        "message": "Endpoint tested successfully (mocked)",
        "request": parsed,
        "response": {"status_code": 200, "data": {"echo": parsed}},
    });
    (200, response.to_string())
}
