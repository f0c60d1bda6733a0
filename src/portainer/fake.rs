//! In-memory Portainer used by unit tests

use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::Result;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::future::Future;
use std::io::Write;
use std::sync::{Arc, Mutex};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "adminadmin";
pub const JWT: &str = "fake-jwt";
pub const SWARM_ID: &str = "swarm-4f1c";

#[derive(Debug, Clone)]
pub struct FakeStack {
    pub id: u64,
    pub name: String,
    pub endpoint_id: i64,
    pub swarm_id: String,
    pub content: String,
}

#[derive(Debug)]
struct State {
    endpoints: Vec<i64>,
    stacks: Vec<FakeStack>,
    next_stack_id: u64,
    missing_routes: bool,
    scripted: VecDeque<Result<HttpResponse>>,
    requests: Vec<HttpRequest>,
}

/// Answers requests like a Portainer 2.x instance with a single swarm
///
/// Scripted responses, when queued, are returned before any routing.
#[derive(Debug)]
pub struct FakePortainer {
    state: Mutex<State>,
}

impl FakePortainer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                endpoints: vec![1],
                stacks: Vec::new(),
                next_stack_id: 1,
                missing_routes: false,
                scripted: VecDeque::new(),
                requests: Vec::new(),
            }),
        }
    }

    pub fn set_endpoints(&self, endpoints: Vec<i64>) {
        self.state.lock().unwrap().endpoints = endpoints;
    }

    /// Answer every request with 404
    pub fn set_missing_routes(&self, missing: bool) {
        self.state.lock().unwrap().missing_routes = missing;
    }

    pub fn script(&self, response: Result<HttpResponse>) {
        self.state.lock().unwrap().scripted.push_back(response);
    }

    pub fn add_stack(&self, name: &str, content: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_stack_id;
        state.next_stack_id += 1;
        state.stacks.push(FakeStack {
            id,
            name: name.to_string(),
            endpoint_id: 1,
            swarm_id: SWARM_ID.to_string(),
            content: content.to_string(),
        });
        id
    }

    pub fn stack(&self, name: &str) -> Option<FakeStack> {
        let state = self.state.lock().unwrap();
        state.stacks.iter().find(|s| s.name == name).cloned()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Number of requests sent to `path` with `method`
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .count()
    }

    fn handle(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        if let Some(response) = state.scripted.pop_front() {
            return response;
        }
        if state.missing_routes {
            return Ok(text(404, "404 page not found"));
        }

        let path = request.url.path().to_string();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        if request.method == Method::POST && segments == ["api", "auth"] {
            return Ok(authenticate(&request));
        }

        let expected = format!("Bearer {}", JWT);
        if request.header("Authorization") != Some(expected.as_str()) {
            return Ok(HttpResponse::json(401, &json!({"message": "Unauthorized"})));
        }

        let response = match (request.method.clone(), segments.as_slice()) {
            (Method::GET, ["api", "endpoints"]) => {
                let endpoints: Vec<Value> = state
                    .endpoints
                    .iter()
                    .map(|id| json!({"Id": id, "Name": "primary", "Type": 1}))
                    .collect();
                HttpResponse::json(200, &Value::Array(endpoints))
            }
            (Method::GET, ["api", "endpoints", id, "docker", "swarm"]) => {
                match id.parse::<i64>() {
                    Ok(id) if state.endpoints.contains(&id) => {
                        HttpResponse::json(200, &json!({"ID": SWARM_ID, "Spec": {}}))
                    }
                    _ => text(404, "endpoint not found"),
                }
            }
            (Method::GET, ["api", "stacks"]) => {
                let stacks: Vec<Value> = state.stacks.iter().map(stack_json).collect();
                HttpResponse::json(200, &Value::Array(stacks))
            }
            (Method::POST, ["api", "stacks"]) => create_stack(&mut state, &request),
            (Method::PUT, ["api", "stacks", id]) => update_stack(&mut state, &request, id),
            _ => text(404, "404 page not found"),
        };

        Ok(response)
    }
}

impl Default for FakePortainer {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for FakePortainer {
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send {
        let response = self.handle(request);
        async move { response }
    }
}

/// Collects formatted log output of the current thread
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route this thread's events into the buffer until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn text(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        body: body.to_string(),
    }
}

fn query(request: &HttpRequest, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn stack_json(stack: &FakeStack) -> Value {
    json!({
        "Id": stack.id,
        "Name": stack.name,
        "Type": 1,
        "EndpointId": stack.endpoint_id,
        "SwarmId": stack.swarm_id,
    })
}

fn authenticate(request: &HttpRequest) -> HttpResponse {
    let body = request.body.clone().unwrap_or(Value::Null);
    if body["Username"] == USERNAME && body["Password"] == PASSWORD {
        HttpResponse::json(200, &json!({"jwt": JWT}))
    } else {
        HttpResponse::json(422, &json!({"message": "Invalid credentials"}))
    }
}

fn stack_query_is_valid(request: &HttpRequest) -> bool {
    query(request, "type").as_deref() == Some("1")
        && query(request, "method").as_deref() == Some("string")
        && query(request, "endpointId").is_some()
}

fn create_stack(state: &mut State, request: &HttpRequest) -> HttpResponse {
    if !stack_query_is_valid(request) {
        return HttpResponse::json(400, &json!({"message": "Invalid query parameters"}));
    }

    let body = request.body.clone().unwrap_or(Value::Null);
    let (Some(name), Some(swarm_id), Some(content)) = (
        body["Name"].as_str(),
        body["SwarmID"].as_str(),
        body["StackFileContent"].as_str(),
    ) else {
        return HttpResponse::json(400, &json!({"message": "Invalid request payload"}));
    };

    if state.stacks.iter().any(|s| s.name == name) {
        return HttpResponse::json(409, &json!({"message": "A stack with this name already exists"}));
    }

    let endpoint_id = query(request, "endpointId")
        .and_then(|id| id.parse().ok())
        .unwrap_or_default();
    let stack = FakeStack {
        id: state.next_stack_id,
        name: name.to_string(),
        endpoint_id,
        swarm_id: swarm_id.to_string(),
        content: content.to_string(),
    };
    state.next_stack_id += 1;

    let response = HttpResponse::json(200, &stack_json(&stack));
    state.stacks.push(stack);
    response
}

fn update_stack(state: &mut State, request: &HttpRequest, id: &str) -> HttpResponse {
    if !stack_query_is_valid(request) {
        return HttpResponse::json(400, &json!({"message": "Invalid query parameters"}));
    }

    let Some(content) = request
        .body
        .as_ref()
        .and_then(|b| b["StackFileContent"].as_str())
        .map(str::to_string)
    else {
        return HttpResponse::json(400, &json!({"message": "Invalid request payload"}));
    };

    match state.stacks.iter_mut().find(|s| s.id.to_string() == id) {
        Some(stack) => {
            stack.content = content;
            HttpResponse::json(200, &stack_json(stack))
        }
        None => text(404, "stack not found"),
    }
}
