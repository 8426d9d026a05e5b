//! HTTP handlers for the gateway server
//!
//! Both API endpoints dispatch on an `action` field in the JSON body. Field
//! names sit next to `action` at the top level of the body.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use mcpgate_core::registry::RegistryEntry;
use mcpgate_core::{Caller, ResourceError, ServerDraft, ServerPatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::GatewayRuntime;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller's roles, comma separated
pub const USER_ROLES_HEADER: &str = "x-user-roles";

const DEFAULT_SEARCH_LIMIT: u32 = 20;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<GatewayRuntime>,
}

/// Identity forwarded by the authenticating front proxy
pub fn caller_from_headers(headers: &HeaderMap) -> Caller {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let roles: Vec<String> = headers
        .get(USER_ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    match user_id {
        Some(id) => Caller::new(id).with_roles(roles),
        None => Caller::anonymous().with_roles(roles),
    }
}

/// Error body returned by the API
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        let status = match &err {
            ResourceError::Validation(_) => StatusCode::BAD_REQUEST,
            ResourceError::NotFound(_) => StatusCode::NOT_FOUND,
            ResourceError::AlreadyExists(_) => StatusCode::CONFLICT,
            ResourceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ResourceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if !err.is_client_error() {
            warn!(error = %err, "[Gateway] Request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "ok": false, "error": self.message })),
        )
            .into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult {
    Ok(Json(json!({ "ok": true, "data": data })))
}

fn unknown_action(action: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": format!("Unknown action: {}", action) })),
    )
        .into_response()
}

fn action_of(body: &Value, default: &str) -> String {
    body.get("action")
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn required_name(body: &Value) -> Result<String, ApiError> {
    body.get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .ok_or_else(|| ApiError::bad_request("Missing required field: name"))
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// `POST /api/servers`
pub async fn servers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let caller = caller_from_headers(&headers);
    let action = action_of(&body, "list");
    debug!(action = %action, user = %caller.user_id, "[Gateway] Servers request");

    let result = match action.as_str() {
        "list" => list_servers(&state, &caller).await,
        "create" => create_server(&state, &caller, body).await,
        "update" => update_server(&state, &caller, body).await,
        "delete" => delete_server(&state, &caller, &body).await,
        "status" => server_status(&state, &caller, &body).await,
        other => return unknown_action(other),
    };

    result.into_response()
}

async fn list_servers(state: &AppState, caller: &Caller) -> ApiResult {
    let resources = state.runtime.servers().list(caller).await?;
    ok(resources)
}

async fn create_server(state: &AppState, caller: &Caller, body: Value) -> ApiResult {
    if body.get("transport_type").map_or(true, Value::is_null) {
        return Err(ApiError::bad_request(
            "Missing required field: transport_type",
        ));
    }
    let draft: ServerDraft = parse_body(body)?;
    let resource = state.runtime.servers().create(caller, draft).await?;
    ok(resource)
}

async fn update_server(state: &AppState, caller: &Caller, body: Value) -> ApiResult {
    let name = required_name(&body)?;
    let patch: ServerPatch = parse_body(body)?;
    let resource = state.runtime.servers().update(caller, &name, patch).await?;
    ok(resource)
}

async fn delete_server(state: &AppState, caller: &Caller, body: &Value) -> ApiResult {
    let name = required_name(body)?;
    state.runtime.servers().delete(caller, &name).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn server_status(state: &AppState, caller: &Caller, body: &Value) -> ApiResult {
    let name = required_name(body)?;
    let containers = state.runtime.container_manager().map(|m| m.as_ref());
    let report = state
        .runtime
        .servers()
        .status(caller, &name, containers)
        .await?;
    ok(report)
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    cursor: Option<String>,
    /// Follow pagination for up to this many pages
    #[serde(default)]
    max_pages: Option<usize>,
}

/// `POST /api/discover`
pub async fn discover(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let caller = caller_from_headers(&headers);
    let action = action_of(&body, "search");
    debug!(action = %action, user = %caller.user_id, "[Gateway] Discover request");

    let result = match action.as_str() {
        "search" => search_registry(&state, body).await,
        "install" => install_server(&state, &caller, body).await,
        other => return unknown_action(other),
    };

    result.into_response()
}

async fn search_registry(state: &AppState, body: Value) -> ApiResult {
    let request: SearchRequest = parse_body(body)?;
    let registry = state.runtime.registry();

    if let Some(max_pages) = request.max_pages {
        return ok(registry.search_all(&request.query, max_pages).await);
    }

    let limit = request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    match registry
        .search(&request.query, limit, request.cursor.as_deref())
        .await
    {
        Ok(entries) => ok(entries),
        Err(e) => {
            warn!(query = %request.query, error = %e, "[Gateway] Registry search failed");
            Err(ApiError {
                status: StatusCode::BAD_GATEWAY,
                message: e.to_string(),
            })
        }
    }
}

async fn install_server(state: &AppState, caller: &Caller, body: Value) -> ApiResult {
    let entry_value = match body.get("server") {
        Some(server) => server.clone(),
        None => body,
    };
    let entry: RegistryEntry = parse_body(entry_value)?;
    let resource = state.runtime.servers().install(caller, &entry).await?;
    ok(resource)
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.runtime.health().run_health_check().await;
    let status = if report.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

/// `GET /health/status`
pub async fn health_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.runtime.health().get_status().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pool_connections": status.pool_connections,
        "registered_servers": status.registered_servers,
    }))
}

/// `GET /health/containers`
pub async fn health_containers(State(state): State<AppState>) -> Json<Value> {
    let containers = state.runtime.health().check_docker_servers().await;
    Json(json!({ "ok": true, "data": containers }))
}
