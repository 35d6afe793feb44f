//! HTTP routes for the query server
//!
//! ## Endpoints
//!
//! - `GET  /`         - Welcome text
//! - `GET  /help`     - API reference
//! - `POST /query`    - Execute the SQL statement in the request body
//! - `GET  /tables`   - List tables with their columns
//! - `GET  /status`   - Snapshot and dispatcher status
//! - `GET  /health`   - Same as `/status`
//! - `POST /shutdown` - Stop the server gracefully
//!
//! When a token is configured, every route except `/` and `/help` requires
//! `Authorization: Bearer <token>` or `X-Symql-Token: <token>`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use symql_vtab::{DispatchError, QueryDispatcher};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::cli_format::result_json;

/// Header accepted as an alternative to a bearer token.
pub const TOKEN_HEADER: &str = "x-symql-token";

// ── Shared state ────────────────────────────────────────────────────────

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<QueryDispatcher>,
    /// Snapshot path as shown in `/status`.
    pub snapshot: String,
    pub function_count: usize,
    pub token: Option<Arc<str>>,
    /// Signalled by `POST /shutdown`.
    pub shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(dispatcher: Arc<QueryDispatcher>, snapshot: impl Into<String>, function_count: usize) -> Self {
        Self {
            dispatcher,
            snapshot: snapshot.into(),
            function_count,
            token: None,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.map(Arc::from);
        self
    }
}

// ── Router creation ─────────────────────────────────────────────────────

/// Build the router for all query server routes.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/query", post(query_handler))
        .route("/tables", get(tables_handler))
        .route("/status", get(status_handler))
        .route("/health", get(status_handler))
        .route("/shutdown", post(shutdown_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/", get(welcome_handler))
        .route("/help", get(help_handler))
        .merge(protected)
        .with_state(state)
}

/// Token check for protected routes.
async fn require_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.token.as_deref() {
        if presented_token(req.headers()) != Some(expected) {
            warn!(path = %req.uri().path(), "Rejected request with missing or wrong token");
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}

fn presented_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(token.trim());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn welcome_handler() -> &'static str {
    "symql query server\n\nPOST a SQL statement to /query. See /help for the full API.\n"
}

async fn help_handler() -> &'static str {
    r#"symql HTTP API

  GET  /          Welcome text
  GET  /help      This text
  POST /query     Execute the SQL statement in the request body (text/plain)
  GET  /tables    List tables, their columns and indexed columns
  GET  /status    Snapshot and dispatcher status
  GET  /health    Same as /status
  POST /shutdown  Stop the server

Authentication (when a token is configured):
  Authorization: Bearer <token>
  X-Symql-Token: <token>

Example:
  curl -X POST --data "SELECT name, rva FROM functions WHERE name = 'main'" http://127.0.0.1:8080/query
"#
}

/// `POST /query` -- run the statement in the body.
async fn query_handler(State(state): State<AppState>, body: String) -> Result<Response, ApiError> {
    let sql = body.trim();
    if sql.is_empty() {
        return Err(ApiError::BadRequest("Empty query".to_string()));
    }
    debug!(sql = %sql, "HTTP query");

    let result = state.dispatcher.execute_async(sql).await?;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(result_json(&result))).into_response())
}

/// `GET /tables`
async fn tables_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "tables": state.dispatcher.tables(),
    }))
}

/// `GET /status` and `GET /health`
async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    let status = if state.dispatcher.is_shut_down() {
        "stopping"
    } else {
        "ok"
    };
    Json(json!({
        "success": true,
        "status": status,
        "tool": "symql",
        "version": env!("CARGO_PKG_VERSION"),
        "snapshot": state.snapshot,
        "functions": state.function_count,
        "tables": state.dispatcher.tables().len(),
        "dispatcher": state.dispatcher.stats(),
    }))
}

/// `POST /shutdown`
async fn shutdown_handler(State(state): State<AppState>) -> Json<Value> {
    info!("Shutdown requested over HTTP");
    state.shutdown.notify_one();
    Json(json!({"success": true, "message": "Shutting down"}))
}

// ── Error type ──────────────────────────────────────────────────────────

/// API error type for the query server.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    /// The dispatcher refused the query; retrying later may succeed.
    Unavailable(String),
    Internal(String),
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::ShutDown | DispatchError::QueueFull { .. } => {
                ApiError::Unavailable(e.to_string())
            }
            DispatchError::WorkerGone | DispatchError::Internal(_) | DispatchError::Init(_) => {
                error!(error = %e, "Query failed inside the dispatcher");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = Json(json!({"success": false, "error": message}));
        (status, body).into_response()
    }
}
