//! HTTP API.
//!
//! Thin axum handlers over the guarded task operations. Authentication is
//! performed upstream by the identity provider, which forwards the
//! authenticated user id in the `x-user-id` header; handlers only check that
//! the id names a known user.

use axum::{
    Router,
    extract::{FromRequestParts, Path, State, rejection::JsonRejection},
    http::{HeaderName, HeaderValue, Method, StatusCode, header, request::Parts},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::CorsConfig;
use crate::error::{ErrorCode, GuardError, StoreError};
use crate::guard::{TaskSecurityContext, create_task_securely, update_task_securely};
use crate::store::{Database, ScopedStore, TaskStore};
use crate::types::{NewTask, Task, TaskUpdate, User};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Server state shared across handlers.
#[derive(Clone)]
pub struct ApiServer {
    /// Reference to the task database.
    db: Arc<Database>,
}

impl ApiServer {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get the database reference.
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    let body = ApiResponse {
        success: true,
        data: Some(data),
        error: None,
        code: None,
    };
    (status, Json(body)).into_response()
}

/// An error rendered as a failed envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: status_for(code),
            code,
            message: message.into(),
        }
    }

    fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(self.message),
            code: Some(self.code),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if matches!(err, StoreError::Database(_) | StoreError::Unavailable(_)) {
            error!("Store error: {}", err);
        }
        ApiError::new(err.code(), err.to_string())
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match &err {
            GuardError::Blocked { op, reason } => {
                warn!(
                    op = %op,
                    code = ?reason.code(),
                    cause = reason.cause(),
                    "Task mutation blocked: {}",
                    reason
                );
            }
            GuardError::Storage { op, source } => {
                error!(op = %op, "Task mutation failed: {}", source);
            }
        }
        ApiError::new(err.code(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(ErrorCode::InvalidRequest, rejection.body_text())
            .with_status(rejection.status())
    }
}

/// HTTP status for an error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest | ErrorCode::SelfReference => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::OwnerMismatch | ErrorCode::CrossUserParent | ErrorCode::PolicyViolation => {
            StatusCode::FORBIDDEN
        }
        ErrorCode::ParentNotFoundOrDenied | ErrorCode::TaskNotFound => StatusCode::NOT_FOUND,
        ErrorCode::ConstraintViolation => StatusCode::CONFLICT,
        ErrorCode::DatabaseError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The authenticated caller, resolved from [`USER_ID_HEADER`].
pub struct Identity(pub User);

impl FromRequestParts<ApiServer> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiServer,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::new(ErrorCode::Unauthenticated, "Not authenticated"))?;

        match state.db().get_user(user_id)? {
            Some(user) => Ok(Identity(user)),
            None => Err(ApiError::new(ErrorCode::Unauthenticated, "Unknown user")),
        }
    }
}

impl Identity {
    fn store(&self, state: &ApiServer) -> ScopedStore {
        state.db().scoped(&self.0.id)
    }
}

/// Health check endpoint.
async fn health() -> Response {
    success(
        StatusCode::OK,
        json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
    )
}

/// Database connectivity check.
async fn database_health(State(state): State<ApiServer>) -> Response {
    match state.db().ping() {
        Ok(()) => success(
            StatusCode::OK,
            json!({
                "message": "Database connection healthy",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "database": {
                    "connected": true,
                    "tables": { "users": "accessible", "tasks": "accessible" }
                }
            }),
        ),
        Err(e) => {
            error!("Database health check failed: {}", e);
            ApiError::new(e.code(), format!("Database connection failed: {}", e))
                .with_status(StatusCode::SERVICE_UNAVAILABLE)
                .into_response()
        }
    }
}

async fn profile_me(identity: Identity) -> Response {
    success(StatusCode::OK, identity.0)
}

async fn list_tasks(
    State(state): State<ApiServer>,
    identity: Identity,
) -> Result<Response, ApiError> {
    let tasks = identity.store(&state).list_tasks()?;
    Ok(success(StatusCode::OK, tasks))
}

async fn create_task(
    State(state): State<ApiServer>,
    identity: Identity,
    input: Result<Json<NewTask>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = input?;
    let store = identity.store(&state);
    let task = create_task_securely(&TaskSecurityContext::from(&store), &input)?;
    info!(task_id = %task.id, user_id = %task.user_id, "Task created");
    Ok(success(StatusCode::CREATED, task))
}

async fn get_task(
    State(state): State<ApiServer>,
    identity: Identity,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let task: Task = identity
        .store(&state)
        .fetch_task(&task_id)?
        .ok_or_else(|| ApiError::new(ErrorCode::TaskNotFound, "Task not found"))?;
    Ok(success(StatusCode::OK, task))
}

async fn update_task(
    State(state): State<ApiServer>,
    identity: Identity,
    Path(task_id): Path<String>,
    updates: Result<Json<TaskUpdate>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(updates) = updates?;
    let store = identity.store(&state);
    let task = update_task_securely(&TaskSecurityContext::from(&store), &task_id, &updates)?;
    info!(task_id = %task.id, user_id = %task.user_id, "Task updated");
    Ok(success(StatusCode::OK, task))
}

async fn list_children(
    State(state): State<ApiServer>,
    identity: Identity,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let store = identity.store(&state);
    if store.fetch_task(&task_id)?.is_none() {
        return Err(ApiError::new(ErrorCode::TaskNotFound, "Task not found"));
    }
    Ok(success(StatusCode::OK, store.list_children(&task_id)?))
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(USER_ID_HEADER),
        ])
        .allow_credentials(true)
}

/// Build the API router.
pub fn build_router(state: ApiServer, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/database/health", get(database_health))
        .route("/api/profile/me", get(profile_me))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{task_id}", get(get_task).patch(update_task))
        .route("/api/tasks/{task_id}/children", get(list_children))
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A running server.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Signal shutdown and wait for in-flight requests to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("Server task failed: {}", e);
        }
    }
}

/// Start the HTTP server on the given address.
pub async fn start_server(
    db: Arc<Database>,
    addr: SocketAddr,
    cors: &CorsConfig,
) -> anyhow::Result<ServerHandle> {
    let app = build_router(ApiServer::new(db), cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("API server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            })
            .await
        {
            error!("API server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr: bound_addr,
        shutdown_tx,
        task,
    })
}
