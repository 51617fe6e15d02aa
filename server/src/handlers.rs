use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use common::{
    BatchRequest, BatchSummary, Job, JobCreate, LogContent, LogFile, TaskConfig, TaskUpdate,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::batch;
use crate::executor;
use crate::jobs::{JobPatch, StoreError};
use crate::logs::{self, LogsError, DEFAULT_TAIL_LINES};
use crate::registry::RegistryError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/v1/tasks/:name",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/api/v1/reports/run", post(run_report))
        .route("/api/v1/reports/batch", post(run_batch))
        .route("/api/v1/reports/jobs", get(list_jobs))
        .route("/api/v1/reports/jobs/:id", get(get_job))
        .route("/api/v1/reports/jobs/:id/cancel", post(cancel_job))
        .route("/api/v1/logs/:task_name", get(list_logs))
        .route("/api/v1/logs/:task_name/:filename", get(read_log))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- errores HTTP ---------------- */

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: msg.into() }))
}

fn registry_error(e: RegistryError) -> ApiError {
    match e {
        RegistryError::DuplicateName(_) | RegistryError::EmptyName => {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        RegistryError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        RegistryError::Io(_) | RegistryError::Json(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::IllegalTransition { .. } => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        StoreError::Io(_) | StoreError::Json(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn logs_error(e: LogsError) -> ApiError {
    match e {
        LogsError::NotConfigured | LogsError::FileNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, e.to_string())
        }
        LogsError::InvalidPath => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        LogsError::Io(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn task_not_found(name: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("task '{}' not found", name))
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskConfig>> {
    Json(state.registry.list())
}

async fn get_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TaskConfig>, ApiError> {
    match state.registry.get(&name) {
        Some(task) => Ok(Json(task)),
        None => Err(task_not_found(&name)),
    }
}

async fn create_task(
    State(state): State<AppState>,
    Json(config): Json<TaskConfig>,
) -> Result<(StatusCode, Json<TaskConfig>), ApiError> {
    let created = state.registry.create(config).map_err(registry_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<TaskConfig>, ApiError> {
    let updated = state
        .registry
        .update(&name, update)
        .map_err(registry_error)?;
    Ok(Json(updated))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete(&name).map_err(registry_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Crea el job y dispara la ejecución en segundo plano.
/// La respuesta es el job recién creado, todavía pending: el estado
/// se sigue por polling contra /reports/jobs/:id.
async fn run_report(
    State(state): State<AppState>,
    Json(req): Json<JobCreate>,
) -> Result<Json<Job>, ApiError> {
    let Some(config) = state.registry.get(&req.task_name) else {
        return Err(task_not_found(&req.task_name));
    };

    let job = state
        .store
        .create(&config.name, req.test_mode)
        .map_err(store_error)?;

    info!(
        "corrida manual de '{}' (test={}) -> job {}",
        config.name, req.test_mode, job.id
    );

    {
        let state = state.clone();
        let job = job.clone();
        tokio::spawn(async move {
            executor::execute(
                state.source.as_ref(),
                state.store.as_ref(),
                &state.cancels,
                &config,
                &job,
            )
            .await;
        });
    }

    Ok(Json(job))
}

/// Corre el lote completo y recién entonces responde con el resumen.
async fn run_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Json<BatchSummary> {
    let summary = batch::run_batch(
        state.source.as_ref(),
        state.registry.as_ref(),
        state.store.as_ref(),
        &state.cancels,
        req.frequency,
        req.continue_on_error,
    )
    .await;

    Json(summary)
}

#[derive(Debug, Deserialize)]
struct ListJobsQuery {
    limit: Option<usize>,
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Json<Vec<Job>> {
    Json(state.store.list(query.limit))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    match state.store.get(&id) {
        Some(job) => Ok(Json(job)),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("job '{}' not found", id),
        )),
    }
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    message: String,
}

/// Cancelación cooperativa: el job pasa a cancelled ya mismo en el store
/// y a la descarga en vuelo se le avisa; si ya estaba terminal, 400.
async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    state
        .store
        .update(&id, JobPatch::cancel())
        .map_err(|e| match e {
            StoreError::IllegalTransition { .. } => {
                api_error(StatusCode::BAD_REQUEST, "Job cannot be cancelled")
            }
            other => store_error(other),
        })?;

    state.cancels.request(&id);
    info!("job {} cancelado a pedido", id);

    Ok(Json(CancelResponse {
        message: "Job cancelled".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    #[serde(default)]
    test_mode: bool,
    tail: Option<usize>,
}

async fn list_logs(
    State(state): State<AppState>,
    Path(task_name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogFile>>, ApiError> {
    let Some(config) = state.registry.get(&task_name) else {
        return Err(task_not_found(&task_name));
    };
    Ok(Json(logs::list_log_files(&config, query.test_mode)))
}

async fn read_log(
    State(state): State<AppState>,
    Path((task_name, filename)): Path<(String, String)>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogContent>, ApiError> {
    let Some(config) = state.registry.get(&task_name) else {
        return Err(task_not_found(&task_name));
    };

    let tail = query.tail.unwrap_or(DEFAULT_TAIL_LINES);
    logs::read_log_file(&config, query.test_mode, &filename, tail)
        .map(Json)
        .map_err(logs_error)
}
