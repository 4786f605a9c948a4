use std::sync::Arc;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tower_http::trace::TraceLayer;

use csvpipe::api::Download;
use csvpipe::broadcast::{JobPhase, JobProgressEvent};
use csvpipe::jobs::PREVIEW_ROWS;
use csvpipe::{IngestionService, ProcessingConfig};

use crate::error::ApiError;
use crate::response::ApiResponse;

pub const OWNER_HEADER: &str = "x-owner-id";

/// Room for multipart framing on top of the upload limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IngestionService>,
}

impl AppState {
    /// Runs a blocking service call off the async runtime.
    async fn call<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&IngestionService) -> csvpipe::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| ApiError::Task(e.to_string()))?
            .map_err(ApiError::from)
    }
}

/// Caller identity taken from the `x-owner-id` header.
#[derive(Debug)]
pub struct Owner(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Owner(v.to_string()))
            .ok_or(ApiError::MissingOwner)
    }
}

/// Builds the `/api/v1` router. `max_upload_bytes` bounds request bodies.
pub fn router(service: Arc<IngestionService>, max_upload_bytes: u64) -> Router {
    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let api = Router::new()
        .route("/health", get(health))
        .route("/files", post(upload_file))
        .route("/files/by-hash/:hash", get(check_by_hash))
        .route("/files/:id", axum::routing::delete(delete_file))
        .route("/files/:id/process", post(start_processing))
        .route("/files/:id/preview", get(preview))
        .route("/files/:id/download", get(download))
        .route("/files/:id/export", get(export))
        .route("/jobs/:id", get(job_status))
        .route("/jobs/:id/events", get(job_events))
        .route("/mapping-targets", get(mapping_targets))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(AppState { service });

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> ApiResponse<serde_json::Value> {
    ApiResponse::success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

#[tracing::instrument(skip(state))]
async fn check_by_hash(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(hash): Path<String>,
) -> Result<Response, ApiError> {
    let check = state
        .call(move |s| s.check_by_hash(&hash, &owner))
        .await?;
    Ok(ApiResponse::success(check).into_response())
}

#[tracing::instrument(skip(state, multipart))]
async fn upload_file(
    State(state): State<AppState>,
    Owner(owner): Owner,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.csv").to_string();
        let mime_type = field.content_type().unwrap_or("").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file bytes: {}", e)))?;
        upload = Some((name, mime_type, bytes.to_vec()));
    }

    let (name, mime_type, bytes) = upload
        .ok_or_else(|| ApiError::BadRequest("No file field found in multipart data".into()))?;

    let result = state
        .call(move |s| s.upload(&owner, &bytes, &name, &mime_type))
        .await?;

    tracing::info!(
        file_id = %result.file.id,
        deduplicated = result.deduplicated,
        "file uploaded via API"
    );

    let status = if result.deduplicated {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok(ApiResponse::success(result).with_status(status))
}

#[tracing::instrument(skip(state))]
async fn delete_file(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.call(move |s| s.delete_file(&id, &owner)).await?;
    Ok(ApiResponse::success(json!({ "deleted": true })).into_response())
}

#[tracing::instrument(skip(state, config))]
async fn start_processing(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Json(config): Json<ProcessingConfig>,
) -> Result<Response, ApiError> {
    let started = state
        .call(move |s| s.start_processing(&id, &owner, &config))
        .await?;
    Ok(ApiResponse::success(started).with_status(StatusCode::ACCEPTED))
}

#[tracing::instrument(skip(state))]
async fn job_status(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let job = state.call(move |s| s.get_job_status(&id, &owner)).await?;
    Ok(ApiResponse::success(job).into_response())
}

/// Streams a job as server-sent events.
///
/// The first `snapshot` event carries the stored job. `progress` events
/// follow until the job completes or fails; a job that is already terminal
/// ends the stream after the snapshot.
#[tracing::instrument(skip(state))]
async fn job_events(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    // Subscribe before reading the row so no transition falls in between.
    let rx = state.service.orchestrator().progress().subscribe();
    let job_id = id.clone();
    let job = state.call(move |s| s.get_job_status(&job_id, &owner)).await?;

    let snapshot = Event::default().event("snapshot").json_data(&job);
    let live = (!job.status.is_terminal()).then_some((rx, id));
    let events = stream::once(async move { snapshot }).chain(stream::unfold(live, next_event));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn next_event(
    live: Option<(Receiver<JobProgressEvent>, String)>,
) -> Option<(Result<Event, axum::Error>, Option<(Receiver<JobProgressEvent>, String)>)> {
    let (mut rx, job_id) = live?;
    loop {
        match rx.recv().await {
            Ok(event) if event.job_id == job_id => {
                let done = matches!(event.phase, JobPhase::Completed | JobPhase::Failed);
                let item = Event::default().event("progress").json_data(&event);
                return Some((item, (!done).then_some((rx, job_id))));
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(job_id = %job_id, skipped, "event stream lagged");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

fn default_preview_limit() -> usize {
    PREVIEW_ROWS
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    #[serde(default = "default_preview_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    processed: bool,
}

#[tracing::instrument(skip(state))]
async fn preview(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, ApiError> {
    let page = state
        .call(move |s| s.get_preview(&id, &owner, query.limit, query.offset, query.processed))
        .await?;
    Ok(ApiResponse::success(page).into_response())
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    #[serde(default)]
    processed: bool,
}

#[tracing::instrument(skip(state))]
async fn download(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let file = state
        .call(move |s| s.download(&id, &owner, query.processed))
        .await?;
    Ok(attachment(file))
}

#[tracing::instrument(skip(state))]
async fn export(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = state.call(move |s| s.export(&id, &owner)).await?;
    Ok(attachment(file))
}

#[tracing::instrument(skip(state))]
async fn mapping_targets(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Response, ApiError> {
    let targets = state.call(move |s| s.mapping_targets(&owner)).await?;
    Ok(ApiResponse::success(targets).into_response())
}

fn attachment(file: Download) -> Response {
    let name: String = file
        .name
        .chars()
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect();
    (
        [
            (header::CONTENT_TYPE, file.mime_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        file.bytes,
    )
        .into_response()
}
