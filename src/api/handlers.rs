use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::request_json::RequestJson;
use crate::config::MatrixConfig;
use crate::error::{MatrixError, MatrixResult};
use crate::logic::{HydrationReport, SessionSnapshot, VariantSession};
use crate::model::{
    AttributeGroup, ClientIndex, Id, LocalFile, RemoteVariant, RowDescriptor, RowEdit,
    SubmissionPayload, VariantRow,
};
use crate::store::SessionCache;

/// Shared state behind every handler
#[derive(Debug, Clone)]
pub struct ApiContext {
    pub sessions: SessionCache,
    pub matrix: MatrixConfig,
}

pub type AppState = Arc<ApiContext>;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine readable reason, so clients can tell "too many combinations"
    /// from "save failed"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
            code: None,
        }
    }

    pub fn with_code(message: &str, code: &str) -> Self {
        Self {
            error: message.to_string(),
            code: Some(code.to_string()),
        }
    }
}

fn matrix_error(err: MatrixError) -> (StatusCode, Json<ErrorResponse>) {
    let message = err.to_string();
    let (status, code) = match err {
        MatrixError::CapExceeded { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "too_many_combinations"),
        MatrixError::UnknownGroup(_) => (StatusCode::NOT_FOUND, "unknown_group"),
        MatrixError::RowNotFound(_) => (StatusCode::NOT_FOUND, "row_not_found"),
        MatrixError::SubmissionInFlight => (StatusCode::CONFLICT, "submission_in_flight"),
        MatrixError::NoSubmissionInFlight => (StatusCode::CONFLICT, "no_submission_in_flight"),
        MatrixError::Submission(_) => (StatusCode::BAD_GATEWAY, "submission_failed"),
        MatrixError::ReconciliationMismatch { .. } => (StatusCode::BAD_REQUEST, "malformed_variant"),
        MatrixError::InvalidPhase(_) => (StatusCode::CONFLICT, "invalid_phase"),
    };
    (status, Json(ErrorResponse::with_code(&message, code)))
}

fn session_not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Session not found")),
    )
}

/// Run an engine operation against a cached session
async fn on_session<F, R>(state: &AppState, session_id: &str, f: F) -> ApiResult<R>
where
    F: FnOnce(&mut VariantSession) -> MatrixResult<R> + Send,
    R: Send,
{
    match state.sessions.with_session(session_id, f).await {
        Some(Ok(value)) => Ok(Json(value)),
        Some(Err(err)) => Err(matrix_error(err)),
        None => Err(session_not_found()),
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub groups: Vec<AttributeGroup>,
    pub combination_cap: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: Id,
}

pub async fn create_session(
    State(state): State<AppState>,
    RequestJson(request): RequestJson<CreateSessionRequest>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let mut matrix = state.matrix.clone();
    if let Some(cap) = request.combination_cap {
        matrix.combination_cap = cap;
    }
    let session = VariantSession::new(request.groups, matrix);
    let session_id = state.sessions.insert(session).await;
    log::info!("Opened variant editing session {}", session_id);
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
) -> ApiResult<SessionSnapshot> {
    on_session(&state, &session_id, |session| Ok(session.snapshot())).await
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    if state.sessions.remove(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found())
    }
}

#[derive(Debug, Deserialize)]
pub struct VariantsRequest {
    #[serde(default)]
    pub variants: Vec<RemoteVariant>,
}

pub async fn hydrate_session(
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
    RequestJson(request): RequestJson<VariantsRequest>,
) -> ApiResult<HydrationReport> {
    on_session(&state, &session_id, move |session| {
        session.hydrate(&request.variants)
    })
    .await
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GroupSelectionRequest {
    #[serde(default)]
    pub values: Vec<String>,
}

pub async fn set_group_selection(
    State(state): State<AppState>,
    Path((session_id, group_id)): Path<(Id, Id)>,
    RequestJson(request): RequestJson<GroupSelectionRequest>,
) -> ApiResult<SessionSnapshot> {
    on_session(&state, &session_id, move |session| {
        session.set_group_selection(&group_id, request.values)?;
        Ok(session.snapshot())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct ToggleOptionRequest {
    pub value: String,
}

pub async fn toggle_option(
    State(state): State<AppState>,
    Path((session_id, group_id)): Path<(Id, Id)>,
    RequestJson(request): RequestJson<ToggleOptionRequest>,
) -> ApiResult<SessionSnapshot> {
    on_session(&state, &session_id, move |session| {
        session.toggle_option(&group_id, &request.value)?;
        Ok(session.snapshot())
    })
    .await
}

// ---------------------------------------------------------------------------
// Rows and images
// ---------------------------------------------------------------------------

pub async fn update_row(
    State(state): State<AppState>,
    Path((session_id, client_index)): Path<(Id, ClientIndex)>,
    RequestJson(edit): RequestJson<RowEdit>,
) -> ApiResult<VariantRow> {
    on_session(&state, &session_id, move |session| {
        session.update_row(client_index, &edit).cloned()
    })
    .await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadQuery {
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadResponse {
    pub client_index: ClientIndex,
    pub preview_url: String,
}

/// Stage raw image bytes on a row. File type and size checks belong to the
/// caller; only an empty body is refused here.
pub async fn upload_row_image(
    State(state): State<AppState>,
    Path((session_id, client_index)): Path<(Id, ClientIndex)>,
    Query(query): Query<ImageUploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ImageUploadResponse> {
    if body.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Image upload is empty")),
        ));
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let file_name = query
        .file_name
        .unwrap_or_else(|| format!("variant-{}", client_index));
    let file = LocalFile::new(file_name, content_type, body.to_vec());

    on_session(&state, &session_id, move |session| {
        let preview_url = session.attach_image(client_index, file)?;
        Ok(ImageUploadResponse {
            client_index,
            preview_url,
        })
    })
    .await
}

pub async fn remove_row_image(
    State(state): State<AppState>,
    Path((session_id, client_index)): Path<(Id, ClientIndex)>,
) -> ApiResult<SessionSnapshot> {
    on_session(&state, &session_id, move |session| {
        session.remove_image(client_index)?;
        Ok(session.snapshot())
    })
    .await
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSummary {
    pub field_name: String,
    pub client_index: ClientIndex,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

/// Prepared submission as JSON; file bytes are described, not inlined
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    pub rows: Vec<RowDescriptor>,
    pub attachments: Vec<AttachmentSummary>,
    pub removed_image_paths: Vec<String>,
}

impl From<SubmissionPayload> for SubmissionSummary {
    fn from(payload: SubmissionPayload) -> Self {
        let attachments = payload
            .attachments
            .iter()
            .map(|a| AttachmentSummary {
                field_name: a.field_name.clone(),
                client_index: a.client_index,
                file_name: a.file.file_name.clone(),
                content_type: a.file.content_type.clone(),
                size: a.file.size(),
            })
            .collect();
        Self {
            rows: payload.rows,
            attachments,
            removed_image_paths: payload.removed_image_paths,
        }
    }
}

pub async fn prepare_submission(
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
) -> ApiResult<SubmissionSummary> {
    on_session(&state, &session_id, |session| {
        session.prepare_submission().map(SubmissionSummary::from)
    })
    .await
}

/// Outcome of the transport call: either the backend's row set or an error
#[derive(Debug, Deserialize)]
pub struct CompleteSubmissionRequest {
    pub variants: Option<Vec<RemoteVariant>>,
    pub error: Option<String>,
}

/// A backend response that cannot be read still finishes the in-flight
/// submission, as a failure, so the session does not stay locked
pub async fn complete_submission(
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
    request: Result<RequestJson<CompleteSubmissionRequest>, (StatusCode, Json<ErrorResponse>)>,
) -> ApiResult<HydrationReport> {
    let outcome = match request {
        Err((_, Json(rejection))) => Err(format!("unreadable backend response: {}", rejection.error)),
        Ok(RequestJson(request)) => match (request.error, request.variants) {
            (Some(error), _) => Err(error),
            (None, Some(variants)) => Ok(variants),
            (None, None) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Either variants or error is required")),
                ))
            }
        },
    };
    on_session(&state, &session_id, move |session| {
        session.complete_submission(outcome)
    })
    .await
}
