use crate::access::{AccessDecision, AdminPolicy};
use crate::analyzer::{self, report};
use crate::config::Config;
use crate::dashboard::{Dashboard, DashboardSnapshot};
use crate::events::LeadEvents;
use crate::intake::{self, SignupError, SignupForm, SignupOutcome};
use crate::lead::{Lead, University};
use crate::store::LeadStore;
use anyhow::Context;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub store: Arc<dyn LeadStore>,
    pub events: LeadEvents,
    pub dashboard: Arc<Dashboard>,
    pub policy: Arc<AdminPolicy>,
    pub identity_header: HeaderName,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/universities", get(universities))
        .route("/api/v1/leads", get(lead_list).post(signup))
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/dashboard/refresh", post(dashboard_refresh))
        .route("/api/v1/report/markdown", get(report_markdown))
        .route(
            "/api/v1/report/download/markdown",
            get(report_download_markdown),
        )
        .route("/api/v1/report/download/json", get(report_download_json))
        .fallback(not_found)
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    backend: &'static str,
    api_port: u16,
    admin_gate: &'static str,
    listeners: usize,
    last_refreshed_at: Option<String>,
    last_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct UniversityOption {
    value: &'static str,
    label: &'static str,
}

#[derive(Debug, Serialize)]
struct LeadsPayload {
    count: usize,
    leads: Vec<Lead>,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let snapshot = state.dashboard.snapshot();

    Ok(Json(StatusPayload {
        backend: state.store.backend_name(),
        api_port: state.config.api_port,
        admin_gate: if state.policy.is_open() {
            "open"
        } else {
            "allowlist"
        },
        listeners: state.events.listener_count(),
        last_refreshed_at: snapshot.refreshed_at,
        last_error: snapshot.last_error,
    }))
}

async fn universities() -> Json<Vec<UniversityOption>> {
    Json(
        University::ALL
            .into_iter()
            .map(|university| UniversityOption {
                value: university.code(),
                label: university.label(),
            })
            .collect(),
    )
}

async fn signup(
    State(state): State<ApiState>,
    payload: Result<Json<SignupForm>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SignupOutcome>)> {
    let Json(form) = payload?;
    let outcome = intake::submit(state.store.as_ref(), &state.events, &form)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn lead_list(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<LeadsPayload>> {
    authorize(&state, &headers)?;

    let leads = state.store.list_all().context("Failed to load leads")?;

    Ok(Json(LeadsPayload {
        count: leads.len(),
        leads,
    }))
}

async fn dashboard(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<DashboardSnapshot>> {
    authorize(&state, &headers)?;
    Ok(Json(state.dashboard.snapshot()))
}

async fn dashboard_refresh(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<DashboardSnapshot>> {
    authorize(&state, &headers)?;
    state.dashboard.refresh();
    Ok(Json(state.dashboard.snapshot()))
}

async fn report_markdown(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    authorize(&state, &headers)?;

    let report = analyzer::current_report(state.store.as_ref())?;
    let markdown = report::render_markdown(&report);

    let mut response = Response::new(markdown.into_response().into_body());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/markdown; charset=utf-8"),
    );

    Ok(response)
}

async fn report_download_markdown(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    authorize(&state, &headers)?;

    let report = analyzer::current_report(state.store.as_ref())?;
    let markdown = report::render_markdown(&report);
    let filename = format!("leads-{}.md", report.today.format("%Y-%m-%d"));

    let mut response = Response::new(markdown.into_response().into_body());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/markdown; charset=utf-8"),
    );
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))?,
    );

    Ok(response)
}

async fn report_download_json(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    authorize(&state, &headers)?;

    let report = analyzer::current_report(state.store.as_ref())?;
    let content =
        serde_json::to_string_pretty(&report).context("Failed to serialize report JSON")?;
    let filename = format!("leads-{}.json", report.today.format("%Y-%m-%d"));

    let mut response = Response::new(content.into_response().into_body());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))?,
    );

    Ok(response)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

fn authorize(state: &ApiState, headers: &HeaderMap) -> ApiResult<()> {
    let identity = headers
        .get(&state.identity_header)
        .and_then(|value| value.to_str().ok());

    match state.policy.decide(identity) {
        AccessDecision::Granted => Ok(()),
        AccessDecision::SignInRequired => {
            Err(ApiError::Unauthorized("Sign in to access the dashboard".to_string()))
        }
        AccessDecision::Denied => {
            Err(ApiError::Forbidden("You don't have admin access".to_string()))
        }
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<axum::http::header::InvalidHeaderValue> for ApiError {
    fn from(value: axum::http::header::InvalidHeaderValue) -> Self {
        Self::Internal(value.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl From<SignupError> for ApiError {
    fn from(value: SignupError) -> Self {
        match value {
            SignupError::AlreadyRegistered => Self::Conflict(value.to_string()),
            validation if validation.is_validation() => Self::BadRequest(validation.to_string()),
            other => Self::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Internal(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
