//! REST API for the booking Mini App.
//!
//! Every endpoint authenticates through the `X-Telegram-Init-Data` header
//! and is scoped to the authenticated user. Schedule and reschedule
//! re-validate the availability rules server side; the wizard's client-side
//! checks are a convenience, not a trust boundary.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::backend::client::{BackendApi, INIT_DATA_HEADER};
use crate::backend::types::{
    builtin_tariffs, RescheduleRequest, ScheduleRequest, ScheduleResponse, StatusResponse,
    TariffId, UserProfile,
};
use crate::backend::LocalBackend;
use crate::booking::availability::{self, AvailabilityRules};
use crate::core::AppError;
use crate::storage::db::{self, DbPool};
use crate::telegram::webapp_auth::{self, WebAppUser};

pub struct ApiState {
    pub db_pool: Arc<DbPool>,
    pub bot_token: String,
    pub rules: AvailabilityRules,
}

/// API error responses, rendered as `{"error": "..."}` JSON.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = Json(serde_json::json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Validation(msg) => ApiError::BadRequest(msg),
            AppError::Backend(msg) => ApiError::NotFound(msg),
            other => {
                log::error!("API internal error: {}", other);
                ApiError::Internal("internal error".to_string())
            }
        }
    }
}

/// Resolves the caller from the init data header.
///
/// An empty bot token disables signature checking, for local development
/// against a Mini App served outside Telegram.
fn authenticate(state: &ApiState, headers: &HeaderMap) -> Result<WebAppUser, ApiError> {
    let init_data = headers
        .get(INIT_DATA_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing init data".to_string()))?;

    if state.bot_token.is_empty() {
        log::warn!("Init data signature check disabled (no bot token)");
        return webapp_auth::extract_user_unchecked(init_data)
            .map_err(|e| ApiError::Unauthorized(e.to_string()));
    }
    webapp_auth::validate_init_data(init_data, &state.bot_token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))
}

fn backend_for(state: &ApiState, user: &WebAppUser) -> LocalBackend {
    LocalBackend::new((*state.db_pool).clone(), user.id)
}

/// Rejects a schedule/reschedule instant the availability rules disallow.
fn check_request_instant(
    state: &ApiState,
    user_id: i64,
    date: chrono::NaiveDateTime,
    time: &str,
) -> Result<(), ApiError> {
    let slot = availability::parse_slot(time)
        .ok_or_else(|| ApiError::BadRequest(format!("недоступное время: {}", time)))?;
    if date.time() != slot {
        return Err(ApiError::BadRequest("дата и время не совпадают".to_string()));
    }

    let now = Local::now().naive_local();
    let conn = db::get_connection(&state.db_pool)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let booked = if db::has_scheduled_on(&conn, user_id, date.date())
        .map_err(|e| ApiError::Internal(e.to_string()))?
    {
        vec![date.date()]
    } else {
        vec![]
    };
    availability::check_date(date.date(), now, &booked, &state.rules)
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

pub fn create_webapp_router(db_pool: Arc<DbPool>, bot_token: String, rules: AvailabilityRules) -> Router {
    let state = ApiState {
        db_pool,
        bot_token,
        rules,
    };

    // CORS for the Mini App
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/tariffs", get(handle_list_tariffs))
        .route("/api/tariffs/{id}", get(handle_get_tariff))
        .route("/api/cleanings", get(handle_list_cleanings))
        .route("/api/cleanings/schedule", post(handle_schedule))
        .route("/api/cleanings/{id}/cancel", post(handle_cancel))
        .route("/api/cleanings/{id}/reschedule", post(handle_reschedule))
        .route("/api/user/me", get(handle_current_user))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Runs the Mini App API server until the process stops.
pub async fn run_webapp_server(
    port: u16,
    db_pool: Arc<DbPool>,
    bot_token: String,
    rules: AvailabilityRules,
) -> anyhow::Result<()> {
    let app = create_webapp_router(db_pool, bot_token, rules);

    let addr = format!("0.0.0.0:{}", port);
    log::info!("🌐 Starting Mini App API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_list_tariffs(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authenticate(&state, &headers)?;
    Ok(Json(builtin_tariffs()))
}

async fn handle_get_tariff(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authenticate(&state, &headers)?;
    let id = TariffId::parse(&id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown tariff: {}", id)))?;
    let tariff = builtin_tariffs()
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown tariff: {}", id)))?;
    Ok(Json(tariff))
}

async fn handle_list_cleanings(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = authenticate(&state, &headers)?;
    let cleanings = backend_for(&state, &user).list_cleanings().await?;
    Ok(Json(cleanings))
}

async fn handle_schedule(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(req): Json<ScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = authenticate(&state, &headers)?;
    check_request_instant(&state, user.id, req.date, &req.time)?;

    let conn = db::get_connection(&state.db_pool).map_err(|e| ApiError::Internal(e.to_string()))?;
    db::upsert_user(&conn, user.id, user.username.as_deref(), user.first_name.as_deref())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    drop(conn);

    let cleaning = backend_for(&state, &user).schedule(&req).await?;
    Ok(Json(ScheduleResponse {
        cleaning,
        success: true,
    }))
}

async fn handle_cancel(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = authenticate(&state, &headers)?;
    backend_for(&state, &user).cancel(&id).await?;
    Ok(Json(StatusResponse { success: true }))
}

async fn handle_reschedule(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<RescheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = authenticate(&state, &headers)?;
    check_request_instant(&state, user.id, req.date, &req.time)?;
    let cleaning = backend_for(&state, &user).reschedule(&id, &req).await?;
    Ok(Json(ScheduleResponse {
        cleaning,
        success: true,
    }))
}

async fn handle_current_user(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = authenticate(&state, &headers)?;

    let conn = db::get_connection(&state.db_pool).map_err(|e| ApiError::Internal(e.to_string()))?;
    db::upsert_user(&conn, user.id, user.username.as_deref(), user.first_name.as_deref())
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(UserProfile {
        id: user.id,
        first_name: user.first_name,
        username: user.username,
    }))
}
