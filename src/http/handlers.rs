use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::app::reconnect::ConnectionPhase;
use crate::domain::notification::Notification;
use crate::http::{AdminToken, AppError};
use crate::AppState;

const MAX_FEED_LIMIT: usize = 200;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    phase: ConnectionPhase,
}

#[derive(Deserialize)]
pub struct FeedQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct FeedResponse {
    pub items: Vec<Notification>,
    pub unread_count: usize,
    pub connected: bool,
    pub connection_error: Option<String>,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let phase = state.engine.phase();
    let status = if phase == ConnectionPhase::Connected {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status, phase })
}

pub async fn list_notifications(
    _admin: AdminToken,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, AppError> {
    let snapshot = state.engine.snapshot();
    let limit = query
        .limit
        .unwrap_or_else(|| snapshot.capacity().min(MAX_FEED_LIMIT));
    if !(1..=MAX_FEED_LIMIT).contains(&limit) {
        return Err(AppError::bad_request(format!(
            "limit must be between 1 and {}",
            MAX_FEED_LIMIT
        )));
    }

    let mut items = snapshot.display_order();
    items.truncate(limit);

    Ok(Json(FeedResponse {
        items,
        unread_count: snapshot.unread_count(),
        connected: snapshot.connected,
        connection_error: snapshot.connection_error,
    }))
}

pub async fn mark_notification_read(
    _admin: AdminToken,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    if !state.engine.contains(&id) {
        return Err(AppError::not_found("notification not found"));
    }

    state.engine.mark_as_read(&id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_notifications_read(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> StatusCode {
    let changed = state.engine.mark_all_as_read();
    tracing::debug!(changed, "marked all notifications read");
    StatusCode::NO_CONTENT
}

pub async fn clear_notifications(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> StatusCode {
    if state.engine.clear_all() {
        tracing::info!("notification feed cleared by operator");
    }
    StatusCode::NO_CONTENT
}
