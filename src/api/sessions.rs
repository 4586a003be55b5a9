//! Read-only view of open voice streams

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::voice::SessionInfo;

/// Session listing response
#[derive(Serialize)]
pub struct SessionListResponse {
    pub count: usize,
    pub sessions: Vec<SessionInfo>,
}

/// Build sessions router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/", get(list_sessions)).with_state(state)
}

async fn list_sessions(State(state): State<Arc<ApiState>>) -> Json<SessionListResponse> {
    let sessions = state.manager.registry().snapshot().await;
    Json(SessionListResponse {
        count: sessions.len(),
        sessions,
    })
}
