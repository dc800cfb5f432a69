//! HTTP endpoint handlers. These are thin wrappers that forward to the quest board.
//! Each handler is instrumented and logs basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_quests(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.snapshot().await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_generate(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let outcome = state.regenerate_quests().await;
  info!(target: "quest", ?outcome, "HTTP generate handled");
  Json(GenerateOut { outcome, board: state.snapshot().await })
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_post_toggle(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> impl IntoResponse {
  let matched = state.toggle_complete(&id).await;
  info!(target: "quest", %id, %matched, "HTTP toggle handled");
  Json(ToggleOut { matched, board: state.snapshot().await })
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_dismiss_alert(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  state.dismiss_alert().await;
  Json(state.snapshot().await)
}
