use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::authz::guard::ComponentGuard;
use crate::authz::menu::visible_menu;
use crate::authz::store::RefreshSignal;
use crate::authz::types::{
    CheckRequest, CheckResponse, GuardRequest, GuardResponse, MenuResponse, SignalResponse,
};
use crate::authz::AuthzState;

pub fn router(state: Arc<AuthzState>) -> Router {
    Router::new()
        .route("/v1/permissions", get(handle_permissions))
        .route("/v1/check", post(handle_check))
        .route("/v1/guard", post(handle_guard))
        .route("/v1/signals/{name}", post(handle_signal))
        .route("/v1/menu", get(handle_menu))
        .route("/healthz", get(health))
        .with_state(state)
}

async fn handle_permissions(State(state): State<Arc<AuthzState>>) -> impl IntoResponse {
    Json(state.store.snapshot().to_response())
}

async fn handle_check(
    State(state): State<Arc<AuthzState>>,
    Json(req): Json<CheckRequest>,
) -> impl IntoResponse {
    let allowed = state.store.can_access(&req.module, &req.action);
    Json(CheckResponse { allowed })
}

async fn handle_guard(
    State(state): State<Arc<AuthzState>>,
    Json(req): Json<GuardRequest>,
) -> impl IntoResponse {
    let mut guard = match req.permission.as_deref() {
        Some(permission) => ComponentGuard::new(permission),
        None => ComponentGuard::public(),
    };
    if let Some(action) = req.action.as_deref() {
        guard = guard.with_action(action);
    }
    if let Some(fallback) = req.fallback.as_deref() {
        guard = guard.with_fallback(fallback);
    }

    let response: GuardResponse = state.gate.authorize(&guard).await.into();
    Json(response)
}

async fn handle_signal(
    State(state): State<Arc<AuthzState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match name.parse::<RefreshSignal>() {
        Ok(signal) => {
            let accepted = state.store.signal(signal);
            (
                StatusCode::ACCEPTED,
                Json(SignalResponse {
                    signal: signal.name(),
                    accepted,
                }),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn handle_menu(State(state): State<Arc<AuthzState>>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    Json(MenuResponse {
        menu: visible_menu(&snapshot, &state.tables.menu),
    })
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
