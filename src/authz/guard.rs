//! Navigation and subtree guards.
//!
//! The route guard runs on every console request: it maps the path to a
//! module and redirects denied navigations. The component guard gates a
//! single subtree on a named permission and notifies the operator on denial.
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::authz::engine::DASHBOARD_MODULE;
use crate::authz::store::PermissionStore;
use crate::authz::tables::{strip_locale, PathModuleTable};
use crate::authz::types::{Action, GuardResponse};

const LOADING_PAGE: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><meta http-equiv="refresh" content="1"><title>Loading</title>
<style>body{display:flex;align-items:center;justify-content:center;height:100vh;margin:0}
.spinner{width:48px;height:48px;border:5px solid #ddd;border-top-color:#2e7d32;border-radius:50%;animation:spin 1s linear infinite}
@keyframes spin{to{transform:rotate(360deg)}}</style></head>
<body><div class="spinner"></div></body></html>"#;

const NOT_AUTHORIZED_PAGE: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Not authorized</title></head>
<body><h1>Not authorized</h1><p>Your role does not grant access to this page.</p>
<p><a href="/admin/dashboard">Back to the dashboard</a></p></body></html>"#;

/// Outcome of one navigation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// No identity marker; guarding is skipped so logout transitions cannot loop
    Bypass,
    /// Permissions are still loading; content is held back
    Loading,
    Allowed { module: Option<String> },
    Redirect { module: String, to: String },
}

pub struct RouteGuard {
    store: Arc<PermissionStore>,
    routes: Arc<PathModuleTable>,
    not_authorized_path: String,
}

impl RouteGuard {
    pub fn new(
        store: Arc<PermissionStore>,
        routes: Arc<PathModuleTable>,
        not_authorized_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            routes,
            not_authorized_path: not_authorized_path.into(),
        }
    }

    pub fn not_authorized_path(&self) -> &str {
        &self.not_authorized_path
    }

    /// Module guarding `path`, after stripping a locale segment.
    pub fn module_for(&self, path: &str) -> Option<&str> {
        self.routes.resolve(strip_locale(path))
    }

    pub fn decide(&self, path: &str) -> RouteDecision {
        if !self.store.has_identity_marker() {
            return RouteDecision::Bypass;
        }

        let snapshot = self.store.snapshot();
        if snapshot.is_loading {
            return RouteDecision::Loading;
        }

        let normalized = strip_locale(path);
        if normalized.starts_with(self.not_authorized_path.as_str()) {
            return RouteDecision::Allowed { module: None };
        }

        let module = self.routes.resolve(normalized).map(str::to_string);
        match module {
            Some(m) if !m.eq_ignore_ascii_case(DASHBOARD_MODULE) => {
                if snapshot.can_access(&m, Action::View.as_str()) {
                    RouteDecision::Allowed { module: Some(m) }
                } else {
                    tracing::warn!(path, module = %m, "navigation denied");
                    RouteDecision::Redirect {
                        module: m,
                        to: self.not_authorized_path.clone(),
                    }
                }
            }
            other => RouteDecision::Allowed { module: other },
        }
    }
}

/// Axum middleware applying the route guard to every request it wraps.
pub async fn route_guard(
    State(guard): State<Arc<RouteGuard>>,
    request: Request,
    next: Next,
) -> Response {
    match guard.decide(request.uri().path()) {
        RouteDecision::Bypass | RouteDecision::Allowed { .. } => next.run(request).await,
        RouteDecision::Loading => loading_response(),
        RouteDecision::Redirect { to, .. } => Redirect::to(&to).into_response(),
    }
}

fn loading_response() -> Response {
    let mut response = (StatusCode::SERVICE_UNAVAILABLE, Html(LOADING_PAGE)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    response
}

pub async fn not_authorized_page() -> impl IntoResponse {
    (StatusCode::FORBIDDEN, Html(NOT_AUTHORIZED_PAGE))
}

/// Surfaces a denial to the operator.
pub trait Notifier: Send + Sync {
    fn notify_denied(&self, module: &str, action: &str);
}

/// Logs denials; the console shows its own toast from the guard response.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_denied(&self, module: &str, action: &str) {
        tracing::warn!(module, action, "You do not have permission to access this page");
    }
}

/// A subtree gated on one permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentGuard {
    /// Unset means the subtree is public
    pub permission: Option<String>,
    pub action: String,
    pub fallback_path: Option<String>,
}

impl ComponentGuard {
    pub fn public() -> Self {
        Self {
            permission: None,
            action: Action::View.as_str().to_string(),
            fallback_path: None,
        }
    }

    pub fn new(permission: &str) -> Self {
        Self {
            permission: Some(permission.to_string()),
            ..Self::public()
        }
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action = action.to_string();
        self
    }

    pub fn with_fallback(mut self, path: &str) -> Self {
        self.fallback_path = Some(path.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Render,
    Redirect { to: String },
}

impl From<GuardOutcome> for GuardResponse {
    fn from(outcome: GuardOutcome) -> Self {
        match outcome {
            GuardOutcome::Render => GuardResponse {
                outcome: "render",
                redirect_to: None,
            },
            GuardOutcome::Redirect { to } => GuardResponse {
                outcome: "redirect",
                redirect_to: Some(to),
            },
        }
    }
}

/// Decides component guards against the store.
pub struct ComponentGate {
    store: Arc<PermissionStore>,
    notifier: Arc<dyn Notifier>,
    default_fallback: String,
    enforcement_disabled: bool,
}

impl ComponentGate {
    pub fn new(
        store: Arc<PermissionStore>,
        notifier: Arc<dyn Notifier>,
        default_fallback: impl Into<String>,
        enforcement_disabled: bool,
    ) -> Self {
        if enforcement_disabled {
            tracing::warn!("component guard enforcement is DISABLED; every subtree will render");
        }
        Self {
            store,
            notifier,
            default_fallback: default_fallback.into(),
            enforcement_disabled,
        }
    }

    pub fn enforcement_disabled(&self) -> bool {
        self.enforcement_disabled
    }

    /// Waits for loading to finish, then decides. Public guards render immediately.
    pub async fn authorize(&self, guard: &ComponentGuard) -> GuardOutcome {
        let Some(permission) = guard.permission.as_deref() else {
            return GuardOutcome::Render;
        };

        let snapshot = self.store.wait_until_loaded().await;
        if self.enforcement_disabled || snapshot.can_access(permission, &guard.action) {
            return GuardOutcome::Render;
        }

        self.notifier.notify_denied(permission, &guard.action);
        GuardOutcome::Redirect {
            to: guard
                .fallback_path
                .clone()
                .unwrap_or_else(|| self.default_fallback.clone()),
        }
    }
}
