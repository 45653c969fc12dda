//! HTTP surface: the permission API plus the console bundle behind the route guard.
use crate::authz::guard::{
    not_authorized_page, route_guard, ComponentGate, RouteGuard, TracingNotifier,
};
use crate::authz::store::PermissionStore;
use crate::authz::{AuthzState, Tables};
use crate::errors::GatehouseError;
use crate::settings::Settings;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;

// Security headers middleware
async fn security_headers(request: Request<Body>, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    // X-Frame-Options: Prevent clickjacking
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );

    // X-Content-Type-Options: Prevent MIME sniffing
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );

    // Content-Security-Policy: the console bundle loads only its own assets
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:"),
    );

    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}

/// Build the full application router.
///
/// `/v1/*` and `/healthz` answer permission queries and are never guarded.
/// Everything else falls through to the console bundle, which sits behind
/// the route guard.
pub fn app(
    settings: &Settings,
    store: Arc<PermissionStore>,
    tables: Arc<Tables>,
) -> Result<Router, GatehouseError> {
    let not_authorized = settings.guard.not_authorized_path.as_str();
    if !not_authorized.starts_with('/') {
        return Err(GatehouseError::Other(format!(
            "guard.not_authorized_path `{not_authorized}` must start with `/`"
        )));
    }

    let gate = Arc::new(ComponentGate::new(
        store.clone(),
        Arc::new(TracingNotifier),
        settings.guard.fallback_path.clone(),
        settings.guard.enforcement_disabled,
    ));
    let guard = Arc::new(RouteGuard::new(
        store.clone(),
        Arc::new(tables.routes.clone()),
        not_authorized,
    ));

    let console = Router::new()
        .route(not_authorized, get(not_authorized_page))
        .fallback_service(ServeDir::new(&settings.console.assets_dir))
        .layer(middleware::from_fn_with_state(guard, route_guard));

    let api = crate::authz::web::router(Arc::new(AuthzState { store, tables, gate }));

    Ok(api
        .fallback_service(console)
        .layer(middleware::from_fn(security_headers)))
}

pub async fn serve(
    settings: Settings,
    store: Arc<PermissionStore>,
    tables: Arc<Tables>,
) -> Result<(), GatehouseError> {
    let router = app(&settings, store.clone(), tables)?;

    // Listener first so signals sent during the initial fetch are not dropped
    let _listener = store.spawn_signal_listener();
    let initial = store.clone();
    tokio::spawn(async move { initial.fetch_permissions().await });

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| GatehouseError::Other(format!("bad listen addr: {e}")))?;

    tracing::info!(%addr, "Gatehouse listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gatehouse stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
}
