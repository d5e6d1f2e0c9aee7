use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, Environment};
use crate::handlers::{protected, public};
use crate::middleware::session_middleware;
use crate::state::AppState;

/// Full application router
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(provision_routes())
        // Protected
        .merge(protected_routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn provision_routes() -> Router<AppState> {
    use public::provision;

    Router::new()
        .route("/api/provision", post(provision::open))
        .route(
            "/api/provision/:id",
            get(provision::show).delete(provision::discard),
        )
        .route("/api/provision/:id/request", post(provision::request))
        .route("/api/provision/:id/verify", post(provision::verify))
        .route("/api/provision/:id/first-admin", post(provision::first_admin))
        .route("/api/provision/:id/cancel", post(provision::cancel))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use axum::routing::{delete, patch};
    use protected::{accounts, session};

    Router::new()
        .route("/api/auth/whoami", get(session::whoami))
        .route("/api/auth/session", delete(session::logout))
        .route("/api/accounts", get(accounts::list))
        .route("/api/accounts/stream", get(accounts::stream))
        .route("/api/accounts/bulk", post(accounts::bulk))
        .route(
            "/api/accounts/:id",
            patch(accounts::edit).delete(accounts::delete),
        )
        .route("/api/accounts/:id/toggle", post(accounts::toggle))
        .route_layer(middleware::from_fn_with_state(state, session_middleware))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "RBAC Console",
            "version": version,
            "description": "Admin-approved account provisioning and user management",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "provision": "/api/provision[/:id[/request|/verify|/first-admin|/cancel]] (public)",
                "auth": "/api/auth/whoami, /api/auth/session (protected)",
                "accounts": "/api/accounts[/:id[/toggle]|/bulk|/stream] (protected)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "account store unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
