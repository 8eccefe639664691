pub mod auth;
pub mod objects;
pub mod posts;
pub mod votes;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppResult;
use crate::state::AppState;

/// Assemble the full API with CORS, body limit and request tracing.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let origin: HeaderValue = state.config.cors.allowed_origin.parse()?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let router = Router::new()
        .route("/api/health", get(health))
        .route("/objects/{key}", get(objects::serve))
        .merge(auth::router())
        .merge(posts::router())
        .merge(votes::router())
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(Json(json!({ "status": "ok" })))
}
