use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /objects/{key} — serve a stored post image
pub async fn serve(State(state): State<AppState>, Path(key): Path<String>) -> AppResult<Response> {
    let data = state.objects.get(&key).await?.ok_or(AppError::NotFound)?;
    let mime = mime_guess::from_path(&key).first_or_octet_stream();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        data,
    )
        .into_response())
}
