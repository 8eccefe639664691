use axum::extract::{Multipart, Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use bytes::Bytes;

use crate::db::models::{Post, PostSummary};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::posts::NewPost;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/post", get(list_posts).post(upload_post))
        .route("/api/post/{postid}/{extension}", delete(delete_post))
}

async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostSummary>>> {
    let posts = state.posts.list_with_votes().await?;
    Ok(Json(posts))
}

/// POST /api/post — multipart with `file`, `postID`, `uploaderID`, `postName`, `imgExtension`
async fn upload_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<Post>> {
    let mut file: Option<Bytes> = None;
    let mut post = NewPost {
        id: String::new(),
        uploader_id: String::new(),
        post_name: String::new(),
        img_extension: String::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let bad_field = |e: axum::extract::multipart::MultipartError| {
            AppError::BadRequest(format!("Could not read field {}: {}", name, e))
        };

        match name.as_str() {
            "file" => file = Some(field.bytes().await.map_err(bad_field)?),
            "postID" => post.id = field.text().await.map_err(bad_field)?.trim().to_string(),
            "uploaderID" => {
                post.uploader_id = field.text().await.map_err(bad_field)?.trim().to_string()
            }
            "postName" => post.post_name = field.text().await.map_err(bad_field)?.trim().to_string(),
            "imgExtension" => {
                post.img_extension = field.text().await.map_err(bad_field)?.trim().to_string()
            }
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    tracing::debug!(user_id = user.id, post_id = %post.id, "Upload requested");
    let receipt = state.uploads.create_post(post, file).await?;
    Ok(Json(receipt.post))
}

async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((post_id, extension)): Path<(String, String)>,
) -> AppResult<&'static str> {
    tracing::debug!(user_id = user.id, %post_id, "Delete requested");
    state.uploads.delete_post(&post_id, &extension).await?;
    Ok("Deleted")
}
