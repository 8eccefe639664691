use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::auth::cookies;
use crate::auth::password::{hash_password, verify_login};
use crate::auth::tokens::{IdentityClaims, TokenError};
use crate::db::models::PublicUser;
use crate::error::{AppError, AppResult};
use crate::extractors::SessionCookies;
use crate::state::AppState;
use crate::users::NewUser;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub nickname: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Both cookies outlive the access token so an expired access token is still
/// presented alongside the refresh token when rotating.
fn cookie_max_age(state: &AppState) -> i64 {
    state.tokens.refresh_ttl_secs()
}

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    let nickname = req.nickname.trim().to_string();
    let email = req.email.trim().to_lowercase();

    if nickname.is_empty() {
        return Err(AppError::BadRequest("Nickname is required".into()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    if req.password.is_empty() {
        return Err(AppError::BadRequest("Password is required".into()));
    }

    let password_hash = hash_password(&req.password, state.config.auth.bcrypt_cost)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    let user = state
        .users
        .insert(&NewUser {
            nickname,
            email,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = user.id, "User registered");
    Ok((StatusCode::OK, Json(PublicUser::from(&user))).into_response())
}

/// POST /api/login — verify credentials, issue both tokens as cookies
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_lowercase();

    let found = state.users.find_by_email(&email).await?;
    let stored_hash = found.as_ref().map(|user| user.password_hash.as_str());
    if !verify_login(&req.password, stored_hash, &state.dummy_hash) {
        tracing::info!("Login rejected");
        return Err(AppError::InvalidCredentials);
    }
    let user = found.ok_or(AppError::InvalidCredentials)?;

    let pair = state.tokens.issue_token_pair(&IdentityClaims::from(&user))?;
    let max_age = cookie_max_age(&state);
    let secure = state.config.auth.secure_cookies;

    tracing::info!(user_id = user.id, "Login accepted");
    Ok((
        StatusCode::OK,
        AppendHeaders([
            (
                header::SET_COOKIE,
                cookies::access_cookie(&pair.access_token, max_age, secure),
            ),
            (
                header::SET_COOKIE,
                cookies::refresh_cookie(&pair.refresh_token, max_age, secure),
            ),
        ]),
        Json(PublicUser::from(&user)),
    )
        .into_response())
}

/// POST /api/logout — clear both cookies. Issued tokens stay valid until they expire.
pub async fn logout(State(state): State<AppState>) -> Response {
    let secure = state.config.auth.secure_cookies;
    (
        StatusCode::OK,
        AppendHeaders([
            (header::SET_COOKIE, cookies::clear_access_cookie(secure)),
            (header::SET_COOKIE, cookies::clear_refresh_cookie(secure)),
        ]),
        "Logged out",
    )
        .into_response()
}

/// GET /accesstoken — who the access token belongs to, read fresh from the store
pub async fn access_token(
    State(state): State<AppState>,
    session: SessionCookies,
) -> AppResult<Json<PublicUser>> {
    let claims = state.tokens.verify_access(&session.access_token)?;

    let user = state
        .users
        .find_by_email(&claims.email)
        .await?
        .ok_or(TokenError::AccountNotFound)?;

    Ok(Json(PublicUser::from(&user)))
}

/// GET /refreshtoken — mint a new access token from the refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    session: SessionCookies,
) -> AppResult<Response> {
    let (access, claims) = state
        .tokens
        .rotate_access(&session.refresh_token, state.users.as_ref())
        .await?;

    let cookie = cookies::access_cookie(
        &access,
        cookie_max_age(&state),
        state.config.auth.secure_cookies,
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(PublicUser {
            id: claims.id,
            nickname: claims.nickname,
            email: claims.email,
        }),
    )
        .into_response())
}
