use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::cookies::{get_cookie_value, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::auth::tokens::IdentityClaims;
use crate::error::AppError;
use crate::state::AppState;

/// Both token cookies as sent by the client, unverified.
/// Rejects with 401 when either cookie is missing.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    pub access_token: String,
    pub refresh_token: String,
}

impl<S: Send + Sync> FromRequestParts<S> for SessionCookies {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let access_token = get_cookie_value(parts, ACCESS_COOKIE);
        let refresh_token = get_cookie_value(parts, REFRESH_COOKIE);

        match (access_token, refresh_token) {
            (Some(access), Some(refresh)) => Ok(SessionCookies {
                access_token: access.to_string(),
                refresh_token: refresh.to_string(),
            }),
            (access, refresh) => {
                tracing::debug!(
                    has_access = access.is_some(),
                    has_refresh = refresh.is_some(),
                    "Session cookies missing"
                );
                Err(AppError::Unauthorized)
            }
        }
    }
}

/// The caller identified by a valid access token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub IdentityClaims);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = SessionCookies::from_request_parts(parts, state).await?;
        let claims = state.tokens.verify_access(&cookies.access_token)?;
        Ok(CurrentUser(claims))
    }
}
