//! Signed access/refresh token issuance, verification and rotation.
//!
//! Both tokens carry the same identity claims but are signed with different
//! secrets, so neither can stand in for the other. Nothing is persisted: a
//! token is valid until its `exp` no matter what happens server-side. Rotation
//! is the one place where current state is consulted, by re-reading the user
//! row before minting a new access token.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::User;
use crate::db::RepositoryError;
use crate::users::UserRepository;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, wrong issuer, or not a token at all.
    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Account no longer exists")]
    AccountNotFound,

    #[error("Credential store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// The identity carried by both tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub id: i64,
    pub nickname: String,
    pub email: String,
}

impl From<&User> for IdentityClaims {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            nickname: user.nickname.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SignedClaims {
    #[serde(flatten)]
    identity: IdentityClaims,
    iss: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl KeyPair {
    fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }
}

pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
    validation: Validation,
}

impl TokenService {
    pub fn new(settings: &TokenSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.leeway = 0;

        Self {
            access: KeyPair::new(&settings.access_secret, settings.access_ttl_secs),
            refresh: KeyPair::new(&settings.refresh_secret, settings.refresh_ttl_secs),
            issuer: settings.issuer.clone(),
            validation,
        }
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh.ttl_secs
    }

    pub fn issue_token_pair(&self, claims: &IdentityClaims) -> Result<TokenPair, TokenError> {
        self.issue_token_pair_at(claims, Utc::now().timestamp())
    }

    /// Same as [`issue_token_pair`](Self::issue_token_pair) with an explicit
    /// clock, in Unix seconds.
    pub fn issue_token_pair_at(
        &self,
        claims: &IdentityClaims,
        now: i64,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(&self.access, claims, now)?,
            refresh_token: self.sign(&self.refresh, claims, now)?,
        })
    }

    pub fn issue_access(&self, claims: &IdentityClaims) -> Result<String, TokenError> {
        self.sign(&self.access, claims, Utc::now().timestamp())
    }

    pub fn verify_access(&self, token: &str) -> Result<IdentityClaims, TokenError> {
        self.verify(&self.access, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<IdentityClaims, TokenError> {
        self.verify(&self.refresh, token)
    }

    /// Mint a fresh access token from a refresh token.
    ///
    /// The embedded claims are only used to find the account by email; the
    /// new token is built from the row as it is now. A missing row fails the
    /// rotation rather than falling back to the stale claims.
    pub async fn rotate_access(
        &self,
        refresh_token: &str,
        users: &dyn UserRepository,
    ) -> Result<(String, IdentityClaims), TokenError> {
        let stale = self.verify_refresh(refresh_token)?;

        let user = users
            .find_by_email(&stale.email)
            .await?
            .ok_or(TokenError::AccountNotFound)?;

        let current = IdentityClaims::from(&user);
        let access_token = self.issue_access(&current)?;

        tracing::debug!(user_id = current.id, "Rotated access token");
        Ok((access_token, current))
    }

    fn sign(&self, keys: &KeyPair, claims: &IdentityClaims, now: i64) -> Result<String, TokenError> {
        let signed = SignedClaims {
            identity: claims.clone(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + keys.ttl_secs,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &signed, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify(&self, keys: &KeyPair, token: &str) -> Result<IdentityClaims, TokenError> {
        jsonwebtoken::decode::<SignedClaims>(token, &keys.decoding, &self.validation)
            .map(|data| data.claims.identity)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidSignature,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::users::{NewUser, SqliteUserRepository};
    use rusqlite::params;

    fn settings() -> TokenSettings {
        TokenSettings {
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
            issuer: "pickto".into(),
            access_ttl_secs: 60,
            refresh_ttl_secs: 86_400,
        }
    }

    fn claims() -> IdentityClaims {
        IdentityClaims {
            id: 7,
            nickname: "a".into(),
            email: "a@x.com".into(),
        }
    }

    #[test]
    fn access_token_round_trips_claims() {
        let service = TokenService::new(&settings());
        let pair = service.issue_token_pair(&claims()).unwrap();
        assert_eq!(service.verify_access(&pair.access_token).unwrap(), claims());
        assert_eq!(service.verify_refresh(&pair.refresh_token).unwrap(), claims());
    }

    #[test]
    fn access_token_expires_after_ttl() {
        let service = TokenService::new(&settings());
        let issued_at = Utc::now().timestamp() - 120;
        let pair = service.issue_token_pair_at(&claims(), issued_at).unwrap();

        assert!(matches!(
            service.verify_access(&pair.access_token),
            Err(TokenError::Expired)
        ));
        // refresh lives for a day, so it is still good
        assert_eq!(service.verify_refresh(&pair.refresh_token).unwrap(), claims());
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let service = TokenService::new(&settings());
        let pair = service.issue_token_pair(&claims()).unwrap();
        assert!(matches!(
            service.verify_access(&pair.refresh_token),
            Err(TokenError::InvalidSignature)
        ));
        assert!(matches!(
            service.verify_refresh(&pair.access_token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let service = TokenService::new(&settings());
        let mut other = settings();
        other.access_secret = "someone-else".into();
        let forged = TokenService::new(&other).issue_token_pair(&claims()).unwrap();
        assert!(matches!(
            service.verify_access(&forged.access_token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let service = TokenService::new(&settings());
        let mut other = settings();
        other.issuer = "elsewhere".into();
        let pair = TokenService::new(&other).issue_token_pair(&claims()).unwrap();
        assert!(matches!(
            service.verify_access(&pair.access_token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let service = TokenService::new(&settings());
        assert!(matches!(
            service.verify_access("not.a.token"),
            Err(TokenError::InvalidSignature)
        ));
        assert!(matches!(
            service.verify_access(""),
            Err(TokenError::InvalidSignature)
        ));
    }

    async fn seeded_repo() -> (crate::state::DbPool, SqliteUserRepository, IdentityClaims) {
        let pool = db::memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        let repo = SqliteUserRepository::new(pool.clone());
        let user = repo
            .insert(&NewUser {
                nickname: "a".into(),
                email: "a@x.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        (pool, repo, IdentityClaims::from(&user))
    }

    #[tokio::test]
    async fn rotation_uses_current_row() {
        let service = TokenService::new(&settings());
        let (pool, repo, original) = seeded_repo().await;
        let pair = service.issue_token_pair(&original).unwrap();

        pool.get()
            .unwrap()
            .execute(
                "UPDATE users SET nickname = 'renamed' WHERE id = ?1",
                params![original.id],
            )
            .unwrap();

        let (access, claims) = service.rotate_access(&pair.refresh_token, &repo).await.unwrap();
        assert_eq!(claims.nickname, "renamed");
        assert_eq!(claims.id, original.id);
        assert_eq!(service.verify_access(&access).unwrap(), claims);
    }

    #[tokio::test]
    async fn rotation_fails_for_deleted_account() {
        let service = TokenService::new(&settings());
        let (pool, repo, original) = seeded_repo().await;
        let pair = service.issue_token_pair(&original).unwrap();

        pool.get()
            .unwrap()
            .execute("DELETE FROM users WHERE id = ?1", params![original.id])
            .unwrap();

        let result = service.rotate_access(&pair.refresh_token, &repo).await;
        assert!(matches!(result, Err(TokenError::AccountNotFound)));
    }

    #[tokio::test]
    async fn rotation_rejects_access_token() {
        let service = TokenService::new(&settings());
        let (_pool, repo, original) = seeded_repo().await;
        let pair = service.issue_token_pair(&original).unwrap();

        let result = service.rotate_access(&pair.access_token, &repo).await;
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }
}
