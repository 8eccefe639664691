// Credential store - all user table access goes through here
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::db::models::User;
use crate::db::{constraint_kind, ConstraintKind, RepositoryError};
use crate::state::DbPool;

/// Fields for a user row that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub nickname: String,
    pub email: String,
    pub password_hash: String,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. A taken email is a `Conflict`.
    async fn insert(&self, user: &NewUser) -> Result<User, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
}

pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn insert(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let conn = self.pool.get()?;

        let result = conn.execute(
            "INSERT INTO users (nickname, email, password_hash) VALUES (?1, ?2, ?3)",
            params![user.nickname, user.email, user.password_hash],
        );

        match result {
            Ok(_) => Ok(User {
                id: conn.last_insert_rowid(),
                nickname: user.nickname.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
            }),
            Err(e) if constraint_kind(&e) == Some(ConstraintKind::Unique) => Err(
                RepositoryError::Conflict(format!("email {} is already registered", user.email)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;

        let user = conn
            .query_row(
                "SELECT id, nickname, email, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        nickname: row.get(1)?,
                        email: row.get(2)?,
                        password_hash: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn repo() -> (DbPool, SqliteUserRepository) {
        let pool = db::memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        (pool.clone(), SqliteUserRepository::new(pool))
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            nickname: "a".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn insert_then_find_by_email() {
        let (_pool, repo) = repo();
        let created = repo.insert(&new_user("a@x.com")).await.unwrap();
        assert!(created.id > 0);

        let found = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.nickname, "a");
        assert_eq!(found.password_hash, "hash");
    }

    #[tokio::test]
    async fn find_unknown_email_is_none() {
        let (_pool, repo) = repo();
        assert!(repo.find_by_email("nobody@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let (_pool, repo) = repo();
        repo.insert(&new_user("a@x.com")).await.unwrap();
        let err = repo.insert(&new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
