// Vote ledger - (user, post) like pairs
use async_trait::async_trait;
use rusqlite::params;
use serde::Serialize;

use crate::db::{constraint_kind, ConstraintKind, RepositoryError};
use crate::state::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    Added,
    /// The pair was already recorded; nothing changed.
    AlreadyPresent,
}

#[async_trait]
pub trait VoteRepository: Send + Sync {
    async fn has_voted(&self, user_id: &str, post_id: &str) -> Result<bool, RepositoryError>;

    /// Record a vote. The composite key makes this safe against a racing
    /// duplicate; a vote for an unknown post is `NotFound`.
    async fn add_vote(&self, user_id: &str, post_id: &str) -> Result<VoteOutcome, RepositoryError>;

    /// Returns whether a vote was removed.
    async fn remove_vote(&self, user_id: &str, post_id: &str) -> Result<bool, RepositoryError>;

    async fn count_votes(&self, post_id: &str) -> Result<i64, RepositoryError>;
}

pub struct SqliteVoteRepository {
    pool: DbPool,
}

impl SqliteVoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteRepository for SqliteVoteRepository {
    async fn has_voted(&self, user_id: &str, post_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let voted: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM likes WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
            |row| row.get(0),
        )?;
        Ok(voted)
    }

    async fn add_vote(&self, user_id: &str, post_id: &str) -> Result<VoteOutcome, RepositoryError> {
        let conn = self.pool.get()?;
        let result = conn.execute(
            "INSERT OR IGNORE INTO likes (user_id, post_id) VALUES (?1, ?2)",
            params![user_id, post_id],
        );

        match result {
            Ok(0) => Ok(VoteOutcome::AlreadyPresent),
            Ok(_) => Ok(VoteOutcome::Added),
            Err(e) if constraint_kind(&e) == Some(ConstraintKind::ForeignKey) => {
                Err(RepositoryError::NotFound(format!("post {}", post_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_vote(&self, user_id: &str, post_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
        )?;
        Ok(rows > 0)
    }

    async fn count_votes(&self, post_id: &str) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn ledger() -> (DbPool, SqliteVoteRepository) {
        let pool = db::memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO posts (id, uploader_id, post_name, img_extension)
                 VALUES ('p1', 'u1', 'sunset', 'png')",
                [],
            )
            .unwrap();
        (pool.clone(), SqliteVoteRepository::new(pool))
    }

    #[tokio::test]
    async fn add_check_remove() {
        let (_pool, votes) = ledger();
        assert!(!votes.has_voted("1", "p1").await.unwrap());

        assert_eq!(votes.add_vote("1", "p1").await.unwrap(), VoteOutcome::Added);
        assert!(votes.has_voted("1", "p1").await.unwrap());
        assert!(!votes.has_voted("2", "p1").await.unwrap());

        assert!(votes.remove_vote("1", "p1").await.unwrap());
        assert!(!votes.has_voted("1", "p1").await.unwrap());
        assert!(!votes.remove_vote("1", "p1").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_vote_is_absorbed() {
        let (_pool, votes) = ledger();
        votes.add_vote("1", "p1").await.unwrap();
        assert_eq!(
            votes.add_vote("1", "p1").await.unwrap(),
            VoteOutcome::AlreadyPresent
        );
        assert_eq!(votes.count_votes("p1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn vote_for_unknown_post_is_not_found() {
        let (_pool, votes) = ledger();
        let err = votes.add_vote("1", "missing").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_post_drops_its_votes() {
        let (pool, votes) = ledger();
        votes.add_vote("1", "p1").await.unwrap();
        votes.add_vote("2", "p1").await.unwrap();
        assert_eq!(votes.count_votes("p1").await.unwrap(), 2);

        pool.get()
            .unwrap()
            .execute("DELETE FROM posts WHERE id = 'p1'", [])
            .unwrap();
        assert_eq!(votes.count_votes("p1").await.unwrap(), 0);
    }
}
