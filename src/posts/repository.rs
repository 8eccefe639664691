// Post repository - isolates the posts table
use async_trait::async_trait;
use rusqlite::{params, Row};

use crate::db::models::{Post, PostSummary};
use crate::db::{constraint_kind, ConstraintKind, RepositoryError};
use crate::state::DbPool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub id: String,
    pub uploader_id: String,
    pub post_name: String,
    pub img_extension: String,
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Post>, RepositoryError>;

    /// All posts, newest first, with their like counts.
    async fn list_with_votes(&self) -> Result<Vec<PostSummary>, RepositoryError>;

    async fn exists(&self, id: &str) -> Result<bool, RepositoryError>;

    /// Insert a post. A taken id is a `Conflict`.
    async fn insert(&self, post: &NewPost) -> Result<Post, RepositoryError>;

    /// Delete the post matching both id and extension. Returns whether a row went away.
    async fn delete(&self, id: &str, img_extension: &str) -> Result<bool, RepositoryError>;
}

pub struct SqlitePostRepository {
    pool: DbPool,
}

impl SqlitePostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        uploader_id: row.get(1)?,
        post_name: row.get(2)?,
        img_extension: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn list_all(&self) -> Result<Vec<Post>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT id, uploader_id, post_name, img_extension, created_at
             FROM posts
             ORDER BY created_at DESC, id",
        )?;

        let posts = stmt
            .query_map([], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    async fn list_with_votes(&self) -> Result<Vec<PostSummary>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT p.id, p.uploader_id, p.post_name, p.img_extension, p.created_at,
                    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id)
             FROM posts p
             ORDER BY p.created_at DESC, p.id",
        )?;

        let posts = stmt
            .query_map([], |row| {
                Ok(PostSummary {
                    post: post_from_row(row)?,
                    like_count: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    async fn exists(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn insert(&self, post: &NewPost) -> Result<Post, RepositoryError> {
        let conn = self.pool.get()?;

        let result = conn.query_row(
            "INSERT INTO posts (id, uploader_id, post_name, img_extension)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, uploader_id, post_name, img_extension, created_at",
            params![post.id, post.uploader_id, post.post_name, post.img_extension],
            post_from_row,
        );

        match result {
            Ok(post) => Ok(post),
            Err(e) if constraint_kind(&e) == Some(ConstraintKind::Unique) => Err(
                RepositoryError::Conflict(format!("post {} already exists", post.id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str, img_extension: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM posts WHERE id = ?1 AND img_extension = ?2",
            params![id, img_extension],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn repo() -> (DbPool, SqlitePostRepository) {
        let pool = db::memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        (pool.clone(), SqlitePostRepository::new(pool))
    }

    fn new_post(id: &str) -> NewPost {
        NewPost {
            id: id.into(),
            uploader_id: "u1".into(),
            post_name: "sunset".into(),
            img_extension: "png".into(),
        }
    }

    #[tokio::test]
    async fn insert_list_delete() {
        let (_pool, repo) = repo();
        let created = repo.insert(&new_post("p1")).await.unwrap();
        assert_eq!(created.id, "p1");
        assert_eq!(created.object_key(), "p1.png");
        assert!(!created.created_at.is_empty());

        assert!(repo.exists("p1").await.unwrap());
        assert_eq!(repo.list_all().await.unwrap().len(), 1);

        assert!(repo.delete("p1", "png").await.unwrap());
        assert!(!repo.exists("p1").await.unwrap());
        assert!(!repo.delete("p1", "png").await.unwrap());
    }

    #[tokio::test]
    async fn delete_requires_matching_extension() {
        let (_pool, repo) = repo();
        repo.insert(&new_post("p1")).await.unwrap();
        assert!(!repo.delete("p1", "jpg").await.unwrap());
        assert!(repo.exists("p1").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_id_is_conflict() {
        let (_pool, repo) = repo();
        repo.insert(&new_post("p1")).await.unwrap();
        let err = repo.insert(&new_post("p1")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn listing_includes_like_counts() {
        let (pool, repo) = repo();
        repo.insert(&new_post("p1")).await.unwrap();
        repo.insert(&new_post("p2")).await.unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "INSERT INTO likes (user_id, post_id) VALUES ('1', 'p1');
                 INSERT INTO likes (user_id, post_id) VALUES ('2', 'p1');",
            )
            .unwrap();

        let listed = repo.list_with_votes().await.unwrap();
        let count_for = |id: &str| {
            listed
                .iter()
                .find(|s| s.post.id == id)
                .map(|s| s.like_count)
                .unwrap()
        };
        assert_eq!(count_for("p1"), 2);
        assert_eq!(count_for("p2"), 0);
    }
}
