use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::password::hash_password;
use crate::auth::tokens::TokenService;
use crate::config::Config;
use crate::posts::{PostRepository, SqlitePostRepository, UploadOrchestrator};
use crate::storage::ObjectStore;
use crate::users::{SqliteUserRepository, UserRepository};
use crate::votes::{SqliteVoteRepository, VoteRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Process-wide collaborators, built once at startup and handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: Arc<TokenService>,
    pub objects: Arc<dyn ObjectStore>,
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub votes: Arc<dyn VoteRepository>,
    pub uploads: UploadOrchestrator,
    /// Hash at the configured cost, checked when a login names no account.
    pub dummy_hash: Arc<str>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, objects: Arc<dyn ObjectStore>) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenService::new(&config.auth.token_settings()));
        let posts: Arc<dyn PostRepository> = Arc::new(SqlitePostRepository::new(db.clone()));
        let uploads = UploadOrchestrator::new(objects.clone(), posts.clone());
        let dummy_hash = hash_password("pickto-no-such-account", config.auth.bcrypt_cost)?;

        Ok(Self {
            users: Arc::new(SqliteUserRepository::new(db.clone())),
            votes: Arc::new(SqliteVoteRepository::new(db.clone())),
            db,
            config,
            tokens,
            objects,
            posts,
            uploads,
            dummy_hash: dummy_hash.into(),
        })
    }
}
