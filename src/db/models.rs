use serde::{Deserialize, Serialize};

/// A row of the `users` table. Never serialized to clients; see [`PublicUser`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub nickname: String,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            nickname: user.nickname.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub uploader_id: String,
    pub post_name: String,
    pub img_extension: String,
    pub created_at: String,
}

impl Post {
    pub fn object_key(&self) -> String {
        crate::posts::object_key(&self.id, &self.img_extension)
    }
}

/// A post as listed to clients, with its like count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub like_count: i64,
}
