//! Sequencing of object-store and database writes for posts.
//!
//! Creation runs `Received -> ObjectWritten -> RecordInserted`; deletion runs
//! `DeleteRequested -> ObjectDeleted -> RecordDeleted`. Neither is atomic.
//! A failed insert after a successful put leaves the object behind, and the
//! row is only removed once its object is gone. [`UploadOrchestrator::reconcile`]
//! finds whatever those gaps leave behind.

use bytes::Bytes;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::Post;
use crate::db::RepositoryError;
use crate::posts::object_key;
use crate::posts::repository::{NewPost, PostRepository};
use crate::storage::{ObjectStore, ObjectStoreError};

const MAX_ID_LEN: usize = 128;
const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Received,
    ObjectWritten,
    RecordInserted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStage {
    DeleteRequested,
    ObjectDeleted,
    RecordDeleted,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::ObjectWritten => "object_written",
            Self::RecordInserted => "record_inserted",
        };
        f.write_str(name)
    }
}

impl fmt::Display for DeleteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DeleteRequested => "delete_requested",
            Self::ObjectDeleted => "object_deleted",
            Self::RecordDeleted => "record_deleted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file supplied")]
    NoFileSupplied,

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Post {0} already exists")]
    DuplicatePost(String),

    #[error("Post lookup failed: {0}")]
    Lookup(#[source] RepositoryError),

    #[error("Object store write failed for {key}: {source}")]
    ObjectStoreWriteFailed {
        key: String,
        #[source]
        source: ObjectStoreError,
    },

    /// The object under `key` was written and is still there.
    #[error("Record insert failed for {key}: {source}")]
    RecordInsertFailed {
        key: String,
        #[source]
        source: RepositoryError,
    },
}

impl UploadError {
    /// The last stage the upload reached before failing.
    pub fn stage(&self) -> UploadStage {
        match self {
            Self::RecordInsertFailed { .. } => UploadStage::ObjectWritten,
            _ => UploadStage::Received,
        }
    }
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// The row is untouched.
    #[error("Object delete failed for {key}: {source}")]
    ObjectDeleteFailed {
        key: String,
        #[source]
        source: ObjectStoreError,
    },

    #[error("Record delete failed for {key}: {source}")]
    RecordDeleteFailed {
        key: String,
        #[source]
        source: RepositoryError,
    },

    #[error("No post for {key}")]
    NotFound { key: String },
}

impl DeleteError {
    pub fn stage(&self) -> DeleteStage {
        match self {
            Self::RecordDeleteFailed { .. } | Self::NotFound { .. } => DeleteStage::ObjectDeleted,
            _ => DeleteStage::DeleteRequested,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub post: Post,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct DeleteReceipt {
    pub key: String,
}

/// Result of comparing stored objects against post rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Objects with no matching post row.
    pub orphaned_objects: Vec<String>,
    /// Post rows whose object is missing, by object key.
    pub dangling_records: Vec<String>,
    /// Orphaned objects removed during a repairing sweep.
    pub removed_objects: usize,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_objects.is_empty() && self.dangling_records.is_empty()
    }
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    objects: Arc<dyn ObjectStore>,
    posts: Arc<dyn PostRepository>,
}

impl UploadOrchestrator {
    pub fn new(objects: Arc<dyn ObjectStore>, posts: Arc<dyn PostRepository>) -> Self {
        Self { objects, posts }
    }

    pub async fn create_post(
        &self,
        post: NewPost,
        file: Option<Bytes>,
    ) -> Result<UploadReceipt, UploadError> {
        let file = match file {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(UploadError::NoFileSupplied),
        };
        validate_new_post(&post)?;

        if self.posts.exists(&post.id).await.map_err(UploadError::Lookup)? {
            return Err(UploadError::DuplicatePost(post.id));
        }

        let key = object_key(&post.id, &post.img_extension);
        tracing::info!(%key, bytes = file.len(), stage = %UploadStage::Received, "Upload received");

        // The existence check above can be stale; the create-only write is
        // what keeps another post's object from being replaced.
        match self.objects.put_new(&key, file).await {
            Ok(()) => {}
            Err(ObjectStoreError::AlreadyExists(_)) => {
                tracing::warn!(%key, "Object already stored, refusing upload");
                return Err(UploadError::DuplicatePost(post.id));
            }
            Err(source) => {
                tracing::error!(%key, error = %source, "Object store write failed");
                return Err(UploadError::ObjectStoreWriteFailed { key, source });
            }
        }
        tracing::debug!(%key, stage = %UploadStage::ObjectWritten, "Object written");

        match self.posts.insert(&post).await {
            Ok(post) => {
                tracing::info!(%key, stage = %UploadStage::RecordInserted, "Post created");
                Ok(UploadReceipt { post, key })
            }
            Err(source) => {
                // The object stays; the reconciliation sweep reports it.
                tracing::error!(%key, error = %source, "Record insert failed after object write");
                Err(UploadError::RecordInsertFailed { key, source })
            }
        }
    }

    pub async fn delete_post(
        &self,
        post_id: &str,
        extension: &str,
    ) -> Result<DeleteReceipt, DeleteError> {
        validate_identifier("postID", post_id).map_err(DeleteError::InvalidField)?;
        validate_identifier("imgExtension", extension).map_err(DeleteError::InvalidField)?;

        let key = object_key(post_id, extension);
        tracing::info!(%key, stage = %DeleteStage::DeleteRequested, "Post delete requested");

        if let Err(source) = self.objects.delete(&key).await {
            tracing::error!(%key, error = %source, "Object delete failed, keeping record");
            return Err(DeleteError::ObjectDeleteFailed { key, source });
        }
        tracing::debug!(%key, stage = %DeleteStage::ObjectDeleted, "Object deleted");

        match self.posts.delete(post_id, extension).await {
            Ok(true) => {
                tracing::info!(%key, stage = %DeleteStage::RecordDeleted, "Post deleted");
                Ok(DeleteReceipt { key })
            }
            Ok(false) => Err(DeleteError::NotFound { key }),
            Err(source) => {
                tracing::error!(%key, error = %source, "Record delete failed after object delete");
                Err(DeleteError::RecordDeleteFailed { key, source })
            }
        }
    }

    /// Compare the object store with the posts table. Idempotent; with
    /// `repair` set, orphaned objects are deleted. Dangling records are only
    /// reported since the image they pointed at cannot be recovered.
    pub async fn reconcile(&self, repair: bool) -> anyhow::Result<ReconciliationReport> {
        let stored: BTreeSet<String> = self.objects.list_keys().await?.into_iter().collect();
        let recorded: BTreeSet<String> = self
            .posts
            .list_all()
            .await?
            .iter()
            .map(Post::object_key)
            .collect();

        let mut report = ReconciliationReport {
            orphaned_objects: stored.difference(&recorded).cloned().collect(),
            dangling_records: recorded.difference(&stored).cloned().collect(),
            removed_objects: 0,
        };

        if repair {
            for key in &report.orphaned_objects {
                match self.objects.delete(key).await {
                    Ok(()) => report.removed_objects += 1,
                    Err(e) => tracing::warn!(%key, error = %e, "Could not remove orphaned object"),
                }
            }
        }

        if report.is_consistent() {
            tracing::debug!("Object store and posts table agree");
        } else {
            tracing::warn!(
                orphaned = report.orphaned_objects.len(),
                dangling = report.dangling_records.len(),
                removed = report.removed_objects,
                "Object store and posts table disagree"
            );
        }

        Ok(report)
    }
}

fn validate_identifier(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} is required", field));
    }
    if value.len() > MAX_ID_LEN {
        return Err(format!("{} must be {} characters or less", field, MAX_ID_LEN));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!(
            "{} may only contain letters, digits, '_' and '-'",
            field
        ));
    }
    Ok(())
}

fn validate_new_post(post: &NewPost) -> Result<(), UploadError> {
    validate_identifier("postID", &post.id).map_err(UploadError::InvalidField)?;
    validate_identifier("imgExtension", &post.img_extension).map_err(UploadError::InvalidField)?;

    if post.uploader_id.trim().is_empty() {
        return Err(UploadError::InvalidField("uploaderID is required".into()));
    }
    let name = post.post_name.trim();
    if name.is_empty() {
        return Err(UploadError::InvalidField("postName is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(UploadError::InvalidField(format!(
            "postName must be {} characters or less",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}
