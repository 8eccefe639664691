pub mod orchestrator;
pub mod repository;

pub use orchestrator::{
    DeleteError, DeleteReceipt, DeleteStage, ReconciliationReport, UploadError,
    UploadOrchestrator, UploadReceipt, UploadStage,
};
pub use repository::{NewPost, PostRepository, SqlitePostRepository};

/// Object-store key for a post. Ties the stored image to the post's id and
/// extension, so neither may change after creation.
pub fn object_key(post_id: &str, extension: &str) -> String {
    format!("{}.{}", post_id, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_joins_id_and_extension() {
        assert_eq!(object_key("abc", "png"), "abc.png");
    }
}
