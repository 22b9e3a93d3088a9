//! Collaborator implementations on top of the embedded [`Database`]

use std::collections::HashSet;

use plaza_core::{BlobHash, MediaKind, Post, PostDraft, PostFilter, PostId, Timestamp, UserId};
use plaza_db::{Database, DbError};

use crate::collab::{
    BlobStore, ContentRepository, FollowGraph, InsertSubscription, ProfileDirectory,
};
use crate::error::{RepoError, RepoResult};

fn into_repo_error(err: DbError) -> RepoError {
    match err {
        DbError::PostNotFound { post_id, .. } => RepoError::NotFound { post_id },
        err => RepoError::Storage {
            source: Box::new(err),
        },
    }
}

#[async_trait::async_trait]
impl ContentRepository for Database {
    async fn fetch_page(
        &self,
        filter: &PostFilter,
        offset: usize,
        limit: usize,
    ) -> RepoResult<Vec<Post>> {
        self.fetch_posts(filter, offset, limit)
            .await
            .map_err(into_repo_error)
    }

    async fn get(&self, post_id: PostId) -> RepoResult<Option<Post>> {
        self.get_post(post_id).await.map_err(into_repo_error)
    }

    async fn insert(&self, draft: PostDraft) -> RepoResult<Post> {
        self.create_post(draft, Timestamp::now())
            .await
            .map_err(into_repo_error)
    }

    async fn delete(&self, post_id: PostId) -> RepoResult<()> {
        self.delete_post(post_id).await.map_err(into_repo_error)?;
        Ok(())
    }

    fn subscribe_inserts(&self) -> InsertSubscription {
        self.new_posts_subscribe().into()
    }
}

#[async_trait::async_trait]
impl FollowGraph for Database {
    async fn following(&self, viewer_id: UserId) -> RepoResult<HashSet<UserId>> {
        self.get_followees(viewer_id).await.map_err(into_repo_error)
    }
}

#[async_trait::async_trait]
impl ProfileDirectory for Database {
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<UserId>> {
        self.get_user_id_by_username(username)
            .await
            .map_err(into_repo_error)
    }
}

#[async_trait::async_trait]
impl BlobStore for Database {
    async fn upload(&self, data: Vec<u8>, kind: MediaKind) -> RepoResult<String> {
        let hash = self
            .put_blob(data, kind, Timestamp::now())
            .await
            .map_err(into_repo_error)?;
        Ok(hash.to_url())
    }
}

/// Read back media uploaded through the [`BlobStore`] of a [`Database`]
///
/// `None` if `url` does not point into the database, or the blob is not
/// there.
pub async fn get_blob_by_url(
    db: &Database,
    url: &str,
) -> RepoResult<Option<(MediaKind, Vec<u8>)>> {
    let Some(hash) = BlobHash::from_url(url) else {
        return Ok(None);
    };
    Ok(db
        .get_blob(hash)
        .await
        .map_err(into_repo_error)?
        .map(|blob| (blob.kind, blob.data)))
}
