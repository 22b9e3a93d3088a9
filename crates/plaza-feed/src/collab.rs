//! Contracts of the external collaborators of the engine

use std::collections::HashSet;

use plaza_core::{MediaKind, Post, PostDraft, PostFilter, PostId, UserId};
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::RepoResult;
use crate::LOG_TARGET;

/// Where the posts live
#[async_trait::async_trait]
pub trait ContentRepository: Send + Sync {
    /// One page of published posts matching `filter`, newest first with ties
    /// broken by the id (descending)
    async fn fetch_page(
        &self,
        filter: &PostFilter,
        offset: usize,
        limit: usize,
    ) -> RepoResult<Vec<Post>>;

    async fn get(&self, post_id: PostId) -> RepoResult<Option<Post>>;

    /// Store a new post, assigning its id and timestamps
    async fn insert(&self, draft: PostDraft) -> RepoResult<Post>;

    async fn delete(&self, post_id: PostId) -> RepoResult<()>;

    /// All posts published (system-wide) after the call
    fn subscribe_inserts(&self) -> InsertSubscription;
}

#[async_trait::async_trait]
pub trait FollowGraph: Send + Sync {
    /// Creators followed by `viewer_id`
    ///
    /// Always read fresh, callers do not cache the result.
    async fn following(&self, viewer_id: UserId) -> RepoResult<HashSet<UserId>>;
}

/// Resolves usernames to users
#[async_trait::async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<UserId>>;
}

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store media, returning the URL it can be referenced by
    async fn upload(&self, data: Vec<u8>, kind: MediaKind) -> RepoResult<String>;
}

/// Picks the posts shown in the `for_you` mode out of a page of candidates
pub trait ForYouStrategy: Send + Sync {
    fn select(&self, candidates: &[Post]) -> Vec<Post>;
}

/// Shows every candidate
#[derive(Debug, Default, Clone, Copy)]
pub struct MostRecent;

impl ForYouStrategy for MostRecent {
    fn select(&self, candidates: &[Post]) -> Vec<Post> {
        candidates.to_vec()
    }
}

/// Stream of newly published posts
pub struct InsertSubscription {
    rx: broadcast::Receiver<Post>,
}

impl InsertSubscription {
    pub fn new(rx: broadcast::Receiver<Post>) -> Self {
        Self { rx }
    }

    /// Next post, or `None` once the sending side is gone
    ///
    /// Posts missed because of lagging behind are skipped with a warning.
    pub async fn recv(&mut self) -> Option<Post> {
        loop {
            match self.rx.recv().await {
                Ok(post) => return Some(post),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(target: LOG_TARGET, missed, "Live subscription lagging, posts missed");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl From<broadcast::Receiver<Post>> for InsertSubscription {
    fn from(rx: broadcast::Receiver<Post>) -> Self {
        Self::new(rx)
    }
}
