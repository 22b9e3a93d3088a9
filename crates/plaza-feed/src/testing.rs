//! In-memory collaborators for tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use plaza_core::{MediaKind, Post, PostDraft, PostFilter, PostId, Timestamp, UserId};
use tokio::sync::{broadcast, watch};

use crate::collab::{
    BlobStore, ContentRepository, FollowGraph, InsertSubscription, ProfileDirectory,
};
use crate::error::{RepoError, RepoResult};
use crate::view::{FeedItem, FeedView};

pub(crate) struct MemRepo {
    posts: Mutex<Vec<Post>>,
    now: AtomicU64,
    /// Number of fetches started so far
    fetch_calls_tx: watch::Sender<usize>,
    pub fail_fetch: AtomicBool,
    pub fail_delete: AtomicBool,
    /// While `false`, fetches wait
    gate_tx: watch::Sender<bool>,
    new_posts_tx: broadcast::Sender<Post>,
}

impl MemRepo {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(vec![]),
            now: AtomicU64::new(1000),
            fetch_calls_tx: watch::channel(0).0,
            fail_fetch: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            gate_tx: watch::channel(true).0,
            new_posts_tx: broadcast::channel(100).0,
        }
    }

    /// Store a post as is, without announcing it
    pub fn seed(&self, post: Post) -> Post {
        self.posts.lock().expect("Locking failed").push(post.clone());
        post
    }

    /// Store and announce a post, like a newly published one
    pub fn publish(&self, post: Post) -> Post {
        self.seed(post.clone());
        self.announce(post.clone());
        post
    }

    /// Only announce, without storing
    pub fn announce(&self, post: Post) {
        let _ = self.new_posts_tx.send(post);
    }

    pub fn fetch_calls(&self) -> usize {
        *self.fetch_calls_tx.borrow()
    }

    /// Wait until at least `n` fetches were started
    pub async fn wait_fetch_calls(&self, n: usize) {
        let mut rx = self.fetch_calls_tx.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|calls| n <= *calls))
            .await
            .expect("Timeout waiting for fetch")
            .expect("Sender alive");
    }

    pub fn live_subscribers(&self) -> usize {
        self.new_posts_tx.receiver_count()
    }

    pub fn close_gate(&self) {
        self.gate_tx.send_replace(false);
    }

    pub fn open_gate(&self) {
        self.gate_tx.send_replace(true);
    }
}

#[async_trait::async_trait]
impl ContentRepository for MemRepo {
    async fn fetch_page(
        &self,
        filter: &PostFilter,
        offset: usize,
        limit: usize,
    ) -> RepoResult<Vec<Post>> {
        self.fetch_calls_tx.send_modify(|calls| *calls += 1);
        let mut gate_rx = self.gate_tx.subscribe();
        let _ = gate_rx.wait_for(|open| *open).await;

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable {
                source: "simulated outage".into(),
            });
        }

        let mut posts: Vec<_> = self
            .posts
            .lock()
            .expect("Locking failed")
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        posts.sort_by_key(|p| std::cmp::Reverse(p.order_key()));
        Ok(posts.into_iter().skip(offset).take(limit).collect())
    }

    async fn get(&self, post_id: PostId) -> RepoResult<Option<Post>> {
        Ok(self
            .posts
            .lock()
            .expect("Locking failed")
            .iter()
            .find(|p| p.id == post_id)
            .cloned())
    }

    async fn insert(&self, draft: PostDraft) -> RepoResult<Post> {
        let now = Timestamp(self.now.fetch_add(1, Ordering::SeqCst));
        let post = draft.into_post(PostId::random(), now);
        if post.is_published() {
            Ok(self.publish(post))
        } else {
            Ok(self.seed(post))
        }
    }

    async fn delete(&self, post_id: PostId) -> RepoResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable {
                source: "simulated outage".into(),
            });
        }
        let mut posts = self.posts.lock().expect("Locking failed");
        let len = posts.len();
        posts.retain(|p| p.id != post_id);
        if posts.len() == len {
            return Err(RepoError::NotFound { post_id });
        }
        Ok(())
    }

    fn subscribe_inserts(&self) -> InsertSubscription {
        self.new_posts_tx.subscribe().into()
    }
}

#[derive(Default)]
pub(crate) struct MemFollows {
    following: Mutex<HashMap<UserId, HashSet<UserId>>>,
}

impl MemFollows {
    pub fn follow(&self, follower: UserId, followee: UserId) {
        self.following
            .lock()
            .expect("Locking failed")
            .entry(follower)
            .or_default()
            .insert(followee);
    }
}

#[async_trait::async_trait]
impl FollowGraph for MemFollows {
    async fn following(&self, viewer_id: UserId) -> RepoResult<HashSet<UserId>> {
        Ok(self
            .following
            .lock()
            .expect("Locking failed")
            .get(&viewer_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Counts uploads, handing out made up URLs
#[derive(Default)]
pub(crate) struct MemBlobs {
    pub uploads: AtomicUsize,
}

#[async_trait::async_trait]
impl BlobStore for MemBlobs {
    async fn upload(&self, _data: Vec<u8>, kind: MediaKind) -> RepoResult<String> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://blobs.example/{n}.{kind}"))
    }
}

#[derive(Default)]
pub(crate) struct MemProfiles {
    usernames: Mutex<HashMap<String, UserId>>,
}

impl MemProfiles {
    pub fn register(&self, username: &str, id: UserId) {
        self.usernames
            .lock()
            .expect("Locking failed")
            .insert(username.to_owned(), id);
    }
}

#[async_trait::async_trait]
impl ProfileDirectory for MemProfiles {
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<UserId>> {
        Ok(self
            .usernames
            .lock()
            .expect("Locking failed")
            .get(username)
            .copied())
    }
}

pub(crate) fn post_at(creator_id: UserId, title: &str, published_at: u64) -> Post {
    PostDraft::new(creator_id, title).into_post(PostId::random(), Timestamp(published_at))
}

pub(crate) fn titles(items: &[FeedItem]) -> Vec<String> {
    items.iter().map(|i| i.post.title.clone()).collect()
}

/// Wait (with a timeout) until the items of `view` satisfy `cond`
pub(crate) async fn wait_for_items(view: &FeedView, cond: impl Fn(&[FeedItem]) -> bool) {
    let mut changes = view.subscribe_changes();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if cond(&view.items()) {
                return;
            }
            changes.changed().await.expect("View alive");
        }
    })
    .await
    .expect("Timeout waiting for view items");
}
