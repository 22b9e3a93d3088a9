//! Live Merge Buffer
//!
//! Keeps the displayed sequence of a feed view. Paginated results are
//! appended at the end, live posts are put on top, and every post id is
//! present at most once. A copy of an already present post replaces it in
//! place (last write wins) without moving it.

use std::collections::HashSet;

use plaza_core::{FilterMode, Post, PostId};

/// Which live posts get merged into a view
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LiveMergePolicy {
    /// Every published post, whatever the filter mode of the view
    #[default]
    Unconditional,
    /// Only posts the current filter mode would have returned
    MatchFilter,
}

impl LiveMergePolicy {
    /// Whether the decision for `post` under `mode` needs the follow graph
    /// or the `for_you` strategy, which the buffer itself can't consult
    pub fn needs_lookup(self, mode: FilterMode) -> bool {
        self == LiveMergePolicy::MatchFilter
            && matches!(mode, FilterMode::Subscribed | FilterMode::ForYou)
    }

    /// Decide using only `post` and `mode`
    ///
    /// Drafts are never admitted. For modes where [`Self::needs_lookup`] is
    /// true this returns `true` and the caller is expected to check further.
    pub fn admits(self, post: &Post, mode: FilterMode) -> bool {
        if !post.is_published() {
            return false;
        }
        match (self, mode) {
            (LiveMergePolicy::Unconditional, _) => true,
            (LiveMergePolicy::MatchFilter, FilterMode::Creator(creator_id)) => {
                post.creator_id == creator_id
            }
            (LiveMergePolicy::MatchFilter, _) => true,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct LiveMergeBuffer {
    items: Vec<Post>,
    ids: HashSet<PostId>,
}

impl LiveMergeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Post] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, post_id: PostId) -> bool {
        self.ids.contains(&post_id)
    }

    pub fn get(&self, post_id: PostId) -> Option<&Post> {
        if !self.contains(post_id) {
            return None;
        }
        self.items.iter().find(|p| p.id == post_id)
    }

    /// Replace an already present copy in place
    ///
    /// Returns `post` back if it's not present.
    fn update(&mut self, post: Post) -> Option<Post> {
        if !self.contains(post.id) {
            return Some(post);
        }
        if let Some(existing) = self.items.iter_mut().find(|p| p.id == post.id) {
            *existing = post;
        }
        None
    }

    /// Merge a live post, returns `true` if it was new
    pub fn insert_live(&mut self, post: Post) -> bool {
        let Some(post) = self.update(post) else {
            return false;
        };
        self.ids.insert(post.id);
        self.items.insert(0, post);
        true
    }

    /// Like [`Self::insert_live`], but returns `false` only if an identical
    /// copy was already present
    pub fn insert_changes(&mut self, post: Post) -> bool {
        if self.get(post.id) == Some(&post) {
            return false;
        }
        self.insert_live(post);
        true
    }

    /// Append a freshly fetched page, returns the number of new posts
    pub fn append_page(&mut self, posts: impl IntoIterator<Item = Post>) -> usize {
        let mut appended = 0;
        for post in posts {
            if let Some(post) = self.update(post) {
                self.ids.insert(post.id);
                self.items.push(post);
                appended += 1;
            }
        }
        appended
    }

    /// Returns `true` if the post was present
    pub fn remove(&mut self, post_id: PostId) -> bool {
        if !self.ids.remove(&post_id) {
            return false;
        }
        self.items.retain(|p| p.id != post_id);
        true
    }

    pub fn replace(&mut self, posts: impl IntoIterator<Item = Post>) {
        self.items.clear();
        self.ids.clear();
        self.append_page(posts);
    }
}
