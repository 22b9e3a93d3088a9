//! Feed View
//!
//! The consumer-facing state of one feed session: a deduplicated, ordered
//! list of posts fed by pagination and by the live insert stream.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use plaza_core::{FilterMode, Post, PostId, UserId};
use plaza_util_error::FmtCompact as _;
use snafu::{ensure, ResultExt as _};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::collab::InsertSubscription;
use crate::cursor::PageCursor;
use crate::engine::FeedCtx;
use crate::error::{ClosedSnafu, DeleteFailedSnafu, FeedResult, LoadInProgressSnafu, NotOwnerSnafu};
use crate::merge::LiveMergeBuffer;
use crate::LOG_TARGET;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub post: Post,
    /// The viewer is the creator of the post
    pub owned: bool,
}

/// A live, paginated feed for a single viewer
///
/// Cheap to clone, all clones share the same state. The live subscription
/// stops on [`FeedView::close`] or when the last clone is dropped.
#[derive(Clone)]
pub struct FeedView {
    inner: Arc<ViewInner>,
}

struct ViewInner {
    ctx: Arc<FeedCtx>,
    viewer_id: UserId,
    state: Mutex<ViewState>,
    version_tx: watch::Sender<u64>,
    /// Sending `true`, or dropping it, stops the live merge task
    stop_tx: watch::Sender<bool>,
}

struct ViewState {
    buffer: LiveMergeBuffer,
    cursor: PageCursor,
    has_more: bool,
    mode: FilterMode,
    /// Bumped by every reload and by closing, results of fetches started
    /// under an older generation are discarded
    generation: u64,
    loading: bool,
    reloading: Option<Reload>,
    /// Live posts that arrived while a reload was in flight and belong to
    /// its target mode, put back on top of its result
    live_during_reload: Vec<Post>,
    closed: bool,
}

/// A reload in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reload {
    generation: u64,
    mode: FilterMode,
}

enum Flight {
    Load,
    Reload(u64),
}

/// Clears the in-flight marker even if the fetching future gets dropped
struct FlightGuard<'v> {
    inner: &'v ViewInner,
    flight: Flight,
    armed: bool,
}

impl FlightGuard<'_> {
    fn land(&mut self, state: &mut ViewState) {
        if !self.armed {
            return;
        }
        self.armed = false;
        match self.flight {
            Flight::Load => state.loading = false,
            Flight::Reload(generation) => {
                if state.reloading.map(|r| r.generation) == Some(generation) {
                    state.reloading = None;
                    state.live_during_reload.clear();
                }
            }
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let inner = self.inner;
            self.land(&mut inner.lock_state());
        }
    }
}

impl ViewInner {
    fn lock_state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().expect("Locking failed")
    }

    fn bump_version(&self) {
        self.version_tx.send_modify(|v| *v = v.wrapping_add(1));
    }

    async fn merge_live(&self, post: Post) {
        let (mode, reload) = {
            let state = self.lock_state();
            if state.closed {
                return;
            }
            (state.mode, state.reloading)
        };

        let admitted = self.ctx.live_admits(mode, self.viewer_id, &post).await;
        // The content of a reload in flight gets replaced, so the post has to
        // be judged against the mode the reload switches to as well
        let admitted_after_reload = match reload {
            Some(reload) if reload.mode != mode => {
                self.ctx
                    .live_admits(reload.mode, self.viewer_id, &post)
                    .await
            }
            Some(_) => admitted,
            None => false,
        };

        let post_id = post.id;
        let changed = {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            // A reload started after the post was received fetches it anyway,
            // if it belongs there
            if state.reloading.is_some() && state.reloading == reload && admitted_after_reload {
                state.live_during_reload.push(post.clone());
            }
            // The mode might have changed by a reload landing in the meantime
            let admitted_now = if state.mode == mode {
                admitted
            } else if reload.map(|r| r.mode) == Some(state.mode) {
                admitted_after_reload
            } else {
                false
            };
            if !admitted_now {
                debug!(target: LOG_TARGET, %post_id, mode = %state.mode, "Live post not admitted");
                return;
            }
            state.buffer.insert_changes(post)
        };
        debug!(target: LOG_TARGET, %post_id, changed, "Live post merged");
        if changed {
            self.bump_version();
        }
    }
}

impl FeedView {
    pub(crate) async fn open(
        ctx: Arc<FeedCtx>,
        viewer_id: UserId,
        mode: FilterMode,
    ) -> FeedResult<Self> {
        // Subscribe before the first fetch, so posts published in between
        // arrive live
        let subscription = ctx.repo.subscribe_inserts();
        let (version_tx, _) = watch::channel(0);
        let (stop_tx, stop_rx) = watch::channel(false);

        let cursor = PageCursor::new(ctx.config.page_size);
        let inner = Arc::new(ViewInner {
            ctx,
            viewer_id,
            state: Mutex::new(ViewState {
                buffer: LiveMergeBuffer::new(),
                cursor,
                has_more: false,
                mode,
                generation: 0,
                loading: false,
                reloading: None,
                live_during_reload: vec![],
                closed: false,
            }),
            version_tx,
            stop_tx,
        });

        tokio::spawn(LiveMergeTask::new(Arc::downgrade(&inner), subscription, stop_rx).run());

        let view = Self { inner };
        view.reload(None).await?;
        debug!(target: LOG_TARGET, %viewer_id, %mode, "Feed view opened");
        Ok(view)
    }

    pub fn viewer_id(&self) -> UserId {
        self.inner.viewer_id
    }

    pub fn mode(&self) -> FilterMode {
        self.inner.lock_state().mode
    }

    pub fn cursor(&self) -> PageCursor {
        self.inner.lock_state().cursor
    }

    pub fn has_more(&self) -> bool {
        self.inner.lock_state().has_more
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }

    /// Current content, in display order
    pub fn items(&self) -> Vec<FeedItem> {
        let viewer_id = self.inner.viewer_id;
        self.inner
            .lock_state()
            .buffer
            .items()
            .iter()
            .map(|post| FeedItem {
                owned: post.creator_id == viewer_id,
                post: post.clone(),
            })
            .collect()
    }

    /// A counter bumped on every change of the content
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.inner.version_tx.subscribe()
    }

    /// Fetch and append the next page
    ///
    /// Returns the number of posts appended. Does not touch the repository
    /// once the end was reached. Only one load can be in flight at a time.
    pub async fn load_more(&self) -> FeedResult<usize> {
        let inner = self.inner.as_ref();
        let (mode, cursor, generation) = {
            let mut state = inner.lock_state();
            ensure!(!state.closed, ClosedSnafu);
            ensure!(!state.loading, LoadInProgressSnafu);
            if state.reloading.is_some() {
                // Would be discarded anyway, the reload resets the cursor
                debug!(target: LOG_TARGET, "Not loading more while reloading");
                return Ok(0);
            }
            if !state.has_more {
                return Ok(0);
            }
            state.loading = true;
            (state.mode, state.cursor.next(), state.generation)
        };
        let mut guard = FlightGuard {
            inner,
            flight: Flight::Load,
            armed: true,
        };

        let res = inner.ctx.fetch_page(mode, inner.viewer_id, &cursor).await;

        let appended = {
            let mut state = inner.lock_state();
            guard.land(&mut state);
            ensure!(!state.closed, ClosedSnafu);
            if state.generation != generation {
                debug!(target: LOG_TARGET, "Discarding page fetched before a reload");
                return Ok(0);
            }

            let page = res?;
            state.cursor = cursor;
            state.has_more = page.has_more;
            state.buffer.append_page(page.posts)
        };

        debug!(target: LOG_TARGET, appended, offset = cursor.offset(), "Page loaded");
        inner.bump_version();
        Ok(appended)
    }

    /// Start over from the first page
    ///
    /// The content is replaced only if the fetch succeeds.
    pub async fn refresh(&self) -> FeedResult<()> {
        self.reload(None).await
    }

    /// Start over from the first page of a different filter mode
    ///
    /// On failure the view keeps its previous mode and content.
    pub async fn switch_mode(&self, mode: FilterMode) -> FeedResult<()> {
        self.reload(Some(mode)).await
    }

    async fn reload(&self, new_mode: Option<FilterMode>) -> FeedResult<()> {
        let inner = self.inner.as_ref();
        let (mode, generation) = {
            let mut state = inner.lock_state();
            ensure!(!state.closed, ClosedSnafu);
            state.generation += 1;
            let mode = new_mode.unwrap_or(state.mode);
            state.reloading = Some(Reload {
                generation: state.generation,
                mode,
            });
            state.live_during_reload.clear();
            (mode, state.generation)
        };
        let mut guard = FlightGuard {
            inner,
            flight: Flight::Reload(generation),
            armed: true,
        };

        let cursor = PageCursor::new(inner.ctx.config.page_size);
        let res = inner.ctx.fetch_page(mode, inner.viewer_id, &cursor).await;

        let len = {
            let mut state = inner.lock_state();
            let live = std::mem::take(&mut state.live_during_reload);
            guard.land(&mut state);
            ensure!(!state.closed, ClosedSnafu);
            if state.generation != generation {
                debug!(target: LOG_TARGET, "Reload superseded by a newer one");
                return Ok(());
            }

            let page = res?;
            state.mode = mode;
            state.cursor = cursor;
            state.has_more = page.has_more;
            state.buffer.replace(page.posts);
            for post in live {
                state.buffer.insert_live(post);
            }
            state.buffer.len()
        };

        debug!(target: LOG_TARGET, %mode, len, "Feed reloaded");
        inner.bump_version();
        Ok(())
    }

    /// Show a post without waiting for it to arrive live
    ///
    /// Returns `true` if it was not present yet. A closed view ignores it.
    pub fn insert_local(&self, post: Post) -> bool {
        let (is_new, changed) = {
            let mut state = self.inner.lock_state();
            if state.closed {
                return false;
            }
            let is_new = !state.buffer.contains(post.id);
            (is_new, state.buffer.insert_changes(post))
        };
        if changed {
            self.inner.bump_version();
        }
        is_new
    }

    /// Returns `true` if the post was present. A closed view ignores it.
    pub fn remove_local(&self, post_id: PostId) -> bool {
        let removed = {
            let mut state = self.inner.lock_state();
            if state.closed {
                return false;
            }
            state.buffer.remove(post_id)
        };
        if removed {
            self.inner.bump_version();
        }
        removed
    }

    /// Delete a post owned by the viewer
    ///
    /// The post disappears from the view immediately. If the repository
    /// then fails to delete it, the error is returned but the post is not
    /// put back.
    #[instrument(skip(self))]
    pub async fn delete(&self, post_id: PostId) -> FeedResult<()> {
        let inner = self.inner.as_ref();
        let in_view = {
            let mut state = inner.lock_state();
            ensure!(!state.closed, ClosedSnafu);
            match state.buffer.get(post_id).map(|post| post.creator_id) {
                Some(creator_id) => {
                    ensure!(creator_id == inner.viewer_id, NotOwnerSnafu { post_id });
                    state.buffer.remove(post_id);
                    true
                }
                None => false,
            }
        };

        let res = if in_view {
            inner.bump_version();
            inner
                .ctx
                .repo
                .delete(post_id)
                .await
                .context(DeleteFailedSnafu { post_id })
        } else {
            inner.ctx.delete_owned(inner.viewer_id, post_id).await
        };

        match &res {
            Ok(()) => info!(target: LOG_TARGET, %post_id, "Post deleted"),
            Err(err) => {
                warn!(target: LOG_TARGET, %post_id, err = %err.fmt_compact(), "Post deletion failed")
            }
        }
        res
    }

    /// Stop live updates and discard results of fetches still in flight
    pub fn close(&self) {
        {
            let mut state = self.inner.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.generation += 1;
        }
        // The task might be gone already
        let _ = self.inner.stop_tx.send(true);
        self.inner.bump_version();
        debug!(target: LOG_TARGET, viewer_id = %self.inner.viewer_id, "Feed view closed");
    }
}

/// Merges posts from the live insert stream into a view
struct LiveMergeTask {
    view: Weak<ViewInner>,
    subscription: InsertSubscription,
    stop_rx: watch::Receiver<bool>,
}

impl LiveMergeTask {
    fn new(
        view: Weak<ViewInner>,
        subscription: InsertSubscription,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            view,
            subscription,
            stop_rx,
        }
    }

    #[instrument(name = "live-merge", skip_all)]
    async fn run(mut self) {
        loop {
            let post = tokio::select! {
                // Either a stop request or the view being dropped
                _ = self.stop_rx.changed() => break,
                post = self.subscription.recv() => {
                    let Some(post) = post else {
                        debug!(target: LOG_TARGET, "Insert stream closed");
                        break;
                    };
                    post
                }
            };

            let Some(view) = self.view.upgrade() else {
                break;
            };
            view.merge_live(post).await;
        }
        debug!(target: LOG_TARGET, "Live merge task finished");
    }
}

#[cfg(test)]
mod tests;
