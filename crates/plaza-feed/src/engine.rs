use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use plaza_core::post::DEFAULT_CONTENT_TYPE;
use plaza_core::{
    FetchSpec, FilterMode, FilterModeRef, MediaKind, MediaRef, Post, PostDraft, PostId, UserId,
};
use plaza_util_error::FmtCompact as _;
use snafu::{ensure, OptionExt as _, ResultExt as _};
use tracing::{debug, info, instrument, warn};

use crate::collab::{
    BlobStore, ContentRepository, FollowGraph, ForYouStrategy, MostRecent, ProfileDirectory,
};
use crate::cursor::PageCursor;
use crate::error::{
    BlobSnafu, BlobStoreMissingSnafu, DeleteFailedSnafu, FeedResult, FollowGraphSnafu,
    NotOwnerSnafu, ProfileDirectoryMissingSnafu, ProfileLookupSnafu, RepoError,
    UnknownUsernameSnafu,
};
use crate::merge::LiveMergePolicy;
use crate::view::FeedView;
use crate::{planner, LOG_TARGET};

pub const DEFAULT_PAGE_SIZE: NonZeroUsize = NonZeroUsize::new(20).expect("Non-zero");

#[derive(Debug, Clone, bon::Builder)]
pub struct FeedConfig {
    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: NonZeroUsize,
    #[builder(default)]
    pub live_merge: LiveMergePolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Media attached to a [`NewPost`]
#[derive(Debug, Clone)]
pub enum NewMedia {
    /// Already hosted somewhere
    Url(MediaRef),
    /// To be uploaded through the blob store first
    Upload { data: Vec<u8>, kind: MediaKind },
}

/// A post as submitted by a creator
#[derive(Debug, Clone, bon::Builder)]
pub struct NewPost {
    #[builder(into)]
    pub title: String,
    #[builder(into, default)]
    pub description: String,
    #[builder(into, default = DEFAULT_CONTENT_TYPE.to_owned())]
    pub content_type: String,
    /// The first item becomes the primary media
    #[builder(default)]
    pub media: Vec<NewMedia>,
    #[builder(default)]
    pub is_premium: bool,
    /// `false` keeps the post as a draft
    #[builder(default = true)]
    pub publish: bool,
}

/// One page of results, as put into a view
pub(crate) struct Page {
    pub posts: Vec<Post>,
    pub has_more: bool,
}

impl Page {
    fn empty() -> Self {
        Self {
            posts: vec![],
            has_more: false,
        }
    }
}

/// Everything shared by the engine and all its views
pub(crate) struct FeedCtx {
    pub repo: Arc<dyn ContentRepository>,
    pub follows: Arc<dyn FollowGraph>,
    pub blobs: Option<Arc<dyn BlobStore>>,
    pub profiles: Option<Arc<dyn ProfileDirectory>>,
    pub for_you: Arc<dyn ForYouStrategy>,
    pub config: FeedConfig,
}

impl FeedCtx {
    pub(crate) async fn fetch_page(
        &self,
        mode: FilterMode,
        viewer_id: UserId,
        cursor: &PageCursor,
    ) -> FeedResult<Page> {
        let FetchSpec::Fetch {
            filter,
            offset,
            limit,
        } = planner::plan(mode, viewer_id, cursor, self.follows.as_ref()).await?
        else {
            return Ok(Page::empty());
        };

        let raw = self.repo.fetch_page(&filter, offset, limit).await?;
        let has_more = cursor.has_more_after(raw.len());
        debug!(
            target: LOG_TARGET,
            %mode,
            offset,
            len = raw.len(),
            has_more,
            "Fetched page"
        );

        let posts = if mode == FilterMode::ForYou {
            self.select_for_you(raw, limit)
        } else {
            raw
        };

        Ok(Page { posts, has_more })
    }

    /// Apply the `for_you` strategy, keeping the candidate order
    fn select_for_you(&self, candidates: Vec<Post>, limit: usize) -> Vec<Post> {
        let selected: HashSet<PostId> = self
            .for_you
            .select(&candidates)
            .into_iter()
            .map(|p| p.id)
            .collect();
        candidates
            .into_iter()
            .filter(|p| selected.contains(&p.id))
            .take(limit)
            .collect()
    }

    /// Whether a live `post` belongs to a view in `mode`
    pub(crate) async fn live_admits(&self, mode: FilterMode, viewer_id: UserId, post: &Post) -> bool {
        let policy = self.config.live_merge;
        if !policy.admits(post, mode) {
            return false;
        }
        if !policy.needs_lookup(mode) {
            return true;
        }

        match mode {
            FilterMode::Subscribed => match self
                .follows
                .following(viewer_id)
                .await
                .context(FollowGraphSnafu)
            {
                Ok(following) => following.contains(&post.creator_id),
                Err(err) => {
                    warn!(
                        target: LOG_TARGET,
                        err = %err.fmt_compact(),
                        post_id = %post.id,
                        "Can't check live post against the follow graph, dropping"
                    );
                    false
                }
            },
            FilterMode::ForYou => !self.for_you.select(std::slice::from_ref(post)).is_empty(),
            FilterMode::All | FilterMode::Creator(_) => true,
        }
    }

    /// Delete `post_id` on behalf of `requester`, after checking ownership
    /// with the repository
    pub(crate) async fn delete_owned(&self, requester: UserId, post_id: PostId) -> FeedResult<()> {
        let post = self
            .repo
            .get(post_id)
            .await
            .context(DeleteFailedSnafu { post_id })?
            .ok_or(RepoError::NotFound { post_id })
            .context(DeleteFailedSnafu { post_id })?;
        ensure!(post.creator_id == requester, NotOwnerSnafu { post_id });

        self.repo
            .delete(post_id)
            .await
            .context(DeleteFailedSnafu { post_id })
    }
}

/// The feed service shared by all presentation surfaces
///
/// Holds no per-viewer state, every call takes the viewer explicitly.
#[derive(Clone)]
pub struct FeedEngine {
    ctx: Arc<FeedCtx>,
}

#[bon::bon]
impl FeedEngine {
    #[builder(finish_fn(name = "build"))]
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        follows: Arc<dyn FollowGraph>,
        blobs: Option<Arc<dyn BlobStore>>,
        profiles: Option<Arc<dyn ProfileDirectory>>,
        for_you: Option<Arc<dyn ForYouStrategy>>,
        #[builder(default)] config: FeedConfig,
    ) -> Self {
        Self {
            ctx: Arc::new(FeedCtx {
                repo,
                follows,
                blobs,
                profiles,
                for_you: for_you.unwrap_or_else(|| Arc::new(MostRecent)),
                config,
            }),
        }
    }
}

impl FeedEngine {
    pub fn config(&self) -> &FeedConfig {
        &self.ctx.config
    }

    /// Open a live, paginated view for `viewer_id`
    ///
    /// Starts listening for new posts before loading the first page, so
    /// nothing published in between is missed.
    pub async fn open_view(&self, viewer_id: UserId, mode: FilterMode) -> FeedResult<FeedView> {
        FeedView::open(self.ctx.clone(), viewer_id, mode).await
    }

    /// Turn a mode naming a creator by username into a [`FilterMode`]
    pub async fn resolve_mode(&self, mode: &FilterModeRef) -> FeedResult<FilterMode> {
        let username = match mode {
            FilterModeRef::Mode(mode) => return Ok(*mode),
            FilterModeRef::CreatorUsername(username) => username,
        };
        let profiles = self
            .ctx
            .profiles
            .as_ref()
            .context(ProfileDirectoryMissingSnafu)?;
        let creator_id = profiles
            .find_by_username(username)
            .await
            .context(ProfileLookupSnafu)?
            .context(UnknownUsernameSnafu { username })?;
        debug!(target: LOG_TARGET, %username, %creator_id, "Username resolved");
        Ok(FilterMode::Creator(creator_id))
    }

    /// Publish (or store as a draft) a new post by `creator_id`
    #[instrument(skip_all, fields(%creator_id))]
    pub async fn publish(&self, creator_id: UserId, new_post: NewPost) -> FeedResult<Post> {
        let NewPost {
            title,
            description,
            content_type,
            media,
            is_premium,
            publish,
        } = new_post;

        // Check what can be checked before uploading anything
        PostDraft::validate_title(&title)?;
        PostDraft::validate_media_count(media.len())?;
        for media in &media {
            if let NewMedia::Url(media_ref) = media {
                PostDraft::validate_media_url(&media_ref.url)?;
            }
        }

        let mut media_refs = Vec::with_capacity(media.len());
        for media in media {
            media_refs.push(match media {
                NewMedia::Url(media_ref) => media_ref,
                NewMedia::Upload { data, kind } => {
                    let blobs = self.ctx.blobs.as_ref().context(BlobStoreMissingSnafu)?;
                    let len = data.len();
                    let url = blobs.upload(data, kind).await.context(BlobSnafu)?;
                    debug!(target: LOG_TARGET, %url, %kind, len, "Media uploaded");
                    MediaRef::new(url, kind)
                }
            });
        }

        let draft = PostDraft::new(creator_id, title)
            .description(description)
            .content_type(content_type)
            .media(media_refs)
            .premium(is_premium)
            .publish(publish);
        draft.validate()?;

        let post = self.ctx.repo.insert(draft).await?;
        info!(
            target: LOG_TARGET,
            post_id = %post.id,
            published = post.is_published(),
            "Post created"
        );
        Ok(post)
    }

    /// Delete a post owned by `requester` without going through a view
    pub async fn delete_post(&self, requester: UserId, post_id: PostId) -> FeedResult<()> {
        self.ctx.delete_owned(requester, post_id).await
    }
}
