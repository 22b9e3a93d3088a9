use plaza_core::{ContentValidationError, InvalidFilterModeError, PostId};
use plaza_util_error::BoxedError;
use snafu::Snafu;

/// Failure of one of the external collaborators (content repository, follow
/// graph, blob store)
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RepoError {
    #[snafu(display("Repository unavailable"))]
    Unavailable { source: BoxedError },
    #[snafu(display("Repository storage error"))]
    Storage { source: BoxedError },
    #[snafu(display("Post not found: {post_id}"))]
    NotFound { post_id: PostId },
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FeedError {
    #[snafu(transparent)]
    InvalidFilterMode { source: InvalidFilterModeError },
    #[snafu(transparent)]
    Repository { source: RepoError },
    #[snafu(display("Follow graph lookup failed"))]
    FollowGraph { source: RepoError },
    #[snafu(display("Deleting post {post_id} failed"))]
    DeleteFailed { post_id: PostId, source: RepoError },
    #[snafu(display("Post {post_id} belongs to someone else"))]
    NotOwner { post_id: PostId },
    #[snafu(display("Another page is already being loaded"))]
    LoadInProgress,
    #[snafu(display("Feed view closed"))]
    Closed,
    #[snafu(transparent)]
    Validation { source: ContentValidationError },
    #[snafu(display("Media upload failed"))]
    Blob { source: RepoError },
    #[snafu(display("No blob store configured for media uploads"))]
    BlobStoreMissing,
    #[snafu(display("No user with username {username}"))]
    UnknownUsername { username: String },
    #[snafu(display("Profile lookup failed"))]
    ProfileLookup { source: RepoError },
    #[snafu(display("No profile directory configured to resolve usernames"))]
    ProfileDirectoryMissing,
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;
