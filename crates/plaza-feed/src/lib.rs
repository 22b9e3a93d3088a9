//! Feed Synchronization Engine
//!
//! Answers paginated, filtered queries over the content repository and
//! merges the live stream of newly published posts into them, giving each
//! consumer one consistent and deduplicated [`FeedView`].

pub mod collab;
pub mod cursor;
mod db;
mod engine;
mod error;
pub mod identity;
pub mod merge;
pub mod planner;
mod view;

pub use self::collab::{
    BlobStore, ContentRepository, FollowGraph, ForYouStrategy, InsertSubscription, MostRecent,
    ProfileDirectory,
};
pub use self::cursor::PageCursor;
pub use self::db::get_blob_by_url;
pub use self::engine::{DEFAULT_PAGE_SIZE, FeedConfig, FeedEngine, NewMedia, NewPost};
pub use self::error::{FeedError, FeedResult, RepoError, RepoResult};
pub use self::identity::{Identity, IdentityProvider, StaticIdentity};
pub use self::merge::{LiveMergeBuffer, LiveMergePolicy};
pub use self::view::{FeedItem, FeedView};

const LOG_TARGET: &str = "plaza::feed";

#[cfg(test)]
mod testing;
