//! Core data model of the Plaza content feed
//!
//! Kept free of any storage or runtime concerns, so the store and the feed
//! engine can share the same types.

#[cfg(feature = "bincode")]
mod bincode;
pub mod filter;
pub mod id;
mod macros;
pub mod media;
pub mod post;
mod profile;
mod timestamp;

pub use self::filter::{
    FetchSpec, FilterMode, FilterModeRef, InvalidFilterModeError, PostFilter,
};
pub use self::id::{BlobHash, PostId, UserId};
pub use self::media::{MediaKind, MediaRef, PostMedia};
pub use self::post::{AuthorProfile, ContentValidationError, Post, PostDraft};
pub use self::profile::Profile;
pub use self::timestamp::Timestamp;
