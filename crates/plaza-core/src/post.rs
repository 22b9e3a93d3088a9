use serde::{Deserialize, Serialize};
use snafu::{ensure, Snafu};

use crate::media::{MAX_SECONDARY_MEDIA, MediaRef, PostMedia};
use crate::{PostId, Timestamp, UserId};

pub const DEFAULT_CONTENT_TYPE: &str = "post";
pub const MAX_TITLE_LEN: usize = 300;

/// Denormalized author information attached to a [`Post`] when it is read
///
/// Only a snapshot for display. The authoritative profile lives with the
/// identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
pub struct AuthorProfile {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub creator_id: UserId,
    pub title: String,
    pub description: String,
    pub content_type: String,
    pub primary_media: Option<MediaRef>,
    pub secondary_media: Vec<MediaRef>,
    pub is_premium: bool,
    /// `None` for a draft
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub author: Option<AuthorProfile>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    /// Key used to order published posts: newest first, ties broken by id
    /// (both descending)
    pub fn order_key(&self) -> (Timestamp, PostId) {
        (self.published_at.unwrap_or(Timestamp::ZERO), self.id)
    }

    pub fn media(&self) -> PostMedia {
        PostMedia {
            primary: self.primary_media.clone(),
            secondary: self.secondary_media.clone(),
        }
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ContentValidationError {
    #[snafu(display("Title must not be empty"))]
    EmptyTitle,
    #[snafu(display("Title longer than {max} characters"))]
    TitleTooLong { max: usize },
    #[snafu(display("At most {max} secondary media items allowed, got {count}"))]
    TooManyMedia { max: usize, count: usize },
    #[snafu(display("Invalid media url: {url}"))]
    InvalidMediaUrl { url: String },
}

pub type ContentValidationResult<T> = std::result::Result<T, ContentValidationError>;

/// A post as submitted by a creator, before the repository assigns it an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub creator_id: UserId,
    pub title: String,
    pub description: String,
    pub content_type: String,
    pub media: Vec<MediaRef>,
    pub is_premium: bool,
    /// Publish immediately instead of keeping as a draft
    pub publish: bool,
}

impl PostDraft {
    pub fn new(creator_id: UserId, title: impl Into<String>) -> Self {
        Self {
            creator_id,
            title: title.into(),
            description: String::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            media: vec![],
            is_premium: false,
            publish: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn media(mut self, media: impl IntoIterator<Item = MediaRef>) -> Self {
        self.media = media.into_iter().collect();
        self
    }

    pub fn premium(mut self, is_premium: bool) -> Self {
        self.is_premium = is_premium;
        self
    }

    pub fn publish(mut self, publish: bool) -> Self {
        self.publish = publish;
        self
    }

    pub fn validate(&self) -> ContentValidationResult<()> {
        Self::validate_title(&self.title)?;
        Self::validate_media_count(self.media.len())?;
        for media in &self.media {
            Self::validate_media_url(&media.url)?;
        }
        Ok(())
    }

    pub fn validate_title(title: &str) -> ContentValidationResult<()> {
        let title = title.trim();
        ensure!(!title.is_empty(), EmptyTitleSnafu);
        ensure!(
            title.chars().count() <= MAX_TITLE_LEN,
            TitleTooLongSnafu { max: MAX_TITLE_LEN }
        );
        Ok(())
    }

    /// `count` includes the primary media
    pub fn validate_media_count(count: usize) -> ContentValidationResult<()> {
        let secondary = count.saturating_sub(1);
        ensure!(
            secondary <= MAX_SECONDARY_MEDIA,
            TooManyMediaSnafu {
                max: MAX_SECONDARY_MEDIA,
                count: secondary,
            }
        );
        Ok(())
    }

    pub fn validate_media_url(url: &str) -> ContentValidationResult<()> {
        ensure!(
            url::Url::parse(url).is_ok(),
            InvalidMediaUrlSnafu { url }
        );
        Ok(())
    }

    /// Turn into a [`Post`] once the repository assigned the identity and
    /// timestamps
    pub fn into_post(self, id: PostId, created_at: Timestamp) -> Post {
        let PostMedia { primary, secondary } = PostMedia::from_list(self.media);
        Post {
            id,
            creator_id: self.creator_id,
            title: self.title.trim().to_owned(),
            description: self.description,
            content_type: self.content_type,
            primary_media: primary,
            secondary_media: secondary,
            is_premium: self.is_premium,
            published_at: self.publish.then_some(created_at),
            created_at,
            author: None,
        }
    }
}
