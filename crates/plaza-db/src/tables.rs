use bincode::{Decode, Encode};
use plaza_core::media::PostMedia;
use plaza_core::post::DEFAULT_CONTENT_TYPE;
use plaza_core::{BlobHash, MediaKind, MediaRef, Post, PostId, Profile, Timestamp, UserId};

#[macro_export]
macro_rules! def_table {
    ($(#[$outer:meta])*
        $name:ident : $k:ty => $v:ty) => {
        #[allow(unused)]
        $(#[$outer])*
        pub mod $name {
            use super::*;
            pub type Key = $k;
            pub type Value = $v;
            pub type Definition<'a> = redb_bincode::TableDefinition<'a, Key, Value>;
            pub trait ReadableTable: redb_bincode::ReadableTable<Key, Value> {}
            impl<RT> ReadableTable for RT where RT: redb_bincode::ReadableTable<Key, Value> {}
            pub type Table<'a> = redb_bincode::Table<'a, Key, Value>;
            pub const TABLE: Definition = redb_bincode::TableDefinition::new(stringify!($name));
        }
    };
}

def_table! {
    /// Tracks database/schema version
    db_version: () => u64
}

// POSTS
def_table! {
    /// All posts, including drafts
    posts: PostId => PostRecord
}
def_table! {
    /// Published posts, by publication time
    ///
    /// Iterated in reverse to get the newest-first feed order, with ties
    /// broken by the id.
    posts_by_time: (Timestamp, PostId) => ()
}
def_table! {
    /// Published posts of each creator, by publication time
    posts_by_creator: (UserId, Timestamp, PostId) => ()
}

// IDS
def_table! {
    /// `(follower, followee)`
    ids_followees: (UserId, UserId) => IdsFolloweesRecord
}
def_table! {
    /// `(followee, follower)`, reverse index of `ids_followees`
    ids_followers: (UserId, UserId) => IdsFollowersRecord
}
def_table!(profiles: UserId => ProfileRecord);
def_table! {
    /// Owner of each username in use, index of `profiles`
    profiles_by_username: String => UserId
}

// BLOBS
def_table! {
    /// Uploaded media, addressed by the content hash
    blobs: BlobHash => BlobRecord
}

/// Stored form of a [`Post`]
///
/// The secondary media are kept in their encoded string form, and the
/// author is never stored, only attached on read.
#[derive(Debug, Encode, Decode, Clone)]
pub struct PostRecord {
    pub creator_id: UserId,
    pub title: String,
    pub description: String,
    pub content_type: String,
    pub primary_media: Option<MediaRef>,
    pub secondary_media: Option<String>,
    pub is_premium: bool,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl PostRecord {
    pub fn from_post(post: &Post) -> Self {
        let (primary_media, secondary_media) = post.media().into_parts();
        Self {
            creator_id: post.creator_id,
            title: post.title.clone(),
            description: post.description.clone(),
            content_type: post.content_type.clone(),
            primary_media,
            secondary_media,
            is_premium: post.is_premium,
            published_at: post.published_at,
            created_at: post.created_at,
        }
    }

    pub fn into_post(self, id: PostId, author: Option<&Profile>) -> Post {
        let PostMedia { primary, secondary } =
            PostMedia::from_parts(self.primary_media, self.secondary_media.as_deref());
        Post {
            id,
            creator_id: self.creator_id,
            title: self.title,
            description: self.description,
            content_type: if self.content_type.is_empty() {
                DEFAULT_CONTENT_TYPE.to_owned()
            } else {
                self.content_type
            },
            primary_media: primary,
            secondary_media: secondary,
            is_premium: self.is_premium,
            published_at: self.published_at,
            created_at: self.created_at,
            author: author.map(Profile::to_author),
        }
    }
}

#[derive(Debug, Encode, Decode, Clone, Copy)]
pub struct IdsFolloweesRecord {
    /// When the follow was established
    pub ts: Timestamp,
}

#[derive(Debug, Encode, Decode, Clone, Copy)]
pub struct IdsFollowersRecord {}

#[derive(Debug, Encode, Decode, Clone)]
pub struct ProfileRecord {
    pub ts: Timestamp,
    pub profile: Profile,
}

#[derive(Debug, Encode, Decode, Clone)]
pub struct BlobRecord {
    pub kind: MediaKind,
    pub ts: Timestamp,
    pub data: Vec<u8>,
}
