use serde::{Deserialize, Serialize};

use crate::AuthorProfile;

/// Public profile of a user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
pub struct Profile {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub is_creator: bool,
}

impl Profile {
    /// The subset of the profile that gets attached to posts
    pub fn to_author(&self) -> AuthorProfile {
        AuthorProfile {
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }

    /// Name to display: display name, then username, then nothing
    pub fn handle(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .filter(|s| !s.is_empty())
    }
}
