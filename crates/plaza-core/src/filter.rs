use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::{Post, UserId};

/// Which posts a feed is allowed to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Every published post
    All,
    /// Published posts of creators the viewer follows
    Subscribed,
    /// A candidate set chosen by a pluggable strategy
    ForYou,
    /// Published posts of a single creator (profile page)
    Creator(UserId),
}

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(display("Invalid filter mode: {mode}"))]
pub struct InvalidFilterModeError {
    pub mode: String,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::All => f.write_str("all"),
            FilterMode::Subscribed => f.write_str("subscribed"),
            FilterMode::ForYou => f.write_str("for_you"),
            FilterMode::Creator(id) => write!(f, "creator:{id}"),
        }
    }
}

impl FromStr for FilterMode {
    type Err = InvalidFilterModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidFilterModeError { mode: s.to_owned() };
        Ok(match s {
            "all" => FilterMode::All,
            "subscribed" => FilterMode::Subscribed,
            "for_you" | "for-you" => FilterMode::ForYou,
            other => {
                let id = other.strip_prefix("creator:").ok_or_else(invalid)?;
                FilterMode::Creator(id.parse().map_err(|_| invalid())?)
            }
        })
    }
}

/// A [`FilterMode`] as typed by a user, where a creator can also be named by
/// their username (`creator:@alice`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterModeRef {
    Mode(FilterMode),
    CreatorUsername(String),
}

impl From<FilterMode> for FilterModeRef {
    fn from(mode: FilterMode) -> Self {
        FilterModeRef::Mode(mode)
    }
}

impl fmt::Display for FilterModeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterModeRef::Mode(mode) => mode.fmt(f),
            FilterModeRef::CreatorUsername(username) => write!(f, "creator:@{username}"),
        }
    }
}

impl FromStr for FilterModeRef {
    type Err = InvalidFilterModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("creator:@") {
            Some("") => Err(InvalidFilterModeError { mode: s.to_owned() }),
            Some(username) => Ok(FilterModeRef::CreatorUsername(username.to_owned())),
            None => Ok(FilterModeRef::Mode(s.parse()?)),
        }
    }
}

/// Repository-side restriction of a fetch
///
/// Every variant implies "published only".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    Published,
    Creators(BTreeSet<UserId>),
    Creator(UserId),
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        post.is_published()
            && match self {
                PostFilter::Published => true,
                PostFilter::Creators(creators) => creators.contains(&post.creator_id),
                PostFilter::Creator(creator) => *creator == post.creator_id,
            }
    }
}

/// A bounded fetch against the content repository, as produced by the
/// planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSpec {
    /// Nothing can match, the repository does not need to be asked
    Empty,
    Fetch {
        filter: PostFilter,
        offset: usize,
        limit: usize,
    },
}

impl FetchSpec {
    pub fn is_empty(&self) -> bool {
        matches!(self, FetchSpec::Empty)
    }
}
