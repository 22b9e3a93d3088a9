//! Media Descriptor Codec
//!
//! A post carries its media in two places: a single structured primary slot
//! and a list of secondary items stored as one compact string. This module
//! converts between that storage form and a plain ordered list of
//! [`MediaRef`]s.
//!
//! Decoding never fails. Anything that can't be understood is dropped, and
//! a completely malformed string decodes to an empty list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::Snafu;
use tracing::debug;

const LOG_TARGET: &str = "plaza::media";

/// Maximum number of secondary media items a post can carry
pub const MAX_SECONDARY_MEDIA: usize = 5;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Snafu)]
#[snafu(display("Unknown media kind: {kind}"))]
pub struct UnknownMediaKindError {
    kind: String,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Guess the kind from a mime type like `image/png`
    pub fn from_mime(mime: &str) -> Option<Self> {
        let (top, _) = mime.split_once('/')?;
        top.parse().ok()
    }

    /// Guess the kind from a file extension (without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" => Some(MediaKind::Image),
            "mp4" | "webm" | "mov" | "mkv" | "m4v" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = UnknownMediaKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => UnknownMediaKindSnafu { kind: other }.fail(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
pub struct MediaRef {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

impl MediaRef {
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::new(url, MediaKind::Image)
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self::new(url, MediaKind::Video)
    }
}

/// Lenient shape used only for decoding, so that a single bad entry does not
/// take the whole list down with it
#[derive(Deserialize)]
struct MediaRefRaw {
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Decode the compact secondary media string
pub fn decode(raw: Option<&str>) -> Vec<MediaRef> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return vec![];
    };

    let entries = match serde_json::from_str::<Vec<MediaRefRaw>>(raw) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(target: LOG_TARGET, %err, "Ignoring malformed media descriptor");
            return vec![];
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.url?;
            let kind = entry.kind?.parse().ok()?;
            Some(MediaRef { url, kind })
        })
        .collect()
}

/// Encode media items into the compact string form
///
/// An empty list is represented as absent.
pub fn encode(media: &[MediaRef]) -> Option<String> {
    if media.is_empty() {
        return None;
    }
    Some(serde_json::to_string(media).expect("Can't fail"))
}

/// All media of a post, primary (if any) first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostMedia {
    pub primary: Option<MediaRef>,
    pub secondary: Vec<MediaRef>,
}

impl PostMedia {
    pub fn from_parts(primary: Option<MediaRef>, raw_secondary: Option<&str>) -> Self {
        Self {
            primary,
            secondary: decode(raw_secondary),
        }
    }

    /// Build from an ordered list, where the first item takes the primary
    /// slot
    pub fn from_list(list: impl IntoIterator<Item = MediaRef>) -> Self {
        let mut iter = list.into_iter();
        Self {
            primary: iter.next(),
            secondary: iter.collect(),
        }
    }

    pub fn into_parts(self) -> (Option<MediaRef>, Option<String>) {
        let secondary = encode(&self.secondary);
        (self.primary, secondary)
    }

    pub fn to_list(&self) -> Vec<MediaRef> {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_empty()
    }
}
