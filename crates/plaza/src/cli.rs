use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use clap::{Args, Parser, Subcommand};
use plaza_core::{FilterModeRef, PostId, UserId};
use plaza_feed::DEFAULT_PAGE_SIZE;

/// Command line options for the Plaza CLI application
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub cmd: OptsCmd,
}

/// Global options that apply across all commands
#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Directory holding the database
    #[arg(env = "PLAZA_DATA_DIR", long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Identity to act as (see `gen-id`)
    #[arg(env = "PLAZA_ID", long, global = true)]
    pub id: Option<UserId>,

    /// Number of posts fetched per page
    #[arg(env = "PLAZA_PAGE_SIZE", long, global = true, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: NonZeroUsize,
}

static PROJECTS_DIR: LazyLock<directories::ProjectDirs> = LazyLock::new(|| {
    directories::ProjectDirs::from("org", "Plaza", crate::PROJECT_NAME)
        .expect("Unable to determine project's dir")
});

impl GlobalOpts {
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_deref().unwrap_or_else(|| {
            PROJECTS_DIR
                .state_dir()
                .unwrap_or_else(|| PROJECTS_DIR.data_local_dir())
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Generate a new user id
    GenId,

    #[command(subcommand)]
    Profile(ProfileCmd),

    /// Follow a creator
    Follow { id: UserId },

    /// Stop following a creator
    Unfollow { id: UserId },

    /// Create a new post
    Post {
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value = plaza_core::post::DEFAULT_CONTENT_TYPE)]
        content_type: String,

        /// Media file to upload, can be repeated (the first one is the
        /// primary media)
        #[arg(long = "media")]
        media: Vec<PathBuf>,

        /// Already hosted media, added after the uploaded ones
        #[arg(long = "media-url")]
        media_urls: Vec<String>,

        #[arg(long)]
        premium: bool,

        /// Keep as a draft instead of publishing
        #[arg(long)]
        draft: bool,
    },

    /// Print pages of a feed
    Feed {
        /// `all`, `subscribed`, `for_you`, `creator:<id>` or
        /// `creator:@<username>`
        #[arg(long, default_value = "all")]
        mode: FilterModeRef,

        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: usize,
    },

    /// Print the first page of a feed, and again on every change
    ///
    /// Reads commands (`post <title>`, `delete <post-id>`, `more`,
    /// `refresh`, `mode <mode>`, `quit`) from the standard input, one per
    /// line.
    Watch {
        #[arg(long, default_value = "all")]
        mode: FilterModeRef,
    },

    /// Delete own post
    Delete { post_id: PostId },

    /// Save an uploaded media file
    GetBlob {
        url: String,

        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProfileCmd {
    /// Update own profile; fields not passed are kept
    Set {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
        #[arg(long)]
        banner_url: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        website: Option<String>,
        /// Mark as a content creator
        #[arg(long)]
        creator: Option<bool>,
    },
    /// Show a profile (own one by default)
    Show { id: Option<UserId> },
}
