//! Interactive feed session
//!
//! The database file can only be opened by one process at a time, so
//! everything that should show up live in a watched feed has to be done
//! from within the watching process. Commands are read line by line from
//! the standard input.

use clap::{Parser, Subcommand};
use plaza_core::{FilterMode, FilterModeRef, PostId, UserId};
use plaza_feed::{FeedEngine, FeedView, NewPost};
use plaza_util_error::FmtCompact as _;
use snafu::{OptionExt as _, ResultExt as _};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::{debug, info, warn};

use crate::{items_to_json, CliError, CliResult, IdRequiredSnafu, WatchCommandSnafu, LOG_TARGET};

/// One line typed while watching a feed
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct WatchLine {
    #[command(subcommand)]
    pub cmd: WatchCmd,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum WatchCmd {
    /// Publish a post, the rest of the line is the title
    Post {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        title: Vec<String>,
    },
    /// Delete own post
    Delete { post_id: PostId },
    /// Load the next page
    More,
    /// Start over from the first page
    Refresh,
    /// Switch to a different filter mode
    Mode { mode: FilterModeRef },
    /// Stop watching
    #[command(alias = "exit")]
    Quit,
}

impl WatchCmd {
    pub fn parse_line(line: &str) -> Result<Option<Self>, clap::Error> {
        let mut args = line.split_whitespace().peekable();
        if args.peek().is_none() {
            return Ok(None);
        }
        Ok(Some(WatchLine::try_parse_from(args)?.cmd))
    }
}

pub struct WatchSession<'e> {
    engine: &'e FeedEngine,
    view: FeedView,
    /// Signed in user, needed to post and delete
    actor: Option<UserId>,
}

impl<'e> WatchSession<'e> {
    pub async fn open(
        engine: &'e FeedEngine,
        viewer_id: UserId,
        actor: Option<UserId>,
        mode: FilterMode,
    ) -> CliResult<Self> {
        let view = engine.open_view(viewer_id, mode).await?;
        Ok(Self {
            engine,
            view,
            actor,
        })
    }

    pub fn view(&self) -> &FeedView {
        &self.view
    }

    /// Returns `false` once the session should end
    pub async fn handle_line(&self, line: &str) -> CliResult<bool> {
        let Some(cmd) = WatchCmd::parse_line(line).context(WatchCommandSnafu)? else {
            return Ok(true);
        };
        debug!(target: LOG_TARGET, ?cmd, "Watch command");

        match cmd {
            WatchCmd::Post { title } => {
                let creator_id = self.actor.context(IdRequiredSnafu)?;
                let post = self
                    .engine
                    .publish(creator_id, NewPost::builder().title(title.join(" ")).build())
                    .await?;
                info!(target: LOG_TARGET, post_id = %post.id, "Posted");
            }
            WatchCmd::Delete { post_id } => {
                self.actor.context(IdRequiredSnafu)?;
                self.view.delete(post_id).await?;
            }
            WatchCmd::More => {
                let appended = self.view.load_more().await?;
                info!(target: LOG_TARGET, appended, has_more = self.view.has_more(), "Loaded more");
            }
            WatchCmd::Refresh => self.view.refresh().await?,
            WatchCmd::Mode { mode } => {
                let mode = self.engine.resolve_mode(&mode).await?;
                self.view.switch_mode(mode).await?;
            }
            WatchCmd::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Print the view on every change, handling commands from the standard
    /// input, until `quit` or Ctrl-C
    pub async fn run(self) -> CliResult<()> {
        let mut changes = self.view.subscribe_changes();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        info!(
            target: LOG_TARGET,
            mode = %self.view.mode(),
            "Watching feed, type `help` for commands, Ctrl-C to stop"
        );

        print_items(&self.view);
        loop {
            tokio::select! {
                res = changes.changed() => {
                    if res.is_err() {
                        break;
                    }
                    changes.borrow_and_update();
                    print_items(&self.view);
                }
                line = lines.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) => match self.handle_line(&line).await {
                            Ok(true) => {}
                            Ok(false) => break,
                            // Usage errors and `help`
                            Err(CliError::WatchCommand { source }) => eprintln!("{source}"),
                            Err(err) => warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Command failed"),
                        },
                        Ok(None) => {
                            debug!(target: LOG_TARGET, "Standard input closed");
                            stdin_open = false;
                        }
                        Err(err) => {
                            warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Can't read standard input");
                            stdin_open = false;
                        }
                    }
                }
                res = tokio::signal::ctrl_c() => {
                    if let Err(err) = res {
                        warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Can't listen for Ctrl-C");
                    }
                    break;
                }
            }
        }
        self.view.close();
        Ok(())
    }
}

fn print_items(view: &FeedView) {
    println!(
        "{}",
        serde_json::to_string_pretty(&items_to_json(&view.items())).expect("Can't fail")
    );
}
