mod cli;
mod watch;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cli::{GlobalOpts, Opts, OptsCmd, ProfileCmd};
use plaza_core::{MediaKind, MediaRef, Profile, Timestamp, UserId};
use plaza_db::{Database, DbError};
use plaza_feed::{
    get_blob_by_url, FeedConfig, FeedEngine, FeedError, FeedItem, IdentityProvider as _,
    NewMedia, NewPost, RepoError, StaticIdentity,
};
use plaza_util_error::WhateverResult;
use snafu::{FromString as _, OptionExt as _, ResultExt as _, Snafu, Whatever};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use watch::WatchSession;

pub const PROJECT_NAME: &str = "plaza";
pub const LOG_TARGET: &str = "plaza::cli";

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Miscellaneous error: {source}"))]
    Whatever { source: Whatever },
    #[snafu(display("Data dir error: {source:?}"))]
    DataDir { source: io::Error },
    #[snafu(display("Database error: {source}"))]
    Database { source: DbError },
    #[snafu(transparent)]
    Feed { source: FeedError },
    #[snafu(display("Blob error: {source}"))]
    Blob { source: RepoError },
    #[snafu(display("No identity given, pass `--id` or set PLAZA_ID"))]
    IdRequired,
    #[snafu(display("Can't read media file {}: {source}", path.display()))]
    MediaRead { path: PathBuf, source: io::Error },
    #[snafu(display("Unknown media type of {}", path.display()))]
    MediaKind { path: PathBuf },
    #[snafu(display("Can't write {}: {source}", path.display()))]
    Write { path: PathBuf, source: io::Error },
    #[snafu(display("No such blob: {url}"))]
    BlobNotFound { url: String },
    #[snafu(display("{source}"))]
    WatchCommand { source: clap::Error },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging().context(WhateverSnafu)?;

    let opts = Opts::parse();
    let v = handle_cmd(opts).await?;
    if !v.is_null() {
        println!("{}", serde_json::to_string_pretty(&v).expect("Can't fail"));
    }
    Ok(())
}

async fn open_db(opts: &GlobalOpts) -> CliResult<Arc<Database>> {
    let db_path = Database::mk_db_path(opts.data_dir())
        .await
        .context(DataDirSnafu)?;
    Ok(Arc::new(
        Database::open(db_path).await.context(DatabaseSnafu)?,
    ))
}

fn make_engine(opts: &GlobalOpts, db: &Arc<Database>) -> FeedEngine {
    FeedEngine::builder()
        .repo(db.clone())
        .follows(db.clone())
        .blobs(db.clone())
        .profiles(db.clone())
        .config(FeedConfig::builder().page_size(opts.page_size).build())
        .build()
}

/// The acting user, with the handle from their profile
async fn identity(opts: &GlobalOpts, db: &Database) -> CliResult<StaticIdentity> {
    let Some(id) = opts.id else {
        return Ok(StaticIdentity::anonymous());
    };
    let profile = db.get_profile(id).await.context(DatabaseSnafu)?;
    Ok(StaticIdentity::new(
        id,
        profile.as_ref().and_then(Profile::handle).map(ToOwned::to_owned),
    ))
}

async fn require_id(identity: &StaticIdentity) -> CliResult<UserId> {
    Ok(identity.current_viewer().await.context(IdRequiredSnafu)?.id)
}

/// Viewers that are not signed in still get public feeds
async fn viewer_id(identity: &StaticIdentity) -> UserId {
    identity
        .current_viewer()
        .await
        .map(|identity| identity.id)
        .unwrap_or(UserId::ZERO)
}

async fn load_media(path: PathBuf) -> CliResult<NewMedia> {
    let kind = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(MediaKind::from_extension)
        .context(MediaKindSnafu { path: path.clone() })?;
    let data = tokio::fs::read(&path)
        .await
        .context(MediaReadSnafu { path })?;
    Ok(NewMedia::Upload { data, kind })
}

fn items_to_json(items: &[FeedItem]) -> serde_json::Value {
    items
        .iter()
        .map(|item| serde_json::json!({ "owned": item.owned, "post": item.post }))
        .collect()
}

async fn handle_cmd(opts: Opts) -> CliResult<serde_json::Value> {
    let Opts { global, cmd } = opts;
    if let OptsCmd::GenId = cmd {
        return Ok(serde_json::json!({ "id": UserId::random() }));
    }

    let db = open_db(&global).await?;
    let identity = identity(&global, &db).await?;

    Ok(match cmd {
        OptsCmd::GenId => unreachable!("Handled above"),
        OptsCmd::Profile(ProfileCmd::Set {
            username,
            display_name,
            avatar_url,
            banner_url,
            bio,
            website,
            creator,
        }) => {
            let id = require_id(&identity).await?;
            let mut profile = db
                .get_profile(id)
                .await
                .context(DatabaseSnafu)?
                .unwrap_or_default();
            for (field, value) in [
                (&mut profile.username, username),
                (&mut profile.display_name, display_name),
                (&mut profile.avatar_url, avatar_url),
                (&mut profile.banner_url, banner_url),
                (&mut profile.bio, bio),
                (&mut profile.website, website),
            ] {
                if let Some(value) = value {
                    *field = Some(value).filter(|v| !v.is_empty());
                }
            }
            if let Some(creator) = creator {
                profile.is_creator = creator;
            }
            db.set_profile(id, profile.clone(), Timestamp::now())
                .await
                .context(DatabaseSnafu)?;
            serde_json::to_value(profile).expect("Can't fail")
        }
        OptsCmd::Profile(ProfileCmd::Show { id }) => {
            let id = match id {
                Some(id) => id,
                None => require_id(&identity).await?,
            };
            let profile = db.get_profile(id).await.context(DatabaseSnafu)?;
            serde_json::to_value(profile).expect("Can't fail")
        }
        OptsCmd::Follow { id: followee } => {
            let id = require_id(&identity).await?;
            let changed = db
                .follow(id, followee, Timestamp::now())
                .await
                .context(DatabaseSnafu)?;
            serde_json::Value::Bool(changed)
        }
        OptsCmd::Unfollow { id: followee } => {
            let id = require_id(&identity).await?;
            let changed = db.unfollow(id, followee).await.context(DatabaseSnafu)?;
            serde_json::Value::Bool(changed)
        }
        OptsCmd::Post {
            title,
            description,
            content_type,
            media,
            media_urls,
            premium,
            draft,
        } => {
            let id = require_id(&identity).await?;
            let mut new_media = Vec::with_capacity(media.len() + media_urls.len());
            for path in media {
                new_media.push(load_media(path).await?);
            }
            new_media.extend(media_urls.into_iter().map(|url| {
                let kind = url
                    .rsplit_once('.')
                    .and_then(|(_, ext)| MediaKind::from_extension(ext))
                    .unwrap_or(MediaKind::Image);
                NewMedia::Url(MediaRef::new(url, kind))
            }));

            let post = make_engine(&global, &db)
                .publish(
                    id,
                    NewPost::builder()
                        .title(title)
                        .description(description)
                        .content_type(content_type)
                        .media(new_media)
                        .is_premium(premium)
                        .publish(!draft)
                        .build(),
                )
                .await?;
            serde_json::to_value(post).expect("Can't fail")
        }
        OptsCmd::Feed { mode, pages } => {
            let engine = make_engine(&global, &db);
            let mode = engine.resolve_mode(&mode).await?;
            let view = engine.open_view(viewer_id(&identity).await, mode).await?;
            for _ in 1..pages {
                if !view.has_more() {
                    break;
                }
                view.load_more().await?;
            }
            let out = serde_json::json!({
                "mode": mode,
                "has_more": view.has_more(),
                "items": items_to_json(&view.items()),
            });
            view.close();
            out
        }
        OptsCmd::Watch { mode } => {
            let engine = make_engine(&global, &db);
            let mode = engine.resolve_mode(&mode).await?;
            let actor = identity.current_viewer().await.map(|identity| identity.id);
            WatchSession::open(&engine, viewer_id(&identity).await, actor, mode)
                .await?
                .run()
                .await?;
            serde_json::Value::Null
        }
        OptsCmd::Delete { post_id } => {
            let id = require_id(&identity).await?;
            make_engine(&global, &db).delete_post(id, post_id).await?;
            serde_json::Value::Bool(true)
        }
        OptsCmd::GetBlob { url, out } => {
            let (kind, data) = get_blob_by_url(&db, &url)
                .await
                .context(BlobSnafu)?
                .context(BlobNotFoundSnafu { url })?;
            tokio::fs::write(&out, &data)
                .await
                .context(WriteSnafu { path: out.clone() })?;
            serde_json::json!({ "kind": kind, "len": data.len(), "path": out })
        }
    })
}

pub fn init_logging() -> WhateverResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|_| Whatever::without_source("Failed to initialize logging".to_string()))?;

    Ok(())
}
