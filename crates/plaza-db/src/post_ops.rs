use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use itertools::Itertools as _;
use plaza_core::{Post, PostDraft, PostFilter, PostId, Profile, Timestamp, UserId};
use snafu::OptionExt as _;
use tracing::{debug, info};

use crate::{
    posts, posts_by_creator, posts_by_time, profiles, Database, DbResult, PostNotFoundSnafu,
    PostRecord, WriteTransactionCtx, LOG_TARGET,
};

impl Database {
    /// Store a draft as a new post, assigning it a fresh id
    pub async fn create_post(&self, draft: PostDraft, now: Timestamp) -> DbResult<Post> {
        let post = draft.into_post(PostId::random(), now);
        self.insert_post(post).await
    }

    /// Store `post` as is, replacing any existing post with the same id
    ///
    /// Returns the post with the author profile attached.
    pub async fn insert_post(&self, post: Post) -> DbResult<Post> {
        self.write_with(|tx| self.insert_post_tx(post, tx)).await
    }

    pub fn insert_post_tx(&self, post: Post, tx: &WriteTransactionCtx) -> DbResult<Post> {
        let mut posts_tbl = tx.open_table(&posts::TABLE)?;
        let mut posts_by_time_tbl = tx.open_table(&posts_by_time::TABLE)?;
        let mut posts_by_creator_tbl = tx.open_table(&posts_by_creator::TABLE)?;
        let profiles_tbl = tx.open_table(&profiles::TABLE)?;

        if let Some(existing) = posts_tbl.get(&post.id)?.map(|g| g.value()) {
            debug!(target: LOG_TARGET, post_id = %post.id, "Replacing existing post");
            Self::remove_post_indices_tx(
                post.id,
                &existing,
                &mut posts_by_time_tbl,
                &mut posts_by_creator_tbl,
            )?;
        }

        let record = PostRecord::from_post(&post);
        posts_tbl.insert(&post.id, &record)?;

        if let Some(published_at) = record.published_at {
            posts_by_time_tbl.insert(&(published_at, post.id), &())?;
            posts_by_creator_tbl.insert(&(record.creator_id, published_at, post.id), &())?;
        }

        let author = Self::get_profile_tx(record.creator_id, &profiles_tbl)?;
        let post = record.into_post(post.id, author.as_ref());

        info!(
            target: LOG_TARGET,
            post_id = %post.id,
            creator_id = %post.creator_id,
            published = post.is_published(),
            "New post inserted"
        );

        if post.is_published() {
            let new_posts_tx = self.new_posts_tx.clone();
            let post = post.clone();
            tx.on_commit(move || {
                // No subscribers is not an error
                let _ = new_posts_tx.send(post);
            });
        }

        Ok(post)
    }

    /// Remove a post along with all its index entries
    ///
    /// Fails with [`crate::DbError::PostNotFound`] if there's no such post.
    pub async fn delete_post(&self, post_id: PostId) -> DbResult<Post> {
        self.write_with(|tx| {
            let mut posts_tbl = tx.open_table(&posts::TABLE)?;
            let mut posts_by_time_tbl = tx.open_table(&posts_by_time::TABLE)?;
            let mut posts_by_creator_tbl = tx.open_table(&posts_by_creator::TABLE)?;

            let record = posts_tbl
                .remove(&post_id)?
                .map(|g| g.value())
                .context(PostNotFoundSnafu { post_id })?;

            Self::remove_post_indices_tx(
                post_id,
                &record,
                &mut posts_by_time_tbl,
                &mut posts_by_creator_tbl,
            )?;

            info!(target: LOG_TARGET, %post_id, "Post deleted");
            Ok(record.into_post(post_id, None))
        })
        .await
    }

    fn remove_post_indices_tx(
        post_id: PostId,
        record: &PostRecord,
        posts_by_time_tbl: &mut posts_by_time::Table,
        posts_by_creator_tbl: &mut posts_by_creator::Table,
    ) -> DbResult<()> {
        if let Some(published_at) = record.published_at {
            posts_by_time_tbl.remove(&(published_at, post_id))?;
            posts_by_creator_tbl.remove(&(record.creator_id, published_at, post_id))?;
        }
        Ok(())
    }

    pub async fn get_post(&self, post_id: PostId) -> DbResult<Option<Post>> {
        self.read_with(|tx| {
            let posts_tbl = tx.open_table(&posts::TABLE)?;
            let profiles_tbl = tx.open_table(&profiles::TABLE)?;

            let Some(record) = posts_tbl.get(&post_id)?.map(|g| g.value()) else {
                return Ok(None);
            };
            let author = Self::get_profile_tx(record.creator_id, &profiles_tbl)?;
            Ok(Some(record.into_post(post_id, author.as_ref())))
        })
        .await
    }

    /// Fetch one page of published posts matching `filter`
    ///
    /// Posts are ordered by publication time, newest first, and ties are
    /// broken by the post id, highest first.
    pub async fn fetch_posts(
        &self,
        filter: &PostFilter,
        offset: usize,
        limit: usize,
    ) -> DbResult<Vec<Post>> {
        self.read_with(|tx| {
            let posts_tbl = tx.open_table(&posts::TABLE)?;
            let posts_by_time_tbl = tx.open_table(&posts_by_time::TABLE)?;
            let posts_by_creator_tbl = tx.open_table(&posts_by_creator::TABLE)?;
            let profiles_tbl = tx.open_table(&profiles::TABLE)?;

            let ids = match filter {
                PostFilter::Published => Self::paginate_table_rev(
                    &posts_by_time_tbl,
                    (Timestamp::ZERO, PostId::ZERO)..=(Timestamp::MAX, PostId::MAX),
                    offset,
                    limit,
                    |(_, post_id), ()| Ok(Some(post_id)),
                )?,
                PostFilter::Creator(creator_id) => Self::paginate_table_rev(
                    &posts_by_creator_tbl,
                    Self::creator_range(*creator_id),
                    offset,
                    limit,
                    |(_, _, post_id), ()| Ok(Some(post_id)),
                )?,
                PostFilter::Creators(creators) => {
                    Self::fetch_creators_post_ids_tx(creators, offset, limit, &posts_by_creator_tbl)?
                }
            };

            let mut authors: HashMap<UserId, Option<Profile>> = HashMap::new();
            let mut ret = Vec::with_capacity(ids.len());
            for post_id in ids {
                let Some(record) = posts_tbl.get(&post_id)?.map(|g| g.value()) else {
                    debug!(target: LOG_TARGET, %post_id, "Index entry without a post");
                    continue;
                };
                let author = match authors.entry(record.creator_id) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => {
                        e.insert(Self::get_profile_tx(record.creator_id, &profiles_tbl)?)
                    }
                };
                ret.push(record.into_post(post_id, author.as_ref()));
            }
            Ok(ret)
        })
        .await
    }

    fn creator_range(
        creator_id: UserId,
    ) -> std::ops::RangeInclusive<(UserId, Timestamp, PostId)> {
        (creator_id, Timestamp::ZERO, PostId::ZERO)..=(creator_id, Timestamp::MAX, PostId::MAX)
    }

    /// Ids of the posts of any of `creators`, in feed order
    ///
    /// Every creator contributes at most `offset + limit` newest entries,
    /// which are then merged.
    fn fetch_creators_post_ids_tx(
        creators: &BTreeSet<UserId>,
        offset: usize,
        limit: usize,
        posts_by_creator_tbl: &impl posts_by_creator::ReadableTable,
    ) -> DbResult<Vec<PostId>> {
        let per_creator = offset.saturating_add(limit);

        let mut lists = Vec::with_capacity(creators.len());
        for creator_id in creators {
            lists.push(Self::collect_keys_rev(
                posts_by_creator_tbl,
                Self::creator_range(*creator_id),
                per_creator,
            )?);
        }

        Ok(lists
            .into_iter()
            .kmerge_by(|(_, a_ts, a_id), (_, b_ts, b_id)| (a_ts, a_id) > (b_ts, b_id))
            .skip(offset)
            .take(limit)
            .map(|(_, _, post_id)| post_id)
            .collect())
    }
}
