use std::collections::HashSet;

use plaza_core::{Profile, Timestamp, UserId};
use snafu::ensure;
use tracing::debug;

use crate::{
    ids_followees, ids_followers, profiles, profiles_by_username, Database, DbResult,
    IdsFolloweesRecord, IdsFollowersRecord, ProfileRecord, UsernameTakenSnafu, LOG_TARGET,
};

impl Database {
    pub fn read_followees_tx(
        id: UserId,
        ids_followees_table: &impl ids_followees::ReadableTable,
    ) -> DbResult<HashSet<UserId>> {
        Ok(ids_followees_table
            .range((id, UserId::ZERO)..=(id, UserId::MAX))?
            .map(|res| res.map(|(k, _)| k.value().1))
            .collect::<Result<HashSet<_>, _>>()?)
    }

    pub fn read_followers_tx(
        id: UserId,
        ids_followers_table: &impl ids_followers::ReadableTable,
    ) -> DbResult<HashSet<UserId>> {
        Ok(ids_followers_table
            .range((id, UserId::ZERO)..=(id, UserId::MAX))?
            .map(|res| res.map(|(k, _)| k.value().1))
            .collect::<Result<HashSet<_>, _>>()?)
    }

    /// Record that `follower` follows `followee`
    ///
    /// Returns `false` if nothing changed: the follow already existed, or
    /// it's an attempt to follow oneself.
    pub async fn follow(&self, follower: UserId, followee: UserId, now: Timestamp) -> DbResult<bool> {
        if follower == followee {
            debug!(target: LOG_TARGET, %follower, "Ignoring self-follow");
            return Ok(false);
        }

        self.write_with(|tx| {
            let mut followees_tbl = tx.open_table(&ids_followees::TABLE)?;
            let mut followers_tbl = tx.open_table(&ids_followers::TABLE)?;

            let db_key = (follower, followee);
            if followees_tbl.get(&db_key)?.is_some() {
                return Ok(false);
            }

            followees_tbl.insert(&db_key, &IdsFolloweesRecord { ts: now })?;
            followers_tbl.insert(&(followee, follower), &IdsFollowersRecord {})?;

            debug!(target: LOG_TARGET, %follower, %followee, "Follow update");
            Ok(true)
        })
        .await
    }

    /// Returns `false` if `follower` did not follow `followee`
    pub async fn unfollow(&self, follower: UserId, followee: UserId) -> DbResult<bool> {
        self.write_with(|tx| {
            let mut followees_tbl = tx.open_table(&ids_followees::TABLE)?;
            let mut followers_tbl = tx.open_table(&ids_followers::TABLE)?;

            let existed = followees_tbl.remove(&(follower, followee))?.is_some();
            followers_tbl.remove(&(followee, follower))?;

            if existed {
                debug!(target: LOG_TARGET, %follower, %followee, "Unfollow update");
            }
            Ok(existed)
        })
        .await
    }

    pub async fn get_followees(&self, id: UserId) -> DbResult<HashSet<UserId>> {
        self.read_with(|tx| Self::read_followees_tx(id, &tx.open_table(&ids_followees::TABLE)?))
            .await
    }

    pub async fn get_followers(&self, id: UserId) -> DbResult<HashSet<UserId>> {
        self.read_with(|tx| Self::read_followers_tx(id, &tx.open_table(&ids_followers::TABLE)?))
            .await
    }

    pub(crate) fn get_profile_tx(
        id: UserId,
        profiles_table: &impl profiles::ReadableTable,
    ) -> DbResult<Option<Profile>> {
        Ok(profiles_table.get(&id)?.map(|g| g.value().profile))
    }

    /// Store the profile of `id`, replacing the previous one
    ///
    /// Fails with [`crate::DbError::UsernameTaken`] if the username belongs
    /// to someone else. An empty username counts as none.
    pub async fn set_profile(&self, id: UserId, profile: Profile, now: Timestamp) -> DbResult<()> {
        self.write_with(|tx| {
            let mut profiles_tbl = tx.open_table(&profiles::TABLE)?;
            let mut usernames_tbl = tx.open_table(&profiles_by_username::TABLE)?;

            let username = profile.username.clone().filter(|u| !u.is_empty());
            if let Some(username) = &username {
                let owner = usernames_tbl.get(username)?.map(|g| g.value());
                ensure!(
                    owner.is_none_or(|owner| owner == id),
                    UsernameTakenSnafu {
                        username: username.clone()
                    }
                );
            }

            let prev_username = Self::get_profile_tx(id, &profiles_tbl)?
                .and_then(|prev| prev.username)
                .filter(|u| !u.is_empty());
            if let Some(prev_username) = prev_username {
                if Some(&prev_username) != username.as_ref() {
                    usernames_tbl.remove(&prev_username)?;
                }
            }
            if let Some(username) = &username {
                usernames_tbl.insert(username, &id)?;
            }

            profiles_tbl.insert(&id, &ProfileRecord { ts: now, profile })?;
            debug!(target: LOG_TARGET, %id, ?username, "Profile updated");
            Ok(())
        })
        .await
    }

    pub async fn get_user_id_by_username(&self, username: &str) -> DbResult<Option<UserId>> {
        let username = username.to_owned();
        self.read_with(move |tx| {
            Ok(tx
                .open_table(&profiles_by_username::TABLE)?
                .get(&username)?
                .map(|g| g.value()))
        })
        .await
    }

    pub async fn get_profile(&self, id: UserId) -> DbResult<Option<Profile>> {
        self.read_with(|tx| Self::get_profile_tx(id, &tx.open_table(&profiles::TABLE)?))
            .await
    }
}
