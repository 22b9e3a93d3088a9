use redb_bincode::ReadableTable as _;
use tracing::{debug, info};

use crate::{
    blobs, db_version, ids_followees, ids_followers, posts, posts_by_creator, posts_by_time,
    profiles, profiles_by_username, Database, DbResult, DbVersionTooHighSnafu, WriteTransactionCtx, LOG_TARGET,
};

impl Database {
    pub(crate) fn init_tables_tx(tx: &WriteTransactionCtx) -> DbResult<()> {
        tx.open_table(&db_version::TABLE)?;

        tx.open_table(&posts::TABLE)?;
        tx.open_table(&posts_by_time::TABLE)?;
        tx.open_table(&posts_by_creator::TABLE)?;

        tx.open_table(&ids_followees::TABLE)?;
        tx.open_table(&ids_followers::TABLE)?;
        tx.open_table(&profiles::TABLE)?;
        tx.open_table(&profiles_by_username::TABLE)?;

        tx.open_table(&blobs::TABLE)?;
        Ok(())
    }

    pub(crate) fn handle_db_ver_migrations(dbtx: &WriteTransactionCtx) -> DbResult<()> {
        const DB_VER: u64 = 0;

        let mut table_db_ver = dbtx.open_table(&db_version::TABLE)?;

        let Some(cur_db_ver) = table_db_ver.first()?.map(|g| g.1.value()) else {
            info!(target: LOG_TARGET, "Initializing new database");
            table_db_ver.insert(&(), &DB_VER)?;

            return Ok(());
        };

        if DB_VER < cur_db_ver {
            return DbVersionTooHighSnafu {
                db_ver: cur_db_ver,
                code_ver: DB_VER,
            }
            .fail();
        }

        // No migrations yet, schema v0 is the first one
        debug!(target: LOG_TARGET, db_ver = cur_db_ver, "Db version");

        Ok(())
    }

    /// Overwrite the stored schema version
    #[cfg(test)]
    pub(crate) async fn set_db_version(&self, ver: u64) -> DbResult<()> {
        self.write_with(|tx| {
            tx.open_table(&db_version::TABLE)?.insert(&(), &ver)?;
            Ok(())
        })
        .await
    }
}
