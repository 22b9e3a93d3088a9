use plaza_core::{BlobHash, MediaKind, Timestamp};
use tracing::debug;

use crate::{blobs, BlobRecord, Database, DbResult, LOG_TARGET};

impl Database {
    /// Store a blob, returning its content hash
    ///
    /// Storing the same content again is a no-op.
    pub async fn put_blob(&self, data: Vec<u8>, kind: MediaKind, now: Timestamp) -> DbResult<BlobHash> {
        let hash = BlobHash::of(&data);
        self.write_with(|tx| {
            let mut blobs_tbl = tx.open_table(&blobs::TABLE)?;
            if blobs_tbl.get(&hash)?.is_some() {
                debug!(target: LOG_TARGET, %hash, "Blob already stored");
                return Ok(());
            }
            let len = data.len();
            blobs_tbl.insert(&hash, &BlobRecord { kind, ts: now, data })?;
            debug!(target: LOG_TARGET, %hash, %kind, len, "Blob stored");
            Ok(())
        })
        .await?;
        Ok(hash)
    }

    pub async fn get_blob(&self, hash: BlobHash) -> DbResult<Option<BlobRecord>> {
        self.read_with(|tx| Ok(tx.open_table(&blobs::TABLE)?.get(&hash)?.map(|g| g.value())))
            .await
    }
}
