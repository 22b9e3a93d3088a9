use std::ops;

use crate::{Database, DbResult};

impl Database {
    /// Walk `range` of `table` newest (highest key) first, skipping the first
    /// `offset` entries accepted by `filter_fn` and returning up to `limit`
    /// of the following ones
    pub fn paginate_table_rev<K, V, R>(
        table: &impl redb_bincode::ReadableTable<K, V>,
        range: ops::RangeInclusive<K>,
        offset: usize,
        limit: usize,
        mut filter_fn: impl FnMut(K, V) -> DbResult<Option<R>>,
    ) -> DbResult<Vec<R>>
    where
        K: bincode::Decode<()> + bincode::Encode,
        V: bincode::Decode<()> + bincode::Encode,
    {
        let mut ret = vec![];
        if limit == 0 {
            return Ok(ret);
        }

        let (start, end) = range.into_inner();
        let mut skipped = 0;

        for entry in table.range(&start..=&end)?.rev() {
            let (k, v) = entry?;

            let Some(r) = filter_fn(k.value(), v.value())? else {
                continue;
            };

            if skipped < offset {
                skipped += 1;
                continue;
            }

            ret.push(r);
            if limit <= ret.len() {
                break;
            }
        }

        Ok(ret)
    }

    /// Collect up to `limit` keys of `range`, highest first
    pub fn collect_keys_rev<K, V>(
        table: &impl redb_bincode::ReadableTable<K, V>,
        range: ops::RangeInclusive<K>,
        limit: usize,
    ) -> DbResult<Vec<K>>
    where
        K: bincode::Decode<()> + bincode::Encode,
        V: bincode::Decode<()> + bincode::Encode,
    {
        Self::paginate_table_rev(table, range, 0, limit, |k, _| Ok(Some(k)))
    }
}
