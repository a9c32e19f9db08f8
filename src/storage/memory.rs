use crate::storage::backend::{
    BackendError, BackendResult, Column, ColumnBackend, ConsistencyLevel, KeyRange, KeySlice,
    RowMutation,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

type Row = BTreeMap<String, Column>;
type Family = BTreeMap<Vec<u8>, Row>;

/// Single-node column backend kept in process memory.
///
/// Keys are ordered bytewise, which is what range scans rely on. Every
/// consistency level is trivially satisfied by the one replica.
#[derive(Default)]
pub struct MemoryBackend {
    families: RwLock<HashMap<String, Family>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored in a column family
    pub fn row_count(&self, column_family: &str) -> usize {
        self.families
            .read()
            .get(column_family)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl ColumnBackend for MemoryBackend {
    async fn get(
        &self,
        column_family: &str,
        key: &[u8],
        column: &str,
        _consistency: ConsistencyLevel,
    ) -> BackendResult<Column> {
        let families = self.families.read();
        families
            .get(column_family)
            .and_then(|family| family.get(key))
            .and_then(|row| row.get(column))
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn get_range_slices(
        &self,
        column_family: &str,
        columns: &[&str],
        range: &KeyRange,
        _consistency: ConsistencyLevel,
    ) -> BackendResult<Vec<KeySlice>> {
        if !range.end_key.is_empty() && range.end_key < range.start_key {
            return Err(BackendError::InvalidRequest(
                "start key sorts after end key".to_string(),
            ));
        }

        let families = self.families.read();
        let Some(family) = families.get(column_family) else {
            return Ok(Vec::new());
        };

        let upper = if range.end_key.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(range.end_key.clone())
        };
        let lower = Bound::Included(range.start_key.clone());

        let slices = family
            .range((lower, upper))
            .take(range.count)
            .map(|(key, row)| KeySlice {
                key: key.clone(),
                columns: columns
                    .iter()
                    .filter_map(|name| row.get(*name).cloned())
                    .collect(),
            })
            .collect();

        Ok(slices)
    }

    async fn batch_mutate(
        &self,
        mutations: Vec<RowMutation>,
        _consistency: ConsistencyLevel,
    ) -> BackendResult<()> {
        if let Some(bad) = mutations.iter().find(|m| m.key.is_empty()) {
            return Err(BackendError::InvalidRequest(format!(
                "empty key in column family {}",
                bad.column_family
            )));
        }

        // One write lock for the whole batch keeps every row update atomic
        let mut families = self.families.write();
        for mutation in mutations {
            let row = families
                .entry(mutation.column_family)
                .or_default()
                .entry(mutation.key)
                .or_default();

            for column in mutation.columns {
                let stale = row
                    .get(&column.name)
                    .is_some_and(|existing| existing.timestamp > column.timestamp);
                if stale {
                    tracing::trace!("Ignoring stale write to column {}", column.name);
                } else {
                    row.insert(column.name.clone(), column);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation(key: &[u8], columns: Vec<Column>) -> RowMutation {
        RowMutation {
            column_family: "cf".to_string(),
            key: key.to_vec(),
            columns,
        }
    }

    #[tokio::test]
    async fn test_get_missing_row_and_column() {
        let backend = MemoryBackend::new();
        backend
            .batch_mutate(
                vec![mutation(b"k", vec![Column::new("a", b"1".to_vec(), 1)])],
                ConsistencyLevel::Quorum,
            )
            .await
            .unwrap();

        let col = backend
            .get("cf", b"k", "a", ConsistencyLevel::One)
            .await
            .unwrap();
        assert_eq!(col.value, b"1");

        assert_eq!(
            backend.get("cf", b"k", "b", ConsistencyLevel::One).await,
            Err(BackendError::NotFound)
        );
        assert_eq!(
            backend.get("cf", b"x", "a", ConsistencyLevel::One).await,
            Err(BackendError::NotFound)
        );
        assert_eq!(
            backend.get("other", b"k", "a", ConsistencyLevel::One).await,
            Err(BackendError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_newest_timestamp_wins() {
        let backend = MemoryBackend::new();
        backend
            .batch_mutate(
                vec![mutation(b"k", vec![Column::new("a", b"new".to_vec(), 10)])],
                ConsistencyLevel::Quorum,
            )
            .await
            .unwrap();
        backend
            .batch_mutate(
                vec![mutation(b"k", vec![Column::new("a", b"old".to_vec(), 5)])],
                ConsistencyLevel::Quorum,
            )
            .await
            .unwrap();

        let col = backend
            .get("cf", b"k", "a", ConsistencyLevel::One)
            .await
            .unwrap();
        assert_eq!(col.value, b"new");
    }

    #[tokio::test]
    async fn test_range_scan_order_count_and_projection() {
        let backend = MemoryBackend::new();
        let rows = [b"c", b"a", b"d", b"b"];
        for key in rows {
            backend
                .batch_mutate(
                    vec![mutation(
                        key,
                        vec![
                            Column::new("keep", key.to_vec(), 1),
                            Column::new("drop", b"x".to_vec(), 1),
                        ],
                    )],
                    ConsistencyLevel::Quorum,
                )
                .await
                .unwrap();
        }
        assert_eq!(backend.row_count("cf"), 4);

        let range = KeyRange {
            start_key: b"b".to_vec(),
            end_key: Vec::new(),
            count: 2,
        };
        let slices = backend
            .get_range_slices("cf", &["keep"], &range, ConsistencyLevel::One)
            .await
            .unwrap();

        let keys: Vec<_> = slices.iter().map(|s| s.key.clone()).collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
        for slice in &slices {
            assert_eq!(slice.columns.len(), 1);
            assert_eq!(slice.columns[0].name, "keep");
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_key() {
        let backend = MemoryBackend::new();
        let result = backend
            .batch_mutate(vec![mutation(b"", Vec::new())], ConsistencyLevel::Quorum)
            .await;
        assert!(matches!(result, Err(BackendError::InvalidRequest(_))));
    }
}
