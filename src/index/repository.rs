//! Index metadata persistence
//!
//! Abstracts where index metadata lives. The in-memory repository is the
//! default; a durable store can be injected through `IndexManager::with_repository`.

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::errors::{IndexError, IndexResult};
use super::types::IndexInfo;

/// Index metadata store
pub trait IndexRepository: Send + Sync {
    /// Get an index by id
    fn get(&self, id: &str) -> IndexResult<Option<IndexInfo>>;

    /// All indexes, ordered by id
    fn list(&self) -> IndexResult<Vec<IndexInfo>>;

    /// Insert unless a structural duplicate (same table, same ordered columns) exists
    ///
    /// Check and insert happen under one write lock.
    fn insert_if_absent(&self, info: IndexInfo) -> IndexResult<()>;

    /// Apply a mutation to one index and return the updated entry
    fn update_with(
        &self,
        id: &str,
        mutate: &mut dyn FnMut(&mut IndexInfo),
    ) -> IndexResult<IndexInfo>;

    /// Remove an index, returning it if present
    fn remove(&self, id: &str) -> IndexResult<Option<IndexInfo>>;

    fn len(&self) -> IndexResult<usize>;

    fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory index repository
#[derive(Debug, Default)]
pub struct InMemoryIndexRepository {
    indexes: RwLock<BTreeMap<String, IndexInfo>>,
}

impl InMemoryIndexRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexRepository for InMemoryIndexRepository {
    fn get(&self, id: &str) -> IndexResult<Option<IndexInfo>> {
        let indexes = self.indexes.read().map_err(|_| IndexError::poisoned())?;
        Ok(indexes.get(id).cloned())
    }

    fn list(&self) -> IndexResult<Vec<IndexInfo>> {
        let indexes = self.indexes.read().map_err(|_| IndexError::poisoned())?;
        Ok(indexes.values().cloned().collect())
    }

    fn insert_if_absent(&self, info: IndexInfo) -> IndexResult<()> {
        let mut indexes = self.indexes.write().map_err(|_| IndexError::poisoned())?;

        if indexes
            .values()
            .any(|existing| existing.is_structural_duplicate(&info.table, &info.columns))
        {
            return Err(IndexError::duplicate(&info.table, &info.columns));
        }

        indexes.insert(info.id.clone(), info);
        Ok(())
    }

    fn update_with(
        &self,
        id: &str,
        mutate: &mut dyn FnMut(&mut IndexInfo),
    ) -> IndexResult<IndexInfo> {
        let mut indexes = self.indexes.write().map_err(|_| IndexError::poisoned())?;
        let info = indexes
            .get_mut(id)
            .ok_or_else(|| IndexError::IndexNotFound(id.to_string()))?;
        mutate(info);
        Ok(info.clone())
    }

    fn remove(&self, id: &str) -> IndexResult<Option<IndexInfo>> {
        let mut indexes = self.indexes.write().map_err(|_| IndexError::poisoned())?;
        Ok(indexes.remove(id))
    }

    fn len(&self) -> IndexResult<usize> {
        let indexes = self.indexes.read().map_err(|_| IndexError::poisoned())?;
        Ok(indexes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::{IndexConfig, IndexStatus};

    #[test]
    fn test_insert_and_get() {
        let repo = InMemoryIndexRepository::new();
        let info = IndexInfo::building(IndexConfig::new("orders", &["status"]));
        let id = info.id.clone();

        repo.insert_if_absent(info).unwrap();

        assert_eq!(repo.len().unwrap(), 1);
        assert_eq!(repo.get(&id).unwrap().unwrap().table, "orders");
    }

    #[test]
    fn test_structural_duplicate_rejected() {
        let repo = InMemoryIndexRepository::new();
        repo.insert_if_absent(IndexInfo::building(IndexConfig::new("orders", &["status"])))
            .unwrap();

        let err = repo
            .insert_if_absent(IndexInfo::building(IndexConfig::new("orders", &["status"])))
            .unwrap_err();

        assert_eq!(err.code(), "INDEX_DUPLICATE");
        assert_eq!(repo.len().unwrap(), 1);
    }

    #[test]
    fn test_update_with() {
        let repo = InMemoryIndexRepository::new();
        let info = IndexInfo::building(IndexConfig::new("orders", &["status"]));
        let id = info.id.clone();
        repo.insert_if_absent(info).unwrap();

        let updated = repo
            .update_with(&id, &mut |i| i.status = IndexStatus::Active)
            .unwrap();

        assert_eq!(updated.status, IndexStatus::Active);
        assert!(matches!(
            repo.update_with("missing", &mut |_| {}),
            Err(IndexError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_remove() {
        let repo = InMemoryIndexRepository::new();
        let info = IndexInfo::building(IndexConfig::new("orders", &["status"]));
        let id = info.id.clone();
        repo.insert_if_absent(info).unwrap();

        assert!(repo.remove(&id).unwrap().is_some());
        assert!(repo.remove(&id).unwrap().is_none());
        assert!(repo.is_empty().unwrap());
    }
}
