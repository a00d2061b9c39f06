//! Materialized views
//!
//! A view is a named query whose rows are materialized on refresh. The
//! default manager materializes against the memory tier; views whose
//! dataset is not loaded there stay empty until it is.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{EngineError, EngineResult};
use crate::memory::InMemoryAnalyticsEngine;
use crate::query::Query;

/// Requested view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    pub sql: String,
    pub tenant_id: String,
    /// Refresh interval for background refresh
    pub refresh_interval_secs: u64,
}

impl ViewDefinition {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            tenant_id: String::new(),
            refresh_interval_secs: 300,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_secs = interval.as_secs();
        self
    }
}

/// Current view state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewInfo {
    pub name: String,
    pub sql: String,
    pub tenant_id: String,
    pub refresh_interval_secs: u64,
    pub created_at: DateTime<Utc>,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub refresh_count: u64,
    pub row_count: usize,
}

impl ViewInfo {
    /// True if the view was never refreshed or its interval has elapsed
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_refreshed {
            None => true,
            Some(at) => now - at >= chrono::Duration::seconds(self.refresh_interval_secs as i64),
        }
    }
}

#[async_trait]
pub trait MaterializedViewManager: Send + Sync {
    async fn create_view(&self, definition: ViewDefinition) -> EngineResult<ViewInfo>;

    async fn refresh_view(&self, name: &str) -> EngineResult<ViewInfo>;

    fn get_all_views(&self) -> Vec<ViewInfo>;

    /// Fraction of view lookups served from a materialization
    fn get_hit_rate(&self) -> f64;
}

struct MaterializedView {
    info: ViewInfo,
    rows: Option<Vec<Value>>,
}

/// Views held in process, materialized through the memory tier
pub struct InMemoryViewManager {
    views: RwLock<BTreeMap<String, MaterializedView>>,
    memory: Option<Arc<InMemoryAnalyticsEngine>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryViewManager {
    pub fn new() -> Self {
        Self {
            views: RwLock::new(BTreeMap::new()),
            memory: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_memory(mut self, memory: Arc<InMemoryAnalyticsEngine>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Materialized rows of a view, counted toward the hit rate
    pub fn lookup(&self, name: &str) -> Option<Vec<Value>> {
        let rows = self
            .views
            .read()
            .ok()
            .and_then(|views| views.get(name).and_then(|v| v.rows.clone()));
        match rows {
            Some(_) => self.hits.fetch_add(1, Ordering::SeqCst),
            None => self.misses.fetch_add(1, Ordering::SeqCst),
        };
        rows
    }

    async fn materialize(&self, sql: &str) -> EngineResult<Option<Vec<Value>>> {
        let memory = match &self.memory {
            Some(memory) => memory,
            None => return Ok(None),
        };
        let query = Query::new(sql);
        match query.dataset_name() {
            Some(dataset) if memory.has_dataset(&dataset) => {
                let output = memory.execute_query(&query).await?;
                Ok(Some(output.rows))
            }
            _ => Ok(None),
        }
    }
}

impl Default for InMemoryViewManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MaterializedViewManager for InMemoryViewManager {
    async fn create_view(&self, definition: ViewDefinition) -> EngineResult<ViewInfo> {
        if definition.name.trim().is_empty() {
            return Err(EngineError::InvalidQuery("view name is empty".to_string()));
        }
        if definition.sql.trim().is_empty() {
            return Err(EngineError::InvalidQuery(format!(
                "view {} has no query",
                definition.name
            )));
        }
        if definition.refresh_interval_secs == 0 {
            return Err(EngineError::InvalidQuery(format!(
                "view {} has a zero refresh interval",
                definition.name
            )));
        }

        let info = ViewInfo {
            name: definition.name.clone(),
            sql: definition.sql,
            tenant_id: definition.tenant_id,
            refresh_interval_secs: definition.refresh_interval_secs,
            created_at: Utc::now(),
            last_refreshed: None,
            refresh_count: 0,
            row_count: 0,
        };

        let mut views = self.views.write().map_err(|_| EngineError::poisoned())?;
        views.insert(
            definition.name,
            MaterializedView {
                info: info.clone(),
                rows: None,
            },
        );
        Ok(info)
    }

    async fn refresh_view(&self, name: &str) -> EngineResult<ViewInfo> {
        let sql = {
            let views = self.views.read().map_err(|_| EngineError::poisoned())?;
            views
                .get(name)
                .map(|v| v.info.sql.clone())
                .ok_or_else(|| EngineError::ViewNotFound(name.to_string()))?
        };

        let rows = self.materialize(&sql).await?;

        let mut views = self.views.write().map_err(|_| EngineError::poisoned())?;
        let view = views
            .get_mut(name)
            .ok_or_else(|| EngineError::ViewNotFound(name.to_string()))?;
        view.info.last_refreshed = Some(Utc::now());
        view.info.refresh_count += 1;
        view.info.row_count = rows.as_ref().map_or(0, Vec::len);
        view.rows = rows;
        Ok(view.info.clone())
    }

    fn get_all_views(&self) -> Vec<ViewInfo> {
        self.views
            .read()
            .map(|views| views.values().map(|v| v.info.clone()).collect())
            .unwrap_or_default()
    }

    fn get_hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::SeqCst);
        let lookups = hits + self.misses.load(Ordering::SeqCst);
        if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEngineConfig;
    use serde_json::json;

    fn manager_with_orders() -> InMemoryViewManager {
        let memory = Arc::new(InMemoryAnalyticsEngine::new(MemoryEngineConfig::default()));
        memory
            .load_dataset(
                "orders",
                vec![
                    json!({"id": 1, "status": "pending"}),
                    json!({"id": 2, "status": "shipped"}),
                    json!({"id": 3, "status": "pending"}),
                ],
            )
            .unwrap();
        InMemoryViewManager::new().with_memory(memory)
    }

    #[tokio::test]
    async fn test_create_and_refresh() {
        let manager = manager_with_orders();
        let created = manager
            .create_view(ViewDefinition::new(
                "pending_orders",
                "SELECT * FROM orders WHERE status = 'pending'",
            ))
            .await
            .unwrap();
        assert!(created.is_due(Utc::now()));

        let refreshed = manager.refresh_view("pending_orders").await.unwrap();

        assert_eq!(refreshed.refresh_count, 1);
        assert_eq!(refreshed.row_count, 2);
        assert!(!refreshed.is_due(Utc::now()));
        assert_eq!(manager.lookup("pending_orders").map(|r| r.len()), Some(2));
    }

    #[tokio::test]
    async fn test_refresh_unknown_view() {
        let manager = InMemoryViewManager::new();
        let err = manager.refresh_view("missing").await.unwrap_err();
        assert_eq!(err, EngineError::ViewNotFound("missing".into()));
    }

    #[tokio::test]
    async fn test_rejects_empty_definition() {
        let manager = InMemoryViewManager::new();
        assert!(manager.create_view(ViewDefinition::new("v", "  ")).await.is_err());
        assert!(manager.create_view(ViewDefinition::new("", "SELECT 1")).await.is_err());
    }

    #[tokio::test]
    async fn test_hit_rate() {
        let manager = manager_with_orders();
        manager
            .create_view(ViewDefinition::new("all_orders", "SELECT * FROM orders"))
            .await
            .unwrap();
        assert_eq!(manager.get_hit_rate(), 0.0);

        assert!(manager.lookup("all_orders").is_none());
        manager.refresh_view("all_orders").await.unwrap();
        assert!(manager.lookup("all_orders").is_some());

        assert_eq!(manager.get_hit_rate(), 0.5);
        assert_eq!(manager.get_all_views().len(), 1);
    }
}
