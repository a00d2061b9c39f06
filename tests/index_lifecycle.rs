//! Index Lifecycle Tests
//!
//! Tests for the index manager:
//! - Creation, duplicate rejection and dropping
//! - Build failures leave no metadata behind
//! - Usage tracking, recommendations and optimization

use std::sync::Arc;

use aero_analytics::index::{
    BuildOutcome, IndexBuilder, IndexConfig, IndexError, IndexInfo, IndexManager,
    IndexManagerConfig, IndexResult, IndexStatus, IndexStrategy, RecommendationAction,
    SimulatedIndexBuilder,
};
use aero_analytics::query::Query;
use async_trait::async_trait;
use std::time::Duration;

// =============================================================================
// Helper Functions
// =============================================================================

struct FailingBuilder;

#[async_trait]
impl IndexBuilder for FailingBuilder {
    async fn build(&self, _index: &IndexInfo) -> IndexResult<BuildOutcome> {
        Err(IndexError::Internal("disk full".into()))
    }
}

fn manager(config: IndexManagerConfig) -> IndexManager {
    IndexManager::new(config).with_builder(Arc::new(SimulatedIndexBuilder::new(Duration::ZERO)))
}

// =============================================================================
// Creation
// =============================================================================

/// A created index is active and listed under its table.
#[tokio::test]
async fn test_create_and_list() {
    let manager = manager(IndexManagerConfig::default());

    let info = manager
        .create_index(
            IndexConfig::new("orders", &["customer_id", "created_at"])
                .with_strategy(IndexStrategy::BTree),
        )
        .await
        .unwrap();

    assert_eq!(info.status, IndexStatus::Active);
    assert_eq!(info.leading_column(), Some("customer_id"));
    assert_eq!(manager.list_indexes(Some("orders")).unwrap().len(), 1);
    assert!(manager.list_indexes(Some("events")).unwrap().is_empty());
}

/// Same table and columns is a duplicate.
#[tokio::test]
async fn test_duplicate_rejected() {
    let manager = manager(IndexManagerConfig::default());
    manager
        .create_index(IndexConfig::new("orders", &["status"]))
        .await
        .unwrap();

    let err = manager
        .create_index(IndexConfig::new("orders", &["status"]).with_name("orders_status_2"))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::DuplicateIndex { .. }));
}

/// A failed build removes the placeholder entry.
#[tokio::test]
async fn test_failed_build_leaves_nothing() {
    let manager = IndexManager::new(IndexManagerConfig::default())
        .with_builder(Arc::new(FailingBuilder));

    let err = manager
        .create_index(IndexConfig::new("orders", &["status"]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INDEX_BUILD_FAILED");
    assert!(manager.list_indexes(None).unwrap().is_empty());
}

/// Dropping twice reports not found.
#[tokio::test]
async fn test_drop() {
    let manager = manager(IndexManagerConfig::default());
    let info = manager
        .create_index(IndexConfig::new("orders", &["status"]))
        .await
        .unwrap();

    manager.drop_index(&info.id).unwrap();
    assert!(manager.get_index(&info.id).unwrap().is_none());
    assert!(matches!(
        manager.drop_index(&info.id),
        Err(IndexError::IndexNotFound(_))
    ));
}

// =============================================================================
// Usage and Optimization
// =============================================================================

/// Hit rate above the threshold with recent use makes an index optimal.
#[tokio::test]
async fn test_optimal_indexes_follow_usage() {
    let manager = manager(IndexManagerConfig::default());
    let info = manager
        .create_index(IndexConfig::new("orders", &["status"]))
        .await
        .unwrap();
    assert!(manager.get_optimal_indexes("orders").unwrap().is_empty());

    for _ in 0..9 {
        manager.record_usage(&info.id, true).unwrap();
    }
    manager.record_usage(&info.id, false).unwrap();

    let optimal = manager.get_optimal_indexes("orders").unwrap();
    assert_eq!(optimal.len(), 1);
    assert!((optimal[0].usage.hit_rate - 0.9).abs() < 1e-9);
}

/// A full scan on an unindexed filter column recommends an index.
#[tokio::test]
async fn test_analyze_recommends_create() {
    let manager = manager(IndexManagerConfig::default());
    let query = Query::new("SELECT * FROM orders WHERE region = 'eu'");

    let recommendations = manager.analyze_query(&query, &[]).unwrap();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0].action, RecommendationAction::Create);
    assert_eq!(recommendations[0].columns, vec!["region".to_string()]);
}

/// Stale indexes are rebuilt; idle ones are reported, never dropped.
#[tokio::test]
async fn test_optimize_rebuilds_and_reports() {
    let config = IndexManagerConfig {
        stale_rebuild_days: 0,
        unused_after_days: 0,
        ..IndexManagerConfig::default()
    };
    let manager = manager(config);
    let info = manager
        .create_index(IndexConfig::new("orders", &["status"]))
        .await
        .unwrap();

    let report = manager.optimize_indexes().await.unwrap();
    assert_eq!(report.rebuilt, vec![info.id.clone()]);
    assert_eq!(report.drop_candidates, vec![info.id.clone()]);
    assert!(manager.get_index(&info.id).unwrap().is_some());

    let stats = manager.statistics().unwrap();
    assert_eq!(stats.total_indexes, 1);
    assert_eq!(stats.active, 1);
}
