//! Observable engine events
//!
//! Events are explicit and typed. Each maps to exactly one log event name.

use std::fmt;

/// Observable events in the analytics engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Engine start begins
    EngineStart,
    /// Engine running, background loops spawned
    EngineStartComplete,
    /// Engine stop begins
    EngineStop,
    /// Engine stop complete, all components shut down
    EngineStopComplete,
    /// Configuration loaded from file
    ConfigLoaded,

    // Query path
    /// Query accepted for execution
    QueryReceived,
    /// Query served from the result cache
    QueryCacheHit,
    /// Query plan built
    QueryPlanned,
    /// Query executed successfully
    QueryExecuted,
    /// Query failed at some stage
    QueryFailed,
    /// Query cancelled by caller or timeout
    QueryCancelled,
    /// Hybrid plan fell back from memory to distributed
    TierFallback,
    /// Rolling execution time above threshold
    SlowQueries,
    /// Expired history entries evicted
    HistoryEvicted,

    // Memory tier
    /// Dataset registered
    DatasetLoaded,
    /// Dataset rejected (memory ceiling)
    DatasetRejected,
    /// Query cache cleared due to memory pressure
    MemoryPressure,

    // Distributed tier
    /// Worker node connected
    NodeConnected,
    /// Worker node disconnected
    NodeDisconnected,
    /// Fragment execution failed on a node
    FragmentFailed,
    /// Cancellation signal failed on a node
    CancelSignalFailed,

    // Indexes
    /// Index built and active
    IndexCreated,
    /// Index build failed, entry removed
    IndexBuildFailed,
    /// Index dropped
    IndexDropped,
    /// Index rebuilt
    IndexRebuilt,
    /// Advisory index recommendation
    IndexRecommendation,

    // Maintenance
    /// Materialized view refreshed
    ViewRefreshed,
    /// Materialized view refresh failed
    ViewRefreshFailed,
    /// Storage optimization pass finished
    StorageOptimized,
    /// Tiering policy configured for a tenant
    TieringConfigured,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::EngineStart => "ENGINE_START_BEGIN",
            Event::EngineStartComplete => "ENGINE_START_COMPLETE",
            Event::EngineStop => "ENGINE_STOP_BEGIN",
            Event::EngineStopComplete => "ENGINE_STOP_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::QueryReceived => "QUERY_BEGIN",
            Event::QueryCacheHit => "QUERY_CACHE_HIT",
            Event::QueryPlanned => "QUERY_PLANNED",
            Event::QueryExecuted => "QUERY_COMPLETE",
            Event::QueryFailed => "QUERY_FAILED",
            Event::QueryCancelled => "QUERY_CANCELLED",
            Event::TierFallback => "TIER_FALLBACK",
            Event::SlowQueries => "SLOW_QUERIES",
            Event::HistoryEvicted => "HISTORY_EVICTED",

            Event::DatasetLoaded => "DATASET_LOADED",
            Event::DatasetRejected => "DATASET_REJECTED",
            Event::MemoryPressure => "MEMORY_PRESSURE",

            Event::NodeConnected => "NODE_CONNECTED",
            Event::NodeDisconnected => "NODE_DISCONNECTED",
            Event::FragmentFailed => "FRAGMENT_FAILED",
            Event::CancelSignalFailed => "CANCEL_SIGNAL_FAILED",

            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexBuildFailed => "INDEX_BUILD_FAILED",
            Event::IndexDropped => "INDEX_DROPPED",
            Event::IndexRebuilt => "INDEX_REBUILT",
            Event::IndexRecommendation => "INDEX_RECOMMENDATION",

            Event::ViewRefreshed => "VIEW_REFRESHED",
            Event::ViewRefreshFailed => "VIEW_REFRESH_FAILED",
            Event::StorageOptimized => "STORAGE_OPTIMIZED",
            Event::TieringConfigured => "TIERING_CONFIGURED",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::QueryFailed
                | Event::FragmentFailed
                | Event::CancelSignalFailed
                | Event::IndexBuildFailed
                | Event::ViewRefreshFailed
                | Event::DatasetRejected
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
