//! Engine result cache
//!
//! Keyed by `sha256(canonical_sql ␟ tenant ␟ canonical_json(parameters) ␟
//! descriptors)`. Canonical SQL collapses whitespace runs outside quoted
//! literals and trims; parameters come from an ordered map, so key order
//! never changes the key. Descriptors are the query's structured filters,
//! aggregations, joins, sort and slicing, which builders can set apart
//! from the SQL text.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::result::QueryResult;
use crate::query::Query;

const SEPARATOR: char = '\u{241F}';

/// Cache key for a query and tenant
pub fn cache_key(query: &Query, tenant_id: &str) -> String {
    let canonical_params = serde_json::to_string(&query.parameters).unwrap_or_default();
    let separator = SEPARATOR.to_string();

    let mut hasher = Sha256::new();
    hasher.update(canonical_sql(&query.sql).as_bytes());
    hasher.update(separator.as_bytes());
    hasher.update(tenant_id.as_bytes());
    hasher.update(separator.as_bytes());
    hasher.update(canonical_params.as_bytes());
    hasher.update(separator.as_bytes());
    hasher.update(query.fingerprint().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Trims and collapses whitespace runs, leaving quoted literals untouched
pub fn canonical_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for c in sql.trim().chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c.is_whitespace() => pending_space = true,
            None => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Result cache consumed by the engine
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &str) -> Option<QueryResult>;

    fn set(&self, key: &str, result: QueryResult, ttl: Duration);

    fn clear(&self);

    fn stats(&self) -> CacheStats;
}

struct Entry {
    result: QueryResult,
    /// `None` when the TTL runs past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process cache with per-entry TTL and an entry ceiling
pub struct TtlResultCache {
    entries: Mutex<HashMap<String, Entry>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TtlResultCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl ResultCache for TtlResultCache {
    fn get(&self, key: &str) -> Option<QueryResult> {
        let now = Instant::now();
        let found = match self.entries.lock() {
            Ok(mut entries) => match entries.get(key) {
                Some(entry) if entry.is_live(now) => Some(entry.result.clone()),
                Some(_) => {
                    entries.remove(key);
                    None
                }
                None => None,
            },
            Err(_) => None,
        };

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::SeqCst),
            None => self.misses.fetch_add(1, Ordering::SeqCst),
        };
        found
    }

    fn set(&self, key: &str, result: QueryResult, ttl: Duration) {
        let now = Instant::now();
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            entries.retain(|_, e| e.is_live(now));
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| (e.expires_at.is_none(), e.expires_at))
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                result,
                expires_at: now.checked_add(ttl),
            },
        );
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().map(|e| e.len()).unwrap_or(0);
        let hits = self.hits.load(Ordering::SeqCst);
        let misses = self.misses.load(Ordering::SeqCst);
        let lookups = hits + misses;
        CacheStats {
            entries,
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plan::{QueryPlan, Tier};
    use crate::query::{Query, TierOutput};
    use chrono::Utc;
    use serde_json::json;

    fn result(id: &str) -> QueryResult {
        let plan = QueryPlan {
            id: "p".into(),
            query: Query::new("SELECT * FROM orders").with_id(id),
            tenant_id: "tenant-a".into(),
            tier: Tier::Memory,
            index_ids: vec![],
            parallelism: 1,
            estimated_cost: 1.0,
            estimated_time_ms: 1,
            created_at: Utc::now(),
            hints: vec![],
        };
        QueryResult::from_output(&plan, Tier::Memory, TierOutput::default(), false)
    }

    // =========================================================================
    // Keys
    // =========================================================================

    #[test]
    fn test_key_ignores_whitespace() {
        assert_eq!(
            cache_key(&Query::new("SELECT *  FROM\n orders "), "t"),
            cache_key(&Query::new("SELECT * FROM orders"), "t")
        );
    }

    #[test]
    fn test_key_keeps_whitespace_inside_literals() {
        assert_eq!(
            canonical_sql("  SELECT *\tFROM people WHERE name = 'a  b'  "),
            "SELECT * FROM people WHERE name = 'a  b'"
        );
        assert_ne!(
            cache_key(&Query::new("SELECT * FROM people WHERE name = 'a b'"), "t"),
            cache_key(&Query::new("SELECT * FROM people WHERE name = 'a  b'"), "t")
        );
    }

    #[test]
    fn test_key_depends_on_tenant_and_params() {
        let query = Query::new("SELECT * FROM orders");
        let base = cache_key(&query, "t1");

        assert_ne!(base, cache_key(&query, "t2"));
        assert_ne!(
            base,
            cache_key(&query.clone().with_parameter("status", json!("pending")), "t1")
        );
        assert_eq!(base.len(), 64);
    }

    #[test]
    fn test_key_depends_on_descriptors() {
        let scan = Query::scan("orders");
        let base = cache_key(&scan, "t");

        assert_ne!(base, cache_key(&scan.clone().filter_eq("status", json!("shipped")), "t"));
        assert_ne!(base, cache_key(&scan.clone().with_limit(1), "t"));
        assert_ne!(base, cache_key(&scan.clone().with_dataset("archive"), "t"));
        assert_eq!(base, cache_key(&scan.clone().with_id("other"), "t"));
    }

    #[test]
    fn test_key_ignores_parameter_insertion_order() {
        let a = Query::new("q").with_parameter("x", json!(1)).with_parameter("y", json!(2));
        let b = Query::new("q").with_parameter("y", json!(2)).with_parameter("x", json!(1));

        assert_eq!(cache_key(&a, "t"), cache_key(&b, "t"));
    }

    // =========================================================================
    // TTL cache
    // =========================================================================

    #[test]
    fn test_get_set_and_stats() {
        let cache = TtlResultCache::new(10);
        assert!(cache.get("k").is_none());

        cache.set("k", result("q-1"), Duration::from_secs(60));

        assert_eq!(cache.get("k").map(|r| r.id), Some("q-1".to_string()));
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn test_expired_entry_is_miss() {
        let cache = TtlResultCache::new(10);
        cache.set("k", result("q-1"), Duration::ZERO);

        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_ceiling_evicts_soonest_expiry() {
        let cache = TtlResultCache::new(2);
        cache.set("a", result("q-a"), Duration::from_secs(10));
        cache.set("b", result("q-b"), Duration::from_secs(60));
        cache.set("c", result("q-c"), Duration::from_secs(60));

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_unbounded_ttl_never_expires() {
        let cache = TtlResultCache::new(2);
        cache.set("forever", result("q-1"), Duration::MAX);
        cache.set("short", result("q-2"), Duration::from_secs(60));
        cache.set("other", result("q-3"), Duration::from_secs(60));

        assert!(cache.get("forever").is_some());
        assert!(cache.get("short").is_none());
    }

    #[test]
    fn test_clear() {
        let cache = TtlResultCache::new(10);
        cache.set("k", result("q-1"), Duration::from_secs(60));
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
