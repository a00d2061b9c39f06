//! Background maintenance loops
//!
//! Each loop holds a `Weak` engine reference and exits when the engine is
//! dropped or the shutdown signal is sent.
//!
//! | Loop                 | Default period |
//! |----------------------|----------------|
//! | performance monitor  | 30s            |
//! | memory pressure      | 30s            |
//! | history cleanup      | 300s           |
//! | view refresh         | 60s            |
//! | storage optimization | 3600s          |

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::engine::AnalyticsStorageEngine;
use super::storage::StorageOptimization;
use crate::observability::Logger;

/// Running loops and their shutdown signal
pub(crate) struct BackgroundTasks {
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub(crate) fn spawn(engine: &Arc<AnalyticsStorageEngine>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let config = engine.config().clone();
        let weak = Arc::downgrade(engine);
        let mut handles = Vec::new();

        handles.push(spawn_loop(
            "performance_monitor",
            weak.clone(),
            Duration::from_secs(config.monitoring.performance_interval_secs),
            shutdown_tx.subscribe(),
            |engine| async move {
                engine.run_performance_check();
            },
        ));

        handles.push(spawn_loop(
            "memory_pressure",
            weak.clone(),
            Duration::from_secs(config.monitoring.memory_check_interval_secs),
            shutdown_tx.subscribe(),
            |engine| async move {
                if let Err(e) = engine.run_memory_check() {
                    Logger::warn("MEMORY_CHECK_FAILED", &[("error", e.to_string().as_str())]);
                }
            },
        ));

        handles.push(spawn_loop(
            "history_cleanup",
            weak.clone(),
            Duration::from_secs(config.monitoring.history_cleanup_interval_secs),
            shutdown_tx.subscribe(),
            |engine| async move {
                engine.run_history_cleanup();
            },
        ));

        handles.push(spawn_loop(
            "view_refresh",
            weak.clone(),
            Duration::from_secs(config.maintenance.view_refresh_interval_secs),
            shutdown_tx.subscribe(),
            |engine| async move {
                engine.run_view_refresh().await;
            },
        ));

        if config.maintenance.auto_optimize {
            handles.push(spawn_loop(
                "storage_optimization",
                weak,
                Duration::from_secs(config.maintenance.optimize_interval_secs),
                shutdown_tx.subscribe(),
                |engine| async move {
                    if let Err(e) = engine.run_optimization(StorageOptimization::all()).await {
                        Logger::warn(
                            "AUTO_OPTIMIZE_FAILED",
                            &[("error", e.to_string().as_str())],
                        );
                    }
                },
            ));
        }

        Self {
            shutdown_tx,
            handles,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Signals every loop and waits for all of them to exit; returns how
    /// many exited cleanly
    pub(crate) async fn shutdown(self) -> usize {
        let _ = self.shutdown_tx.send(());
        let mut joined = 0;
        for handle in self.handles {
            match handle.await {
                Ok(()) => joined += 1,
                Err(e) => Logger::warn(
                    "BACKGROUND_TASK_PANICKED",
                    &[("error", e.to_string().as_str())],
                ),
            }
        }
        joined
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    engine: Weak<AnalyticsStorageEngine>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    tick: F,
) -> JoinHandle<()>
where
    F: Fn(Arc<AnalyticsStorageEngine>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let Some(engine) = engine.upgrade() else {
                        break;
                    };
                    tick(engine).await;
                }
            }
        }
        Logger::trace("BACKGROUND_LOOP_STOPPED", &[("loop", name)]);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineBuilder, EngineConfig, EngineEvent, Tier, ViewDefinition};
    use serde_json::json;

    fn fast_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.mode = Tier::Memory;
        config.distributed.nodes.clear();
        config.monitoring.performance_interval_secs = 1;
        config.monitoring.memory_check_interval_secs = 1;
        config.monitoring.history_cleanup_interval_secs = 1;
        config.maintenance.view_refresh_interval_secs = 1;
        config.maintenance.optimize_interval_secs = 1;
        config.maintenance.auto_optimize = true;
        config
    }

    fn drain(events: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut seen = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => seen.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_loops_run_maintenance_on_their_period() {
        let mut config = fast_config();
        config.memory.pressure_threshold = 0.0;
        let engine = EngineBuilder::new(config).build().unwrap();
        engine
            .load_dataset("tenant-a", "orders", vec![json!({"id": 1, "status": "pending"})])
            .unwrap();
        engine
            .create_materialized_view(
                "tenant-a",
                ViewDefinition::new("pending", "SELECT * FROM orders WHERE status = 'pending'"),
            )
            .await
            .unwrap();
        let mut events = engine.subscribe_events();

        engine.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let seen = drain(&mut events);

        assert!(seen
            .iter()
            .any(|e| matches!(e, EngineEvent::MemoryPressure { .. })));
        assert!(seen
            .iter()
            .any(|e| matches!(e, EngineEvent::ViewRefreshed { name } if name == "pending")));
        assert!(seen
            .iter()
            .any(|e| matches!(e, EngineEvent::StorageOptimized { .. })));

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_joins_every_loop() {
        let engine = EngineBuilder::new(fast_config()).build().unwrap();

        let tasks = BackgroundTasks::spawn(&engine);
        assert_eq!(tasks.len(), 5);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(tasks.shutdown().await, 5);

        let mut config = fast_config();
        config.maintenance.auto_optimize = false;
        let engine = EngineBuilder::new(config).build().unwrap();
        let tasks = BackgroundTasks::spawn(&engine);
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks.shutdown().await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loops_exit_when_engine_dropped() {
        let engine = EngineBuilder::new(fast_config()).build().unwrap();
        let tasks = BackgroundTasks::spawn(&engine);
        drop(engine);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(tasks.handles.iter().all(|h| h.is_finished()));
        assert_eq!(tasks.shutdown().await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_stop_ends_loops() {
        let engine = EngineBuilder::new(fast_config()).build().unwrap();
        engine.start().await.unwrap();
        let mut events = engine.subscribe_events();

        engine.stop().await;
        drain(&mut events);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(!engine.is_running());
        assert!(drain(&mut events).is_empty());
    }
}
