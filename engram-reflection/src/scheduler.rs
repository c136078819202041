//! The maintenance scheduler.
//!
//! Interval-driven decay sweeps and reflection passes with overlap
//! protection: a tick that lands while the previous run is still going
//! is skipped, not queued. One scheduler per engine; init on first use,
//! explicit stop on shutdown, never reassigned.

use std::sync::Arc;
use std::time::Duration;

use engram_core::cancel::CancellationToken;
use engram_core::config::{DynamicsConfig, ReflectConfig};
use engram_dynamics::DecaySweep;
use engram_storage::meta::MetaStore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::ReflectionEngine;

pub struct MaintenanceScheduler {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl MaintenanceScheduler {
    /// Spawn the decay and reflection loops.
    pub fn start(
        meta: Arc<MetaStore>,
        dynamics: DynamicsConfig,
        reflect: ReflectConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        // Decay loop.
        {
            let sweep = DecaySweep::new(meta.clone(), dynamics);
            let cancel = cancel.clone();
            let lock = Arc::new(tokio::sync::Mutex::new(()));
            let period = Duration::from_secs(reflect.decay_interval_minutes.max(1) * 60);
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                ticker.tick().await; // immediate first tick is a no-op
                loop {
                    ticker.tick().await;
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Ok(_guard) = lock.try_lock() else {
                        debug!("decay tick skipped, previous run still active");
                        continue;
                    };
                    if let Err(e) = sweep.run(&cancel).await {
                        warn!(error = %e, "decay sweep failed");
                    }
                }
            }));
        }

        // Reflection + prune loop.
        {
            let engine = ReflectionEngine::new(meta, reflect.clone());
            let cancel = cancel.clone();
            let lock = Arc::new(tokio::sync::Mutex::new(()));
            let period = Duration::from_secs(reflect.interval_minutes.max(1) * 60);
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Ok(_guard) = lock.try_lock() else {
                        debug!("reflection tick skipped, previous run still active");
                        continue;
                    };
                    if let Err(e) = engine.reflect(&cancel).await {
                        warn!(error = %e, "reflection failed");
                    }
                    if let Err(e) = engine.prune_waypoints().await {
                        warn!(error = %e, "waypoint pruning failed");
                    }
                }
            }));
        }

        info!("maintenance scheduler started");
        Self { cancel, handles }
    }

    /// Signal cancellation and stop the loops. In-flight work notices
    /// the token at its next checkpoint; the abort then reaps the task,
    /// and transaction guards roll back anything unfinished.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("maintenance scheduler stopped");
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.stop();
        }
    }
}
