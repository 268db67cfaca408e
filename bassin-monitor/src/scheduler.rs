//! Per-pool tick loop.
//!
//! Every pool gets its own tokio task and its own [`Monitor`], so pools
//! share no mutable state. Within a pool a separate tick lock keeps ticks
//! from overlapping, while the state lock is only held around in-memory
//! work, so queries never wait on a sensor or a store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use water_quality::{Alert, Catalog, EvaluatedReading, Grade, HistoryStats, Monitor};

use crate::alert_store::AlertStore;
use crate::config::MonitorConfig;
use crate::feed::AlertFeed;
use crate::history_store::HistoryStore;
use crate::notify::{AlertNotification, NotificationSink};
use crate::sensor::SensorSource;

// ------------------------------------------------------------------ //
//  Types                                                              //
// ------------------------------------------------------------------ //

/// External services a pool loop talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub sensor: Arc<dyn SensorSource>,
    pub alerts: Arc<dyn AlertStore>,
    pub history: Arc<dyn HistoryStore>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// Mutable state of one pool, guarded by a single lock.
#[derive(Debug)]
pub struct PoolState {
    pub monitor: Monitor,
    pub feed: AlertFeed,
    pub ticks: u64,
}

impl PoolState {
    pub fn new(monitor: Monitor, feed_cap: usize) -> Self {
        Self { monitor, feed: AlertFeed::new(feed_cap), ticks: 0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// Not a persistence tick.
    Skipped,
    /// Number of entries handed to the history store (the tick's own).
    Stored(usize),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub pool_id: String,
    pub tick: u64,
    pub grade: Grade,
    pub alerts: usize,
    pub notifications: usize,
    pub persist: PersistOutcome,
}

// ------------------------------------------------------------------ //
//  PoolRunner                                                         //
// ------------------------------------------------------------------ //

/// Runs single ticks for one pool.
#[derive(Clone)]
pub struct PoolRunner {
    pool_id: String,
    user_id: String,
    persist_every: u64,
    state: Arc<Mutex<PoolState>>,
    tick_lock: Arc<Mutex<()>>,
    deps: Collaborators,
}

impl PoolRunner {
    pub fn new(
        pool_id: &str,
        config: &MonitorConfig,
        state: Arc<Mutex<PoolState>>,
        deps: Collaborators,
    ) -> Self {
        Self {
            pool_id: pool_id.to_string(),
            user_id: config.user_id.clone(),
            persist_every: config.settings.persist_every_n_ticks.max(1),
            state,
            tick_lock: Arc::new(Mutex::new(())),
            deps,
        }
    }

    pub fn state(&self) -> &Arc<Mutex<PoolState>> {
        &self.state
    }

    /// One evaluation cycle. A sensor failure skips the tick and is the
    /// only error returned; store and delivery failures are logged.
    pub async fn tick(&self) -> Result<TickReport> {
        let _tick = self.tick_lock.lock().await;

        let reading = self
            .deps
            .sensor
            .read(&self.pool_id)
            .await
            .with_context(|| format!("sensor read failed for pool '{}'", self.pool_id))?;

        let (outcome, tick) = {
            let mut state = self.state.lock().await;
            let outcome = state.monitor.process(&self.pool_id, &reading);
            state.ticks += 1;
            state.feed.push_batch(&outcome.evaluated.alerts);
            (outcome, state.ticks)
        };

        let notified = self.record_and_notify(&outcome.evaluated, outcome.notifications).await;

        let persist = if tick % self.persist_every == 0 {
            match self.deps.history.persist(&self.pool_id, std::slice::from_ref(&outcome.evaluated)).await {
                Ok(()) => PersistOutcome::Stored(1),
                Err(e) => {
                    warn!(pool_id = %self.pool_id, tick, error = %e, "history persistence failed");
                    PersistOutcome::Failed(e.to_string())
                }
            }
        } else {
            PersistOutcome::Skipped
        };

        Ok(TickReport {
            pool_id: self.pool_id.clone(),
            tick,
            grade: outcome.evaluated.quality.grade,
            alerts: outcome.evaluated.alerts.len(),
            notifications: notified,
            persist,
        })
    }

    /// Save new alerts, then deliver them. Returns how many were delivered.
    async fn record_and_notify(&self, evaluated: &EvaluatedReading, notifications: Vec<Alert>) -> usize {
        if notifications.is_empty() {
            return 0;
        }

        if let Err(e) = self.deps.alerts.save(&self.user_id, &notifications).await {
            warn!(pool_id = %self.pool_id, error = %e, "alert store write failed; notifications withdrawn");
            self.state.lock().await.monitor.withdraw(&self.pool_id, &notifications);
            return 0;
        }

        let count = notifications.len();
        let grade = evaluated.quality.grade;
        let payloads = notifications
            .into_iter()
            .map(|a| AlertNotification::new(&self.user_id, grade, a))
            .collect();
        if let Err(e) = self.deps.notifier.notify(payloads).await {
            warn!(pool_id = %self.pool_id, error = %e, "notification delivery failed");
        }
        count
    }
}

async fn run(runner: PoolRunner, period: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match runner.tick().await {
                    Ok(report) => info!(
                        pool_id = %report.pool_id,
                        tick = report.tick,
                        grade = %report.grade,
                        alerts = report.alerts,
                        notifications = report.notifications,
                        persist = ?report.persist,
                        "tick complete"
                    ),
                    Err(e) => warn!(pool_id = %runner.pool_id, error = %e, "tick skipped"),
                }
            }
        }
    }
    info!(pool_id = %runner.pool_id, "pool loop stopped");
}

// ------------------------------------------------------------------ //
//  Scheduler                                                          //
// ------------------------------------------------------------------ //

struct PoolHandle {
    state: Arc<Mutex<PoolState>>,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the running pool loops.
pub struct Scheduler {
    config: MonitorConfig,
    catalog: Catalog,
    deps: Collaborators,
    pools: HashMap<String, PoolHandle>,
}

impl Scheduler {
    pub fn new(config: MonitorConfig, deps: Collaborators) -> Result<Self> {
        let catalog = config.catalog()?;
        Ok(Self { config, catalog, deps, pools: HashMap::new() })
    }

    pub fn running(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pools.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Hydrate the pool's ledger, then start ticking.
    pub async fn start_pool(&mut self, pool_id: &str) -> Result<()> {
        if self.pools.contains_key(pool_id) {
            bail!("pool '{pool_id}' is already running");
        }

        let history_cap = self.config.settings.history_cap;
        let mut monitor = Monitor::new(self.catalog.clone(), history_cap);

        match self.deps.history.load_recent(pool_id, history_cap).await {
            Ok(entries) => {
                if !entries.is_empty() {
                    info!(pool_id, entries = entries.len(), "history restored");
                }
                monitor.restore(pool_id, entries);
            }
            Err(e) => warn!(pool_id, error = %e, "history restore failed; starting empty"),
        }

        if monitor.ledger().is_empty(pool_id) && self.config.seed_history > 0 {
            let readings = self
                .deps
                .sensor
                .backfill(pool_id, self.config.seed_history)
                .await
                .with_context(|| format!("history backfill failed for pool '{pool_id}'"))?;
            let seeded = readings
                .iter()
                .map(|r| EvaluatedReading::evaluate(pool_id, r, &self.catalog))
                .collect::<Vec<_>>();
            info!(pool_id, entries = seeded.len(), "history seeded");
            monitor.restore(pool_id, seeded);
        }

        let state = Arc::new(Mutex::new(PoolState::new(monitor, self.config.alert_feed_cap)));
        let runner = PoolRunner::new(pool_id, &self.config, state.clone(), self.deps.clone());
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run(runner, self.config.settings.tick_interval(), stop_rx));

        info!(pool_id, interval_ms = self.config.settings.tick_interval_ms, "pool started");
        self.pools.insert(pool_id.to_string(), PoolHandle { state, stop, task });
        Ok(())
    }

    /// Stop scheduling ticks for `pool_id` and wait for its loop to exit.
    /// Returns `false` when the pool was not running.
    pub async fn stop_pool(&mut self, pool_id: &str) -> Result<bool> {
        let Some(handle) = self.pools.remove(pool_id) else {
            return Ok(false);
        };
        let _ = handle.stop.send(true);
        handle.task.await.with_context(|| format!("pool '{pool_id}' task failed"))?;
        Ok(true)
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        for pool_id in self.running() {
            self.stop_pool(&pool_id).await?;
        }
        Ok(())
    }

    pub async fn history(&self, pool_id: &str, limit: Option<usize>) -> Option<Vec<EvaluatedReading>> {
        let handle = self.pools.get(pool_id)?;
        let state = handle.state.lock().await;
        Some(state.monitor.history(pool_id, limit))
    }

    pub async fn stats(&self, pool_id: &str) -> Option<HistoryStats> {
        let handle = self.pools.get(pool_id)?;
        let state = handle.state.lock().await;
        Some(state.monitor.stats(pool_id))
    }

    pub async fn recent_alerts(&self, pool_id: &str) -> Option<Vec<Alert>> {
        let handle = self.pools.get(pool_id)?;
        let state = handle.state.lock().await;
        Some(state.feed.recent())
    }

    /// Returns `false` when the pool is not running.
    pub async fn clear_alerts(&self, pool_id: &str) -> bool {
        match self.pools.get(pool_id) {
            Some(handle) => {
                handle.state.lock().await.feed.clear();
                true
            }
            None => false,
        }
    }

    /// Empties the in-memory ledger only; durable history is untouched.
    pub async fn clear_history(&self, pool_id: &str) -> bool {
        match self.pools.get(pool_id) {
            Some(handle) => {
                handle.state.lock().await.monitor.clear_history(pool_id);
                true
            }
            None => false,
        }
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
