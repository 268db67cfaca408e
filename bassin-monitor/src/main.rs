//! bassin-monitor service entry point.
//!
//! # Environment variables
//! | Var                         | Default              |
//! |-----------------------------|----------------------|
//! | `BASSIN_CONFIG`             | `bassin.toml`        |
//! | `BASSIN_*`                  | see `config` module  |
//! | `BASSIN_EXPORT_DIR`         | optional             |
//! | `DATABASE_URL`              | optional             |
//! | `INFLUXDB_URL`              | optional             |
//! | `INFLUXDB_ORG`              | optional             |
//! | `INFLUXDB_TOKEN`            | optional             |
//! | `INFLUXDB_BUCKET`           | optional             |
//! | `AMQP_URL`                  | optional             |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use bassin_monitor::alert_store::{AlertStore, FakeAlertStore, PgAlertStore};
use bassin_monitor::config::MonitorConfig;
use bassin_monitor::history_store::{FakeHistoryStore, HistoryStore, InfluxHistoryStore, PgHistoryStore};
use bassin_monitor::notify::{AmqpNotificationSink, LogNotificationSink, NotificationSink};
use bassin_monitor::scheduler::{Collaborators, Scheduler};
use bassin_monitor::sensor::{SimulatedSensor, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bassin_monitor=info".parse()?),
        )
        .json()
        .init();

    let config = MonitorConfig::load()?;
    info!(
        pools = ?config.pools,
        interval_ms = config.settings.tick_interval_ms,
        persist_every = config.settings.persist_every_n_ticks,
        "configuration loaded"
    );

    // PostgreSQL backs both alerts and history when configured
    let pg = match std::env::var("DATABASE_URL").ok() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            Some(pool)
        }
        None => None,
    };

    let alerts: Arc<dyn AlertStore> = match &pg {
        Some(pool) => {
            let store = PgAlertStore::new(pool.clone());
            store.migrate().await?;
            info!("Using PgAlertStore");
            Arc::new(store)
        }
        None => {
            info!("No DATABASE_URL; using FakeAlertStore");
            Arc::new(FakeAlertStore::new())
        }
    };

    let history: Arc<dyn HistoryStore> = match (
        &pg,
        std::env::var("INFLUXDB_URL").ok(),
        std::env::var("INFLUXDB_ORG").ok(),
        std::env::var("INFLUXDB_TOKEN").ok(),
        std::env::var("INFLUXDB_BUCKET").ok(),
    ) {
        (Some(pool), ..) => {
            let store = PgHistoryStore::new(pool.clone());
            store.migrate().await?;
            info!("Using PgHistoryStore");
            Arc::new(store)
        }
        (None, Some(url), Some(org), Some(token), Some(bucket)) => {
            info!("Using InfluxHistoryStore (write-only)");
            Arc::new(InfluxHistoryStore::new(&url, &org, &token, &bucket))
        }
        _ => {
            info!("No history backend configured; using FakeHistoryStore");
            Arc::new(FakeHistoryStore::new())
        }
    };

    let notifier: Arc<dyn NotificationSink> = match std::env::var("AMQP_URL").ok() {
        Some(url) => {
            let sink = AmqpNotificationSink::connect(&url).await?;
            info!("RabbitMQ channel ready");
            Arc::new(sink)
        }
        None => {
            info!("No AMQP_URL; logging notifications");
            Arc::new(LogNotificationSink)
        }
    };

    let deps = Collaborators {
        sensor: Arc::new(SimulatedSensor::new(Arc::new(SystemClock))),
        alerts,
        history,
        notifier,
    };

    let pools = config.pools.clone();
    let mut scheduler = Scheduler::new(config, deps)?;
    for pool_id in &pools {
        scheduler.start_pool(pool_id).await?;
    }

    info!(pools = pools.len(), "bassin-monitor running");
    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("shutdown requested");

    if let Some(dir) = std::env::var_os("BASSIN_EXPORT_DIR").map(PathBuf::from) {
        for pool_id in &pools {
            if let Err(e) = export_history(&scheduler, pool_id, &dir).await {
                warn!(pool_id, error = %e, "history export failed");
            }
        }
    }

    scheduler.shutdown().await?;
    info!("bassin-monitor stopped");
    Ok(())
}

/// Write the pool's in-memory history as a CSV file under `dir`.
async fn export_history(scheduler: &Scheduler, pool_id: &str, dir: &std::path::Path) -> Result<()> {
    let Some(entries) = scheduler.history(pool_id, None).await else {
        return Ok(());
    };
    let path = dir.join(water_quality::export::file_name(
        pool_id,
        chrono::Utc::now().date_naive(),
    ));
    let csv = water_quality::export::to_csv(&entries).context("Failed to render history CSV")?;
    tokio::fs::write(&path, csv)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(pool_id, path = %path.display(), entries = entries.len(), "history exported");
    Ok(())
}
