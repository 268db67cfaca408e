//! HistoryStore trait and implementations.
//!
//! The in-memory ledger is authoritative while the service runs; a store
//! only receives periodic batches and supplies history at start-up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Row};
use water_quality::{EvaluatedReading, Parameter};

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Store a batch of evaluated readings. Entries already stored are kept.
    async fn persist(&self, pool_id: &str, entries: &[EvaluatedReading]) -> Result<()>;

    /// Up to `limit` most recent entries for `pool_id`, newest first.
    async fn load_recent(&self, pool_id: &str, limit: usize) -> Result<Vec<EvaluatedReading>>;
}

// ------------------------------------------------------------------ //
//  FakeHistoryStore (for tests)                                       //
// ------------------------------------------------------------------ //

#[derive(Debug, Default, Clone)]
pub struct FakeHistoryStore {
    pub entries: Arc<Mutex<Vec<EvaluatedReading>>>,
    /// Number of successful `persist` calls.
    pub batches: Arc<Mutex<usize>>,
    failing: Arc<AtomicBool>,
}

impl FakeHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<EvaluatedReading>) -> Self {
        let store = Self::default();
        *store.lock() = entries;
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<EvaluatedReading> {
        self.lock().clone()
    }

    pub fn batch_count(&self) -> usize {
        *self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EvaluatedReading>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HistoryStore for FakeHistoryStore {
    async fn persist(&self, _pool_id: &str, entries: &[EvaluatedReading]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("history store unavailable");
        }
        let mut stored = self.lock();
        for entry in entries {
            if !stored.iter().any(|e| e.id == entry.id) {
                stored.push(entry.clone());
            }
        }
        *self.batches.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    async fn load_recent(&self, pool_id: &str, limit: usize) -> Result<Vec<EvaluatedReading>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("history store unavailable");
        }
        let mut found: Vec<EvaluatedReading> =
            self.lock().iter().filter(|e| e.pool_id == pool_id).cloned().collect();
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        found.truncate(limit);
        Ok(found)
    }
}

// ------------------------------------------------------------------ //
//  PgHistoryStore (production)                                        //
// ------------------------------------------------------------------ //

/// Stores each entry as a JSONB document keyed by its id.
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS water_quality_readings (
                id          UUID PRIMARY KEY,
                pool_id     TEXT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL,
                grade       TEXT NOT NULL,
                payload     JSONB NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create water_quality_readings table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS water_quality_readings_pool_idx \
             ON water_quality_readings (pool_id, recorded_at DESC)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create water_quality_readings index")?;

        Ok(())
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn persist(&self, pool_id: &str, entries: &[EvaluatedReading]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO water_quality_readings (id, pool_id, recorded_at, grade, payload)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(entry.id)
            .bind(pool_id)
            .bind(entry.timestamp)
            .bind(entry.quality.grade.as_str())
            .bind(Json(entry))
            .execute(&mut *tx)
            .await
            .context("INSERT water_quality_readings failed")?;
        }
        tx.commit().await.context("Failed to commit readings")?;
        Ok(())
    }

    async fn load_recent(&self, pool_id: &str, limit: usize) -> Result<Vec<EvaluatedReading>> {
        let rows = sqlx::query(
            r#"
            SELECT payload
            FROM water_quality_readings
            WHERE pool_id = $1
            ORDER BY recorded_at DESC
            LIMIT $2
            "#,
        )
        .bind(pool_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .context("SELECT water_quality_readings failed")?;

        rows.iter()
            .map(|r| {
                let Json(entry) = r
                    .try_get::<Json<EvaluatedReading>, _>("payload")
                    .context("Malformed water_quality_readings payload")?;
                Ok(entry)
            })
            .collect()
    }
}

// ------------------------------------------------------------------ //
//  InfluxHistoryStore (write-only mirror)                             //
// ------------------------------------------------------------------ //

pub const INFLUX_MEASUREMENT: &str = "water_quality";

fn escape_lp(s: &str) -> String {
    s.replace(' ', "\\ ").replace(',', "\\,").replace('=', "\\=")
}

/// One line-protocol line per entry: normalised values, score and alert count.
pub fn to_line_protocol(pool_id: &str, entry: &EvaluatedReading) -> String {
    let mut fields: Vec<String> = Parameter::ALL
        .into_iter()
        .map(|p| format!("{}={}", p.key(), entry.value(p)))
        .collect();
    fields.push(format!("avg_score={}", entry.quality.avg_score));
    fields.push(format!("active_alerts={}i", entry.active_alerts()));
    fields.push(format!("grade=\"{}\"", entry.quality.grade.as_str()));

    let ts_ns = entry.timestamp.timestamp_nanos_opt().unwrap_or_default();
    format!(
        "{},pool_id={} {} {}",
        INFLUX_MEASUREMENT,
        escape_lp(pool_id),
        fields.join(","),
        ts_ns
    )
}

/// Writes to InfluxDB 2.x via the `influxdb2` client. Cannot hydrate.
pub struct InfluxHistoryStore {
    client: influxdb2::Client,
    org: String,
    bucket: String,
}

impl InfluxHistoryStore {
    pub fn new(url: &str, org: &str, token: &str, bucket: &str) -> Self {
        Self {
            client: influxdb2::Client::new(url, org, token),
            org: org.to_string(),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl HistoryStore for InfluxHistoryStore {
    async fn persist(&self, pool_id: &str, entries: &[EvaluatedReading]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let data = entries
            .iter()
            .map(|e| to_line_protocol(pool_id, e))
            .collect::<Vec<_>>()
            .join("\n");
        self.client
            .write_line_protocol(&self.org, &self.bucket, data)
            .await
            .map_err(|e| anyhow::anyhow!("InfluxDB write failed: {e}"))?;
        Ok(())
    }

    async fn load_recent(&self, _pool_id: &str, _limit: usize) -> Result<Vec<EvaluatedReading>> {
        Ok(Vec::new())
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use water_quality::{Catalog, Reading};

    fn entry(pool: &str, minute: i64) -> EvaluatedReading {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        EvaluatedReading::evaluate(pool, &Reading::new(ts), &Catalog::default())
    }

    #[tokio::test]
    async fn fake_store_loads_newest_first_per_pool() {
        let store = FakeHistoryStore::new();
        store.persist("a", &[entry("a", 0), entry("a", 2)]).await.unwrap();
        store.persist("a", &[entry("a", 1), entry("a", 2)]).await.unwrap();
        store.persist("b", &[entry("b", 5)]).await.unwrap();

        let recent = store.load_recent("a", 2).await.unwrap();
        assert_eq!(recent, vec![entry("a", 2), entry("a", 1)]);
        assert_eq!(store.snapshot().len(), 4);
        assert_eq!(store.batch_count(), 3);
    }

    #[tokio::test]
    async fn failing_fake_rejects_batches() {
        let store = FakeHistoryStore::new();
        store.set_failing(true);
        assert!(store.persist("a", &[entry("a", 0)]).await.is_err());
        assert_eq!(store.batch_count(), 0);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn line_protocol_tags_pool_and_carries_every_parameter() {
        let e = entry("north pond", 0);
        let line = to_line_protocol("north pond", &e);
        assert!(line.starts_with("water_quality,pool_id=north\\ pond "));
        assert!(line.contains("temperature=20,"));
        assert!(line.contains("plankton=25000,"));
        assert!(line.contains("active_alerts=0i"));
        assert!(line.contains("grade=\"Excellent\""));
        assert!(line.ends_with(&e.timestamp.timestamp_nanos_opt().unwrap().to_string()));
    }
}
