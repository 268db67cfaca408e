//! AlertStore trait and implementations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;
use water_quality::{Alert, AlertSeverity, Parameter};

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

/// Durable store of alerts, owned by a user.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Save alerts for `user_id`. Alerts already stored are left alone.
    async fn save(&self, user_id: &str, alerts: &[Alert]) -> Result<()>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Alert>>;

    /// Returns `false` when no such alert exists for the user.
    async fn acknowledge(&self, user_id: &str, alert_id: Uuid) -> Result<bool>;

    async fn delete(&self, user_id: &str, alert_id: Uuid) -> Result<bool>;

    /// Returns how many alerts were removed.
    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64>;
}

// ------------------------------------------------------------------ //
//  FakeAlertStore (for tests)                                         //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAlert {
    pub user_id: String,
    pub alert: Alert,
}

/// In-memory store; can be switched into a failing mode.
#[derive(Debug, Default, Clone)]
pub struct FakeAlertStore {
    pub alerts: Arc<Mutex<Vec<StoredAlert>>>,
    failing: Arc<AtomicBool>,
}

impl FakeAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call return an error (or stop doing so).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Non-destructive snapshot of everything stored.
    pub fn snapshot(&self) -> Vec<StoredAlert> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredAlert>> {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("alert store unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl AlertStore for FakeAlertStore {
    async fn save(&self, user_id: &str, alerts: &[Alert]) -> Result<()> {
        self.check()?;
        let mut stored = self.lock();
        for alert in alerts {
            if stored.iter().any(|s| s.alert.id == alert.id) {
                continue;
            }
            stored.push(StoredAlert { user_id: user_id.to_string(), alert: alert.clone() });
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Alert>> {
        self.check()?;
        let mut alerts: Vec<Alert> = self
            .lock()
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.alert.clone())
            .collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(alerts)
    }

    async fn acknowledge(&self, user_id: &str, alert_id: Uuid) -> Result<bool> {
        self.check()?;
        let mut stored = self.lock();
        match stored.iter_mut().find(|s| s.user_id == user_id && s.alert.id == alert_id) {
            Some(s) => {
                s.alert.acknowledged = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, user_id: &str, alert_id: Uuid) -> Result<bool> {
        self.check()?;
        let mut stored = self.lock();
        let before = stored.len();
        stored.retain(|s| !(s.user_id == user_id && s.alert.id == alert_id));
        Ok(stored.len() != before)
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64> {
        self.check()?;
        let mut stored = self.lock();
        let before = stored.len();
        stored.retain(|s| s.user_id != user_id);
        Ok((before - stored.len()) as u64)
    }
}

// ------------------------------------------------------------------ //
//  PgAlertStore (production)                                          //
// ------------------------------------------------------------------ //

pub struct PgAlertStore {
    pool: PgPool,
}

impl PgAlertStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `pool_alerts` table if it doesn't exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pool_alerts (
                id           UUID PRIMARY KEY,
                user_id      TEXT NOT NULL,
                pool_id      TEXT NOT NULL,
                parameter    TEXT NOT NULL,
                severity     TEXT NOT NULL,
                message      TEXT NOT NULL,
                value        DOUBLE PRECISION NOT NULL,
                occurred_at  TIMESTAMPTZ NOT NULL,
                acknowledged BOOLEAN NOT NULL DEFAULT FALSE,
                created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create pool_alerts table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS pool_alerts_user_idx ON pool_alerts (user_id, occurred_at DESC)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create pool_alerts index")?;

        Ok(())
    }
}

fn alert_from_row(row: &PgRow) -> Result<Alert> {
    let key: String = row.try_get("parameter")?;
    let parameter =
        Parameter::from_key(&key).ok_or_else(|| anyhow!("unknown parameter '{key}' in pool_alerts"))?;
    let severity: String = row.try_get("severity")?;
    Ok(Alert {
        id: row.try_get("id")?,
        pool_id: row.try_get("pool_id")?,
        parameter,
        severity: AlertSeverity::from_str(&severity),
        message: row.try_get("message")?,
        value: row.try_get("value")?,
        timestamp: row.try_get::<DateTime<Utc>, _>("occurred_at")?,
        acknowledged: row.try_get("acknowledged")?,
    })
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn save(&self, user_id: &str, alerts: &[Alert]) -> Result<()> {
        if alerts.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        for alert in alerts {
            sqlx::query(
                r#"
                INSERT INTO pool_alerts
                    (id, user_id, pool_id, parameter, severity, message, value, occurred_at, acknowledged)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(alert.id)
            .bind(user_id)
            .bind(&alert.pool_id)
            .bind(alert.parameter.key())
            .bind(alert.severity.as_str())
            .bind(&alert.message)
            .bind(alert.value)
            .bind(alert.timestamp)
            .bind(alert.acknowledged)
            .execute(&mut *tx)
            .await
            .context("INSERT pool_alerts failed")?;
        }
        tx.commit().await.context("Failed to commit alerts")?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pool_id, parameter, severity, message, value, occurred_at, acknowledged
            FROM pool_alerts
            WHERE user_id = $1
            ORDER BY occurred_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("SELECT pool_alerts failed")?;

        rows.iter().map(alert_from_row).collect()
    }

    async fn acknowledge(&self, user_id: &str, alert_id: Uuid) -> Result<bool> {
        let affected = sqlx::query(
            "UPDATE pool_alerts SET acknowledged = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(alert_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("UPDATE pool_alerts failed")?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn delete(&self, user_id: &str, alert_id: Uuid) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM pool_alerts WHERE id = $1 AND user_id = $2")
            .bind(alert_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("DELETE pool_alerts failed")?
            .rows_affected();

        Ok(affected > 0)
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64> {
        let affected = sqlx::query("DELETE FROM pool_alerts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("DELETE pool_alerts failed")?
            .rows_affected();

        Ok(affected)
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn alert(minute: i64) -> Alert {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::minutes(minute);
        Alert {
            id: Alert::stable_id("bassin-1", Parameter::Ammonia, ts),
            pool_id: "bassin-1".into(),
            parameter: Parameter::Ammonia,
            severity: AlertSeverity::Warning,
            message: "High Ammonia levels detected: 1.20 mg/L".into(),
            value: 1.2,
            timestamp: ts,
            acknowledged: false,
        }
    }

    #[tokio::test]
    async fn save_ignores_duplicates_and_lists_newest_first() {
        let store = FakeAlertStore::new();
        store.save("u1", &[alert(0), alert(5)]).await.unwrap();
        store.save("u1", &[alert(5)]).await.unwrap();
        store.save("u2", &[alert(9)]).await.unwrap();

        let listed = store.list_for_user("u1").await.unwrap();
        assert_eq!(listed, vec![alert(5), alert(0)]);
        assert_eq!(store.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn acknowledge_and_delete_are_scoped_to_the_user() {
        let store = FakeAlertStore::new();
        let a = alert(0);
        store.save("u1", &[a.clone()]).await.unwrap();

        assert!(!store.acknowledge("u2", a.id).await.unwrap());
        assert!(store.acknowledge("u1", a.id).await.unwrap());
        assert!(store.list_for_user("u1").await.unwrap()[0].acknowledged);

        assert!(!store.delete("u2", a.id).await.unwrap());
        assert!(store.delete("u1", a.id).await.unwrap());
        assert!(store.list_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_all_counts_removed_rows() {
        let store = FakeAlertStore::new();
        store.save("u1", &[alert(0), alert(1)]).await.unwrap();
        store.save("u2", &[alert(2)]).await.unwrap();
        assert_eq!(store.delete_all_for_user("u1").await.unwrap(), 2);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn failing_mode_errors() {
        let store = FakeAlertStore::new();
        store.set_failing(true);
        assert!(store.save("u1", &[alert(0)]).await.is_err());
        store.set_failing(false);
        assert!(store.save("u1", &[alert(0)]).await.is_ok());
    }
}
