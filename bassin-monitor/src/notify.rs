//! NotificationSink trait and implementations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;
use water_quality::{Alert, Grade};

pub const ALERT_QUEUE: &str = "bassin.alerts";

// ------------------------------------------------------------------ //
//  Domain types                                                       //
// ------------------------------------------------------------------ //

/// Message published for each newly notified alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertNotification {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub pool_id: String,
    pub user_id: String,
    pub grade: Grade,
    pub alert: Alert,
}

impl AlertNotification {
    pub const KIND: &'static str = "PoolAlertRaised.v1";

    pub fn new(user_id: &str, grade: Grade, alert: Alert) -> Self {
        Self {
            kind: Self::KIND,
            pool_id: alert.pool_id.clone(),
            user_id: user_id.to_string(),
            grade,
            alert,
        }
    }
}

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

/// Fire-and-forget delivery of user-facing notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notifications: Vec<AlertNotification>) -> Result<()>;
}

// ------------------------------------------------------------------ //
//  LogNotificationSink                                                //
// ------------------------------------------------------------------ //

/// Emits each notification as a structured `warn!` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, notifications: Vec<AlertNotification>) -> Result<()> {
        for n in &notifications {
            warn!(
                pool_id = %n.pool_id,
                parameter = %n.alert.parameter,
                severity = %n.alert.severity,
                value = n.alert.value,
                grade = %n.grade,
                "{}",
                n.alert.message
            );
        }
        Ok(())
    }
}

// ------------------------------------------------------------------ //
//  FakeNotificationSink (for tests)                                   //
// ------------------------------------------------------------------ //

/// In-memory sink that collects notifications for test assertions.
#[derive(Debug, Default, Clone)]
pub struct FakeNotificationSink {
    pub sent: Arc<Mutex<Vec<AlertNotification>>>,
}

impl FakeNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume everything sent so far.
    pub fn drain(&self) -> Vec<AlertNotification> {
        self.lock().drain(..).collect()
    }

    pub fn snapshot(&self) -> Vec<AlertNotification> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AlertNotification>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl NotificationSink for FakeNotificationSink {
    async fn notify(&self, notifications: Vec<AlertNotification>) -> Result<()> {
        self.lock().extend(notifications);
        Ok(())
    }
}

// ------------------------------------------------------------------ //
//  AmqpNotificationSink (production)                                  //
// ------------------------------------------------------------------ //

/// Publishes JSON notifications to the durable `bassin.alerts` queue.
pub struct AmqpNotificationSink {
    channel: lapin::Channel,
}

impl AmqpNotificationSink {
    pub async fn connect(url: &str) -> Result<Self> {
        let conn = lapin::Connection::connect(url, lapin::ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;
        let channel = conn.create_channel().await.context("Failed to open AMQP channel")?;
        channel
            .queue_declare(
                ALERT_QUEUE,
                lapin::options::QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                lapin::types::FieldTable::default(),
            )
            .await
            .context("Failed to declare alert queue")?;
        Ok(Self { channel })
    }
}

#[async_trait]
impl NotificationSink for AmqpNotificationSink {
    async fn notify(&self, notifications: Vec<AlertNotification>) -> Result<()> {
        for n in &notifications {
            let body = serde_json::to_vec(n).context("Failed to encode notification")?;
            self.channel
                .basic_publish(
                    "",
                    ALERT_QUEUE,
                    lapin::options::BasicPublishOptions::default(),
                    &body,
                    lapin::BasicProperties::default().with_content_type("application/json".into()),
                )
                .await
                .context("AMQP publish failed")?;
        }
        Ok(())
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use water_quality::{AlertSeverity, Parameter};

    fn alert() -> Alert {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Alert {
            id: Alert::stable_id("bassin-1", Parameter::Temperature, ts),
            pool_id: "bassin-1".into(),
            parameter: Parameter::Temperature,
            severity: AlertSeverity::Warning,
            message: "High Temperature levels detected: 25.00°C".into(),
            value: 25.0,
            timestamp: ts,
            acknowledged: false,
        }
    }

    #[tokio::test]
    async fn fake_sink_collects_and_drains() {
        let sink = FakeNotificationSink::new();
        sink.notify(vec![AlertNotification::new("u1", Grade::Good, alert())]).await.unwrap();
        assert_eq!(sink.snapshot().len(), 1);
        assert_eq!(sink.drain().len(), 1);
        assert!(sink.snapshot().is_empty());
    }

    #[tokio::test]
    async fn log_sink_accepts_notifications() {
        let n = AlertNotification::new("u1", Grade::Warning, alert());
        assert!(LogNotificationSink.notify(vec![n]).await.is_ok());
    }

    #[test]
    fn payload_is_tagged_json() {
        let n = AlertNotification::new("u1", Grade::Good, alert());
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "PoolAlertRaised.v1");
        assert_eq!(v["pool_id"], "bassin-1");
        assert_eq!(v["user_id"], "u1");
        assert_eq!(v["alert"]["severity"], "Warning");
        assert_eq!(v["alert"]["parameter"], "temperature");
    }
}
