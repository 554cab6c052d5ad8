//! # Postgres Notification Listener
//!
//! Subscribes to the indexer database with `LISTEN` and forwards every
//! `NOTIFY` payload to the ingestion handler as a [`ChangeNotification`].
//!
//! When a notification table is configured the listener first installs an
//! `AFTER INSERT` trigger that publishes each new row as JSON on the
//! channel. Otherwise the trigger is expected to exist already.
//!
//! A dropped connection is re-established on the next receive; anything
//! notified while disconnected is lost and must be re-notified upstream.

use std::time::Duration;

use anyhow::{Context, Result};
use attestation_relay::ChangeNotification;
use sqlx::postgres::{PgListener, PgPool};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;

/// Pause before receiving again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// `LISTEN` loop feeding the ingestion handler.
pub struct PostgresListener {
    listener: PgListener,
    channel: String,
    notifications: mpsc::Sender<ChangeNotification>,
}

impl PostgresListener {
    /// Connect, install the trigger if configured, and start listening.
    pub async fn connect(
        config: &RelayConfig,
        notifications: mpsc::Sender<ChangeNotification>,
    ) -> Result<Self> {
        let pool = PgPool::connect(&config.database_url)
            .await
            .with_context(|| format!("Failed to connect to {}", config.redacted_database_url()))?;

        if let Some(table) = &config.notification_table {
            sqlx::raw_sql(&trigger_sql(&config.notification_channel, table))
                .execute(&pool)
                .await
                .with_context(|| format!("Failed to install notify trigger on {}", table))?;
            info!(
                "[relay-runtime] Notify trigger installed on {} (channel {})",
                table, config.notification_channel
            );
        }

        let mut listener = PgListener::connect_with(&pool)
            .await
            .context("Failed to open LISTEN connection")?;
        listener
            .listen(&config.notification_channel)
            .await
            .with_context(|| format!("Failed to LISTEN on {}", config.notification_channel))?;

        Ok(Self {
            listener,
            channel: config.notification_channel.clone(),
            notifications,
        })
    }

    /// Forward notifications until shutdown or until the handler goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "[relay-runtime] Listening for inserts on channel {}",
            self.channel
        );

        loop {
            tokio::select! {
                received = self.listener.recv() => match received {
                    Ok(notification) => {
                        if !forward(&self.notifications, notification.payload()).await {
                            info!("[relay-runtime] Notification handler gone, listener exiting");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("[relay-runtime] Notification connection error: {}", e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                },
                _ = shutdown.changed() => {
                    info!("[relay-runtime] Notification listener shutting down");
                    break;
                }
            }
        }
    }
}

/// Hand one payload to the ingestion handler. `false` once the handler's
/// receiver is closed.
async fn forward(notifications: &mpsc::Sender<ChangeNotification>, payload: &str) -> bool {
    if payload.is_empty() {
        warn!("[relay-runtime] Ignoring empty notification payload");
        return true;
    }
    debug!("[relay-runtime] Received payload: {}", payload);
    notifications
        .send(ChangeNotification {
            payload: payload.to_string(),
        })
        .await
        .is_ok()
}

/// Trigger function and `AFTER INSERT` trigger publishing each new row of
/// `table` as JSON on `channel`. Both names must already be validated
/// identifiers.
pub fn trigger_sql(channel: &str, table: &str) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {channel}_notify() RETURNS trigger AS $$\n\
         BEGIN\n\
         \x20 PERFORM pg_notify('{channel}', row_to_json(NEW)::text);\n\
         \x20 RETURN NEW;\n\
         END;\n\
         $$ LANGUAGE plpgsql;\n\
         DROP TRIGGER IF EXISTS {channel}_trigger ON {table};\n\
         CREATE TRIGGER {channel}_trigger AFTER INSERT ON {table} \
         FOR EACH ROW EXECUTE FUNCTION {channel}_notify();"
    )
}
