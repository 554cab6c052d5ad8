//! # Message Feed
//!
//! JSON-lines bridge between the relay and the processes around it.
//!
//! Inbound, one message per line, tagged by `type`:
//!
//! ```text
//! {"type":"notification","payload":"{\"block$\":120,...}"}
//! {"type":"validation","content":{...},"metadata":{...}}
//! ```
//!
//! Notifications go to the ingestion handler; validations are delivered to
//! the in-process validation stream. Outbound, every message published on
//! the relay's own stream is written as one JSON line.

use attestation_relay::{ChangeNotification, InMemoryValidationNetwork, ValidationRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// One inbound feed line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    /// Change notification from the database listener.
    Notification(ChangeNotification),
    /// Validation observed on the validation network.
    Validation(ValidationRecord),
}

/// Parse one line; blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<FeedMessage>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Routes inbound feed messages to their consumers.
pub struct FeedRouter {
    notifications: mpsc::Sender<ChangeNotification>,
    network: Arc<InMemoryValidationNetwork>,
    validation_stream_id: String,
}

impl FeedRouter {
    /// Create a router.
    pub fn new(
        notifications: mpsc::Sender<ChangeNotification>,
        network: Arc<InMemoryValidationNetwork>,
        validation_stream_id: impl Into<String>,
    ) -> Self {
        Self {
            notifications,
            network,
            validation_stream_id: validation_stream_id.into(),
        }
    }

    /// Read lines until EOF or until the notification handler is gone.
    ///
    /// Unparseable lines are logged and skipped.
    pub async fn pump<R>(&self, reader: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            match parse_line(&line) {
                Ok(Some(FeedMessage::Notification(notification))) => {
                    if self.notifications.send(notification).await.is_err() {
                        warn!("[relay-runtime] Notification handler gone, stopping feed");
                        return Ok(());
                    }
                }
                Ok(Some(FeedMessage::Validation(record))) => {
                    let reached = self.network.deliver(&self.validation_stream_id, record);
                    debug!("[relay-runtime] Validation delivered to {} subscribers", reached);
                }
                Ok(None) => {}
                Err(e) => warn!("[relay-runtime] Skipping malformed feed line: {}", e),
            }
        }
        info!("[relay-runtime] Feed reached end of input");
        Ok(())
    }
}

/// Writes published messages as JSON lines.
pub struct PublishedForwarder<W> {
    receiver: broadcast::Receiver<ValidationRecord>,
    writer: W,
}

impl<W> PublishedForwarder<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a forwarder from a subscription on the publish stream.
    pub fn new(receiver: broadcast::Receiver<ValidationRecord>, writer: W) -> Self {
        Self { receiver, writer }
    }

    /// Run until the stream closes or the writer fails.
    pub async fn run(mut self) -> W {
        info!("[relay-runtime] Publish forwarder started");

        loop {
            match self.receiver.recv().await {
                Ok(record) => {
                    if let Err(e) = self.write_record(&record).await {
                        warn!("[relay-runtime] Publish forwarder stopped: {}", e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("[relay-runtime] Publish forwarder lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("[relay-runtime] Publish stream closed, exiting");
                    break;
                }
            }
        }
        self.writer
    }

    async fn write_record(&mut self, record: &ValidationRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await
    }
}
