//! # Relay Handlers
//!
//! Supervising loops for the two relay paths. Every message is handled in
//! its own task; failures are logged and never stop the loop. On shutdown a
//! loop stops taking messages and hands back its in-flight tasks so the
//! runtime can let them finish.

use std::sync::Arc;

use attestation_relay::{
    AttestationRelayApi, ChangeNotification, RelayError, ValidationOutcome, ValidationRecord,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Handler for change notifications (source ingestion path).
pub struct NotificationHandler<A> {
    /// Notifications forwarded by the feed.
    receiver: mpsc::Receiver<ChangeNotification>,
    api: Arc<A>,
}

impl<A> NotificationHandler<A>
where
    A: AttestationRelayApi + 'static,
{
    /// Create a new handler.
    pub fn new(receiver: mpsc::Receiver<ChangeNotification>, api: Arc<A>) -> Self {
        Self { receiver, api }
    }

    /// Run the handler loop until the feed closes or shutdown is signalled.
    ///
    /// Returns the in-flight tasks so callers can wait for them.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!("[relay-runtime] Notification handler started");
        let mut tasks = Vec::new();

        loop {
            let notification = tokio::select! {
                received = self.receiver.recv() => match received {
                    Some(notification) => notification,
                    None => {
                        info!("[relay-runtime] Notification feed closed, exiting");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    info!("[relay-runtime] Notification handler shutting down");
                    break;
                }
            };

            let api = Arc::clone(&self.api);
            tasks.retain(|task: &JoinHandle<()>| !task.is_finished());
            tasks.push(tokio::spawn(async move {
                match api.ingest_notification(notification).await {
                    Ok(claim) => {
                        debug!(
                            "[relay-runtime] Source claim {} published",
                            claim.content.identity()
                        );
                    }
                    Err(e) => log_ingest_error(&e),
                }
            }));
        }

        tasks.retain(|task| !task.is_finished());
        tasks
    }
}

fn log_ingest_error(e: &RelayError) {
    match e {
        RelayError::BlockNotFound { .. } | RelayError::ReceiptNotFound { .. } => {
            warn!("[relay-runtime] Notification not matched: {}", e);
        }
        _ => error!("[relay-runtime] Failed to ingest notification: {}", e),
    }
}

/// Handler for validation messages (validation aggregation path).
pub struct ValidationHandler<A> {
    /// Subscription on the validation stream.
    receiver: broadcast::Receiver<ValidationRecord>,
    api: Arc<A>,
}

impl<A> ValidationHandler<A>
where
    A: AttestationRelayApi + 'static,
{
    /// Create a new handler.
    pub fn new(receiver: broadcast::Receiver<ValidationRecord>, api: Arc<A>) -> Self {
        Self { receiver, api }
    }

    /// Run the handler loop until the stream closes or shutdown is signalled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!("[relay-runtime] Validation handler started");
        let mut tasks = Vec::new();

        loop {
            let received = tokio::select! {
                received = self.receiver.recv() => received,
                _ = shutdown.changed() => {
                    info!("[relay-runtime] Validation handler shutting down");
                    break;
                }
            };
            match received {
                Ok(record) => {
                    let api = Arc::clone(&self.api);
                    tasks.retain(|task: &JoinHandle<()>| !task.is_finished());
                    tasks.push(tokio::spawn(async move {
                        match api.handle_validation(record).await {
                            Ok(outcome) => log_outcome(&outcome),
                            Err(e) => error!("[relay-runtime] Failed to handle validation: {}", e),
                        }
                    }));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("[relay-runtime] Validation handler lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("[relay-runtime] Validation stream closed, exiting");
                    break;
                }
            }
        }
        tasks.retain(|task| !task.is_finished());
        tasks
    }
}

fn log_outcome(outcome: &ValidationOutcome) {
    match outcome {
        ValidationOutcome::Orphan { key } => {
            debug!("[relay-runtime] Discarded validation for untracked {}", key);
        }
        ValidationOutcome::Pending { count, threshold } => {
            debug!("[relay-runtime] Validation recorded ({}/{})", count, threshold);
        }
        ValidationOutcome::Dispatched { count, cleaned } => {
            info!(
                "[relay-runtime] Dispatched with {} validations (cleaned: {})",
                count, cleaned
            );
        }
    }
}
