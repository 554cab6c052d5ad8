//! # Relay Runtime
//!
//! Builds the relay service from configuration and supervises its tasks.
//!
//! ```text
//! Postgres NOTIFY ──→ PostgresListener ──┐
//!                                        ↓
//! stdin ──→ FeedRouter ──notification──→ NotificationHandler ──→ RelayService
//!                │                                                   │
//!                └──validation──→ [validation stream]                 │ publish
//!                                        │                           ↓
//!                                 ValidationHandler          [publish stream]
//!                                        │                           │
//!                                        ↓                           ↓
//!                                   RelayService            PublishedForwarder ──→ stdout
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use attestation_relay::{
    InMemoryClaimStore, InMemoryValidationNetwork, JsonRpcDestinationClient, JsonRpcLedgerClient,
    NetworkPublisher, PublisherIdentity, RelayService, RelayServiceConfig,
};
use parking_lot::Mutex;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::RelayConfig;
use crate::feed::{FeedRouter, PublishedForwarder};
use crate::handlers::{NotificationHandler, ValidationHandler};
use crate::listener::PostgresListener;

/// Notifications buffered between the feed and the ingestion handler.
const NOTIFICATION_QUEUE: usize = 256;

/// How long shutdown waits for in-flight ingestions and dispatches.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// A handler loop; resolves to the tasks still running when it stopped.
type HandlerLoop = JoinHandle<Vec<JoinHandle<()>>>;

/// Relay service wired to live adapters.
pub type LiveRelayService = RelayService<
    JsonRpcLedgerClient,
    NetworkPublisher,
    InMemoryClaimStore,
    JsonRpcDestinationClient,
>;

/// The runtime owning the relay service and its supervising tasks.
pub struct RelayRuntime {
    config: RelayConfig,
    service: Arc<LiveRelayService>,
    network: Arc<InMemoryValidationNetwork>,
    identity: PublisherIdentity,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handlers: Mutex<Vec<HandlerLoop>>,
}

impl RelayRuntime {
    /// Build the runtime from configuration.
    pub fn new(config: RelayConfig) -> Result<Self> {
        let identity = PublisherIdentity::from_private_key(&config.private_key)
            .context("EVM_PRIVATE_KEY is not a valid secp256k1 key")?;

        let network = Arc::new(InMemoryValidationNetwork::new());
        let publisher = Arc::new(NetworkPublisher::new(
            Arc::clone(&network),
            config.publish_stream_id.clone(),
            identity.clone(),
        ));
        let service = Arc::new(RelayService::new(
            RelayServiceConfig {
                contract_address: config.contract_address.clone(),
                chain_id: config.chain_id.clone(),
                threshold: config.threshold,
            },
            Arc::new(JsonRpcLedgerClient::new(config.ledger_rpc_url.clone())),
            publisher,
            Arc::new(InMemoryClaimStore::new()),
            Arc::new(JsonRpcDestinationClient::new(
                config.destination_rpc_url.clone(),
            )),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            service,
            network,
            identity,
            shutdown_tx,
            shutdown_rx,
            handlers: Mutex::new(Vec::new()),
        })
    }

    /// Connect the notification listener, then start the handler loops and
    /// the stdin feed.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Attestation Relay v{}", crate::VERSION);
        info!("===========================================");
        info!("[relay-runtime] Publisher: {}", self.identity.address());
        info!("[relay-runtime] Contract: {}", self.config.contract_address);
        info!("[relay-runtime] Chain: {}", self.config.chain_id);
        info!("[relay-runtime] Threshold: {}", self.config.threshold);
        info!(
            "[relay-runtime] Notification source: {}",
            self.config.redacted_database_url()
        );
        info!("[relay-runtime] Publishing to: {}", self.config.publish_stream_id);
        info!(
            "[relay-runtime] Validations from: {}",
            self.config.validation_stream_id
        );

        // Subscriptions are taken before the feed starts so nothing is missed
        let validations = self.network.subscribe(&self.config.validation_stream_id);
        let published = self.network.subscribe(&self.config.publish_stream_id);
        let (notification_tx, notification_rx) = mpsc::channel(NOTIFICATION_QUEUE);

        let listener = PostgresListener::connect(&self.config, notification_tx.clone())
            .await
            .context("Failed to start the notification listener")?;
        tokio::spawn(listener.run(self.shutdown_rx.clone()));

        let validation_handler = ValidationHandler::new(validations, Arc::clone(&self.service));
        let notification_handler =
            NotificationHandler::new(notification_rx, Arc::clone(&self.service));
        self.handlers.lock().extend([
            tokio::spawn(validation_handler.run(self.shutdown_rx.clone())),
            tokio::spawn(notification_handler.run(self.shutdown_rx.clone())),
        ]);

        let forwarder = PublishedForwarder::new(published, tokio::io::stdout());
        let mut forwarder_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = forwarder.run() => {}
                _ = forwarder_shutdown.changed() => {
                    info!("[relay-runtime] Publish forwarder shutting down");
                }
            }
        });

        let router = FeedRouter::new(
            notification_tx,
            Arc::clone(&self.network),
            self.config.validation_stream_id.clone(),
        );
        let mut feed_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = router.pump(BufReader::new(tokio::io::stdin())) => {
                    if let Err(e) = result {
                        error!("[relay-runtime] Feed failed: {}", e);
                    }
                }
                _ = feed_shutdown.changed() => {
                    info!("[relay-runtime] Feed shutting down");
                }
            }
        });

        info!("[relay-runtime] Relay handlers started");
        Ok(())
    }

    /// Shutdown the relay gracefully.
    pub async fn shutdown(&self) {
        info!("[relay-runtime] Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("[relay-runtime] Failed to send shutdown signal: {}", e);
        }

        let handlers = std::mem::take(&mut *self.handlers.lock());
        if !drain_handlers(handlers, SHUTDOWN_GRACE).await {
            warn!(
                "[relay-runtime] In-flight work still running after {:?}, abandoning it",
                SHUTDOWN_GRACE
            );
        }

        info!("[relay-runtime] Shutdown complete");
    }

    /// The relay service.
    pub fn service(&self) -> Arc<LiveRelayService> {
        Arc::clone(&self.service)
    }

    /// Address the relay publishes under.
    pub fn publisher_address(&self) -> &str {
        self.identity.address()
    }
}

/// Wait for handler loops to stop and for the tasks they hand back to
/// finish. `false` if `grace` ran out first.
async fn drain_handlers(handlers: Vec<HandlerLoop>, grace: Duration) -> bool {
    let drain = async move {
        for handler in handlers {
            let tasks = match handler.await {
                Ok(tasks) => tasks,
                Err(e) => {
                    error!("[relay-runtime] Handler loop failed: {}", e);
                    continue;
                }
            };
            for task in tasks {
                if let Err(e) = task.await {
                    error!("[relay-runtime] In-flight task failed: {}", e);
                }
            }
        }
    };
    tokio::time::timeout(grace, drain).await.is_ok()
}
