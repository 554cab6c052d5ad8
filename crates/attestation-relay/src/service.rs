//! Relay Service - Core business logic
//!
//! Two independently triggered paths converge on the claim store:
//!
//! ```text
//! ChangeNotification ──→ decode ──→ ledger receipts ──→ match ──→ publish ──→ store[source]
//!
//! ValidationRecord ──→ store[source]? ──no──→ discard (orphan)
//!                            │
//!                           yes
//!                            ↓
//!                  append store[validator] ──→ count < threshold ──→ pending
//!                                                     │
//!                                                 quorum reached
//!                                                     ↓
//!                                 dispatch {source, validation} ──→ delete both entries
//! ```
//!
//! All claim store work for one event runs under that event's key lock, so
//! concurrent validations for the same event cannot lose updates and
//! quorum fires once.

use crate::algorithms::{claim_keys, key_for, quorum_reached, ReceiptMatcher};
use crate::dispatcher::Dispatcher;
use crate::domain::{
    ChangeNotification, ClaimParameters, ClaimRole, CorrelationKey, DispatchRecord,
    QuorumThreshold, RelayResult, SourceClaim, ValidationRecord,
};
use crate::locks::KeyedLocks;
use crate::ports::inbound::{AttestationRelayApi, ValidationOutcome};
use crate::ports::outbound::{ClaimStore, DestinationClient, LedgerClient, ValidationPublisher};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Relay service configuration.
#[derive(Clone, Debug)]
pub struct RelayServiceConfig {
    /// Contract whose receipts are watched.
    pub contract_address: String,
    /// Chain identifier stamped on published envelopes.
    pub chain_id: String,
    /// Validations required before dispatch.
    pub threshold: QuorumThreshold,
}

/// Relay service implementation.
pub struct RelayService<L, P, S, D>
where
    L: LedgerClient,
    P: ValidationPublisher,
    S: ClaimStore,
    D: DestinationClient,
{
    matcher: ReceiptMatcher,
    threshold: QuorumThreshold,
    ledger: Arc<L>,
    publisher: Arc<P>,
    store: Arc<S>,
    dispatcher: Dispatcher<D>,
    locks: KeyedLocks,
}

impl<L, P, S, D> RelayService<L, P, S, D>
where
    L: LedgerClient,
    P: ValidationPublisher,
    S: ClaimStore,
    D: DestinationClient,
{
    /// Create a new relay service.
    pub fn new(
        config: RelayServiceConfig,
        ledger: Arc<L>,
        publisher: Arc<P>,
        store: Arc<S>,
        destination: Arc<D>,
    ) -> Self {
        Self {
            matcher: ReceiptMatcher::new(config.contract_address, config.chain_id),
            threshold: config.threshold,
            ledger,
            publisher,
            store,
            dispatcher: Dispatcher::new(destination),
            locks: KeyedLocks::new(),
        }
    }

    /// Configured quorum threshold.
    pub fn threshold(&self) -> QuorumThreshold {
        self.threshold
    }

    /// Read and decode the validator sequence for `key`; absent is empty.
    async fn load_validations(&self, key: &CorrelationKey) -> RelayResult<Vec<ValidationRecord>> {
        match self.store.get(key).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Remove both entries after a successful dispatch.
    ///
    /// Failures are logged and reported as `false`; nothing is rolled back.
    async fn clear_claim(&self, source_key: &CorrelationKey, validator_key: &CorrelationKey) -> bool {
        let mut cleaned = true;
        for key in [source_key, validator_key] {
            if let Err(e) = self.store.delete(key).await {
                error!("[relay] Failed to clear {}: {}", key, e);
                cleaned = false;
            }
        }
        if cleaned {
            info!("[relay] Cache for Event:{} cleared", source_key);
        }
        cleaned
    }
}

#[async_trait]
impl<L, P, S, D> AttestationRelayApi for RelayService<L, P, S, D>
where
    L: LedgerClient,
    P: ValidationPublisher,
    S: ClaimStore,
    D: DestinationClient,
{
    async fn ingest_notification(
        &self,
        notification: ChangeNotification,
    ) -> RelayResult<SourceClaim> {
        debug!("[relay] Received payload: {}", notification.payload);

        let claim = ClaimParameters::from_payload(&notification.payload)?;
        let receipts = self.ledger.get_block_receipts(claim.block_number).await?;
        let envelope = self.matcher.match_claim(&claim, &receipts)?;

        info!(
            "[relay] Matched block {} to log {}, publishing",
            claim.block_number,
            envelope.identity()
        );
        let signed = self.publisher.publish(&envelope).await?;

        let identity = signed.content.identity();
        let (source_key, _) = claim_keys(&signed.content);
        let _guard = self.locks.lock(&identity.to_string()).await;
        self.store
            .set(&source_key, serde_json::to_string(&signed)?)
            .await?;

        info!("[relay] Event:{} tracked, awaiting validations", source_key);
        Ok(signed)
    }

    async fn handle_validation(&self, record: ValidationRecord) -> RelayResult<ValidationOutcome> {
        let identity = record.content.identity();
        let source_key = key_for(ClaimRole::Source, &identity);
        let validator_key = key_for(ClaimRole::Validator, &identity);

        let _guard = self.locks.lock(&identity.to_string()).await;

        let Some(source_json) = self.store.get(&source_key).await? else {
            debug!("[relay] Event:{} not tracked, discarding validation", source_key);
            return Ok(ValidationOutcome::Orphan { key: source_key });
        };
        info!(
            "[relay] Event:{} received a validation from {}",
            source_key, record.metadata.publisher_id
        );
        let source: SourceClaim = serde_json::from_str(&source_json)?;

        // Most recent first
        let mut validations = self.load_validations(&validator_key).await?;
        validations.insert(0, record);
        self.store
            .set(&validator_key, serde_json::to_string(&validations)?)
            .await?;

        let validations = self.load_validations(&validator_key).await?;
        let count = validations.len();

        if !quorum_reached(count, self.threshold) {
            debug!(
                "[relay] Event:{} has {}/{} validations",
                source_key, count, self.threshold
            );
            return Ok(ValidationOutcome::Pending {
                count,
                threshold: self.threshold.get(),
            });
        }

        info!(
            "[relay] Event:{} has enough validations ({}/{}), dispatching",
            source_key, count, self.threshold
        );
        let record = DispatchRecord {
            source,
            validation: validations,
        };
        if let Err(e) = self.dispatcher.dispatch(&source_key, &record).await {
            warn!("[relay] Event:{} left in store after failed dispatch", source_key);
            return Err(e);
        }

        let cleaned = self.clear_claim(&source_key, &validator_key).await;
        Ok(ValidationOutcome::Dispatched { count, cleaned })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryClaimStore;
    use crate::algorithms::encode_deposit_log;
    use crate::domain::{
        DepositEvent, MessageMetadata, ReceiptLog, RelayError, TransactionReceipt,
    };
    use crate::ports::outbound::{MockDestinationClient, MockLedgerClient, MockPublisher};

    const CONTRACT: &str = "0x1111111111111111111111111111111111111111";
    const BLOCK: u64 = 120;

    type TestService =
        RelayService<MockLedgerClient, MockPublisher, InMemoryClaimStore, MockDestinationClient>;

    struct Harness {
        service: TestService,
        store: Arc<InMemoryClaimStore>,
        publisher: Arc<MockPublisher>,
        destination: Arc<MockDestinationClient>,
    }

    fn deposit() -> DepositEvent {
        DepositEvent {
            account: "0x00000000000000000000000000000000000000aa".to_string(),
            token: "0x00000000000000000000000000000000000000bb".to_string(),
            canister_id: "canister-1".to_string(),
            amount: "1000".to_string(),
            chain: "ethereum".to_string(),
        }
    }

    fn receipts() -> Vec<TransactionReceipt> {
        vec![TransactionReceipt {
            to: Some(CONTRACT.to_string()),
            logs: vec![ReceiptLog {
                address: CONTRACT.to_string(),
                block_hash: "0xb1".to_string(),
                raw: encode_deposit_log(&deposit()).unwrap(),
                log_index: 2,
                transaction_hash: "0xt1".to_string(),
            }],
        }]
    }

    fn notification() -> ChangeNotification {
        ChangeNotification {
            payload: serde_json::json!({
                "block$": BLOCK,
                "account": "\\x00000000000000000000000000000000000000AA",
                "canister_id": "canister-1",
                "amount": 1000,
                "chain": "ethereum",
                "token": "\\x00000000000000000000000000000000000000BB",
            })
            .to_string(),
        }
    }

    fn harness_with(threshold: usize, destination: MockDestinationClient) -> Harness {
        let store = Arc::new(InMemoryClaimStore::new());
        let publisher = Arc::new(MockPublisher::default());
        let destination = Arc::new(destination);
        let ledger = Arc::new(MockLedgerClient::default().with_block(BLOCK, receipts()));
        let service = RelayService::new(
            RelayServiceConfig {
                contract_address: CONTRACT.to_string(),
                chain_id: "1".to_string(),
                threshold: QuorumThreshold::new(threshold).unwrap(),
            },
            ledger,
            Arc::clone(&publisher),
            Arc::clone(&store),
            Arc::clone(&destination),
        );
        Harness {
            service,
            store,
            publisher,
            destination,
        }
    }

    fn harness(threshold: usize) -> Harness {
        harness_with(threshold, MockDestinationClient::default())
    }

    fn validation(publisher: &str, source: &SourceClaim) -> ValidationRecord {
        ValidationRecord {
            content: source.content.clone(),
            metadata: MessageMetadata {
                stream_id: "validators".to_string(),
                publisher_id: publisher.to_string(),
                timestamp: 1_700_000_000_000,
                sequence_number: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_ingest_stores_source_claim() {
        let h = harness(1);
        let signed = h.service.ingest_notification(notification()).await.unwrap();

        let (source_key, validator_key) = claim_keys(&signed.content);
        assert!(h.store.contains(&source_key));
        assert!(!h.store.contains(&validator_key));
        assert_eq!(h.publisher.published.lock().len(), 1);
        assert_eq!(signed.content.channel_id, "evm-validate");
    }

    #[tokio::test]
    async fn test_ingest_malformed_payload() {
        let h = harness(1);
        let err = h
            .service
            .ingest_notification(ChangeNotification {
                payload: "{oops".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MalformedPayload(_)));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_block_not_found() {
        let h = harness(1);
        let payload = notification().payload.replace("120", "121");
        let err = h
            .service
            .ingest_notification(ChangeNotification { payload })
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::BlockNotFound { block_number: 121 }));
        assert!(h.publisher.published.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_receipt_not_found() {
        let h = harness(1);
        let payload = notification().payload.replace("1000", "2000");
        let err = h
            .service
            .ingest_notification(ChangeNotification { payload })
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ReceiptNotFound { .. }));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_orphan_validation_discarded() {
        let h = harness(1);
        let signed = h.service.ingest_notification(notification()).await.unwrap();
        let mut stray = validation("0xv1", &signed);
        stray.content.log_index = 99;

        let outcome = h.service.handle_validation(stray).await.unwrap();
        assert!(matches!(outcome, ValidationOutcome::Orphan { .. }));
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.destination.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        let h = harness(3);
        let signed = h.service.ingest_notification(notification()).await.unwrap();

        for (i, expected) in [1usize, 2].into_iter().enumerate() {
            let outcome = h
                .service
                .handle_validation(validation(&format!("0xv{i}"), &signed))
                .await
                .unwrap();
            assert_eq!(
                outcome,
                ValidationOutcome::Pending {
                    count: expected,
                    threshold: 3
                }
            );
            assert_eq!(h.destination.dispatch_count(), 0);
        }

        let outcome = h
            .service
            .handle_validation(validation("0xv2", &signed))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::Dispatched {
                count: 3,
                cleaned: true
            }
        );
        assert_eq!(h.destination.dispatch_count(), 1);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_validations_stored_most_recent_first() {
        let h = harness(3);
        let signed = h.service.ingest_notification(notification()).await.unwrap();
        for publisher in ["0xa", "0xb", "0xc"] {
            h.service
                .handle_validation(validation(publisher, &signed))
                .await
                .unwrap();
        }

        let payloads = h.destination.payloads.lock();
        let record: DispatchRecord = serde_json::from_str(&payloads[0]).unwrap();
        let order: Vec<&str> = record
            .validation
            .iter()
            .map(|v| v.metadata.publisher_id.as_str())
            .collect();
        assert_eq!(order, vec!["0xc", "0xb", "0xa"]);
        assert_eq!(record.source, signed);
    }

    #[tokio::test]
    async fn test_validation_after_dispatch_is_orphan() {
        let h = harness(1);
        let signed = h.service.ingest_notification(notification()).await.unwrap();
        h.service
            .handle_validation(validation("0xv1", &signed))
            .await
            .unwrap();

        let outcome = h
            .service
            .handle_validation(validation("0xv2", &signed))
            .await
            .unwrap();
        assert!(matches!(outcome, ValidationOutcome::Orphan { .. }));
        assert_eq!(h.destination.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_dispatch_keeps_entries_and_retries() {
        let h = harness_with(1, MockDestinationClient::failing(1));
        let signed = h.service.ingest_notification(notification()).await.unwrap();

        let err = h
            .service
            .handle_validation(validation("0xv1", &signed))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::DispatchFailure { .. }));
        assert_eq!(h.store.len(), 2);

        let outcome = h
            .service
            .handle_validation(validation("0xv2", &signed))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::Dispatched {
                count: 2,
                cleaned: true
            }
        );
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_validation_key_ignores_hex_case() {
        let h = harness(1);
        let signed = h.service.ingest_notification(notification()).await.unwrap();
        let mut upper = validation("0xv1", &signed);
        upper.content.transaction_hash = upper.content.transaction_hash.to_uppercase();
        upper.content.block_hash = upper.content.block_hash.to_uppercase();

        let outcome = h.service.handle_validation(upper).await.unwrap();
        assert!(matches!(outcome, ValidationOutcome::Dispatched { .. }));
    }

    /// Store whose deletes always fail.
    #[derive(Default)]
    struct UndeletableStore {
        inner: InMemoryClaimStore,
    }

    #[async_trait]
    impl ClaimStore for UndeletableStore {
        async fn get(&self, key: &CorrelationKey) -> RelayResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &CorrelationKey, value: String) -> RelayResult<()> {
            self.inner.set(key, value).await
        }

        async fn delete(&self, _key: &CorrelationKey) -> RelayResult<()> {
            Err(RelayError::StoreFailure("delete refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_cleanup_reports_uncleaned() {
        let store = Arc::new(UndeletableStore::default());
        let destination = Arc::new(MockDestinationClient::default());
        let service = RelayService::new(
            RelayServiceConfig {
                contract_address: CONTRACT.to_string(),
                chain_id: "1".to_string(),
                threshold: QuorumThreshold::new(1).unwrap(),
            },
            Arc::new(MockLedgerClient::default().with_block(BLOCK, receipts())),
            Arc::new(MockPublisher::default()),
            Arc::clone(&store),
            Arc::clone(&destination),
        );
        let signed = service.ingest_notification(notification()).await.unwrap();

        let outcome = service
            .handle_validation(validation("0xv1", &signed))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::Dispatched {
                count: 1,
                cleaned: false
            }
        );
        assert_eq!(destination.dispatch_count(), 1);

        // Entries remain since nothing could be removed
        let (source_key, validator_key) = claim_keys(&signed.content);
        assert!(store.inner.contains(&source_key));
        assert!(store.inner.contains(&validator_key));
    }

    #[tokio::test]
    async fn test_every_arrival_order_dispatches_once() {
        let orders = [
            ["0xv1", "0xv2", "0xv3"],
            ["0xv1", "0xv3", "0xv2"],
            ["0xv2", "0xv1", "0xv3"],
            ["0xv2", "0xv3", "0xv1"],
            ["0xv3", "0xv1", "0xv2"],
            ["0xv3", "0xv2", "0xv1"],
        ];

        for order in orders {
            let h = harness(3);
            let signed = h.service.ingest_notification(notification()).await.unwrap();

            let mut last = None;
            for publisher in order {
                last = Some(
                    h.service
                        .handle_validation(validation(publisher, &signed))
                        .await
                        .unwrap(),
                );
            }
            assert_eq!(
                last,
                Some(ValidationOutcome::Dispatched {
                    count: 3,
                    cleaned: true
                }),
                "{order:?}"
            );
            assert_eq!(h.destination.dispatch_count(), 1, "{order:?}");

            let payloads = h.destination.payloads.lock();
            let record: DispatchRecord = serde_json::from_str(&payloads[0]).unwrap();
            let mut seen: Vec<&str> = record
                .validation
                .iter()
                .map(|v| v.metadata.publisher_id.as_str())
                .collect();
            seen.sort_unstable();
            assert_eq!(seen, vec!["0xv1", "0xv2", "0xv3"]);
        }
    }
}
