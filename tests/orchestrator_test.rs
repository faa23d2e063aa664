use bigdecimal::BigDecimal;
use std::sync::Arc;
use std::time::Duration;

use paygate_core::adapters::memory::{
    InMemoryMessageBus, InMemoryTransactionStore, ScriptedDispatchClient, StaticGatewayDirectory,
};
use paygate_core::domain::{Gateway, TransactionRequest, TransactionType, PROCESSING_MESSAGE};
use paygate_core::ports::{StoreError, TransactionStore};
use paygate_core::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
use paygate_core::services::{
    ErrorKind, PriorityGatewaySelector, ResilientPublisher, SelectionError, TransactionError,
    TransactionOrchestrator,
};

struct Harness {
    store: Arc<InMemoryTransactionStore>,
    directory: Arc<StaticGatewayDirectory>,
    dispatch: Arc<ScriptedDispatchClient>,
    bus: Arc<InMemoryMessageBus>,
    breaker: CircuitBreaker,
    orchestrator: TransactionOrchestrator,
    selector: PriorityGatewaySelector,
}

fn gateway(id: i32, priority: i32) -> Gateway {
    Gateway {
        id,
        name: format!("gateway-{id}"),
        data_format_supported: "application/json".to_string(),
        priority,
        country_id: 840,
    }
}

fn request(amount: i64, user_id: i64) -> TransactionRequest {
    TransactionRequest {
        amount: BigDecimal::from(amount),
        user_id,
        country_id: 840,
        currency: "USD".to_string(),
    }
}

fn harness(dispatch: ScriptedDispatchClient) -> Harness {
    let store = Arc::new(InMemoryTransactionStore::starting_at(12345));
    let directory = Arc::new(StaticGatewayDirectory::new().with_country(840, vec![gateway(1, 1)]));
    let dispatch = Arc::new(dispatch);
    let bus = Arc::new(InMemoryMessageBus::new());
    let breaker = CircuitBreaker::new(
        "kafka-publisher",
        CircuitBreakerConfig {
            failure_threshold: 5,
            reset_interval: Duration::from_secs(5),
            call_timeout: Duration::from_secs(3),
        },
    );
    let publisher = Arc::new(ResilientPublisher::new(
        bus.clone(),
        breaker.clone(),
        RetryPolicy::immediate(5),
    ));

    let orchestrator = TransactionOrchestrator::new(store.clone(), dispatch.clone(), publisher)
        .with_dispatch_retry(RetryPolicy::immediate(5))
        .with_compensation_retry(RetryPolicy::immediate(3));
    let selector = PriorityGatewaySelector::new(directory.clone());

    Harness {
        store,
        directory,
        dispatch,
        bus,
        breaker,
        orchestrator,
        selector,
    }
}

#[tokio::test]
async fn test_successful_deposit_returns_receipt() {
    let h = harness(ScriptedDispatchClient::succeeding());

    let response = h
        .orchestrator
        .process_transaction(&request(100, 1), &h.selector, TransactionType::Deposit)
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.message, PROCESSING_MESSAGE);
    assert_eq!(response.data.transaction_id, 12345);
    assert_eq!(response.data.gateway_id, 1);
    assert_eq!(response.data.status, "pending");

    assert_eq!(h.dispatch.delivered(), vec![12345]);

    let messages = h.bus.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].topic, "transactions.json");
    assert_eq!(messages[0].key, "12345");

    let event: serde_json::Value = serde_json::from_slice(&messages[0].payload).unwrap();
    assert_eq!(event["id"], 12345);
    assert_eq!(event["type"], "deposit");
    assert_eq!(event["status"], "pending");
    assert_eq!(event["user_id"], 1);
    assert_eq!(event["gateway_id"], 1);
    assert_eq!(event["country_id"], 840);
    assert!(event.get("created_at").is_some());
    assert!(event.get("amount").is_some());
}

#[tokio::test]
async fn test_withdrawal_is_persisted_with_its_type() {
    let h = harness(ScriptedDispatchClient::succeeding());

    h.orchestrator
        .process_transaction(&request(40, 7), &h.selector, TransactionType::Withdrawal)
        .await
        .unwrap();

    let stored = h.store.get_by_id(12345).await.unwrap();
    assert_eq!(stored.transaction_type, TransactionType::Withdrawal);
    assert_eq!(stored.user_id, 7);
    assert_eq!(stored.gateway_id, 1);
}

#[tokio::test]
async fn test_invalid_amount_has_no_side_effects() {
    let h = harness(ScriptedDispatchClient::succeeding());

    for amount in [0, -10] {
        let err = h
            .orchestrator
            .process_transaction(&request(amount, 1), &h.selector, TransactionType::Deposit)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    assert_eq!(h.directory.calls(), 0);
    assert_eq!(h.store.create_calls(), 0);
    assert_eq!(h.dispatch.calls(), 0);
    assert_eq!(h.bus.calls(), 0);
}

#[tokio::test]
async fn test_invalid_user_has_no_side_effects() {
    let h = harness(ScriptedDispatchClient::succeeding());

    let err = h
        .orchestrator
        .process_transaction(&request(100, 0), &h.selector, TransactionType::Deposit)
        .await
        .unwrap_err();

    assert!(matches!(err, TransactionError::InvalidUser));
    assert_eq!(h.directory.calls(), 0);
    assert_eq!(h.store.create_calls(), 0);
    assert_eq!(h.dispatch.calls(), 0);
    assert_eq!(h.bus.calls(), 0);
}

#[tokio::test]
async fn test_no_gateway_for_country() {
    let h = harness(ScriptedDispatchClient::succeeding());
    let mut req = request(100, 1);
    req.country_id = 999;

    let err = h
        .orchestrator
        .process_transaction(&req, &h.selector, TransactionType::Deposit)
        .await
        .unwrap_err();

    assert!(matches!(err, TransactionError::Selection(SelectionError::NoGatewayAvailable)));
    assert_eq!(h.store.create_calls(), 0);
}

#[tokio::test]
async fn test_all_gateways_unhealthy() {
    let h = harness(ScriptedDispatchClient::succeeding());
    let selector = PriorityGatewaySelector::with_health_check(
        h.directory.clone(),
        Arc::new(|_: &Gateway| false),
    );

    let err = h
        .orchestrator
        .process_transaction(&request(100, 1), &selector, TransactionType::Deposit)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AllGatewaysUnhealthy);
    assert_eq!(h.store.create_calls(), 0);
}

#[tokio::test]
async fn test_create_failure_aborts_before_dispatch() {
    let h = harness(ScriptedDispatchClient::succeeding());
    h.store.fail_creates(true);

    let err = h
        .orchestrator
        .process_transaction(&request(100, 1), &h.selector, TransactionType::Deposit)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PersistenceFailed);
    assert_eq!(h.store.create_calls(), 1);
    assert_eq!(h.dispatch.calls(), 0);
    assert_eq!(h.bus.calls(), 0);
}

#[tokio::test]
async fn test_dispatch_exhaustion_marks_transaction_failed() {
    let h = harness(ScriptedDispatchClient::always_failing());

    let err = h
        .orchestrator
        .process_transaction(&request(100, 1), &h.selector, TransactionType::Deposit)
        .await
        .unwrap_err();

    match err {
        TransactionError::DispatchFailed { transaction_id, .. } => assert_eq!(transaction_id, 12345),
        other => panic!("expected DispatchFailed, got {other:?}"),
    }
    assert_eq!(h.dispatch.calls(), 5);
    assert_eq!(h.store.status_updates(), vec![(12345, "failed".to_string())]);
    assert_eq!(h.store.get_by_id(12345).await.unwrap().status, "failed");
    assert_eq!(h.bus.calls(), 0);
}

#[tokio::test]
async fn test_dispatch_recovers_within_retry_budget() {
    let h = harness(ScriptedDispatchClient::failing_times(4));

    let response = h
        .orchestrator
        .process_transaction(&request(100, 1), &h.selector, TransactionType::Deposit)
        .await
        .unwrap();

    assert_eq!(response.data.status, "pending");
    assert_eq!(h.dispatch.calls(), 5);
    assert!(h.store.status_updates().is_empty());
    assert_eq!(h.bus.messages().len(), 1);
}

#[tokio::test]
async fn test_failed_compensation_is_reported_distinctly() {
    let h = harness(ScriptedDispatchClient::always_failing());
    h.store.fail_updates(true);

    let err = h
        .orchestrator
        .process_transaction(&request(100, 1), &h.selector, TransactionType::Deposit)
        .await
        .unwrap_err();

    match &err {
        TransactionError::CompensationFailed {
            transaction_id,
            status_update,
            ..
        } => {
            assert_eq!(*transaction_id, 12345);
            assert!(matches!(status_update, StoreError::Unavailable(_)));
        }
        other => panic!("expected CompensationFailed, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::CompensationFailed);
    // Three compensation attempts, all rejected; the record is still pending.
    assert_eq!(h.store.status_updates().len(), 3);
    assert_eq!(h.store.get_by_id(12345).await.unwrap().status, "pending");
    assert_eq!(h.bus.calls(), 0);
}

#[tokio::test]
async fn test_publish_failure_leaves_transaction_pending() {
    let h = harness(ScriptedDispatchClient::succeeding());
    h.bus.fail_sends(true);

    let err = h
        .orchestrator
        .process_transaction(&request(100, 1), &h.selector, TransactionType::Deposit)
        .await
        .unwrap_err();

    match err {
        TransactionError::PublishFailed { transaction_id, .. } => assert_eq!(transaction_id, 12345),
        other => panic!("expected PublishFailed, got {other:?}"),
    }
    // Five attempts reach the bus and open the breaker.
    assert_eq!(h.bus.calls(), 5);
    assert_eq!(h.breaker.state().to_string(), "open");

    let stored = h.store.get_by_id(12345).await.unwrap();
    assert_eq!(stored.status, "pending");
    assert!(h.store.status_updates().is_empty());
}

#[tokio::test]
async fn test_open_breaker_short_circuits_publish() {
    let h = harness(ScriptedDispatchClient::succeeding());
    h.bus.fail_sends(true);

    let _ = h
        .orchestrator
        .process_transaction(&request(100, 1), &h.selector, TransactionType::Deposit)
        .await;
    let calls_after_open = h.bus.calls();

    h.bus.fail_sends(false);
    let err = h
        .orchestrator
        .process_transaction(&request(50, 2), &h.selector, TransactionType::Deposit)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PublishFailed);
    assert_eq!(h.bus.calls(), calls_after_open);
    assert_eq!(h.store.get_by_id(12346).await.unwrap().status, "pending");
}

#[tokio::test]
async fn test_callback_updates_status() {
    let h = harness(ScriptedDispatchClient::succeeding());
    h.orchestrator
        .process_transaction(&request(100, 1), &h.selector, TransactionType::Deposit)
        .await
        .unwrap();

    h.orchestrator.process_callback(12345, "completed").await.unwrap();

    assert_eq!(h.store.get_by_id(12345).await.unwrap().status, "completed");
}

#[tokio::test]
async fn test_callback_accepts_arbitrary_status() {
    let h = harness(ScriptedDispatchClient::succeeding());
    h.orchestrator
        .process_transaction(&request(100, 1), &h.selector, TransactionType::Deposit)
        .await
        .unwrap();

    h.orchestrator.process_callback(12345, "settled-manually").await.unwrap();

    assert_eq!(h.store.get_by_id(12345).await.unwrap().status, "settled-manually");
}

#[tokio::test]
async fn test_callback_for_unknown_transaction() {
    let h = harness(ScriptedDispatchClient::succeeding());

    let err = h.orchestrator.process_callback(404, "completed").await.unwrap_err();

    assert!(matches!(err, TransactionError::PersistenceFailed(StoreError::NotFound(404))));
}

#[tokio::test]
async fn test_concurrent_transactions_get_distinct_ids() {
    let h = harness(ScriptedDispatchClient::succeeding());
    let orchestrator = Arc::new(h.orchestrator);
    let selector = Arc::new(h.selector);

    let handles: Vec<_> = (1..=20)
        .map(|user| {
            let orchestrator = Arc::clone(&orchestrator);
            let selector = Arc::clone(&selector);
            tokio::spawn(async move {
                orchestrator
                    .process_transaction(&request(10, user), selector.as_ref(), TransactionType::Deposit)
                    .await
                    .map(|r| r.data.transaction_id)
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort_unstable();
    ids.dedup();

    assert_eq!(ids.len(), 20);
    assert_eq!(h.store.len(), 20);
    assert_eq!(h.bus.messages().len(), 20);
}
