//! Deterministic in-memory implementations of the ports.
//! Every double counts its calls so tests can assert which side effects ran.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use crate::domain::{Gateway, NewTransaction, Transaction};
use crate::ports::{
    BusError, DirectoryError, DispatchClient, DispatchError, GatewayDirectory, MessageBus,
    StoreError, StoreResult, TransactionStore,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Gateways keyed by country.
#[derive(Debug, Default)]
pub struct StaticGatewayDirectory {
    gateways: HashMap<i32, Vec<Gateway>>,
    fail: bool,
    calls: AtomicUsize,
}

impl StaticGatewayDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_country(mut self, country_id: i32, gateways: Vec<Gateway>) -> Self {
        self.gateways.insert(country_id, gateways);
        self
    }

    /// Every lookup fails.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatewayDirectory for StaticGatewayDirectory {
    async fn gateways_for_country(&self, country_id: i32) -> Result<Vec<Gateway>, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DirectoryError::Unavailable(format!(
                "lookup for country {country_id} failed"
            )));
        }
        Ok(self.gateways.get(&country_id).cloned().unwrap_or_default())
    }
}

/// Store with a monotonically increasing id sequence.
#[derive(Debug)]
pub struct InMemoryTransactionStore {
    records: Mutex<HashMap<i64, Transaction>>,
    next_id: AtomicI64,
    fail_creates: AtomicBool,
    fail_updates: AtomicBool,
    creates: AtomicUsize,
    updates: Mutex<Vec<(i64, String)>>,
}

impl Default for InMemoryTransactionStore {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first created transaction gets `first_id`.
    pub fn starting_at(first_id: i64) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(first_id),
            fail_creates: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            creates: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Every `update_status` call received, including failed ones.
    pub fn status_updates(&self) -> Vec<(i64, String)> {
        lock(&self.updates).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, tx: NewTransaction) -> StoreResult<Transaction> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert rejected".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let persisted = tx.persisted(id);
        lock(&self.records).insert(id, persisted.clone());
        Ok(persisted)
    }

    async fn update_status(&self, id: i64, status: &str) -> StoreResult<()> {
        lock(&self.updates).push((id, status.to_string()));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("update rejected".to_string()));
        }
        let mut records = lock(&self.records);
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.status = status.to_string();
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<Transaction> {
        lock(&self.records)
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }
}

/// Fails the first `failures` sends, then succeeds.
#[derive(Debug, Default)]
pub struct ScriptedDispatchClient {
    failures: u32,
    calls: AtomicU32,
    sent: Mutex<Vec<i64>>,
}

impl ScriptedDispatchClient {
    pub fn succeeding() -> Self {
        Self::failing_times(0)
    }

    pub fn failing_times(failures: u32) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_times(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Ids of transactions that were delivered.
    pub fn delivered(&self) -> Vec<i64> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl DispatchClient for ScriptedDispatchClient {
    async fn send(&self, tx: &Transaction) -> Result<(), DispatchError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(DispatchError::Unreachable(format!(
                "gateway {} unreachable (attempt {})",
                tx.gateway_id,
                attempt + 1
            )));
        }
        lock(&self.sent).push(tx.id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Message bus that records what it is given.
#[derive(Debug, Default)]
pub struct InMemoryMessageBus {
    messages: Mutex<Vec<PublishedMessage>>,
    fail: AtomicBool,
    closed: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of `send` calls that reached the bus, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        lock(&self.messages).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn send(&self, topic: &str, key: &str, payload: &[u8], _deadline: Instant) -> Result<(), BusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(BusError::PublishFailed {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }
        lock(&self.messages).push(PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
