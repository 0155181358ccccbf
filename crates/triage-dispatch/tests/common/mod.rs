//! Shared fixtures for dispatcher integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use triage_core::{
    CachedResult, ChangeTime, Entity, Job, JobHandle, JobItem, JobKey, JobStatus, ModelRegistry,
    PendingJob,
};
use triage_dispatch::{ChangeTimeOracle, DispatchSettings, Dispatcher, OracleError};
use triage_store::memory::{MemoryQueue, MemoryStore};
use triage_store::worker::{WorkerOutput, complete_job};
use triage_store::{Claim, JobQueue, QueuedJob, ResultStore, StoreError};

pub const MODEL: &str = "component";
pub const RESULT_TTL: Duration = Duration::from_secs(3600);

pub fn registry() -> ModelRegistry {
    ModelRegistry::new(["component", "regression", "defectenhancementtask"])
}

pub const fn settings() -> DispatchSettings {
    DispatchSettings {
        pending_ttl: Duration::from_secs(60),
        oracle_timeout: Duration::from_millis(200),
        store_timeout: Duration::from_secs(1),
    }
}

pub fn payload(class: &str) -> Value {
    json!({
        "prob": [0.11, 0.89],
        "index": 1,
        "class": class,
        "extra_data": {},
    })
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// In-memory tracker with programmable change times, latency, and failures.
///
/// Bulk lookups leave unknown entities out of the returned map, the way a
/// tracker search omits ids it cannot find.
#[derive(Default)]
pub struct ScriptedOracle {
    times: Mutex<HashMap<Entity, ChangeTime>>,
    delay: Duration,
    failing: AtomicBool,
    single_calls: AtomicUsize,
    bulk_calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn set(&self, entity: Entity, change_time: &str) {
        self.times
            .lock()
            .unwrap()
            .insert(entity, ChangeTime::new(change_time));
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.single_calls() + self.bulk_calls()
    }

    async fn respond(&self) -> Result<(), OracleError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(OracleError::Unavailable("tracker returned 502".into()));
        }
        Ok(())
    }
}

impl ChangeTimeOracle for ScriptedOracle {
    async fn fetch_one(&self, entity: &Entity) -> Result<Option<ChangeTime>, OracleError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        Ok(self.times.lock().unwrap().get(entity).cloned())
    }

    async fn fetch_many(
        &self,
        entities: &[Entity],
    ) -> Result<HashMap<Entity, Option<ChangeTime>>, OracleError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        let times = self.times.lock().unwrap();
        Ok(entities
            .iter()
            .filter_map(|entity| {
                times
                    .get(entity)
                    .map(|change_time| (entity.clone(), Some(change_time.clone())))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub dispatcher: Dispatcher<ScriptedOracle, MemoryStore, MemoryQueue>,
    pub oracle: Arc<ScriptedOracle>,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryQueue>,
}

pub fn harness(oracle: ScriptedOracle) -> Harness {
    let oracle = Arc::new(oracle);
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let dispatcher = Dispatcher::new(
        registry(),
        Arc::clone(&oracle),
        Arc::clone(&store),
        Arc::clone(&queue),
        settings(),
    );
    Harness {
        dispatcher,
        oracle,
        store,
        queue,
    }
}

// ---------------------------------------------------------------------------
// Failing backends
// ---------------------------------------------------------------------------

fn injected(operation: &str) -> StoreError {
    StoreError::InvalidState(format!("injected {operation} failure"))
}

/// In-memory store whose claims or handle writes can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing_claims: Mutex<Option<String>>,
    failing_attach: AtomicBool,
}

impl FlakyStore {
    /// Fail every claim on a key derived for `entity`.
    pub fn fail_claims_for(&self, entity: &Entity) {
        *self.failing_claims.lock().unwrap() = Some(format!(":{}:", entity.store_key()));
    }

    pub fn recover(&self) {
        *self.failing_claims.lock().unwrap() = None;
        self.failing_attach.store(false, Ordering::SeqCst);
    }

    pub fn fail_attach(&self) {
        self.failing_attach.store(true, Ordering::SeqCst);
    }

    fn claim_fails(&self, key: &JobKey) -> bool {
        self.failing_claims
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|needle| key.as_str().contains(needle))
    }
}

impl ResultStore for FlakyStore {
    async fn get_result(&self, key: &JobKey) -> Result<Option<CachedResult>, StoreError> {
        self.inner.get_result(key).await
    }

    async fn put_result(
        &self,
        key: &JobKey,
        result: &CachedResult,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.inner.put_result(key, result, ttl).await
    }

    async fn get_pending(&self, key: &JobKey) -> Result<Option<PendingJob>, StoreError> {
        self.inner.get_pending(key).await
    }

    async fn claim_pending(&self, key: &JobKey, ttl: Duration) -> Result<Claim, StoreError> {
        if self.claim_fails(key) {
            return Err(injected("claim"));
        }
        self.inner.claim_pending(key, ttl).await
    }

    async fn attach_handle(
        &self,
        keys: &[JobKey],
        handle: &JobHandle,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        if self.failing_attach.load(Ordering::SeqCst) {
            return Err(injected("attach"));
        }
        self.inner.attach_handle(keys, handle, ttl).await
    }

    async fn release_pending(&self, keys: &[JobKey]) -> Result<u64, StoreError> {
        self.inner.release_pending(keys).await
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        self.inner.purge_expired().await
    }
}

/// In-memory queue whose enqueue can be made to fail.
#[derive(Default)]
pub struct FlakyQueue {
    pub inner: MemoryQueue,
    failing_enqueue: AtomicBool,
}

impl FlakyQueue {
    pub fn fail_enqueue(&self) {
        self.failing_enqueue.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.failing_enqueue.store(false, Ordering::SeqCst);
    }
}

impl JobQueue for FlakyQueue {
    async fn enqueue(&self, job: &Job) -> Result<JobHandle, StoreError> {
        if self.failing_enqueue.load(Ordering::SeqCst) {
            return Err(injected("enqueue"));
        }
        self.inner.enqueue(job).await
    }

    async fn status(&self, handle: &JobHandle) -> Result<Option<JobStatus>, StoreError> {
        self.inner.status(handle).await
    }

    async fn get(&self, handle: &JobHandle) -> Result<Option<QueuedJob>, StoreError> {
        self.inner.get(handle).await
    }

    async fn claim_next(&self) -> Result<Option<QueuedJob>, StoreError> {
        self.inner.claim_next().await
    }

    async fn finish(&self, handle: &JobHandle) -> Result<(), StoreError> {
        self.inner.finish(handle).await
    }

    async fn fail(&self, handle: &JobHandle, reason: &str) -> Result<(), StoreError> {
        self.inner.fail(handle, reason).await
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<QueuedJob>, StoreError> {
        self.inner.list(status, limit).await
    }

    async fn purge_finished(&self, older_than: Duration) -> Result<u64, StoreError> {
        self.inner.purge_finished(older_than).await
    }
}

pub struct FlakyHarness {
    pub dispatcher: Dispatcher<ScriptedOracle, FlakyStore, FlakyQueue>,
    pub oracle: Arc<ScriptedOracle>,
    pub store: Arc<FlakyStore>,
    pub queue: Arc<FlakyQueue>,
}

pub fn flaky_harness(oracle: ScriptedOracle) -> FlakyHarness {
    let oracle = Arc::new(oracle);
    let store = Arc::new(FlakyStore::default());
    let queue = Arc::new(FlakyQueue::default());
    let dispatcher = Dispatcher::new(
        registry(),
        Arc::clone(&oracle),
        Arc::clone(&store),
        Arc::clone(&queue),
        settings(),
    );
    FlakyHarness {
        dispatcher,
        oracle,
        store,
        queue,
    }
}

/// Act as one inference worker: take the next job and answer every item.
pub async fn run_worker<S, Q>(store: &S, queue: &Q, class: &str) -> Option<JobHandle>
where
    S: ResultStore,
    Q: JobQueue,
{
    let queued = queue.claim_next().await.unwrap()?;
    let outputs = queued
        .job
        .items
        .iter()
        .map(|item| WorkerOutput {
            job_key: item.job_key.clone(),
            payload: payload(class),
        })
        .collect();
    complete_job(store, queue, &queued.handle, outputs, RESULT_TTL)
        .await
        .unwrap();
    Some(queued.handle)
}

/// Cache a result for one job item without finishing its job.
pub async fn write_result<S: ResultStore>(store: &S, item: &JobItem, value: Value) {
    store
        .put_result(
            &item.job_key,
            &CachedResult::new(value, item.change_time.clone()),
            RESULT_TTL,
        )
        .await
        .unwrap();
}
