//! Single-entity dispatch: cache lookup, single-flight claim, enqueue.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use triage_config::TriageConfig;
use triage_core::{
    CachedResult, ChangeTime, Entity, Job, JobHandle, JobItem, JobKey, JobStatus,
    ModelRegistry, Outcome,
};
use triage_store::{Claim, JobQueue, ResultStore};

use crate::error::DispatchError;
use crate::oracle::ChangeTimeOracle;

/// How many times a key whose pending record points at a dead job is
/// released and re-claimed within one request.
const RECLAIM_ATTEMPTS: usize = 2;

/// Time bounds and expiries the dispatcher runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Expiry of a pending-job record. Bounds how long a lost job blocks
    /// re-enqueueing its keys.
    pub pending_ttl: Duration,
    pub oracle_timeout: Duration,
    pub store_timeout: Duration,
}

impl DispatchSettings {
    #[must_use]
    pub const fn from_config(config: &TriageConfig) -> Self {
        Self {
            pending_ttl: config.store.pending_ttl(),
            oracle_timeout: config.dispatch.oracle_timeout(),
            store_timeout: config.dispatch.store_timeout(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&TriageConfig::default())
    }
}

/// Where a job key stands after the cache and pending registry were consulted.
#[derive(Debug)]
pub(crate) enum KeyState {
    /// A result for this exact key is cached.
    Ready(CachedResult),
    /// Another request owns the key; its job is queued, running, or about to be.
    InFlight,
    /// This request owns the key and must enqueue a job for it.
    Claimed,
}

/// Entry point of the classification service.
///
/// Cheap to clone; every clone shares the same oracle, store, and queue.
pub struct Dispatcher<O, S, Q> {
    registry: Arc<ModelRegistry>,
    oracle: Arc<O>,
    store: Arc<S>,
    queue: Arc<Q>,
    settings: DispatchSettings,
}

impl<O, S, Q> Clone for Dispatcher<O, S, Q> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            oracle: Arc::clone(&self.oracle),
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
            settings: self.settings,
        }
    }
}

impl<O, S, Q> Dispatcher<O, S, Q>
where
    O: ChangeTimeOracle,
    S: ResultStore,
    Q: JobQueue,
{
    pub fn new(
        registry: ModelRegistry,
        oracle: Arc<O>,
        store: Arc<S>,
        queue: Arc<Q>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            oracle,
            store,
            queue,
            settings,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub(crate) fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Classify one entity with `model`.
    ///
    /// Returns the cached result if one exists for the entity's current change
    /// time. Otherwise makes sure exactly one job for it is in flight and
    /// returns [`Outcome::Pending`]. Repeating the call is safe and never
    /// enqueues duplicate work while a job is live.
    ///
    /// # Errors
    ///
    /// `DispatchError::InvalidModel` before any I/O if the model is unknown;
    /// retryable errors if the oracle, store, or queue fail or time out.
    pub async fn classify(&self, model: &str, entity: &Entity) -> Result<Outcome, DispatchError> {
        let model = self.registry.resolve(model)?;

        let change_time = bounded(
            "change-time lookup",
            self.settings.oracle_timeout,
            self.oracle.fetch_one(entity),
        )
        .await?;
        let Some(change_time) = change_time else {
            debug!(model = %model, entity = %entity, "entity not found");
            return Ok(Outcome::NotFound(entity.clone()));
        };

        let key = JobKey::derive(&model, entity, &change_time);
        match self.resolve_key(&key, &change_time).await? {
            KeyState::Ready(result) => Ok(Outcome::Ready(result)),
            KeyState::InFlight => Ok(Outcome::Pending),
            KeyState::Claimed => {
                let item = JobItem {
                    entity: entity.clone(),
                    job_key: key,
                    change_time,
                };
                self.submit(Job::single(model, item)).await?;
                Ok(Outcome::Pending)
            }
        }
    }

    /// Consult the result cache and pending registry for one key, claiming it
    /// if nothing is cached and nothing is in flight.
    pub(crate) async fn resolve_key(
        &self,
        key: &JobKey,
        change_time: &ChangeTime,
    ) -> Result<KeyState, DispatchError> {
        if let Some(result) = self.cached(key, change_time).await? {
            return Ok(KeyState::Ready(result));
        }

        for _ in 0..RECLAIM_ATTEMPTS {
            let claim = self
                .store_call("pending claim", self.store.claim_pending(key, self.settings.pending_ttl))
                .await?;
            match claim {
                Claim::Acquired => {
                    // A worker may have finished between the cache miss and
                    // the claim; its result wins over a duplicate job.
                    if let Some(result) = self.cached(key, change_time).await? {
                        self.release(std::slice::from_ref(key)).await;
                        return Ok(KeyState::Ready(result));
                    }
                    return Ok(KeyState::Claimed);
                }
                Claim::Held(pending) => {
                    let Some(handle) = pending.handle else {
                        debug!(job_key = %key, "claimed by a concurrent request, enqueue in progress");
                        return Ok(KeyState::InFlight);
                    };
                    if self.job_is_live(&handle).await? {
                        debug!(job_key = %key, handle = %handle, "job already in flight");
                        return Ok(KeyState::InFlight);
                    }
                    warn!(
                        job_key = %key,
                        handle = %handle,
                        "pending record points at a job the queue no longer runs, re-enqueueing"
                    );
                    self.release(std::slice::from_ref(key)).await;
                }
            }
        }

        warn!(job_key = %key, "pending record kept reappearing, reporting as in flight");
        Ok(KeyState::InFlight)
    }

    /// Enqueue `job` and record its handle on every key it carries.
    ///
    /// The caller must hold the pending claim on all of the job's keys. If the
    /// enqueue fails the claims are released so a retry can claim them again.
    pub(crate) async fn submit(&self, job: Job) -> Result<JobHandle, DispatchError> {
        let keys: Vec<JobKey> = job.keys().cloned().collect();
        let handle = match self.store_call("enqueue", self.queue.enqueue(&job)).await {
            Ok(handle) => handle,
            Err(err) => {
                self.release(&keys).await;
                return Err(err);
            }
        };

        if let Err(err) = self
            .store_call(
                "attach handle",
                self.store.attach_handle(&keys, &handle, self.settings.pending_ttl),
            )
            .await
        {
            // The job is queued and its worker releases these keys on
            // completion, so the request is still pending.
            warn!(handle = %handle, error = %err, "failed to record job handle on pending keys");
        }

        info!(model = %job.model, handle = %handle, items = keys.len(), "job enqueued");
        Ok(handle)
    }

    async fn cached(
        &self,
        key: &JobKey,
        change_time: &ChangeTime,
    ) -> Result<Option<CachedResult>, DispatchError> {
        let cached = self
            .store_call("result lookup", self.store.get_result(key))
            .await?;
        match cached {
            Some(result) if &result.change_time == change_time => Ok(Some(result)),
            Some(result) => {
                warn!(
                    job_key = %key,
                    cached = %result.change_time,
                    current = %change_time,
                    "cached result carries a different change time, ignoring it"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn job_is_live(&self, handle: &JobHandle) -> Result<bool, DispatchError> {
        let status = self
            .store_call("job status", self.queue.status(handle))
            .await?;
        Ok(status.is_some_and(JobStatus::is_live))
    }

    /// Best-effort release of pending claims; failures only cost a TTL wait.
    pub(crate) async fn release(&self, keys: &[JobKey]) {
        if let Err(err) = self
            .store_call("pending release", self.store.release_pending(keys))
            .await
        {
            warn!(keys = keys.len(), error = %err, "failed to release pending records");
        }
    }

    async fn store_call<T, F>(&self, operation: &'static str, fut: F) -> Result<T, DispatchError>
    where
        F: Future<Output = Result<T, triage_store::StoreError>>,
    {
        bounded(operation, self.settings.store_timeout, fut).await
    }
}

/// Run `fut` under `limit`, turning an elapsed timer into a retryable error.
pub(crate) async fn bounded<T, E, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, DispatchError>
where
    F: Future<Output = Result<T, E>>,
    DispatchError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(DispatchError::from),
        Err(_) => {
            warn!(operation, ?limit, "upstream call timed out");
            Err(DispatchError::Timeout {
                operation,
                after: limit,
            })
        }
    }
}
