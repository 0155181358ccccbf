//! Batch dispatch.
//!
//! A batch is resolved as a set: one bulk change-time lookup, concurrent
//! cache/claim checks per entity, and at most one job carrying every entity
//! this request had to enqueue. The merged [`BatchResult`] is keyed by the
//! caller's identifiers in the caller's order.

use std::collections::{BTreeSet, HashMap};

use futures::future::join_all;
use tracing::debug;
use triage_core::batch::ensure_non_empty;
use triage_core::{BatchEntry, BatchResult, Entity, Job, JobItem, JobKey, Outcome};
use triage_store::{JobQueue, ResultStore};

use crate::dispatcher::{Dispatcher, KeyState, bounded};
use crate::error::DispatchError;
use crate::oracle::ChangeTimeOracle;

impl<O, S, Q> Dispatcher<O, S, Q>
where
    O: ChangeTimeOracle,
    S: ResultStore,
    Q: JobQueue,
{
    /// Classify many entities with `model` in one request.
    ///
    /// Every entity gets its own outcome. Entities the tracker does not know
    /// are reported as not found without affecting the others. The batch is
    /// complete (HTTP 200) only once every entity is ready.
    ///
    /// # Errors
    ///
    /// `DispatchError::InvalidBatch` for an empty batch and
    /// `DispatchError::InvalidModel` for an unknown model, both before any
    /// I/O. A failing bulk lookup fails the whole batch with a retryable error.
    pub async fn classify_batch(
        &self,
        model: &str,
        entities: &[Entity],
    ) -> Result<BatchResult, DispatchError> {
        let model = self.registry().resolve(model)?;
        ensure_non_empty(entities)?;

        let unique: Vec<Entity> = entities
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let change_times = bounded(
            "bulk change-time lookup",
            self.settings().oracle_timeout,
            self.oracle().fetch_many(&unique),
        )
        .await?;

        let found: Vec<(Entity, JobKey, _)> = unique
            .iter()
            .filter_map(|entity| {
                let change_time = change_times.get(entity).cloned().flatten()?;
                let key = JobKey::derive(&model, entity, &change_time);
                Some((entity.clone(), key, change_time))
            })
            .collect();

        let states = join_all(
            found
                .iter()
                .map(|(_, key, change_time)| self.resolve_key(key, change_time)),
        )
        .await;

        let mut outcomes: HashMap<&Entity, Outcome> = HashMap::with_capacity(unique.len());
        let mut claimed = Vec::new();
        let mut first_error = None;
        for ((entity, key, change_time), state) in found.iter().zip(states) {
            let outcome = match state {
                Ok(KeyState::Ready(result)) => Outcome::Ready(result),
                Ok(KeyState::InFlight) => Outcome::Pending,
                Ok(KeyState::Claimed) => {
                    claimed.push(JobItem {
                        entity: entity.clone(),
                        job_key: key.clone(),
                        change_time: change_time.clone(),
                    });
                    Outcome::Pending
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                    continue;
                }
            };
            outcomes.insert(entity, outcome);
        }

        if let Some(err) = first_error {
            // Claims taken by the lookups that did succeed would otherwise
            // block these keys until the pending TTL runs out.
            let keys: Vec<JobKey> = claimed.into_iter().map(|item| item.job_key).collect();
            if !keys.is_empty() {
                self.release(&keys).await;
            }
            return Err(err);
        }

        if !claimed.is_empty() {
            self.submit(Job {
                model: model.clone(),
                items: claimed,
            })
            .await?;
        }

        let entries: Vec<BatchEntry> = entities
            .iter()
            .map(|entity| BatchEntry {
                key: entity.to_string(),
                outcome: outcomes
                    .get(entity)
                    .cloned()
                    .unwrap_or_else(|| Outcome::NotFound(entity.clone())),
            })
            .collect();

        let result = BatchResult::new(entries);
        debug!(
            model = %model,
            entities = entities.len(),
            ready = result.count_where(Outcome::is_ready),
            complete = result.is_complete(),
            "batch classified"
        );
        Ok(result)
    }
}
