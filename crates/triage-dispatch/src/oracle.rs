//! Change-time oracle contract.
//!
//! The oracle is the tracker-facing collaborator: given entities, it reports
//! each one's current change time, or that the tracker does not know it.
//! Tracker clients live outside this workspace and implement this trait.

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;
use triage_core::{ChangeTime, Entity};

#[derive(Debug, Error)]
pub enum OracleError {
    /// The tracker could not be reached or answered with an error.
    #[error("tracker unavailable: {0}")]
    Unavailable(String),

    /// The tracker answered with something unparseable.
    #[error("malformed tracker response: {0}")]
    Malformed(String),
}

pub trait ChangeTimeOracle: Send + Sync {
    /// Current change time of `entity`, or `None` if it does not exist.
    fn fetch_one(
        &self,
        entity: &Entity,
    ) -> impl Future<Output = Result<Option<ChangeTime>, OracleError>> + Send;

    /// Change times for many entities in one round trip.
    ///
    /// Entities missing from the returned map are treated as not found. Any
    /// error fails the whole batch. The default falls back to one
    /// [`fetch_one`](Self::fetch_one) per entity for trackers without bulk lookup.
    fn fetch_many(
        &self,
        entities: &[Entity],
    ) -> impl Future<Output = Result<HashMap<Entity, Option<ChangeTime>>, OracleError>> + Send
    {
        async move {
            let mut found = HashMap::with_capacity(entities.len());
            for entity in entities {
                found.insert(entity.clone(), self.fetch_one(entity).await?);
            }
            Ok(found)
        }
    }
}
