//! Change times supplied on the command line.
//!
//! Lets an operator drive the dispatcher without a tracker client: each
//! `ENTITY=CHANGE_TIME` argument stands in for what the tracker would report.

use std::collections::{BTreeMap, HashMap};

use triage_core::batch::{BatchValidationError, check_identifier};
use triage_core::{ChangeTime, Entity};
use triage_dispatch::{ChangeTimeOracle, OracleError};

const MSG_EMPTY_CHANGE_TIME: &str = "change time must not be empty";

#[derive(Debug, Default)]
pub struct ArgOracle {
    times: HashMap<Entity, ChangeTime>,
}

/// Split `ENTITY[=CHANGE_TIME]` into its identifier and change time.
pub fn split_arg(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('=') {
        Some((raw, change_time)) => (raw.trim(), Some(change_time.trim())),
        None => (arg.trim(), None),
    }
}

impl ArgOracle {
    /// Parse `ENTITY[=CHANGE_TIME]` arguments, returning the oracle and the
    /// entities in argument order.
    ///
    /// The arguments are validated as one batch: every bad identifier or
    /// empty change time is reported by its index.
    pub fn parse(args: &[String]) -> Result<(Self, Vec<Entity>), BatchValidationError> {
        if args.is_empty() {
            return Err(BatchValidationError::Empty);
        }

        let mut oracle = Self::default();
        let mut entities = Vec::with_capacity(args.len());
        let mut offending = BTreeMap::new();
        for (idx, arg) in args.iter().enumerate() {
            let (raw, change_time) = split_arg(arg);
            let entity = match check_identifier(raw) {
                Ok(entity) => entity,
                Err(message) => {
                    offending.insert(idx, message);
                    continue;
                }
            };
            match change_time {
                Some("") => {
                    offending.insert(idx, MSG_EMPTY_CHANGE_TIME);
                    continue;
                }
                Some(change_time) => {
                    oracle
                        .times
                        .insert(entity.clone(), ChangeTime::new(change_time));
                }
                None => {}
            }
            entities.push(entity);
        }

        if offending.is_empty() {
            Ok((oracle, entities))
        } else {
            Err(BatchValidationError::InvalidItems(offending))
        }
    }
}

impl ChangeTimeOracle for ArgOracle {
    async fn fetch_one(&self, entity: &Entity) -> Result<Option<ChangeTime>, OracleError> {
        Ok(self.times.get(entity).cloned())
    }
}
