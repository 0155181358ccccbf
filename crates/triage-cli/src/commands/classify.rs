use std::sync::Arc;

use serde_json::{Value, json};
use triage_core::Entity;
use triage_dispatch::{DispatchError, DispatchSettings, Dispatcher};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ClassifyArgs;
use crate::context::AppContext;
use crate::oracle::{ArgOracle, split_arg};
use crate::output::output;

/// Handle `triage classify`.
///
/// Prints `{"status", "body"}` for every response, errors included. A 4xx or
/// 5xx response also fails the command.
pub async fn handle(
    args: &ClassifyArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let (oracle, entities) = match ArgOracle::parse(&args.entities) {
        Ok(parsed) => parsed,
        Err(invalid) => {
            return fail(DispatchError::from(invalid), arg_field(&args.entities), flags);
        }
    };
    let field = batch_field(&entities);
    let dispatcher = Dispatcher::new(
        ctx.config.models.registry(),
        Arc::new(oracle),
        Arc::clone(&ctx.db),
        Arc::clone(&ctx.db),
        DispatchSettings::from_config(&ctx.config),
    );

    let response = if let [entity] = entities.as_slice()
        && !args.batch
    {
        match dispatcher.classify(&args.model, entity).await {
            Ok(outcome) => json!({ "status": outcome.http_status(), "body": outcome.body() }),
            Err(error) => return fail(error, field, flags),
        }
    } else {
        match dispatcher.classify_batch(&args.model, &entities).await {
            Ok(result) => json!({ "status": result.http_status(), "body": result.body(field) }),
            Err(error) => return fail(error, field, flags),
        }
    };
    output(&response, flags.format)
}

/// Response field of a batch body: `bugs` for bug-only batches.
fn batch_field(entities: &[Entity]) -> &'static str {
    if entities
        .iter()
        .all(|entity| matches!(entity, Entity::Bug { .. }))
    {
        "bugs"
    } else {
        "issues"
    }
}

/// Response field for arguments that did not all parse: `issues` as soon as
/// one argument is shaped like an issue path.
fn arg_field(args: &[String]) -> &'static str {
    let issue_like = args.iter().any(|arg| {
        let (raw, _) = split_arg(arg);
        raw.strip_prefix("bug/").unwrap_or(raw).contains('/')
    });
    if issue_like { "issues" } else { "bugs" }
}

fn error_response(error: &DispatchError, field: &str) -> Value {
    json!({ "status": error.http_status(), "body": error.body(field) })
}

fn fail(error: DispatchError, field: &str, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&error_response(&error, field), flags.format)?;
    let status = error.http_status();
    Err(anyhow::Error::new(error).context(format!("request failed with status {status}")))
}
