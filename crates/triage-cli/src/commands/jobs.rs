use std::path::Path;

use anyhow::Context;
use serde_json::json;
use triage_core::JobHandle;
use triage_store::JobQueue;
use triage_store::worker::{WorkerOutput, complete_job, fail_job};

use crate::cli::GlobalFlags;
use crate::cli::subcommands::JobsCommands;
use crate::context::AppContext;
use crate::output::output;

const DEFAULT_LIST_LIMIT: u32 = 50;

/// Handle `triage jobs`.
pub async fn handle(
    action: &JobsCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        JobsCommands::List { status } => {
            let limit = flags.limit.unwrap_or(DEFAULT_LIST_LIMIT) as usize;
            let jobs = ctx.db.list(status.map(Into::into), limit).await?;
            output(&jobs, flags.format)
        }
        JobsCommands::Get { handle } => {
            let job = ctx
                .db
                .get(&JobHandle::new(handle.as_str()))
                .await?
                .with_context(|| format!("job {handle} not found"))?;
            output(&job, flags.format)
        }
        JobsCommands::Claim => {
            let claimed = ctx.db.claim_next().await?;
            output(&claimed, flags.format)
        }
        JobsCommands::Complete { handle, results } => {
            let outputs = read_outputs(results)?;
            let handle = JobHandle::new(handle.as_str());
            let written = complete_job(
                ctx.db.as_ref(),
                ctx.db.as_ref(),
                &handle,
                outputs,
                ctx.config.store.result_ttl(),
            )
            .await?;
            output(
                &json!({ "handle": handle, "status": "done", "written": written }),
                flags.format,
            )
        }
        JobsCommands::Fail { handle, reason } => {
            let handle = JobHandle::new(handle.as_str());
            fail_job(ctx.db.as_ref(), ctx.db.as_ref(), &handle, reason).await?;
            output(
                &json!({ "handle": handle, "status": "failed", "reason": reason }),
                flags.format,
            )
        }
    }
}

/// Load worker outputs from a JSON file.
fn read_outputs(path: &Path) -> anyhow::Result<Vec<WorkerOutput>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read results file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid results file {}", path.display()))
}
