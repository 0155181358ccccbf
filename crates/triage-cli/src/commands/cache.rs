use serde::Serialize;
use serde_json::json;
use triage_core::{CachedResult, JobKey, PendingJob};
use triage_store::{JobQueue, ResultStore};

use crate::cli::GlobalFlags;
use crate::cli::subcommands::CacheCommands;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct CacheEntry {
    job_key: JobKey,
    result: Option<CachedResult>,
    pending: Option<PendingJob>,
}

/// Handle `triage cache`.
pub async fn handle(
    action: &CacheCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        CacheCommands::Get { job_key } => {
            let job_key = JobKey::parse(job_key)?;
            let entry = CacheEntry {
                result: ctx.db.get_result(&job_key).await?,
                pending: ctx.db.get_pending(&job_key).await?,
                job_key,
            };
            output(&entry, flags.format)
        }
        CacheCommands::Purge => {
            let purged = ctx.db.purge_expired().await?;
            let jobs = ctx.db.purge_finished(ctx.config.store.result_ttl()).await?;
            output(&json!({ "purged": purged, "jobs_purged": jobs }), flags.format)
        }
    }
}
