use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use triage_core::JobStatus;

/// Job status filter for `triage jobs list`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusArg {
    Queued,
    Running,
    Done,
    Failed,
}

impl From<StatusArg> for JobStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Queued => Self::Queued,
            StatusArg::Running => Self::Running,
            StatusArg::Done => Self::Done,
            StatusArg::Failed => Self::Failed,
        }
    }
}

/// Inference job queue.
#[derive(Clone, Debug, Subcommand)]
pub enum JobsCommands {
    /// List jobs in enqueue order.
    List {
        /// Only jobs in this status.
        #[arg(long)]
        status: Option<StatusArg>,
    },
    /// Show one job.
    Get {
        /// Job handle, e.g. `job-a3f8b2c10d9e7f64`.
        handle: String,
    },
    /// Take the oldest queued job and mark it running.
    Claim,
    /// Store a running job's results and mark it done.
    Complete {
        /// Job handle.
        handle: String,
        /// JSON file holding `[{"job_key": ..., "payload": ...}, ...]`.
        #[arg(long)]
        results: PathBuf,
    },
    /// Mark a job failed so its entities are re-enqueued on the next request.
    Fail {
        /// Job handle.
        handle: String,
        /// Failure reason recorded on the job.
        #[arg(long, default_value = "failed by operator")]
        reason: String,
    },
}

/// Result cache.
#[derive(Clone, Debug, Subcommand)]
pub enum CacheCommands {
    /// Show the cached result and pending marker for a job key.
    Get {
        /// Job key, e.g. `triage:job:component:bug/123:1f2e...`.
        job_key: String,
    },
    /// Delete expired results and pending markers, and finished jobs older than the result TTL.
    Purge,
}
