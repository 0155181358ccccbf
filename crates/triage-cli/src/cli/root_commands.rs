use clap::{Args, Subcommand};

use crate::cli::subcommands::{CacheCommands, JobsCommands};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// List the models requests may target.
    Models,
    /// Classify entities against a model, enqueueing work on a cache miss.
    Classify(ClassifyArgs),
    /// Inference job queue.
    Jobs {
        #[command(subcommand)]
        action: JobsCommands,
    },
    /// Result cache.
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
}

#[derive(Clone, Debug, Args)]
pub struct ClassifyArgs {
    /// Model name, e.g. `component`.
    pub model: String,

    /// Entities as `ID=CHANGE_TIME` or `PLATFORM/OWNER/REPO/NUMBER=CHANGE_TIME`.
    /// An entity without `=CHANGE_TIME` is treated as unknown to the tracker.
    #[arg(required = true)]
    pub entities: Vec<String>,

    /// Always use the batch path, even for a single entity.
    #[arg(long)]
    pub batch: bool,
}
