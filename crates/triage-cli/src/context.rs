use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use triage_config::TriageConfig;
use triage_store::TriageDb;

/// Everything a command handler needs.
pub struct AppContext {
    pub config: TriageConfig,
    pub db: Arc<TriageDb>,
}

impl AppContext {
    pub async fn init(root: &Path, config: TriageConfig) -> anyhow::Result<Self> {
        let path = config.store.resolved_path(root);
        if !config.store.is_in_memory()
            && let Some(parent) = path.parent()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let path = path.to_string_lossy();
        let db = TriageDb::open_local(&path).await?;
        tracing::debug!(root = %root.display(), db = %path, "context ready");
        Ok(Self {
            config,
            db: Arc::new(db),
        })
    }
}
