use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

/// Handle `triage models`.
pub fn handle(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let registry = ctx.config.models.registry();
    let names: Vec<&str> = registry.names().collect();
    output(&names, flags.format)
}
