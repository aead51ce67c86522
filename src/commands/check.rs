//! Check command - resolve every reference without applying

use anyhow::Result;
use applykit::{CommandExecutor, Registry, Settings, SystemExecutor};

use crate::Context as AppContext;
use crate::cli::CheckArgs;
use crate::commands::load_definitions;
use crate::config;
use crate::ui;

pub fn run(ctx: &AppContext, args: &CheckArgs) -> Result<()> {
    let settings = config::load(ctx.settings.as_deref())?;
    let count = run_with(&SystemExecutor, settings, args)?;

    if !ctx.quiet {
        ui::success(&format!("{count} resource(s), all references resolve"));
    }
    Ok(())
}

/// Load and check definitions, returning how many resources were checked
pub fn run_with(
    executor: &dyn CommandExecutor,
    settings: Settings,
    args: &CheckArgs,
) -> Result<usize> {
    let mut registry = Registry::with_settings(executor, settings);
    load_definitions(&mut registry, &args.files)?;
    registry.check_references()?;
    Ok(registry.len())
}
