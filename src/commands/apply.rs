//! Apply command - load definitions and apply them in order

use anyhow::{Result, bail};
use applykit::{CommandExecutor, Registry, Settings, SystemExecutor};
use colored::Colorize;

use crate::Context as AppContext;
use crate::cli::ApplyArgs;
use crate::commands::load_definitions;
use crate::config;
use crate::ui;

pub fn run(ctx: &AppContext, args: &ApplyArgs) -> Result<()> {
    let settings = config::load(ctx.settings.as_deref())?;
    let applied = run_with(&SystemExecutor, settings, args, ctx.quiet)?;

    if !ctx.quiet {
        println!();
        ui::success(&format!(
            "Applied {} resource(s)",
            applied.len().to_string().bold()
        ));
    }
    Ok(())
}

/// Apply through `executor`, returning the names applied in order
pub fn run_with(
    executor: &dyn CommandExecutor,
    settings: Settings,
    args: &ApplyArgs,
    quiet: bool,
) -> Result<Vec<String>> {
    let mut registry = Registry::with_settings(executor, settings);
    let loaded = load_definitions(&mut registry, &args.files)?;
    log::info!("Loaded {loaded} definitions from {} file(s)", args.files.len());

    let names: Vec<String> = match &args.only {
        Some(name) => vec![name.clone()],
        None => registry.iter().map(|(r, _)| r.name().to_string()).collect(),
    };

    if names.is_empty() {
        bail!("No resources defined in the given files");
    }

    if !quiet {
        ui::header("Applying Resources");
    }

    let total = names.len();
    for (i, name) in names.iter().enumerate() {
        if !quiet {
            let kind = registry.get(name).map_or("", |r| r.kind());
            ui::step(i + 1, total, &format!("{} {}", kind.dimmed(), name));
        }

        registry.apply_one(name)?;

        if !quiet
            && let Some(dir) = registry.get(name).and_then(|r| r.output_dir())
        {
            ui::kv("output", &dir.display().to_string());
        }
    }

    Ok(names)
}
