use std::path::PathBuf;

use anyhow::{Context, Result};
use deckconfig::{PowerSetting, WindowSize};
use renderer::{GpuPowerPreference, WindowOptions};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use visuals::{CatalogEntry, EntryOrigin};

use crate::cli::{GlobalArgs, ListArgs, RunArgs};
use crate::session::{self, Session};

const DEFAULT_WINDOW_SIZE: WindowSize = WindowSize {
    width: 1280,
    height: 720,
};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Serialize)]
struct Listing<'a> {
    pack_roots: &'a [PathBuf],
    visualizations: Vec<CatalogEntry>,
}

pub fn list(global: &GlobalArgs, args: ListArgs) -> Result<()> {
    let session = Session::open(global)?;
    let entries = session.catalog().entries();

    if args.json {
        let listing = Listing {
            pack_roots: session.catalog().pack_roots(),
            visualizations: entries,
        };
        let rendered =
            serde_json::to_string_pretty(&listing).context("failed to serialise listing")?;
        println!("{rendered}");
        return Ok(());
    }

    let default = session.requested_name(None);
    let width = entries
        .iter()
        .map(|entry| entry.name.len())
        .max()
        .unwrap_or(0);
    for entry in &entries {
        let marker = if entry.name == default { '*' } else { ' ' };
        let origin = match &entry.origin {
            EntryOrigin::Builtin => "built-in".to_string(),
            EntryOrigin::Pack { path } => path.display().to_string(),
        };
        println!(
            "{marker} {:<width$}  {:<24}  {origin}",
            entry.name,
            entry.title,
            width = width
        );
    }
    Ok(())
}

pub fn run(global: &GlobalArgs, args: RunArgs) -> Result<()> {
    let session = Session::open(global)?;
    let requested = session.requested_name(args.name.as_deref());
    let overrides = session::overrides(&args.tuning, args.size);
    let prepared = session.prepare(requested, &overrides)?;

    let size = prepared.settings.window_size.unwrap_or(DEFAULT_WINDOW_SIZE);
    let power = match args.power.or(prepared.settings.power) {
        Some(PowerSetting::Low) => GpuPowerPreference::Low,
        Some(PowerSetting::High) | None => GpuPowerPreference::High,
    };
    let options = WindowOptions {
        title: prepared.visual.entry.title.clone(),
        size: (size.width, size.height),
        transparent: args.transparent,
        power,
    };

    tracing::info!(
        visualization = %prepared.visual.entry.name,
        size = %size,
        ?power,
        "opening window"
    );
    renderer::run_window(prepared.spec, options)
        .with_context(|| format!("visualization '{}' stopped with an error", prepared.visual.entry.name))
}
