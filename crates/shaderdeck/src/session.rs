//! Shared setup for every subcommand: locate directories, load the config,
//! build the catalog, and turn a requested name into a spec with the
//! configured overrides applied.

use anyhow::{Context, Result};
use deckconfig::{DeckConfig, Overrides, ResolvedSettings, WindowSize};
use renderer::{PointerOrigin, VisualizationSpec};
use tracing::debug;
use visuals::{Catalog, ResolvedVisual};

use crate::cli::{GlobalArgs, TuningArgs};
use crate::paths::AppPaths;

/// Shown when neither the command line nor the config names one.
pub const FALLBACK_VISUALIZATION: &str = "seascape";

pub struct Session {
    config: DeckConfig,
    catalog: Catalog,
}

/// A resolved visualization with its layered settings already applied.
pub struct Prepared {
    pub visual: ResolvedVisual,
    pub settings: ResolvedSettings,
    pub spec: VisualizationSpec,
}

impl Session {
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let paths = AppPaths::discover()?;
        let config = match &global.config {
            Some(path) => DeckConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => {
                let path = paths.config_file();
                DeckConfig::load_or_default(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?
            }
        };
        let roots = paths.pack_roots(&config, &global.pack_dirs);
        debug!(
            config = %paths.config_dir().display(),
            data = %paths.data_dir().display(),
            roots = ?roots,
            "resolved shaderdeck paths"
        );
        Ok(Self {
            config,
            catalog: Catalog::new(roots),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Command-line name, then the configured default, then the fallback.
    pub fn requested_name<'a>(&'a self, cli: Option<&'a str>) -> &'a str {
        cli.or(self.config.default_visualization())
            .unwrap_or(FALLBACK_VISUALIZATION)
    }

    pub fn prepare(&self, requested: &str, overrides: &Overrides) -> Result<Prepared> {
        let visual = self.catalog.resolve(requested)?;
        let settings = self.config.settings_for(&visual.entry.name, overrides);
        let spec = apply_settings(visual.spec.clone(), &settings);
        debug!(
            visualization = %visual.entry.name,
            max_pixel_ratio = ?spec.max_pixel_ratio,
            max_fps = ?spec.max_fps,
            defines = spec.defines.len(),
            "prepared visualization"
        );
        Ok(Prepared {
            visual,
            settings,
            spec,
        })
    }
}

pub fn overrides(tuning: &TuningArgs, window_size: Option<WindowSize>) -> Overrides {
    Overrides {
        max_pixel_ratio: tuning.max_pixel_ratio,
        frame_limit: tuning.fps,
        window_size,
        defines: tuning.defines.clone(),
    }
}

/// Writes layered settings over the manifest values carried by `spec`.
pub fn apply_settings(mut spec: VisualizationSpec, settings: &ResolvedSettings) -> VisualizationSpec {
    if let Some(ratio) = settings.max_pixel_ratio {
        spec.max_pixel_ratio = Some(ratio);
    }
    if let Some(limit) = settings.frame_limit {
        spec.max_fps = limit.max_fps();
    }
    if let Some(origin) = settings.pointer_origin {
        spec.pointer_origin = match origin {
            deckconfig::PointerOrigin::BottomLeft => PointerOrigin::BottomLeft,
            deckconfig::PointerOrigin::TopLeft => PointerOrigin::TopLeft,
        };
    }
    for (name, value) in &settings.defines {
        spec = spec.with_define(name.clone(), value.clone());
    }
    spec
}
