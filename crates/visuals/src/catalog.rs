//! Resolves visualization names into ready-to-mount specs, hiding whether a
//! visualization ships inside the binary or lives in a pack directory. The
//! CLI hands it a name or a path; it consults the built-in table and the
//! configured pack roots and returns a `ResolvedVisual`.
//!
//! A pack whose manifest name matches a built-in shadows it, so a copied and
//! edited pack replaces the shipped version.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use renderer::VisualizationSpec;
use serde::Serialize;
use tracing::{debug, warn};

use crate::manifest::ShaderManifest;
use crate::pack::{LocalPack, MANIFEST_FILE};

struct Builtin {
    manifest: &'static str,
    fragment: &'static str,
}

macro_rules! builtin {
    ($dir:literal) => {
        Builtin {
            manifest: include_str!(concat!("../packs/", $dir, "/shader.toml")),
            fragment: include_str!(concat!("../packs/", $dir, "/fragment.glsl")),
        }
    };
}

const BUILTINS: [Builtin; 5] = [
    builtin!("tunnel"),
    builtin!("seascape"),
    builtin!("water"),
    builtin!("protean-clouds"),
    builtin!("dvd"),
];

/// Names of the shipped visualizations, in listing order.
pub const BUILTIN_NAMES: [&str; 5] = ["tunnel", "seascape", "water", "protean-clouds", "dvd"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryOrigin {
    Builtin,
    Pack { path: PathBuf },
}

/// One row of the catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub origin: EntryOrigin,
}

impl CatalogEntry {
    fn from_manifest(manifest: &ShaderManifest, origin: EntryOrigin) -> Self {
        Self {
            name: manifest.name.clone(),
            title: manifest.display_title().to_string(),
            description: manifest.description.clone(),
            origin,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedVisual {
    pub entry: CatalogEntry,
    pub manifest: ShaderManifest,
    pub spec: VisualizationSpec,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pack_roots: Vec<PathBuf>,
}

impl Catalog {
    pub fn new(pack_roots: Vec<PathBuf>) -> Self {
        Self { pack_roots }
    }

    pub fn builtin_only() -> Self {
        Self::default()
    }

    pub fn pack_roots(&self) -> &[PathBuf] {
        &self.pack_roots
    }

    /// Built-ins in shipping order, then packs found under the roots.
    pub fn entries(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<CatalogEntry> = BUILTIN_NAMES
            .iter()
            .filter_map(|name| match Self::builtin(name) {
                Ok(resolved) => Some(resolved.entry),
                Err(err) => {
                    warn!(visualization = name, error = %err, "built-in manifest rejected");
                    None
                }
            })
            .collect();

        for pack in self.discover_packs() {
            let entry = CatalogEntry::from_manifest(
                pack.manifest(),
                EntryOrigin::Pack {
                    path: pack.root().to_path_buf(),
                },
            );
            match entries.iter_mut().find(|existing| existing.name == entry.name) {
                Some(existing) => {
                    debug!(visualization = %entry.name, "pack shadows earlier entry");
                    *existing = entry;
                }
                None => entries.push(entry),
            }
        }
        entries
    }

    /// Resolves a pack path, a pack name under the roots, or a built-in name.
    pub fn resolve(&self, requested: &str) -> Result<ResolvedVisual> {
        if requested.trim().is_empty() {
            return Err(anyhow!("visualization name must not be empty"));
        }

        let as_path = Path::new(requested);
        if as_path.join(MANIFEST_FILE).is_file() {
            debug!(path = %as_path.display(), "resolving visualization from path");
            return Self::load_pack(as_path);
        }

        if let Some(pack) = self
            .discover_packs()
            .into_iter()
            .rev()
            .find(|pack| pack.manifest().name == requested)
        {
            return Self::load_pack(pack.root());
        }

        if BUILTIN_NAMES.contains(&requested) {
            return Self::builtin(requested);
        }

        let known: Vec<String> = self.entries().into_iter().map(|entry| entry.name).collect();
        warn!(requested, roots = ?self.pack_roots, "visualization not found");
        Err(anyhow!(
            "unknown visualization '{requested}'. available: {}",
            known.join(", ")
        ))
    }

    /// Loads one of the shipped visualizations.
    pub fn builtin(name: &str) -> Result<ResolvedVisual> {
        let index = BUILTIN_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .ok_or_else(|| anyhow!("no built-in visualization named '{name}'"))?;
        let builtin = &BUILTINS[index];
        let manifest = ShaderManifest::from_toml_str(builtin.manifest)
            .with_context(|| format!("built-in manifest '{name}' is invalid"))?;
        let spec = manifest.to_spec(None, builtin.fragment.to_string());
        Ok(ResolvedVisual {
            entry: CatalogEntry::from_manifest(&manifest, EntryOrigin::Builtin),
            manifest,
            spec,
        })
    }

    fn load_pack(root: &Path) -> Result<ResolvedVisual> {
        let pack = LocalPack::load(root)
            .with_context(|| format!("failed to load shader pack '{}'", root.display()))?;
        let spec = pack
            .load_spec()
            .with_context(|| format!("shader pack '{}' failed validation", root.display()))?;
        Ok(ResolvedVisual {
            entry: CatalogEntry::from_manifest(
                pack.manifest(),
                EntryOrigin::Pack {
                    path: pack.root().to_path_buf(),
                },
            ),
            manifest: pack.manifest().clone(),
            spec,
        })
    }

    /// Valid packs directly under each root, roots in order, directories sorted.
    fn discover_packs(&self) -> Vec<LocalPack> {
        let mut packs = Vec::new();
        for root in &self.pack_roots {
            let listing = match fs::read_dir(root) {
                Ok(listing) => listing,
                Err(err) => {
                    debug!(root = %root.display(), error = %err, "pack root unreadable");
                    continue;
                }
            };
            let mut dirs: Vec<PathBuf> = listing
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.join(MANIFEST_FILE).is_file())
                .collect();
            dirs.sort();
            for dir in dirs {
                match LocalPack::load(&dir) {
                    Ok(pack) => packs.push(pack),
                    Err(err) => {
                        warn!(path = %dir.display(), error = %err, "skipping invalid shader pack")
                    }
                }
            }
        }
        packs
    }
}
