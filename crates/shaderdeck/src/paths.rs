use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use deckconfig::{DeckConfig, CONFIG_FILE};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "SHADERDECK_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "SHADERDECK_DATA_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "shaderdeck";
const APPLICATION: &str = "shaderdeck";

const PACKS_DIR: &str = "packs";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let config_override = env_override(ENV_CONFIG_DIR);
        let data_override = env_override(ENV_DATA_DIR);
        if let (Some(config_dir), Some(data_dir)) = (&config_override, &data_override) {
            return Ok(Self {
                config_dir: config_dir.clone(),
                data_dir: data_dir.clone(),
            });
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: config_override
                .unwrap_or_else(|| project_dirs.config_dir().to_path_buf()),
            data_dir: data_override.unwrap_or_else(|| project_dirs.data_dir().to_path_buf()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Pack roots in search order: configured dirs, then the user config and
    /// data directories, then command-line dirs. Later roots shadow earlier
    /// ones when two packs share a name.
    pub fn pack_roots(&self, config: &DeckConfig, extra: &[PathBuf]) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        let candidates = [
            self.config_dir.join(PACKS_DIR),
            self.data_dir.join(PACKS_DIR),
        ];
        for root in config
            .defaults
            .pack_dirs
            .iter()
            .chain(candidates.iter())
            .chain(extra.iter())
        {
            if !roots.contains(root) {
                roots.push(root.clone());
            }
        }
        roots
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
        }
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
