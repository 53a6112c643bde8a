//! Wraps a shader pack directory so the catalog and the CLI can load its
//! manifest, locate its GLSL sources, and produce a `VisualizationSpec`
//! consistently. Filesystem validation lives here; higher layers decide where
//! packs are searched for.
//!
//! Types:
//!
//! - `PackError` classifies manifest parsing, validation, and I/O failures.
//! - `LocalPack` stores the pack root and its parsed `ShaderManifest`.
//!
//! Functions:
//!
//! - `LocalPack::load` reads `shader.toml`, validates it, and returns a
//!   filesystem-backed handle.
//! - `LocalPack::load_spec` reads the GLSL sources and builds the spec.
//! - `ensure_glsl_sources` confirms every declared stage has a file on disk so
//!   later compile errors point at shader code, not missing files.
use std::fs;
use std::path::{Path, PathBuf};

use renderer::VisualizationSpec;
use thiserror::Error;
use tracing::debug;

use crate::manifest::ShaderManifest;

/// Manifest file name expected at a pack root.
pub const MANIFEST_FILE: &str = "shader.toml";

#[derive(Debug, Error)]
pub enum PackError {
    #[error("manifest not found at {0}")]
    ManifestMissing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("manifest validation failed: {0:?}")]
    ManifestValidation(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ShaderManifest {
    /// Parses and validates a manifest document.
    pub fn from_toml_str(raw: &str) -> Result<Self, PackError> {
        let manifest: ShaderManifest = toml::from_str(raw)?;
        let issues = manifest.validate();
        if !issues.is_empty() {
            return Err(PackError::ManifestValidation(issues));
        }
        Ok(manifest)
    }
}

#[derive(Debug, Clone)]
pub struct LocalPack {
    root: PathBuf,
    manifest: ShaderManifest,
}

impl LocalPack {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(PackError::ManifestMissing(manifest_path));
        }

        let manifest_raw = fs::read_to_string(&manifest_path)?;
        let manifest = ShaderManifest::from_toml_str(&manifest_raw)?;
        debug!(pack = %manifest.name, root = %root.display(), "loaded shader pack manifest");
        Ok(Self { root, manifest })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn manifest(&self) -> &ShaderManifest {
        &self.manifest
    }

    pub fn fragment_path(&self) -> PathBuf {
        self.root.join(&self.manifest.fragment)
    }

    pub fn vertex_path(&self) -> Option<PathBuf> {
        self.manifest.vertex.as_ref().map(|path| self.root.join(path))
    }

    /// Reads the pack's sources and builds the engine-facing spec.
    pub fn load_spec(&self) -> Result<VisualizationSpec, PackError> {
        ensure_glsl_sources(self)?;
        let fragment = fs::read_to_string(self.fragment_path())?;
        let vertex = match self.vertex_path() {
            Some(path) => Some(fs::read_to_string(path)?),
            None => None,
        };
        Ok(self.manifest.to_spec(vertex, fragment))
    }
}

pub fn ensure_glsl_sources(pack: &LocalPack) -> Result<Vec<PathBuf>, PackError> {
    let mut missing = Vec::new();
    let mut resolved = Vec::new();
    let declared = std::iter::once(pack.fragment_path()).chain(pack.vertex_path());
    for source_path in declared {
        if source_path.is_file() {
            resolved.push(source_path);
        } else {
            missing.push(source_path);
        }
    }
    if !missing.is_empty() {
        return Err(PackError::ManifestValidation(
            missing
                .into_iter()
                .map(|p| format!("missing shader source: {}", p.display()))
                .collect(),
        ));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::{PointerOrigin, UniformSource};

    const MANIFEST: &str = r#"
name = "demo"
title = "Demo"
fragment = "image.glsl"
pointer_origin = "top-left"

[[uniforms]]
name = "iTime"
type = "float"
source = "time"
"#;

    fn write_pack(dir: &Path, manifest: &str, extra_files: &[(&str, &str)]) {
        fs::write(dir.join(MANIFEST_FILE), manifest).expect("write manifest");
        for (path, contents) in extra_files {
            let full_path = dir.join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).expect("create dirs");
            }
            fs::write(full_path, contents).expect("write file");
        }
    }

    #[test]
    fn loads_valid_pack() {
        let temp = tempfile::tempdir().unwrap();
        write_pack(temp.path(), MANIFEST, &[("image.glsl", "// shader")]);

        let pack = LocalPack::load(temp.path()).expect("load pack");
        assert_eq!(pack.manifest().name, "demo");
        assert!(pack.fragment_path().exists());
        assert_eq!(pack.vertex_path(), None);

        let spec = pack.load_spec().expect("spec");
        assert_eq!(spec.fragment_source, "// shader");
        assert_eq!(spec.pointer_origin, PointerOrigin::TopLeft);
        assert_eq!(spec.uniforms[0].source, UniformSource::ElapsedTime);
    }

    #[test]
    fn reads_custom_vertex_stage() {
        let temp = tempfile::tempdir().unwrap();
        let manifest = format!("vertex = \"shaders/quad.vert\"\n{MANIFEST}");
        write_pack(
            temp.path(),
            &manifest,
            &[("image.glsl", "// frag"), ("shaders/quad.vert", "// vert")],
        );

        let spec = LocalPack::load(temp.path()).unwrap().load_spec().unwrap();
        assert_eq!(spec.vertex_source, "// vert");
    }

    #[test]
    fn detects_missing_shader_source() {
        let temp = tempfile::tempdir().unwrap();
        write_pack(temp.path(), MANIFEST, &[]);

        let pack = LocalPack::load(temp.path()).expect("load pack");
        let err = ensure_glsl_sources(&pack).unwrap_err();
        assert!(matches!(err, PackError::ManifestValidation(ref items) if items[0].contains("image.glsl")));
        assert!(pack.load_spec().is_err());
    }

    #[test]
    fn missing_manifest_is_reported_with_path() {
        let temp = tempfile::tempdir().unwrap();
        let err = LocalPack::load(temp.path()).unwrap_err();
        match err {
            PackError::ManifestMissing(path) => assert!(path.ends_with(MANIFEST_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_manifest_fails_validation() {
        let temp = tempfile::tempdir().unwrap();
        write_pack(temp.path(), "name = \"\"\nmax_fps = 0.0\n", &[]);
        let err = LocalPack::load(temp.path()).unwrap_err();
        assert!(matches!(err, PackError::ManifestValidation(ref issues) if issues.len() == 2));
    }

    #[test]
    fn malformed_manifest_is_a_parse_error() {
        let temp = tempfile::tempdir().unwrap();
        write_pack(temp.path(), "name = [", &[]);
        assert!(matches!(
            LocalPack::load(temp.path()),
            Err(PackError::ManifestParse(_))
        ));
    }
}
