//! Defines the `shader.toml` schema shared by built-in visualizations and
//! on-disk shader packs. A manifest names the GLSL sources, declares the
//! uniform contract the engine fills every frame, and carries presentation
//! hints (pixel-ratio cap, frame cap, pointer origin, blending).
//!
//! Types:
//!
//! - `ShaderManifest` captures metadata, source paths, uniforms, the optional
//!   procedural texture, `#define` values and presentation hints.
//! - `UniformEntry` pairs a GLSL name with a `UniformKind` and the
//!   `UniformSourceKind` the engine reads it from.
//! - `TextureEntry` describes the generated texture bound to a sampler.
//! - `PointerOriginSetting` and `BlendSetting` mirror the renderer enums with
//!   serde spellings.
//!
//! Functions:
//!
//! - `ShaderManifest::validate` returns human-readable issues so loaders can
//!   report every problem in one pass instead of panicking on the first.
//! - `ShaderManifest::to_spec` turns a manifest plus its sources into a
//!   `VisualizationSpec` the engine can mount.
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use renderer::{
    BlendMode, PointerOrigin, TextureBinding, UniformDecl, UniformSource, UniformType,
    VisualizationSpec,
};
use serde::{Deserialize, Serialize};

use crate::noise::noise_image;

/// Largest procedural texture edge accepted by validation.
const MAX_TEXTURE_SIZE: u32 = 4096;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ShaderManifest {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Optional vertex stage; the pass-through quad shader is used otherwise.
    #[serde(default)]
    pub vertex: Option<PathBuf>,
    #[serde(default = "default_fragment")]
    pub fragment: PathBuf,
    #[serde(default)]
    pub pointer_origin: PointerOriginSetting,
    #[serde(default)]
    pub max_pixel_ratio: Option<f64>,
    #[serde(default)]
    pub max_fps: Option<f32>,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub blend: BlendSetting,
    #[serde(default)]
    pub uniforms: Vec<UniformEntry>,
    #[serde(default)]
    pub texture: Option<TextureEntry>,
    #[serde(default)]
    pub defines: BTreeMap<String, String>,
}

fn default_fragment() -> PathBuf {
    PathBuf::from("fragment.glsl")
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct UniformEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: UniformKind,
    pub source: UniformSourceKind,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl From<UniformKind> for UniformType {
    fn from(kind: UniformKind) -> Self {
        match kind {
            UniformKind::Float => UniformType::Float,
            UniformKind::Vec2 => UniformType::Vec2,
            UniformKind::Vec3 => UniformType::Vec3,
            UniformKind::Vec4 => UniformType::Vec4,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UniformSourceKind {
    Time,
    Resolution,
    Pointer,
    TextureResolution,
}

impl From<UniformSourceKind> for UniformSource {
    fn from(kind: UniformSourceKind) -> Self {
        match kind {
            UniformSourceKind::Time => UniformSource::ElapsedTime,
            UniformSourceKind::Resolution => UniformSource::Resolution,
            UniformSourceKind::Pointer => UniformSource::Pointer,
            UniformSourceKind::TextureResolution => UniformSource::TextureResolution,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TextureEntry {
    /// Sampler name the payload reads through, e.g. `iChannel0`.
    pub sampler: String,
    #[serde(default)]
    pub kind: TextureKind,
    #[serde(default = "default_texture_size")]
    pub size: u32,
    #[serde(default)]
    pub seed: u64,
}

fn default_texture_size() -> u32 {
    256
}

impl TextureEntry {
    /// Generates the texture's texels.
    pub fn binding(&self) -> TextureBinding {
        let image = match self.kind {
            TextureKind::Noise => noise_image(self.size, self.seed),
        };
        TextureBinding {
            sampler: self.sampler.clone(),
            image,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextureKind {
    /// Grey RGB noise, one random byte per texel.
    #[default]
    Noise,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PointerOriginSetting {
    #[default]
    BottomLeft,
    TopLeft,
}

impl From<PointerOriginSetting> for PointerOrigin {
    fn from(setting: PointerOriginSetting) -> Self {
        match setting {
            PointerOriginSetting::BottomLeft => PointerOrigin::BottomLeft,
            PointerOriginSetting::TopLeft => PointerOrigin::TopLeft,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlendSetting {
    #[default]
    Opaque,
    Alpha,
}

impl From<BlendSetting> for BlendMode {
    fn from(setting: BlendSetting) -> Self {
        match setting {
            BlendSetting::Opaque => BlendMode::Opaque,
            BlendSetting::Alpha => BlendMode::Alpha,
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl ShaderManifest {
    /// Title for listings, falling back to the name.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.name.trim().is_empty() {
            issues.push("manifest name must not be empty".to_string());
        }
        if self.fragment.as_os_str().is_empty() {
            issues.push("fragment source path must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for uniform in &self.uniforms {
            if !is_identifier(&uniform.name) {
                issues.push(format!(
                    "uniform '{}' is not a valid GLSL identifier",
                    uniform.name
                ));
            }
            if !seen.insert(uniform.name.as_str()) {
                issues.push(format!("uniform '{}' is declared twice", uniform.name));
            }
            if uniform.source == UniformSourceKind::TextureResolution && self.texture.is_none() {
                issues.push(format!(
                    "uniform '{}' reads the texture resolution but no [texture] is declared",
                    uniform.name
                ));
            }
        }

        if let Some(texture) = &self.texture {
            if !is_identifier(&texture.sampler) {
                issues.push(format!(
                    "texture sampler '{}' is not a valid GLSL identifier",
                    texture.sampler
                ));
            }
            if seen.contains(texture.sampler.as_str()) {
                issues.push(format!(
                    "texture sampler '{}' collides with a uniform of the same name",
                    texture.sampler
                ));
            }
            if texture.size == 0 || texture.size > MAX_TEXTURE_SIZE {
                issues.push(format!(
                    "texture size {} outside 1..={MAX_TEXTURE_SIZE}",
                    texture.size
                ));
            }
        }

        for name in self.defines.keys() {
            if !is_identifier(name) {
                issues.push(format!("define '{name}' is not a valid GLSL identifier"));
            }
        }

        if let Some(ratio) = self.max_pixel_ratio {
            if !ratio.is_finite() || ratio <= 0.0 {
                issues.push(format!("max_pixel_ratio must be positive, got {ratio}"));
            }
        }
        if let Some(fps) = self.max_fps {
            if !fps.is_finite() || fps <= 0.0 {
                issues.push(format!("max_fps must be positive, got {fps}"));
            } else if Duration::try_from_secs_f64(1.0 / f64::from(fps)).is_err() {
                issues.push(format!("max_fps {fps} is too low to pace frames"));
            }
        }
        if self
            .clear_color
            .iter()
            .any(|component| !(0.0..=1.0).contains(component))
        {
            issues.push(format!(
                "clear_color components must lie in 0..=1, got {:?}",
                self.clear_color
            ));
        }
        issues
    }

    /// Builds the engine-facing description from this manifest.
    ///
    /// `vertex_source` of `None` keeps the pass-through vertex stage.
    pub fn to_spec(&self, vertex_source: Option<String>, fragment_source: String) -> VisualizationSpec {
        let mut spec = VisualizationSpec::new(self.name.clone(), fragment_source);
        if let Some(vertex) = vertex_source {
            spec.vertex_source = vertex;
        }
        spec.uniforms = self
            .uniforms
            .iter()
            .map(|entry| UniformDecl::new(entry.name.clone(), entry.kind.into(), entry.source.into()))
            .collect();
        spec.texture = self.texture.as_ref().map(TextureEntry::binding);
        spec.defines = self
            .defines
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        spec.pointer_origin = self.pointer_origin.into();
        spec.max_pixel_ratio = self.max_pixel_ratio;
        spec.max_fps = self.max_fps;
        spec.clear_color = self.clear_color;
        spec.blend = self.blend.into();
        spec
    }
}
