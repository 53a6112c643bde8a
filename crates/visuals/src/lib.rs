//! Visualization payloads for shaderdeck.
//!
//! Five visualizations ship inside the binary; more can be dropped on disk as
//! shader packs, a directory holding `shader.toml` and the GLSL it names. Both
//! kinds are described by the same [`ShaderManifest`] and resolve to a
//! [`renderer::VisualizationSpec`] through the [`Catalog`].

mod catalog;
mod manifest;
mod noise;
mod pack;

pub use catalog::{Catalog, CatalogEntry, EntryOrigin, ResolvedVisual, BUILTIN_NAMES};
pub use manifest::{
    BlendSetting, PointerOriginSetting, ShaderManifest, TextureEntry, TextureKind, UniformEntry,
    UniformKind, UniformSourceKind,
};
pub use noise::noise_image;
pub use pack::{ensure_glsl_sources, LocalPack, PackError, MANIFEST_FILE};
