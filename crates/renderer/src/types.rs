use std::fmt;

/// Shader pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// GLSL type of a declared uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformType {
    /// Number of `f32` components carried by the type.
    pub fn components(self) -> usize {
        match self {
            UniformType::Float => 1,
            UniformType::Vec2 => 2,
            UniformType::Vec3 => 3,
            UniformType::Vec4 => 4,
        }
    }

    /// GLSL spelling used in the generated uniform block.
    pub fn glsl_name(self) -> &'static str {
        match self {
            UniformType::Float => "float",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
        }
    }
}

/// Where the engine takes a uniform's value from each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSource {
    /// Seconds since the frame clock started.
    ElapsedTime,
    /// Physical surface size in pixels.
    Resolution,
    /// Last observed pointer position in physical pixels.
    Pointer,
    /// Size of the visualization's texture in texels.
    TextureResolution,
}

/// One entry of a visualization's uniform contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub ty: UniformType,
    pub source: UniformSource,
}

impl UniformDecl {
    pub fn new(name: impl Into<String>, ty: UniformType, source: UniformSource) -> Self {
        Self {
            name: name.into(),
            ty,
            source,
        }
    }
}

/// Immutable RGB image uploaded once as a repeating texture.
#[derive(Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB8 texels, row-major.
    pub rgb: Vec<u8>,
}

impl TextureImage {
    /// Returns `true` when the byte length matches the declared dimensions.
    pub fn is_consistent(&self) -> bool {
        self.rgb.len() == self.width as usize * self.height as usize * 3
    }
}

impl fmt::Debug for TextureImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgb.len())
            .finish()
    }
}

/// Texture bound to a sampler uniform in the fragment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    /// Name the fragment payload samples through (e.g. `iChannel0`).
    pub sampler: String,
    pub image: TextureImage,
}

/// Which corner the pointer uniform measures from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerOrigin {
    /// Graphics convention: y grows upwards from the bottom edge.
    #[default]
    BottomLeft,
    /// Window convention: y grows downwards from the top edge.
    TopLeft,
}

/// How fragment output combines with the cleared surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// Straight alpha blending; used together with a transparent clear color.
    Alpha,
}

/// Everything the engine needs to host one visualization.
///
/// The GLSL bodies are opaque: the engine only reads the uniform
/// declarations, the optional texture, and the presentation hints.
#[derive(Debug, Clone)]
pub struct VisualizationSpec {
    pub name: String,
    pub vertex_source: String,
    pub fragment_source: String,
    pub uniforms: Vec<UniformDecl>,
    pub texture: Option<TextureBinding>,
    /// Extra `#define NAME VALUE` lines injected ahead of the fragment payload.
    pub defines: Vec<(String, String)>,
    pub pointer_origin: PointerOrigin,
    /// Upper bound applied to the host's device pixel ratio.
    pub max_pixel_ratio: Option<f64>,
    /// Optional frame-rate cap; `None` draws on every host callback.
    pub max_fps: Option<f32>,
    pub clear_color: [f32; 4],
    pub blend: BlendMode,
}

impl VisualizationSpec {
    /// Builds a spec with the default pass-through vertex stage and no uniforms.
    pub fn new(name: impl Into<String>, fragment_source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertex_source: crate::compile::PASS_THROUGH_VERTEX.to_string(),
            fragment_source: fragment_source.into(),
            uniforms: Vec::new(),
            texture: None,
            defines: Vec::new(),
            pointer_origin: PointerOrigin::default(),
            max_pixel_ratio: None,
            max_fps: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            blend: BlendMode::default(),
        }
    }

    pub fn with_uniform(mut self, decl: UniformDecl) -> Self {
        self.uniforms.push(decl);
        self
    }

    pub fn with_texture(mut self, texture: TextureBinding) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.defines.iter_mut().find(|(key, _)| *key == name) {
            existing.1 = value;
        } else {
            self.defines.push((name, value));
        }
        self
    }

    /// First declaration drawing from `source`, if any.
    pub fn uniform_for(&self, source: UniformSource) -> Option<&UniformDecl> {
        self.uniforms.iter().find(|decl| decl.source == source)
    }
}

/// Logical viewport reported by the host, before pixel-ratio scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub logical_width: f64,
    pub logical_height: f64,
    pub device_pixel_ratio: f64,
    /// Exact pixel size when the host knows it. Used while the ratio is uncapped.
    pub physical: Option<PhysicalSize>,
}

impl Viewport {
    pub fn new(logical_width: f64, logical_height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            logical_width,
            logical_height,
            device_pixel_ratio,
            physical: None,
        }
    }

    pub fn with_physical(mut self, size: PhysicalSize) -> Self {
        self.physical = Some(size);
        self
    }
}

/// Bounding rectangle of the drawable in logical client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClientRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Framebuffer size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalSize {
    pub width: u32,
    pub height: u32,
}

impl PhysicalSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
