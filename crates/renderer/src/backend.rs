//! Graphics API seam shared by the wgpu backend and the headless backend.
//!
//! The engine speaks in object handles the way a GL-style API does: shader
//! objects are created, compiled, attached to a program and linked; buffers and
//! vertex arrays are separate objects; every object is explicitly deleted.
//! Keeping that shape lets the lifecycle code count and order releases the same
//! way regardless of which backend sits underneath.

use crate::error::FrameError;
use crate::types::{
    BlendMode, ClientRect, PhysicalSize, ShaderStage, TextureImage, UniformDecl, Viewport,
};
use crate::uniforms::UniformSet;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

handle!(
    /// Compiled (or compiling) shader stage object.
    ShaderHandle
);
handle!(
    /// Linked program; only ever held after a successful link.
    ProgramHandle
);
handle!(BufferHandle);
handle!(VertexArrayHandle);
handle!(TextureHandle);

/// Describes how a vertex buffer feeds a program input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
}

/// Resource layout a program is linked against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgramLayout {
    pub uniforms: Vec<UniformDecl>,
    /// Sampler names in texture-unit order.
    pub samplers: Vec<String>,
    pub blend: BlendMode,
}

/// Object-level graphics operations the engine relies on.
///
/// Implementations own exactly one drawing context. Nothing here is expected to
/// be thread-safe; the engine drives it from a single event-loop thread.
pub trait GraphicsApi {
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderHandle;
    /// Compiles `source` into `shader`, returning the diagnostic log on failure.
    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) -> Result<(), String>;
    fn delete_shader(&mut self, shader: ShaderHandle);

    fn create_program(&mut self) -> ProgramHandle;
    /// Links two compiled stages into `program`, returning the link log on failure.
    fn link_program(
        &mut self,
        program: ProgramHandle,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
        layout: &ProgramLayout,
    ) -> Result<(), String>;
    fn delete_program(&mut self, program: ProgramHandle);

    fn create_buffer(&mut self, data: &[f32]) -> BufferHandle;
    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn create_vertex_array(
        &mut self,
        program: ProgramHandle,
        buffer: BufferHandle,
        attribute: VertexAttribute,
    ) -> VertexArrayHandle;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    fn create_texture(&mut self, image: &TextureImage) -> TextureHandle;
    fn bind_texture(&mut self, program: ProgramHandle, unit: u32, texture: TextureHandle);
    fn delete_texture(&mut self, texture: TextureHandle);

    /// Resizes the drawable and the viewport transform.
    fn set_viewport(&mut self, size: PhysicalSize);
    fn clear(&mut self, color: [f32; 4]);
    fn set_uniforms(&mut self, program: ProgramHandle, uniforms: &UniformSet);
    fn draw(
        &mut self,
        program: ProgramHandle,
        vertex_array: VertexArrayHandle,
        vertex_count: u32,
    ) -> Result<(), FrameError>;
    /// Rebuilds presentation state after a recoverable frame error.
    fn reconfigure(&mut self) {}

    /// Releases the context itself. Called last during teardown.
    fn release(&mut self);
}

/// The display surface a visualization is mounted on.
pub trait HostSurface {
    type Graphics: GraphicsApi;

    /// Requests a drawing context bound to this surface.
    fn acquire_graphics(&self) -> Result<Self::Graphics, String>;
    /// Current logical viewport and device pixel ratio.
    fn viewport(&self) -> Viewport;
    /// Bounding rectangle of the drawable in client coordinates.
    fn client_rect(&self) -> ClientRect;
}
