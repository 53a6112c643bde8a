//! wgpu implementation of [`GraphicsApi`](crate::backend::GraphicsApi).
//!
//! Shader objects hold validated GLSL modules, a linked program is a render
//! pipeline plus its uniform block, and a vertex array is the pairing of a
//! program with the buffer it reads positions from. Every frame is one render
//! pass that clears to the requested color and draws the quad.

mod context;
mod pipeline;
mod textures;
mod uniforms;

use std::borrow::Cow;
use std::collections::HashMap;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, trace, warn};
use wgpu::util::DeviceExt;

use crate::backend::{
    BufferHandle, GraphicsApi, ProgramHandle, ProgramLayout, ShaderHandle, TextureHandle,
    VertexArrayHandle, VertexAttribute,
};
use crate::compile::validate_glsl;
use crate::error::FrameError;
use crate::geometry::POSITION_ATTRIBUTE;
use crate::types::{PhysicalSize, ShaderStage, TextureImage};
use crate::uniforms::UniformSet;

pub use context::{GpuOptions, GpuPowerPreference};

use context::GpuContext;
use pipeline::ShaderPipeline;
use textures::GpuTexture;

struct ShaderSlot {
    stage: ShaderStage,
    module: Option<wgpu::ShaderModule>,
}

struct ProgramSlot {
    pipeline: Option<ShaderPipeline>,
    bound: Vec<Option<TextureHandle>>,
}

#[derive(Clone, Copy)]
struct VertexArraySlot {
    buffer: BufferHandle,
}

/// Window-backed graphics context driven through object handles.
pub struct WgpuGraphics {
    context: Option<GpuContext>,
    shaders: HashMap<ShaderHandle, ShaderSlot>,
    programs: HashMap<ProgramHandle, ProgramSlot>,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArraySlot>,
    textures: HashMap<TextureHandle, GpuTexture>,
    clear_color: wgpu::Color,
    next_id: u64,
}

impl WgpuGraphics {
    /// Creates a device and configured surface for `target`.
    ///
    /// `target` must outlive the returned value.
    pub fn new<T>(target: &T, size: PhysicalSize, options: GpuOptions) -> Result<Self, String>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, options)?;
        Ok(Self {
            context: Some(context),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            clear_color: wgpu::Color::BLACK,
            next_id: 1,
        })
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Rebuilds the texture bind group once every sampler unit has a texture.
    fn refresh_texture_bindings(&mut self, program: ProgramHandle) {
        let Some(context) = &self.context else {
            return;
        };
        let Some(slot) = self.programs.get_mut(&program) else {
            return;
        };
        let Some(pipeline) = slot.pipeline.as_mut() else {
            return;
        };
        let textures: Option<Vec<&GpuTexture>> = slot
            .bound
            .iter()
            .map(|handle| handle.and_then(|handle| self.textures.get(&handle)))
            .collect();
        if let Some(textures) = textures {
            if !pipeline.bind_textures(&context.device, &textures) {
                warn!(?program, "texture count does not match sampler layout");
            }
        }
    }
}

fn naga_stage(stage: ShaderStage) -> wgpu::naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => wgpu::naga::ShaderStage::Vertex,
        ShaderStage::Fragment => wgpu::naga::ShaderStage::Fragment,
    }
}

/// Runs `create` inside a validation error scope.
fn with_validation<T>(device: &wgpu::Device, create: impl FnOnce() -> T) -> Result<T, String> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(err.to_string()),
        None => Ok(value),
    }
}

impl GraphicsApi for WgpuGraphics {
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderHandle {
        let handle = ShaderHandle(self.next());
        self.shaders.insert(handle, ShaderSlot { stage, module: None });
        handle
    }

    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) -> Result<(), String> {
        let Some(context) = &self.context else {
            return Err("graphics context released".to_string());
        };
        let Some(slot) = self.shaders.get_mut(&shader) else {
            return Err(format!("unknown shader object {}", shader.0));
        };
        validate_glsl(slot.stage, source)?;

        let label = format!("{} shader", slot.stage);
        let module = with_validation(&context.device, || {
            context
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&label),
                    source: wgpu::ShaderSource::Glsl {
                        shader: Cow::Owned(source.to_string()),
                        stage: naga_stage(slot.stage),
                        defines: &[],
                    },
                })
        })?;
        slot.module = Some(module);
        Ok(())
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> ProgramHandle {
        let handle = ProgramHandle(self.next());
        self.programs.insert(
            handle,
            ProgramSlot {
                pipeline: None,
                bound: Vec::new(),
            },
        );
        handle
    }

    fn link_program(
        &mut self,
        program: ProgramHandle,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
        layout: &ProgramLayout,
    ) -> Result<(), String> {
        let Some(context) = &self.context else {
            return Err("graphics context released".to_string());
        };
        let module = |handle: ShaderHandle, stage: ShaderStage| {
            self.shaders
                .get(&handle)
                .filter(|slot| slot.stage == stage)
                .and_then(|slot| slot.module.as_ref())
                .ok_or_else(|| format!("{stage} shader {} is not compiled", handle.0))
        };
        let vertex_module = module(vertex, ShaderStage::Vertex)?;
        let fragment_module = module(fragment, ShaderStage::Fragment)?;

        let pipeline = with_validation(&context.device, || {
            ShaderPipeline::new(
                &context.device,
                context.surface_format,
                vertex_module,
                fragment_module,
                layout,
                POSITION_ATTRIBUTE,
            )
        })?;

        let Some(slot) = self.programs.get_mut(&program) else {
            return Err(format!("unknown program object {}", program.0));
        };
        slot.bound = vec![None; layout.samplers.len()];
        slot.pipeline = Some(pipeline);
        debug!(?program, "program linked");
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
    }

    fn create_buffer(&mut self, data: &[f32]) -> BufferHandle {
        let handle = BufferHandle(self.next());
        if let Some(context) = &self.context {
            let buffer = context
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("quad vertices"),
                    contents: bytemuck::cast_slice(data),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            self.buffers.insert(handle, buffer);
        }
        handle
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn create_vertex_array(
        &mut self,
        program: ProgramHandle,
        buffer: BufferHandle,
        attribute: VertexAttribute,
    ) -> VertexArrayHandle {
        if attribute != POSITION_ATTRIBUTE {
            warn!(?program, ?attribute, "pipeline expects a vec2 position at location 0");
        }
        let handle = VertexArrayHandle(self.next());
        self.vertex_arrays.insert(handle, VertexArraySlot { buffer });
        handle
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array);
    }

    fn create_texture(&mut self, image: &TextureImage) -> TextureHandle {
        let handle = TextureHandle(self.next());
        if let Some(context) = &self.context {
            let texture = textures::upload_rgb(&context.device, &context.queue, image);
            self.textures.insert(handle, texture);
        }
        handle
    }

    fn bind_texture(&mut self, program: ProgramHandle, unit: u32, texture: TextureHandle) {
        let Some(slot) = self.programs.get_mut(&program) else {
            warn!(?program, "binding texture to unknown program");
            return;
        };
        let Some(entry) = slot.bound.get_mut(unit as usize) else {
            warn!(?program, unit, "program has no sampler at this unit");
            return;
        };
        *entry = Some(texture);
        self.refresh_texture_bindings(program);
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn set_viewport(&mut self, size: PhysicalSize) {
        if let Some(context) = self.context.as_mut() {
            context.resize(size);
            debug!(width = size.width, height = size.height, "surface resized");
        }
    }

    fn clear(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color.map(f64::from);
        self.clear_color = wgpu::Color { r, g, b, a };
    }

    fn set_uniforms(&mut self, program: ProgramHandle, uniforms: &UniformSet) {
        let Some(context) = &self.context else {
            return;
        };
        if let Some(pipeline) = self
            .programs
            .get_mut(&program)
            .and_then(|slot| slot.pipeline.as_mut())
        {
            pipeline.uniforms.write(&context.queue, uniforms);
        }
    }

    fn draw(
        &mut self,
        program: ProgramHandle,
        vertex_array: VertexArrayHandle,
        vertex_count: u32,
    ) -> Result<(), FrameError> {
        let Some(context) = &self.context else {
            return Err(FrameError::Fatal("graphics context released".to_string()));
        };
        let Some(pipeline) = self
            .programs
            .get(&program)
            .and_then(|slot| slot.pipeline.as_ref())
        else {
            return Err(FrameError::Fatal(format!("program {} is not linked", program.0)));
        };
        if !pipeline.is_complete() {
            return Err(FrameError::Fatal("sampler has no texture bound".to_string()));
        }
        let Some(buffer) = self
            .vertex_arrays
            .get(&vertex_array)
            .and_then(|slot| self.buffers.get(&slot.buffer))
        else {
            return Err(FrameError::Fatal(format!(
                "vertex array {} has no buffer",
                vertex_array.0
            )));
        };

        let frame = match context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(FrameError::Fatal("out of GPU memory".to_string()));
            }
            Err(err) => return Err(FrameError::Recoverable(format!("{err:?}"))),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&pipeline.pipeline);
            render_pass.set_bind_group(0, &pipeline.uniforms.bind_group, &[]);
            if let Some(textures) = &pipeline.texture_bind_group {
                render_pass.set_bind_group(1, textures, &[]);
            }
            render_pass.set_vertex_buffer(0, buffer.slice(..));
            render_pass.draw(0..vertex_count, 0..1);
        }

        context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        trace!(
            width = context.config.width,
            height = context.config.height,
            "presented frame"
        );
        Ok(())
    }

    fn reconfigure(&mut self) {
        if let Some(context) = self.context.as_mut() {
            context.reconfigure();
        }
    }

    fn release(&mut self) {
        self.textures.clear();
        self.vertex_arrays.clear();
        for (_, buffer) in self.buffers.drain() {
            buffer.destroy();
        }
        self.programs.clear();
        self.shaders.clear();
        if self.context.take().is_some() {
            debug!("GPU context released");
        }
    }
}
