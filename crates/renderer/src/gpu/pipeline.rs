use crate::backend::{ProgramLayout, VertexAttribute};
use crate::types::BlendMode;

use super::textures::GpuTexture;
use super::uniforms::UniformBlock;

/// A linked program: pipeline plus the bind groups it draws with.
pub(crate) struct ShaderPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniforms: UniformBlock,
    pub texture_layout: Option<wgpu::BindGroupLayout>,
    pub texture_bind_group: Option<wgpu::BindGroup>,
    pub sampler_count: usize,
}

/// Texture and sampler pairs for set 1, matching the fragment header.
fn texture_layout_entries(sampler_count: usize) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(sampler_count * 2);
    for unit in 0..sampler_count as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: unit * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: unit * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        3 => wgpu::VertexFormat::Float32x3,
        4 => wgpu::VertexFormat::Float32x4,
        _ => wgpu::VertexFormat::Float32x2,
    }
}

fn blend_state(blend: BlendMode) -> wgpu::BlendState {
    match blend {
        BlendMode::Opaque => wgpu::BlendState::REPLACE,
        BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
    }
}

impl ShaderPipeline {
    pub(crate) fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        vertex_module: &wgpu::ShaderModule,
        fragment_module: &wgpu::ShaderModule,
        layout: &ProgramLayout,
        attribute: VertexAttribute,
    ) -> Self {
        let uniforms = UniformBlock::new(device, &layout.uniforms);
        let sampler_count = layout.samplers.len();
        let texture_layout = (sampler_count > 0).then(|| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("channel layout"),
                entries: &texture_layout_entries(sampler_count),
            })
        });

        let mut bind_group_layouts = vec![&uniforms.bind_group_layout];
        if let Some(texture_layout) = &texture_layout {
            bind_group_layouts.push(texture_layout);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shader pipeline layout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let attributes = [wgpu::VertexAttribute {
            format: vertex_format(attribute.components),
            offset: u64::from(attribute.offset),
            shader_location: attribute.location,
        }];
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shader pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex_module,
                entry_point: Some("main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: u64::from(attribute.stride),
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(blend_state(layout.blend)),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniforms,
            texture_layout,
            texture_bind_group: None,
            sampler_count,
        }
    }

    /// Binds `textures` in unit order. Returns `false` on a count mismatch.
    pub(crate) fn bind_textures(&mut self, device: &wgpu::Device, textures: &[&GpuTexture]) -> bool {
        let Some(layout) = &self.texture_layout else {
            return false;
        };
        if textures.len() != self.sampler_count {
            return false;
        }
        let mut entries = Vec::with_capacity(textures.len() * 2);
        for (unit, texture) in textures.iter().enumerate() {
            let unit = unit as u32;
            entries.push(wgpu::BindGroupEntry {
                binding: unit * 2,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: unit * 2 + 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            });
        }
        self.texture_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("channel bind group"),
            layout,
            entries: &entries,
        }));
        true
    }

    /// Whether every declared sampler has a texture bound.
    pub(crate) fn is_complete(&self) -> bool {
        self.sampler_count == 0 || self.texture_bind_group.is_some()
    }
}
