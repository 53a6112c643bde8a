use crate::types::{UniformDecl, UniformType};
use crate::uniforms::UniformSet;

/// Word (4 byte) offsets of each declared uniform inside the std140 block.
///
/// Members appear in declaration order, matching the block the fragment
/// wrapper generates. An empty declaration list still occupies one 16 byte
/// slot for the reserved member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Std140Layout {
    members: Vec<Std140Member>,
    size_words: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Std140Member {
    name: String,
    offset_words: usize,
    components: usize,
}

fn alignment_words(ty: UniformType) -> usize {
    match ty {
        UniformType::Float => 1,
        UniformType::Vec2 => 2,
        UniformType::Vec3 | UniformType::Vec4 => 4,
    }
}

fn round_up(value: usize, multiple: usize) -> usize {
    value.div_ceil(multiple) * multiple
}

impl Std140Layout {
    pub(crate) fn new(decls: &[UniformDecl]) -> Self {
        let mut cursor = 0;
        let mut members = Vec::with_capacity(decls.len());
        for decl in decls {
            let offset_words = round_up(cursor, alignment_words(decl.ty));
            let components = decl.ty.components();
            members.push(Std140Member {
                name: decl.name.clone(),
                offset_words,
                components,
            });
            cursor = offset_words + components;
        }
        Self {
            members,
            size_words: round_up(cursor.max(1), 4),
        }
    }

    pub(crate) fn size_bytes(&self) -> u64 {
        (self.size_words * std::mem::size_of::<f32>()) as u64
    }

    #[cfg(test)]
    pub(crate) fn offset_bytes(&self, name: &str) -> Option<usize> {
        self.members
            .iter()
            .find(|member| member.name == name)
            .map(|member| member.offset_words * std::mem::size_of::<f32>())
    }

    /// Packs `values` into `words`, zeroing anything not present in the set.
    pub(crate) fn pack_into(&self, values: &UniformSet, words: &mut Vec<f32>) {
        words.clear();
        words.resize(self.size_words, 0.0);
        for member in &self.members {
            let Some(value) = values.get(&member.name) else {
                continue;
            };
            let components = value.components();
            let count = components.len().min(member.components);
            words[member.offset_words..member.offset_words + count]
                .copy_from_slice(&components[..count]);
        }
    }
}

/// GPU-side uniform buffer and its bind group.
pub(crate) struct UniformBlock {
    layout: Std140Layout,
    buffer: wgpu::Buffer,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    scratch: Vec<f32>,
}

impl UniformBlock {
    pub(crate) fn new(device: &wgpu::Device, decls: &[UniformDecl]) -> Self {
        let layout = Std140Layout::new(decls);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform block"),
            size: layout.size_bytes(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self {
            layout,
            buffer,
            bind_group_layout,
            bind_group,
            scratch: Vec::new(),
        }
    }

    pub(crate) fn write(&mut self, queue: &wgpu::Queue, values: &UniformSet) {
        self.layout.pack_into(values, &mut self.scratch);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&self.scratch));
    }
}
