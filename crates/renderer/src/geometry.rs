use crate::backend::{BufferHandle, GraphicsApi, ProgramHandle, VertexArrayHandle, VertexAttribute};

/// Two clip-space triangles covering (-1, -1) to (1, 1).
pub const FULLSCREEN_QUAD: [f32; 12] = [
    -1.0, -1.0, 1.0, -1.0, -1.0, 1.0, //
    -1.0, 1.0, 1.0, -1.0, 1.0, 1.0,
];

pub const QUAD_VERTEX_COUNT: u32 = 6;

/// Position input: two floats per vertex, tightly packed, at location 0.
pub const POSITION_ATTRIBUTE: VertexAttribute = VertexAttribute {
    location: 0,
    components: 2,
    stride: 2 * std::mem::size_of::<f32>() as u32,
    offset: 0,
};

/// Uploaded quad geometry. Created once and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub buffer: BufferHandle,
    pub vertex_array: VertexArrayHandle,
    pub vertex_count: u32,
}

/// Uploads the full-screen quad and binds it to the program's position input.
pub fn upload_fullscreen_quad<G: GraphicsApi>(graphics: &mut G, program: ProgramHandle) -> Geometry {
    let buffer = graphics.create_buffer(&FULLSCREEN_QUAD);
    let vertex_array = graphics.create_vertex_array(program, buffer, POSITION_ATTRIBUTE);
    Geometry {
        buffer,
        vertex_array,
        vertex_count: QUAD_VERTEX_COUNT,
    }
}
