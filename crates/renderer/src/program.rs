use tracing::{debug, error};

use crate::backend::{GraphicsApi, ProgramHandle, ProgramLayout, ShaderHandle};
use crate::compile::{prepare_vertex, wrap_fragment};
use crate::error::RenderError;
use crate::types::{ShaderStage, VisualizationSpec};

/// A linked program plus the stage objects it was built from.
///
/// The stage objects stay alive until teardown, which deletes them after the
/// program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkedProgram {
    pub program: ProgramHandle,
    pub vertex: ShaderHandle,
    pub fragment: ShaderHandle,
}

impl LinkedProgram {
    pub fn shaders(&self) -> [ShaderHandle; 2] {
        [self.vertex, self.fragment]
    }
}

/// Compiles one stage. A failed stage object is deleted before returning.
pub fn compile_stage<G: GraphicsApi>(
    graphics: &mut G,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderHandle, RenderError> {
    let shader = graphics.create_shader(stage);
    match graphics.compile_shader(shader, source) {
        Ok(()) => {
            debug!(%stage, "shader compiled");
            Ok(shader)
        }
        Err(log) => {
            error!(%stage, %log, "shader compile failed");
            graphics.delete_shader(shader);
            Err(RenderError::Compile { stage, log })
        }
    }
}

/// Links two compiled stages. A failed program object is deleted before returning.
pub fn link_stages<G: GraphicsApi>(
    graphics: &mut G,
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    layout: &ProgramLayout,
) -> Result<ProgramHandle, RenderError> {
    let program = graphics.create_program();
    match graphics.link_program(program, vertex, fragment, layout) {
        Ok(()) => Ok(program),
        Err(log) => {
            error!(%log, "program link failed");
            graphics.delete_program(program);
            Err(RenderError::Link { log })
        }
    }
}

/// Turns a visualization's payload into a linked program.
#[derive(Debug, Clone)]
pub struct ProgramBuilder {
    vertex_source: String,
    fragment_source: String,
    layout: ProgramLayout,
}

impl ProgramBuilder {
    pub fn from_spec(spec: &VisualizationSpec) -> Self {
        let layout = ProgramLayout {
            uniforms: spec.uniforms.clone(),
            samplers: spec
                .texture
                .iter()
                .map(|binding| binding.sampler.clone())
                .collect(),
            blend: spec.blend,
        };
        Self {
            vertex_source: prepare_vertex(&spec.vertex_source),
            fragment_source: wrap_fragment(&spec.fragment_source, &layout, &spec.defines),
            layout,
        }
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    /// Fragment source after wrapping, as handed to the backend.
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    /// Compiles both stages and links them.
    ///
    /// Any failure releases every object created along the way, so an error
    /// leaves no program or shader behind.
    pub fn build<G: GraphicsApi>(&self, graphics: &mut G) -> Result<LinkedProgram, RenderError> {
        let vertex = compile_stage(graphics, ShaderStage::Vertex, &self.vertex_source)?;
        let fragment = match compile_stage(graphics, ShaderStage::Fragment, &self.fragment_source)
        {
            Ok(fragment) => fragment,
            Err(err) => {
                graphics.delete_shader(vertex);
                return Err(err);
            }
        };
        match link_stages(graphics, vertex, fragment, &self.layout) {
            Ok(program) => Ok(LinkedProgram {
                program,
                vertex,
                fragment,
            }),
            Err(err) => {
                graphics.delete_shader(vertex);
                graphics.delete_shader(fragment);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HostSurface;
    use crate::headless::HeadlessSurface;
    use crate::types::Viewport;

    const CONSTANT_COLOR: &str =
        "void mainImage(out vec4 fragColor, in vec2 fragCoord) {\n    fragColor = vec4(1.0, 0.0, 0.5, 1.0);\n}\n";

    #[test]
    fn build_links_and_retains_stages() {
        let host = HeadlessSurface::new(Viewport::new(10.0, 10.0, 1.0));
        let mut graphics = host.acquire_graphics().expect("graphics");
        let builder = ProgramBuilder::from_spec(&VisualizationSpec::new("ok", CONSTANT_COLOR));
        let linked = builder.build(&mut graphics).expect("link");
        assert_ne!(linked.vertex, linked.fragment);
        let stats = host.stats();
        assert_eq!(stats.shaders_created, 2);
        assert_eq!(stats.shaders_deleted, 0);
        assert_eq!(stats.programs_created, 1);
    }

    #[test]
    fn fragment_failure_releases_vertex_stage() {
        let host = HeadlessSurface::new(Viewport::new(10.0, 10.0, 1.0));
        let mut graphics = host.acquire_graphics().expect("graphics");
        let builder = ProgramBuilder::from_spec(&VisualizationSpec::new(
            "broken",
            "void mainImage(out vec4 c, in vec2 f) { c = vec4(1.0);",
        ));
        let err = builder.build(&mut graphics).expect_err("compile failure");
        assert!(matches!(
            err,
            RenderError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        let stats = host.stats();
        assert_eq!(stats.shaders_created, stats.shaders_deleted);
        assert_eq!(stats.programs_created, 0);
    }

    #[test]
    fn link_failure_releases_program_and_stages() {
        let host = HeadlessSurface::new(Viewport::new(10.0, 10.0, 1.0)).with_link_failure();
        let mut graphics = host.acquire_graphics().expect("graphics");
        let builder = ProgramBuilder::from_spec(&VisualizationSpec::new("mismatch", CONSTANT_COLOR));
        let err = builder.build(&mut graphics).expect_err("link failure");
        assert!(matches!(err, RenderError::Link { .. }));
        let stats = host.stats();
        assert_eq!(stats.programs_created, stats.programs_deleted);
        assert_eq!(stats.shaders_created, stats.shaders_deleted);
    }
}
