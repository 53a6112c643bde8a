use wgpu::naga;

use crate::backend::ProgramLayout;
use crate::types::{ShaderStage, UniformSource};

/// Minimal pass-through vertex stage for the full-screen quad.
pub const PASS_THROUGH_VERTEX: &str = r"#version 450
layout(location = 0) in vec2 position;

void main() {
    gl_Position = vec4(position, 0.0, 1.0);
}
";

const GLSL_VERSION: &str = "#version 450";

/// Name of the uniform block instance in generated headers.
const BLOCK_INSTANCE: &str = "params";

/// Ensures a vertex payload carries a `#version` directive.
pub fn prepare_vertex(source: &str) -> String {
    if source
        .lines()
        .any(|line| line.trim_start().starts_with("#version"))
    {
        source.to_string()
    } else {
        format!("{GLSL_VERSION}\n{source}")
    }
}

/// Produces a self-contained GLSL 450 fragment shader from a payload.
///
/// Steps performed:
///
/// 1. Strip `#version`, `precision` statements, and `uniform` lines that
///    redeclare anything the layout provides.
/// 2. Prepend a header declaring the output, the std140 uniform block with
///    macro aliases, the sampler bindings, and the caller's defines.
/// 3. Append a `main` that flips `gl_FragCoord` to a bottom-left origin and
///    calls `mainImage`, unless the payload brings its own `main`.
pub fn wrap_fragment(source: &str, layout: &ProgramLayout, defines: &[(String, String)]) -> String {
    let provided: Vec<&str> = layout
        .uniforms
        .iter()
        .map(|decl| decl.name.as_str())
        .chain(layout.samplers.iter().map(String::as_str))
        .collect();

    let mut body = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") || trimmed.starts_with("precision ") {
            continue;
        }
        if trimmed.starts_with("uniform ") && identifiers(trimmed).any(|id| provided.contains(&id))
        {
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }

    let mut wrapped = fragment_header(layout, defines);
    wrapped.push_str("#line 1\n");
    wrapped.push_str(&body);
    if !declares_main(&body) {
        wrapped.push_str(&fragment_footer(layout));
    }
    wrapped
}

fn fragment_header(layout: &ProgramLayout, defines: &[(String, String)]) -> String {
    let mut header = String::new();
    header.push_str(GLSL_VERSION);
    header.push_str("\nlayout(location = 0) out vec4 outColor;\n\n");

    header.push_str("layout(std140, set = 0, binding = 0) uniform Params {\n");
    if layout.uniforms.is_empty() {
        header.push_str("    float _reserved;\n");
    }
    for decl in &layout.uniforms {
        header.push_str(&format!("    {} _{};\n", decl.ty.glsl_name(), decl.name));
    }
    header.push_str(&format!("}} {BLOCK_INSTANCE};\n\n"));
    for decl in &layout.uniforms {
        header.push_str(&format!(
            "#define {name} {BLOCK_INSTANCE}._{name}\n",
            name = decl.name
        ));
    }

    for (unit, sampler) in layout.samplers.iter().enumerate() {
        let texture_binding = unit * 2;
        let sampler_binding = texture_binding + 1;
        header.push_str(&format!(
            "\nlayout(set = 1, binding = {texture_binding}) uniform texture2D channel{unit}_texture;\n\
             layout(set = 1, binding = {sampler_binding}) uniform sampler channel{unit}_sampler;\n\
             #define {sampler} sampler2D(channel{unit}_texture, channel{unit}_sampler)\n"
        ));
    }

    if !defines.is_empty() {
        header.push('\n');
        for (name, value) in defines {
            header.push_str(&format!("#define {name} {value}\n"));
        }
    }
    header.push('\n');
    header
}

fn fragment_footer(layout: &ProgramLayout) -> String {
    let resolution = layout
        .uniforms
        .iter()
        .find(|decl| decl.source == UniformSource::Resolution);
    let frag_coord = match resolution {
        Some(decl) => format!(
            "vec2(gl_FragCoord.x, {BLOCK_INSTANCE}._{}.y - gl_FragCoord.y)",
            decl.name
        ),
        None => "gl_FragCoord.xy".to_string(),
    };
    format!(
        "\nvoid main() {{\n    \
         vec2 fragCoord = {frag_coord};\n    \
         vec4 color = vec4(0.0);\n    \
         mainImage(color, fragCoord);\n    \
         outColor = color;\n\
         }}\n"
    )
}

fn identifiers(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
}

fn declares_main(source: &str) -> bool {
    let mut previous = "";
    for token in identifiers(source) {
        if previous == "void" && token == "main" {
            return true;
        }
        previous = token;
    }
    false
}

/// Parses and validates GLSL with naga, returning the rendered diagnostic.
pub fn validate_glsl(stage: ShaderStage, source: &str) -> Result<(), String> {
    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(naga_stage);
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| errors.emit_to_string(source))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|error| error.emit_to_string(source))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{UniformDecl, UniformType};

    fn layout() -> ProgramLayout {
        ProgramLayout {
            uniforms: vec![
                UniformDecl::new("iTime", UniformType::Float, UniformSource::ElapsedTime),
                UniformDecl::new("iResolution", UniformType::Vec3, UniformSource::Resolution),
            ],
            samplers: vec!["iChannel0".to_string()],
            ..ProgramLayout::default()
        }
    }

    #[test]
    fn wrap_strips_redeclared_uniforms() {
        let source = r#"
            #version 300 es
            precision highp float;
            uniform float iTime;
            uniform vec3 iResolution;
            uniform sampler2D iChannel0;
            uniform float untouched;
            void mainImage(out vec4 fragColor, in vec2 fragCoord) {
                fragColor = vec4(fragCoord, 0.0, 1.0);
            }
        "#;

        let wrapped = wrap_fragment(source, &layout(), &[]);
        assert!(!wrapped.contains("uniform float iTime"));
        assert!(!wrapped.contains("uniform vec3 iResolution"));
        assert!(!wrapped.contains("uniform sampler2D iChannel0"));
        assert!(!wrapped.contains("precision highp"));
        assert!(!wrapped.contains("#version 300 es"));
        assert!(wrapped.contains("uniform float untouched"));
        assert!(wrapped.contains("#define iTime params._iTime"));
        assert!(wrapped.contains("vec3 _iResolution;"));
        assert!(wrapped.contains("#define iChannel0 sampler2D(channel0_texture, channel0_sampler)"));
        assert!(wrapped.contains("params._iResolution.y - gl_FragCoord.y"));
    }

    #[test]
    fn wrap_keeps_payload_main() {
        let source = "void main() {\n    outColor = vec4(1.0);\n}\n";
        let wrapped = wrap_fragment(source, &ProgramLayout::default(), &[]);
        assert_eq!(wrapped.matches("void main").count(), 1);
        assert!(wrapped.contains("float _reserved;"));
    }

    #[test]
    fn wrap_injects_defines_before_payload() {
        let defines = vec![("POINTER_CAMERA_MIN_WIDTH".to_string(), "600.0".to_string())];
        let wrapped = wrap_fragment("void mainImage(out vec4 c, in vec2 f) { c = vec4(0.0); }", &layout(), &defines);
        let define_at = wrapped
            .find("#define POINTER_CAMERA_MIN_WIDTH 600.0")
            .expect("define present");
        let payload_at = wrapped.find("void mainImage").expect("payload present");
        assert!(define_at < payload_at);
    }

    #[test]
    fn prepare_vertex_adds_missing_version() {
        let prepared = prepare_vertex("void main() { gl_Position = vec4(0.0); }");
        assert!(prepared.starts_with("#version 450\n"));
        assert_eq!(prepare_vertex(PASS_THROUGH_VERTEX), PASS_THROUGH_VERTEX);
    }

    #[test]
    fn naga_accepts_wrapped_constant_color() {
        let source = "void mainImage(out vec4 fragColor, in vec2 fragCoord) {\n    \
                      fragColor = vec4(fragCoord / iResolution.xy, 0.5 + 0.5 * sin(iTime), 1.0);\n}\n";
        let layout = ProgramLayout {
            samplers: Vec::new(),
            ..layout()
        };
        let wrapped = wrap_fragment(source, &layout, &[]);
        validate_glsl(ShaderStage::Fragment, &wrapped).expect("wrapped shader validates");
        validate_glsl(ShaderStage::Vertex, PASS_THROUGH_VERTEX).expect("vertex validates");
    }

    #[test]
    fn naga_reports_syntax_errors() {
        let wrapped = wrap_fragment(
            "void mainImage(out vec4 fragColor, in vec2 fragCoord) { fragColor = vec4(1.0) }",
            &ProgramLayout::default(),
            &[],
        );
        let log = validate_glsl(ShaderStage::Fragment, &wrapped).expect_err("missing semicolon");
        assert!(!log.is_empty());
    }
}
