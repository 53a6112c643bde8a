use crate::context::Surface;
use crate::types::{PointerOrigin, UniformDecl, UniformSource, UniformType, VisualizationSpec};

/// Typed value pushed to one uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Texture unit a sampler reads from.
    Sampler(u32),
}

impl UniformValue {
    fn from_components(ty: UniformType, c: [f32; 4]) -> Self {
        match ty {
            UniformType::Float => UniformValue::Float(c[0]),
            UniformType::Vec2 => UniformValue::Vec2([c[0], c[1]]),
            UniformType::Vec3 => UniformValue::Vec3([c[0], c[1], c[2]]),
            UniformType::Vec4 => UniformValue::Vec4(c),
        }
    }

    /// Float components in declaration order; samplers carry none.
    pub fn components(&self) -> &[f32] {
        match self {
            UniformValue::Float(v) => std::slice::from_ref(v),
            UniformValue::Vec2(v) => v,
            UniformValue::Vec3(v) => v,
            UniformValue::Vec4(v) => v,
            UniformValue::Sampler(_) => &[],
        }
    }
}

/// Uniform values keyed by name, kept in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformSet {
    entries: Vec<(String, UniformValue)>,
}

impl UniformSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value stored under `name`.
    pub fn set(&mut self, name: &str, value: UniformValue) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, UniformValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pointer position in the same physical pixel space as the resolution uniform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPosition {
    pub x: f32,
    pub y: f32,
}

/// Converts client coordinates to surface pixels, flipping y for bottom-left origins.
pub fn pointer_to_surface(
    client_x: f64,
    client_y: f64,
    surface: &Surface,
    origin: PointerOrigin,
) -> PointerPosition {
    let rect = surface.client_rect();
    let ratio = surface.pixel_ratio();
    let local_x = client_x - rect.left;
    let local_y = client_y - rect.top;
    let y = match origin {
        PointerOrigin::BottomLeft => rect.height - local_y,
        PointerOrigin::TopLeft => local_y,
    };
    PointerPosition {
        x: (local_x * ratio) as f32,
        y: (y * ratio) as f32,
    }
}

/// Computes the per-frame uniform values a visualization declared.
#[derive(Debug, Clone)]
pub struct UniformChannel {
    decls: Vec<UniformDecl>,
    samplers: Vec<String>,
    texture_size: Option<(u32, u32)>,
    origin: PointerOrigin,
    values: UniformSet,
}

impl UniformChannel {
    pub fn new(spec: &VisualizationSpec) -> Self {
        let samplers: Vec<String> = spec
            .texture
            .iter()
            .map(|binding| binding.sampler.clone())
            .collect();
        let texture_size = spec
            .texture
            .as_ref()
            .map(|binding| (binding.image.width, binding.image.height));
        Self {
            decls: spec.uniforms.clone(),
            samplers,
            texture_size,
            origin: spec.pointer_origin,
            values: UniformSet::new(),
        }
    }

    /// Refreshes every declared value from the clock, surface, and pointer.
    ///
    /// `pointer` holds raw client coordinates; it is converted against the
    /// surface as it stands for this frame so pointer and resolution always
    /// share one pixel space. No pointer yet observed reads as the origin.
    pub fn update(
        &mut self,
        elapsed_seconds: f32,
        surface: &Surface,
        pointer: Option<(f64, f64)>,
    ) -> &UniformSet {
        let size = surface.physical_size();
        let pointer = pointer
            .map(|(x, y)| pointer_to_surface(x, y, surface, self.origin))
            .unwrap_or_default();

        for decl in &self.decls {
            let components = match decl.source {
                UniformSource::ElapsedTime => [elapsed_seconds, 0.0, 0.0, 0.0],
                UniformSource::Resolution => [size.width as f32, size.height as f32, 1.0, 0.0],
                UniformSource::Pointer => [pointer.x, pointer.y, 0.0, 0.0],
                UniformSource::TextureResolution => match self.texture_size {
                    Some((width, height)) => [width as f32, height as f32, 1.0, 0.0],
                    None => [0.0; 4],
                },
            };
            self.values
                .set(&decl.name, UniformValue::from_components(decl.ty, components));
        }
        for (unit, sampler) in self.samplers.iter().enumerate() {
            self.values.set(sampler, UniformValue::Sampler(unit as u32));
        }
        &self.values
    }

    pub fn values(&self) -> &UniformSet {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextManager;
    use crate::headless::HeadlessSurface;
    use crate::types::{ClientRect, TextureBinding, TextureImage, Viewport};

    fn surface(viewport: Viewport, rect: ClientRect) -> Surface {
        let host = HeadlessSurface::new(viewport);
        let mut context = ContextManager::acquire(&host, None).expect("graphics");
        context.resize(viewport, rect);
        *context.surface()
    }

    #[test]
    fn pointer_flips_y_for_bottom_left_origin() {
        let rect = ClientRect {
            left: 10.0,
            top: 20.0,
            width: 400.0,
            height: 300.0,
        };
        let surface = surface(Viewport::new(400.0, 300.0, 2.0), rect);
        let bottom_left = pointer_to_surface(110.0, 70.0, &surface, PointerOrigin::BottomLeft);
        assert_eq!(bottom_left, PointerPosition { x: 200.0, y: 500.0 });
        let top_left = pointer_to_surface(110.0, 70.0, &surface, PointerOrigin::TopLeft);
        assert_eq!(top_left, PointerPosition { x: 200.0, y: 100.0 });
    }

    #[test]
    fn update_fills_vector_widths() {
        let image = TextureImage {
            width: 4,
            height: 2,
            rgb: vec![0; 24],
        };
        let spec = VisualizationSpec::new("demo", "")
            .with_uniform(UniformDecl::new("iTime", UniformType::Float, UniformSource::ElapsedTime))
            .with_uniform(UniformDecl::new(
                "iResolution",
                UniformType::Vec3,
                UniformSource::Resolution,
            ))
            .with_uniform(UniformDecl::new("iMouse", UniformType::Vec4, UniformSource::Pointer))
            .with_uniform(UniformDecl::new(
                "iChannelResolution0",
                UniformType::Vec3,
                UniformSource::TextureResolution,
            ))
            .with_texture(TextureBinding {
                sampler: "iChannel0".into(),
                image,
            });
        let rect = ClientRect {
            left: 0.0,
            top: 0.0,
            width: 320.0,
            height: 200.0,
        };
        let surface = surface(Viewport::new(320.0, 200.0, 1.0), rect);

        let mut channel = UniformChannel::new(&spec);
        let values = channel.update(1.5, &surface, Some((20.0, 50.0)));
        assert_eq!(values.get("iTime"), Some(UniformValue::Float(1.5)));
        assert_eq!(
            values.get("iResolution"),
            Some(UniformValue::Vec3([320.0, 200.0, 1.0]))
        );
        assert_eq!(
            values.get("iMouse"),
            Some(UniformValue::Vec4([20.0, 150.0, 0.0, 0.0]))
        );
        assert_eq!(
            values.get("iChannelResolution0"),
            Some(UniformValue::Vec3([4.0, 2.0, 1.0]))
        );
        assert_eq!(values.get("iChannel0"), Some(UniformValue::Sampler(0)));
        assert_eq!(values.len(), 5);
    }

    #[test]
    fn missing_pointer_reads_as_origin() {
        let spec = VisualizationSpec::new("demo", "")
            .with_uniform(UniformDecl::new("u_mouse", UniformType::Vec2, UniformSource::Pointer));
        let surface = surface(Viewport::new(100.0, 100.0, 1.0), ClientRect::default());
        let mut channel = UniformChannel::new(&spec);
        let values = channel.update(0.0, &surface, None);
        assert_eq!(values.get("u_mouse"), Some(UniformValue::Vec2([0.0, 0.0])));
    }
}
