use tracing::{debug, error};

use crate::backend::{GraphicsApi, HostSurface};
use crate::error::RenderError;
use crate::types::{ClientRect, PhysicalSize, Viewport};

/// Drawable target owned by one [`ContextManager`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    logical_width: f64,
    logical_height: f64,
    pixel_ratio: f64,
    physical: PhysicalSize,
    rect: ClientRect,
}

impl Surface {
    fn empty() -> Self {
        Self {
            logical_width: 0.0,
            logical_height: 0.0,
            pixel_ratio: 1.0,
            physical: PhysicalSize::new(0, 0),
            rect: ClientRect::default(),
        }
    }

    pub fn logical_size(&self) -> (f64, f64) {
        (self.logical_width, self.logical_height)
    }

    /// Device pixel ratio after the visualization's cap was applied.
    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn physical_size(&self) -> PhysicalSize {
        self.physical
    }

    pub fn client_rect(&self) -> ClientRect {
        self.rect
    }
}

/// Clamps the host's device pixel ratio to a usable, optionally capped value.
pub fn effective_pixel_ratio(device_pixel_ratio: f64, max_pixel_ratio: Option<f64>) -> f64 {
    let ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    match max_pixel_ratio {
        Some(cap) if cap.is_finite() && cap > 0.0 => ratio.min(cap),
        _ => ratio,
    }
}

/// Physical framebuffer size for a logical viewport; each side is at least 1.
///
/// A host-reported pixel size is used as is unless the cap lowers the ratio,
/// since scaling a rounded logical size back up can lose a pixel.
pub fn physical_size_for(viewport: Viewport, max_pixel_ratio: Option<f64>) -> PhysicalSize {
    let ratio = effective_pixel_ratio(viewport.device_pixel_ratio, max_pixel_ratio);
    if let Some(exact) = viewport.physical {
        if ratio == viewport.device_pixel_ratio {
            return PhysicalSize::new(exact.width.max(1), exact.height.max(1));
        }
    }
    let scale = |logical: f64| -> u32 {
        let scaled = (logical.max(0.0) * ratio).floor();
        if scaled.is_finite() {
            (scaled as u32).max(1)
        } else {
            1
        }
    };
    PhysicalSize::new(scale(viewport.logical_width), scale(viewport.logical_height))
}

/// Owns the drawing context and the surface it renders into.
pub struct ContextManager<G> {
    graphics: Option<G>,
    surface: Surface,
    max_pixel_ratio: Option<f64>,
}

impl<G: GraphicsApi> ContextManager<G> {
    /// Requests a drawing context from the host surface.
    pub fn acquire<H>(host: &H, max_pixel_ratio: Option<f64>) -> Result<Self, RenderError>
    where
        H: HostSurface<Graphics = G>,
    {
        match host.acquire_graphics() {
            Ok(graphics) => Ok(Self {
                graphics: Some(graphics),
                surface: Surface::empty(),
                max_pixel_ratio,
            }),
            Err(reason) => {
                error!(%reason, "graphics context unavailable");
                Err(RenderError::NoGraphicsSupport(reason))
            }
        }
    }

    /// Applies a logical viewport. Returns `true` when the physical size changed.
    pub fn resize(&mut self, viewport: Viewport, rect: ClientRect) -> bool {
        let physical = physical_size_for(viewport, self.max_pixel_ratio);
        let pixel_ratio = effective_pixel_ratio(viewport.device_pixel_ratio, self.max_pixel_ratio);
        let changed = physical != self.surface.physical;

        self.surface = Surface {
            logical_width: viewport.logical_width,
            logical_height: viewport.logical_height,
            pixel_ratio,
            physical,
            rect,
        };

        if changed {
            debug!(
                width = physical.width,
                height = physical.height,
                pixel_ratio,
                "surface resized"
            );
            if let Some(graphics) = self.graphics.as_mut() {
                graphics.set_viewport(physical);
            }
        }
        changed
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn graphics(&self) -> Option<&G> {
        self.graphics.as_ref()
    }

    pub fn graphics_mut(&mut self) -> Option<&mut G> {
        self.graphics.as_mut()
    }

    /// Releases the context. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(mut graphics) = self.graphics.take() {
            graphics.release();
            debug!("graphics context released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.graphics.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessSurface;

    #[test]
    fn physical_size_floors_and_clamps_to_one() {
        let size = physical_size_for(Viewport::new(800.5, 600.7, 1.5), None);
        assert_eq!(size, PhysicalSize::new(1200, 901));
        let empty = physical_size_for(Viewport::new(0.0, 0.0, 2.0), None);
        assert_eq!(empty, PhysicalSize::new(1, 1));
    }

    #[test]
    fn host_pixel_size_wins_at_fractional_scale() {
        let viewport = Viewport::new(29.0 / 1.1, 10.0, 1.1).with_physical(PhysicalSize::new(29, 11));
        assert_eq!(physical_size_for(viewport, None), PhysicalSize::new(29, 11));
        assert_eq!(physical_size_for(viewport, Some(2.0)), PhysicalSize::new(29, 11));
        assert_eq!(physical_size_for(viewport, Some(1.0)), PhysicalSize::new(26, 10));
        let zero = Viewport::new(0.0, 0.0, 1.1).with_physical(PhysicalSize::new(0, 0));
        assert_eq!(physical_size_for(zero, None), PhysicalSize::new(1, 1));
    }

    #[test]
    fn acquired_surface_is_empty_until_resized() {
        let host = HeadlessSurface::new(Viewport::new(320.0, 200.0, 1.0));
        let mut context = ContextManager::acquire(&host, None).expect("graphics");
        assert_eq!(context.surface().physical_size(), PhysicalSize::new(0, 0));
        assert_eq!(context.surface().logical_size(), (0.0, 0.0));
        assert!(context.resize(host.viewport(), host.client_rect()));
        assert_eq!(context.surface().physical_size(), PhysicalSize::new(320, 200));
    }

    #[test]
    fn pixel_ratio_respects_cap_and_rejects_garbage() {
        assert_eq!(effective_pixel_ratio(3.0, Some(1.5)), 1.5);
        assert_eq!(effective_pixel_ratio(1.25, Some(2.0)), 1.25);
        assert_eq!(effective_pixel_ratio(f64::NAN, None), 1.0);
        assert_eq!(effective_pixel_ratio(0.0, Some(2.0)), 1.0);
    }

    #[test]
    fn resize_is_idempotent() {
        let host = HeadlessSurface::new(Viewport::new(800.0, 600.0, 2.0));
        let mut context = ContextManager::acquire(&host, None).expect("graphics");
        let rect = host.client_rect();
        assert!(context.resize(host.viewport(), rect));
        let first = *context.surface();
        assert!(!context.resize(host.viewport(), rect));
        assert_eq!(*context.surface(), first);
        assert_eq!(first.physical_size(), PhysicalSize::new(1600, 1200));
        assert_eq!(host.stats().viewport_updates, 1);
    }

    #[test]
    fn acquire_reports_missing_graphics() {
        let host = HeadlessSurface::new(Viewport::new(640.0, 480.0, 1.0)).without_graphics();
        let err = ContextManager::acquire(&host, None).err().expect("no graphics");
        assert!(matches!(err, RenderError::NoGraphicsSupport(_)));
    }

    #[test]
    fn release_is_idempotent() {
        let host = HeadlessSurface::new(Viewport::new(640.0, 480.0, 1.0));
        let mut context = ContextManager::acquire(&host, None).expect("graphics");
        context.release();
        context.release();
        assert!(context.is_released());
        assert_eq!(host.stats().contexts_released, 1);
    }
}
