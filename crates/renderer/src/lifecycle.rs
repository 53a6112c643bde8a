use tracing::debug;

use crate::backend::{GraphicsApi, TextureHandle};
use crate::context::ContextManager;
use crate::events::{EventHub, ListenerId};
use crate::geometry::Geometry;
use crate::program::LinkedProgram;
use crate::render_loop::RenderLoop;
use crate::runtime::FrameScheduler;

/// Everything one visualization instance created, in creation order.
#[derive(Debug, Default)]
pub struct ResourceLifecycle {
    program: Option<LinkedProgram>,
    geometry: Option<Geometry>,
    textures: Vec<TextureHandle>,
    listeners: Vec<ListenerId>,
    torn_down: bool,
}

impl ResourceLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_program(&mut self, program: LinkedProgram) {
        self.program = Some(program);
    }

    pub fn track_geometry(&mut self, geometry: Geometry) {
        self.geometry = Some(geometry);
    }

    pub fn track_texture(&mut self, texture: TextureHandle) {
        self.textures.push(texture);
    }

    pub fn track_listener(&mut self, listener: ListenerId) {
        self.listeners.push(listener);
    }

    pub fn program(&self) -> Option<LinkedProgram> {
        self.program
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    /// Releases whatever was created, in dependency order.
    ///
    /// The pending frame is cancelled before any object is deleted. Works on
    /// partially initialised instances and does nothing on later calls.
    /// Returns `true` only for the call that performed the teardown.
    pub fn teardown<G, S>(
        &mut self,
        render_loop: &mut RenderLoop,
        scheduler: &mut S,
        events: &EventHub,
        context: Option<&mut ContextManager<G>>,
    ) -> bool
    where
        G: GraphicsApi,
        S: FrameScheduler,
    {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;

        render_loop.cancel(scheduler);
        render_loop.stop();

        for listener in self.listeners.drain(..) {
            events.unsubscribe(listener);
        }

        let Some(context) = context else {
            self.program = None;
            self.geometry = None;
            self.textures.clear();
            return true;
        };

        if let Some(graphics) = context.graphics_mut() {
            for texture in self.textures.drain(..) {
                graphics.delete_texture(texture);
            }
            if let Some(geometry) = self.geometry.take() {
                graphics.delete_vertex_array(geometry.vertex_array);
                graphics.delete_buffer(geometry.buffer);
            }
            if let Some(linked) = self.program.take() {
                graphics.delete_program(linked.program);
                for shader in linked.shaders() {
                    graphics.delete_shader(shader);
                }
            }
        }
        context.release();
        debug!("visualization resources released");
        true
    }
}
