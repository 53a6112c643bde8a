//! Start/stop facade tying the engine components together.
//!
//! `start` never fails outright: it always hands back a [`Visualization`]
//! whose [`Status`] reports whether it is running or why it could not start.
//! A failed instance has already released everything it created.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backend::{GraphicsApi, HostSurface};
use crate::context::{ContextManager, Surface};
use crate::error::{FrameError, RenderError};
use crate::events::{EventHub, EventKind, HostEvent};
use crate::geometry::upload_fullscreen_quad;
use crate::lifecycle::ResourceLifecycle;
use crate::program::ProgramBuilder;
use crate::render_loop::{LoopState, RenderLoop};
use crate::runtime::{BoxedTimeSource, FrameClock, FrameScheduler, FrameToken, SystemTimeSource};
use crate::types::{ClientRect, Viewport, VisualizationSpec};
use crate::uniforms::{UniformChannel, UniformSet};

/// What the host can observe about an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Running,
    Failed(RenderError),
    Stopped,
}

/// Result of handing one frame callback to an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The token was not the pending one, or the instance is not running.
    Stale,
    /// Hidden or paced out; state was updated and the next frame requested.
    Deferred,
    Drawn,
    /// The surface was reconfigured after a recoverable error.
    Recovered,
    /// A fatal frame error stopped the instance.
    Failed,
}

/// Latest host input, written by listeners and consumed by the next tick.
#[derive(Debug, Default)]
struct InputState {
    pointer: Option<(f64, f64)>,
    pending_resize: Option<(Viewport, ClientRect)>,
}

/// One mounted visualization and everything it owns.
pub struct Visualization<G: GraphicsApi, S: FrameScheduler> {
    name: String,
    clear_color: [f32; 4],
    context: Option<ContextManager<G>>,
    uniforms: UniformChannel,
    clock: FrameClock,
    render_loop: RenderLoop,
    lifecycle: ResourceLifecycle,
    scheduler: S,
    events: EventHub,
    input: Rc<RefCell<InputState>>,
    status: Status,
}

/// Mounts `spec` on `host` using the system clock.
pub fn start<H, S>(
    host: &H,
    spec: VisualizationSpec,
    scheduler: S,
    events: EventHub,
) -> Visualization<H::Graphics, S>
where
    H: HostSurface,
    S: FrameScheduler,
{
    start_with_clock(host, spec, scheduler, events, Box::new(SystemTimeSource::new()))
}

/// Mounts `spec` on `host`, reading elapsed time from `time_source`.
pub fn start_with_clock<H, S>(
    host: &H,
    spec: VisualizationSpec,
    scheduler: S,
    events: EventHub,
    time_source: BoxedTimeSource,
) -> Visualization<H::Graphics, S>
where
    H: HostSurface,
    S: FrameScheduler,
{
    let mut visualization = Visualization {
        name: spec.name.clone(),
        clear_color: spec.clear_color,
        context: None,
        uniforms: UniformChannel::new(&spec),
        clock: FrameClock::new(time_source),
        render_loop: RenderLoop::new(spec.max_fps),
        lifecycle: ResourceLifecycle::new(),
        scheduler,
        events,
        input: Rc::new(RefCell::new(InputState::default())),
        status: Status::Running,
    };

    match visualization.initialise(host, &spec) {
        Ok(()) => info!(name = %spec.name, "visualization started"),
        Err(err) => {
            error!(name = %spec.name, error = %err, "visualization failed to start");
            visualization.fail(err);
        }
    }
    visualization
}

/// Tears an instance down. Safe to call any number of times.
pub fn stop<G: GraphicsApi, S: FrameScheduler>(visualization: &mut Visualization<G, S>) {
    visualization.stop();
}

impl<G: GraphicsApi, S: FrameScheduler> Visualization<G, S> {
    fn initialise<H>(&mut self, host: &H, spec: &VisualizationSpec) -> Result<(), RenderError>
    where
        H: HostSurface<Graphics = G>,
    {
        let context = self
            .context
            .insert(ContextManager::acquire(host, spec.max_pixel_ratio)?);
        context.resize(host.viewport(), host.client_rect());
        let Some(graphics) = context.graphics_mut() else {
            return Err(RenderError::NoGraphicsSupport(
                "context released during start".to_string(),
            ));
        };

        let builder = ProgramBuilder::from_spec(spec);
        let linked = builder.build(graphics)?;
        self.lifecycle.track_program(linked);
        self.clock.start();

        let geometry = upload_fullscreen_quad(graphics, linked.program);
        self.lifecycle.track_geometry(geometry);

        if let Some(binding) = &spec.texture {
            let texture = graphics.create_texture(&binding.image);
            graphics.bind_texture(linked.program, 0, texture);
            self.lifecycle.track_texture(texture);
        }

        let input = Rc::clone(&self.input);
        let resize = self.events.subscribe(
            EventKind::Resize,
            Box::new(move |event| {
                if let HostEvent::Resized { viewport, rect } = *event {
                    input.borrow_mut().pending_resize = Some((viewport, rect));
                }
            }),
        );
        self.lifecycle.track_listener(resize);

        let input = Rc::clone(&self.input);
        let pointer = self.events.subscribe(
            EventKind::PointerMove,
            Box::new(move |event| {
                if let HostEvent::PointerMoved { client_x, client_y } = *event {
                    input.borrow_mut().pointer = Some((client_x, client_y));
                }
            }),
        );
        self.lifecycle.track_listener(pointer);

        self.render_loop.mark_ready();
        self.render_loop.start(&mut self.scheduler);
        Ok(())
    }

    fn fail(&mut self, err: RenderError) {
        self.release();
        self.status = Status::Failed(err);
    }

    fn release(&mut self) -> bool {
        self.lifecycle.teardown(
            &mut self.render_loop,
            &mut self.scheduler,
            &self.events,
            self.context.as_mut(),
        )
    }

    /// Runs one tick for the frame identified by `token`.
    ///
    /// Tick order: apply a pending resize, clear, push uniforms, draw the
    /// quad, request the next frame.
    pub fn on_frame(&mut self, token: FrameToken) -> TickOutcome {
        if self.status != Status::Running || !self.render_loop.accept(token) {
            return TickOutcome::Stale;
        }

        let (resize, pointer) = {
            let mut input = self.input.borrow_mut();
            (input.pending_resize.take(), input.pointer)
        };
        let Some(context) = self.context.as_mut() else {
            return TickOutcome::Stale;
        };
        if let Some((viewport, rect)) = resize {
            context.resize(viewport, rect);
        }

        let now = self.clock.now();
        if !self.render_loop.should_draw(now) {
            self.render_loop.schedule_next(&mut self.scheduler);
            return TickOutcome::Deferred;
        }

        let (Some(linked), Some(geometry)) = (self.lifecycle.program(), self.lifecycle.geometry())
        else {
            return TickOutcome::Stale;
        };
        let surface = *context.surface();
        let Some(graphics) = context.graphics_mut() else {
            return TickOutcome::Stale;
        };

        let sample = self.clock.sample();
        graphics.clear(self.clear_color);
        let values = self.uniforms.update(sample.seconds, &surface, pointer);
        graphics.set_uniforms(linked.program, values);
        let result = graphics.draw(linked.program, geometry.vertex_array, geometry.vertex_count);

        match result {
            Ok(()) => {
                self.render_loop.mark_drawn(f64::from(sample.seconds));
                self.render_loop.schedule_next(&mut self.scheduler);
                TickOutcome::Drawn
            }
            Err(FrameError::Recoverable(reason)) => {
                warn!(name = %self.name, %reason, "reconfiguring surface");
                graphics.reconfigure();
                self.render_loop.schedule_next(&mut self.scheduler);
                TickOutcome::Recovered
            }
            Err(err @ FrameError::Fatal(_)) => {
                error!(name = %self.name, error = %err, "stopping visualization");
                self.fail(RenderError::Frame(err));
                TickOutcome::Failed
            }
        }
    }

    /// Skips clearing and drawing while hidden; ticks keep state current.
    pub fn set_visible(&mut self, visible: bool) {
        debug!(name = %self.name, visible, "visibility changed");
        self.render_loop.set_visible(visible);
    }

    /// Cancels the pending frame and releases every resource. Idempotent.
    pub fn stop(&mut self) {
        if self.release() {
            info!(name = %self.name, "visualization stopped");
        }
        if self.status == Status::Running {
            self.status = Status::Stopped;
        }
    }

    pub fn is_visible(&self) -> bool {
        self.render_loop.is_visible()
    }

    /// How long the frame cap holds off the next draw. `None` when uncapped.
    ///
    /// Saturates at `Duration::MAX` for caps too low to express as a duration.
    pub fn time_until_draw(&mut self) -> Option<Duration> {
        let now = self.clock.now();
        self.render_loop
            .time_until_draw(now)
            .map(|seconds| Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    pub fn loop_state(&self) -> LoopState {
        self.render_loop.state()
    }

    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.render_loop.pending_frame()
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.context.as_ref().map(ContextManager::surface)
    }

    /// Values pushed with the most recent draw.
    pub fn uniforms(&self) -> &UniformSet {
        self.uniforms.values()
    }

    pub fn graphics(&self) -> Option<&G> {
        self.context.as_ref().and_then(ContextManager::graphics)
    }

    pub fn graphics_mut(&mut self) -> Option<&mut G> {
        self.context.as_mut().and_then(ContextManager::graphics_mut)
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

impl<G: GraphicsApi, S: FrameScheduler> Drop for Visualization<G, S> {
    fn drop(&mut self) {
        self.stop();
    }
}
