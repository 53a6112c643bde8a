//! winit host: one window, one visualization, driven by the window's redraws.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tracing::{debug, info, trace};
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::backend::HostSurface;
use crate::engine::{self, Status, TickOutcome, Visualization};
use crate::events::{EventHub, HostEvent};
use crate::gpu::{GpuOptions, GpuPowerPreference, WgpuGraphics};
use crate::runtime::{FrameScheduler, FrameToken};
use crate::types::{BlendMode, ClientRect, PhysicalSize, Viewport, VisualizationSpec};

/// Window creation preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOptions {
    pub title: String,
    /// Logical inner size.
    pub size: (u32, u32),
    /// Request a compositing surface. Implied by alpha-blended visualizations.
    pub transparent: bool,
    pub power: GpuPowerPreference,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "shaderdeck".to_string(),
            size: (1280, 720),
            transparent: false,
            power: GpuPowerPreference::default(),
        }
    }
}

/// A winit window acting as the drawable surface.
pub struct WindowHost {
    window: Arc<Window>,
    options: GpuOptions,
}

impl WindowHost {
    pub fn new(window: Arc<Window>, options: GpuOptions) -> Self {
        Self { window, options }
    }

    pub fn window(&self) -> &Window {
        self.window.as_ref()
    }
}

impl HostSurface for WindowHost {
    type Graphics = WgpuGraphics;

    fn acquire_graphics(&self) -> std::result::Result<WgpuGraphics, String> {
        let size = self.window.inner_size();
        WgpuGraphics::new(
            self.window.as_ref(),
            PhysicalSize::new(size.width, size.height),
            self.options,
        )
    }

    fn viewport(&self) -> Viewport {
        let scale = self.window.scale_factor();
        let inner = self.window.inner_size();
        let logical = inner.to_logical::<f64>(scale);
        Viewport::new(logical.width, logical.height, scale)
            .with_physical(PhysicalSize::new(inner.width, inner.height))
    }

    fn client_rect(&self) -> ClientRect {
        let viewport = self.viewport();
        ClientRect {
            left: 0.0,
            top: 0.0,
            width: viewport.logical_width,
            height: viewport.logical_height,
        }
    }
}

#[derive(Debug, Default)]
struct WindowSchedulerState {
    next_token: u64,
    pending: Option<FrameToken>,
}

/// Frame scheduler backed by the window's redraw requests.
///
/// Requests are recorded here and turned into `request_redraw` calls once the
/// event loop is about to wait, so a paced-out tick does not spin.
#[derive(Debug, Clone, Default)]
pub struct WindowScheduler {
    state: Rc<RefCell<WindowSchedulerState>>,
}

impl WindowScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    /// Claims the outstanding request for the redraw being delivered.
    pub fn take_due(&self) -> Option<FrameToken> {
        self.state.borrow_mut().pending.take()
    }
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) -> FrameToken {
        let mut state = self.state.borrow_mut();
        state.next_token += 1;
        let token = FrameToken(state.next_token);
        state.pending = Some(token);
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        let mut state = self.state.borrow_mut();
        if state.pending == Some(token) {
            state.pending = None;
        }
    }
}

/// Field order matters: the visualization (and its surface) drops before the
/// window it presents to.
struct Mounted {
    visualization: Visualization<WgpuGraphics, WindowScheduler>,
    scheduler: WindowScheduler,
    events: EventHub,
    host: WindowHost,
}

impl Mounted {
    fn dispatch_resize(&self) {
        self.events.dispatch(HostEvent::Resized {
            viewport: self.host.viewport(),
            rect: self.host.client_rect(),
        });
    }
}

/// Opens a window, mounts `spec` in it and runs until the window closes.
pub fn run_window(spec: VisualizationSpec, options: WindowOptions) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let transparent = options.transparent || spec.blend == BlendMode::Alpha;
    let window = WindowBuilder::new()
        .with_title(options.title.clone())
        .with_inner_size(LogicalSize::new(options.size.0, options.size.1))
        .with_transparent(transparent)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;

    let host = WindowHost::new(
        Arc::new(window),
        GpuOptions {
            transparent,
            power: options.power,
        },
    );
    let scheduler = WindowScheduler::new();
    let events = EventHub::new();
    let visualization = engine::start(&host, spec, scheduler.clone(), events.clone());
    if let Status::Failed(err) = visualization.status() {
        return Err(anyhow!("{err}"));
    }

    let mut mounted = Mounted {
        visualization,
        scheduler,
        events,
        host,
    };
    let window_id = mounted.host.window().id();
    let mut failure: Option<String> = None;

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id: id, event } if id == window_id => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                mounted.visualization.stop();
                elwt.exit();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let scale = mounted.host.window().scale_factor();
                mounted.events.dispatch(HostEvent::PointerMoved {
                    client_x: position.x / scale,
                    client_y: position.y / scale,
                });
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                mounted.dispatch_resize();
            }
            WindowEvent::Occluded(occluded) => {
                mounted.visualization.set_visible(!occluded);
            }
            WindowEvent::RedrawRequested => {
                let Some(token) = mounted.scheduler.take_due() else {
                    return;
                };
                match mounted.visualization.on_frame(token) {
                    TickOutcome::Failed => {
                        if let Status::Failed(err) = mounted.visualization.status() {
                            failure = Some(err.to_string());
                        }
                        elwt.exit();
                    }
                    outcome => trace!(?outcome, "tick"),
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if !mounted.visualization.is_running() {
                elwt.exit();
                return;
            }
            if !mounted.scheduler.has_pending() || !mounted.visualization.is_visible() {
                elwt.set_control_flow(ControlFlow::Wait);
                return;
            }
            match mounted.visualization.time_until_draw() {
                Some(wait) if !wait.is_zero() => {
                    let control = match Instant::now().checked_add(wait) {
                        Some(deadline) => ControlFlow::WaitUntil(deadline),
                        None => ControlFlow::Wait,
                    };
                    elwt.set_control_flow(control);
                }
                _ => {
                    mounted.host.window().request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
        }
        Event::LoopExiting => {
            debug!("event loop exiting");
            mounted.visualization.stop();
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    if let Some(err) = failure {
        return Err(anyhow!(err));
    }
    info!("window closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_keeps_one_outstanding_request() {
        let mut scheduler = WindowScheduler::new();
        let first = scheduler.request_frame();
        let second = scheduler.request_frame();
        assert_ne!(first, second);
        assert_eq!(scheduler.take_due(), Some(second));
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn cancel_ignores_foreign_tokens() {
        let mut scheduler = WindowScheduler::new();
        let token = scheduler.request_frame();
        scheduler.cancel_frame(FrameToken(token.0 + 7));
        assert!(scheduler.has_pending());
        scheduler.cancel_frame(token);
        assert!(!scheduler.has_pending());
    }
}
