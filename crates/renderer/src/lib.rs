//! Rendering core for shaderdeck.
//!
//! Mounts one fragment-shader visualization on a host surface, feeds it time,
//! resolution and pointer uniforms every frame, and releases everything it
//! created when stopped. The flow is:
//!
//! ```text
//!   engine::start(host, spec)
//!          │
//!          ▼
//!   ContextManager ──▶ ProgramBuilder ──▶ upload_fullscreen_quad ──▶ RenderLoop
//!                                                                       │
//!          ┌────────────────────── on_frame(token) ◀── FrameScheduler ◀─┘
//!          ▼
//!   resize? ─▶ clear ─▶ UniformChannel::update ─▶ draw ─▶ request next frame
//! ```
//!
//! Graphics work goes through [`GraphicsApi`]. [`WgpuGraphics`] renders to a
//! winit window; [`HeadlessGraphics`] counts calls so lifecycle behaviour can
//! be checked without a GPU. Fragment payloads are GLSL 450 `mainImage`
//! functions; [`compile::wrap_fragment`] supplies the uniform block, sampler
//! bindings and `main`.

pub mod backend;
pub mod compile;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod gpu;
pub mod headless;
pub mod lifecycle;
pub mod program;
pub mod render_loop;
pub mod runtime;
pub mod types;
pub mod uniforms;
pub mod window;

pub use backend::{GraphicsApi, HostSurface, ProgramLayout};
pub use context::{ContextManager, Surface};
pub use engine::{start, start_with_clock, stop, Status, TickOutcome, Visualization};
pub use error::{FrameError, RenderError};
pub use events::{EventHub, EventKind, HostEvent};
pub use gpu::{GpuOptions, GpuPowerPreference, WgpuGraphics};
pub use headless::{HeadlessGraphics, HeadlessStats, HeadlessSurface};
pub use render_loop::LoopState;
pub use runtime::{
    FrameScheduler, FrameToken, ManualScheduler, ManualTimeSource, SystemTimeSource, TimeSource,
};
pub use types::{
    BlendMode, ClientRect, PhysicalSize, PointerOrigin, ShaderStage, TextureBinding,
    TextureImage, UniformDecl, UniformSource, UniformType, Viewport, VisualizationSpec,
};
pub use uniforms::{UniformSet, UniformValue};
pub use window::{run_window, WindowOptions};
