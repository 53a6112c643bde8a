use thiserror::Error;

use crate::types::ShaderStage;

/// Fatal, instance-scoped failures reported through [`crate::engine::Status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("graphics support unavailable: {0}")]
    NoGraphicsSupport(String),
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("program failed to link:\n{log}")]
    Link { log: String },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl RenderError {
    /// Diagnostic log carried by compile and link failures.
    pub fn log(&self) -> Option<&str> {
        match self {
            RenderError::Compile { log, .. } | RenderError::Link { log } => Some(log),
            _ => None,
        }
    }
}

/// Failures surfaced while presenting a single frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The swapchain went stale; reconfiguring the surface is enough to continue.
    #[error("surface needs reconfiguration: {0}")]
    Recoverable(String),
    /// The device can no longer present; the instance must stop.
    #[error("frame presentation failed: {0}")]
    Fatal(String),
}
