use thiserror::Error;

use crate::backend::{ProgramHandle, ShaderHandle, ShaderStage};

/// Failures reported by a [`GraphicsBackend`](crate::backend::GraphicsBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to compile {stage} shader:\n{log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("failed to link program:\n{log}")]
    ProgramLink { log: String },

    #[error("graphics context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("a {width}x{height} surface exceeds the maximum size of {max}")]
    SurfaceTooLarge { width: u32, height: u32, max: u32 },

    #[error("unknown shader {0:?}")]
    UnknownShader(ShaderHandle),

    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramHandle),

    #[error("no program is in use")]
    NoProgram,
}
