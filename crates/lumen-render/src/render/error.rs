use thiserror::Error;

/// Externally triggered failures of the batch engine.
///
/// None of these leave a cache torn. A binding that fails keeps the last
/// consistent one; a submission that fails still empties the batch, and the
/// state change that triggered it is applied anyway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// Texture units, device memory or batch room ran out.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Render targets that cannot be bound together, or an incomplete attachment set.
    #[error("incompatible render target: {0}")]
    IncompatibleTarget(String),

    /// Shader program failed to compile or link; carries the device log.
    #[error("shader compilation failed: {0}")]
    CompileFailure(String),

    /// A required device capability is absent.
    #[error("unsupported by device: {0}")]
    Unsupported(&'static str),
}
