/// Renderer construction parameters.
///
/// Consumed once by [`Renderer::new`](super::Renderer::new); steady-state
/// batching never re-reads it.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Quads accumulated before a forced flush.
    pub batch_capacity: usize,
    /// Filter used by bitmaps drawn with [`Smoothing::Default`](crate::paint::Smoothing::Default).
    pub default_smoothing: bool,
    pub vsync: bool,
    /// Language version hint handed to the device with every shader source.
    pub shader_version: Option<String>,
    /// Window surface size in pixels.
    pub screen_size: (u32, u32),
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            batch_capacity: 2048,
            default_smoothing: false,
            vsync: true,
            shader_version: None,
            screen_size: (800, 600),
        }
    }
}
