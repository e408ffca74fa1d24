//! Carry-forward state threaded through one camera's builder chain.

use crate::graph::PassId;

/// Color/depth handed from one builder to the next, plus the last recorded
/// pass. Reset before every camera.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderingContext {
    pub color_name: Option<String>,
    pub depth_stencil_name: Option<String>,
    pub last_pass: Option<PassId>,
}

impl RenderingContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.color_name = None;
        self.depth_stencil_name = None;
        self.last_pass = None;
    }

    #[inline]
    #[must_use]
    pub fn color_name(&self) -> Option<&str> {
        self.color_name.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn depth_stencil_name(&self) -> Option<&str> {
        self.depth_stencil_name.as_deref()
    }
}
