// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero dimension; nothing can be presented then.
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Backend-neutral color target preference. Always paired with an sRGB
/// non-linear colorspace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorFormat {
    #[default]
    Bgra8Srgb,
    Rgba8Srgb,
}

#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub clear_color: [f32; 4],
    pub color_format: ColorFormat,
    /// Enable API validation when the layer is installed.
    pub validation: bool,
    /// SPIR-V overrides; the backend's built-in shaders are used when unset.
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.1, 0.1, 0.1, 1.0],
            color_format: ColorFormat::default(),
            validation: cfg!(debug_assertions),
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The window is minimized or occluded.
    Paused,
    /// Acquire reported the chain out of date; it is rebuilt next frame.
    OutOfDate,
    /// The surface has no area yet; recreation is deferred.
    ZeroExtent,
}

/// What one call to [`Renderer::render`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { frame: u64, image_index: u32 },
    /// Work was submitted and completed but presentation rejected the chain.
    Discarded { frame: u64 },
    Skipped(SkipReason),
}

impl FrameOutcome {
    pub fn is_presented(&self) -> bool {
        matches!(self, FrameOutcome::Presented { .. })
    }
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        config: &RenderConfig,
    ) -> Result<Self>
    where
        Self: Sized;

    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn render(&mut self) -> Result<FrameOutcome>;
    fn set_clear_color(&mut self, rgba: [f32; 4]);
}
