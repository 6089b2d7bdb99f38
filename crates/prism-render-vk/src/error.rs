// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{call} failed: {result}")]
    Vk {
        call: &'static str,
        result: vk::Result,
    },

    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("Vulkan {found} is older than the required 1.3")]
    UnsupportedApiVersion { found: String },

    #[error("no physical device with a graphics queue that can present to the surface")]
    NoSuitableDevice,

    #[error("no host-visible coherent memory type")]
    NoHostVisibleMemory,

    #[error("surface reports no formats")]
    NoSurfaceFormat,

    #[error("surface extent is 0x0; cannot build a swapchain")]
    ZeroExtent,

    #[error("image index {index} out of range for {count} swapchain images")]
    ImageIndex { index: u32, count: usize },

    #[error("invalid SPIR-V blob: {0}")]
    Spirv(#[source] std::io::Error),

    #[error("reading shader {}: {source}", path.display())]
    ShaderFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("frame loop is lost after a fatal device error")]
    Lost,
}

impl Error {
    /// The raw Vulkan result behind this error, if any.
    pub fn vk_result(&self) -> Option<vk::Result> {
        match self {
            Error::Vk { result, .. } => Some(*result),
            _ => None,
        }
    }
}

/// Attaches the failing entry point name to a raw `VkResult`.
pub trait VkResultExt<T> {
    fn call(self, call: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, vk::Result> {
    fn call(self, call: &'static str) -> Result<T> {
        self.map_err(|result| Error::Vk { call, result })
    }
}
