// SPDX-License-Identifier: CEPL-1.0
//! Vulkan 1.3 backend: dynamic rendering, synchronization2, one frame in
//! flight, swapchain rebuilt on demand.

mod backend;
mod context;
mod error;
mod frame;
mod gpu;
#[cfg(test)]
mod mock;
mod pipeline;
mod recorder;
mod resources;
mod surface;
mod swapchain;
mod sync;

use std::rc::Rc;

use anyhow::Context;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

use prism_render::{FrameOutcome, RenderConfig, RenderSize, Renderer, SkipReason};

pub use backend::AshBackend;
pub use context::GraphicsContext;
pub use error::{Error, Result, VkResultExt};
pub use frame::{FrameLoop, FrameLoopDesc, FrameState};
pub use gpu::Gpu;
pub use pipeline::{ShaderBlobs, Vertex, TRIANGLE};
pub use swapchain::Swapchain;

pub struct VkRenderer {
    frame_loop: FrameLoop,
    paused: bool,
}

impl VkRenderer {
    fn with_gpu(gpu: Rc<dyn Gpu>, size: RenderSize, config: &RenderConfig) -> anyhow::Result<Self> {
        let shaders = ShaderBlobs::load(
            config.vertex_shader.as_deref(),
            config.fragment_shader.as_deref(),
        )?;
        let frame_loop = FrameLoop::new(
            &gpu,
            &FrameLoopDesc {
                preferred_format: surface::preferred_format(config.color_format),
                hint: size,
                clear_color: config.clear_color,
                shaders: &shaders,
                vertices: bytemuck::cast_slice::<Vertex, u8>(&TRIANGLE),
            },
        )
        .context("building the frame loop")?;
        Ok(Self {
            frame_loop,
            paused: false,
        })
    }

    pub fn frame_loop(&self) -> &FrameLoop {
        &self.frame_loop
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        config: &RenderConfig,
    ) -> anyhow::Result<Self> {
        let backend =
            AshBackend::new(window, display, config.validation).context("initialising Vulkan")?;
        let ctx = backend.context();
        info!(
            "vk: device {} (Vulkan {}), queue family {}, memory type {}",
            ctx.device_name,
            context::version_string(ctx.api_version),
            ctx.queue_family_index,
            ctx.memory_type_index
        );
        Self::with_gpu(Rc::new(backend), size, config)
    }

    fn resize(&mut self, size: RenderSize) -> anyhow::Result<()> {
        if size.is_zero() {
            if !self.paused {
                info!("vk: resize to 0x0 → paused=true");
            }
            self.paused = true;
            return Ok(());
        }
        if self.paused {
            info!("vk: resize to {}x{} → paused=false", size.width, size.height);
        }
        self.paused = false;
        self.frame_loop.resize(size);
        Ok(())
    }

    fn render(&mut self) -> anyhow::Result<FrameOutcome> {
        if self.paused {
            return Ok(FrameOutcome::Skipped(SkipReason::Paused));
        }
        Ok(self.frame_loop.render_frame()?)
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.frame_loop.set_clear_color(rgba);
    }
}
