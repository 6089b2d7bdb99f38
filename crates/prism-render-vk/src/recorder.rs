// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use ash::vk;
use tracing::trace;

use crate::error::{Result, VkResultExt};
use crate::gpu::{name_object, Gpu, ImageBarrier, RenderTarget};
use crate::pipeline::DrawResources;
use crate::resources::CommandPool;

/// Fixed-function state set per draw through dynamic state.
#[derive(Clone, Copy, Debug)]
pub struct DynamicPipelineState {
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
}

impl DynamicPipelineState {
    /// Full-image viewport with Y flipped so +Y points up in clip space.
    pub fn for_extent(extent: vk::Extent2D) -> Self {
        Self {
            viewport: vk::Viewport {
                x: 0.0,
                y: extent.height as f32,
                width: extent.width as f32,
                height: -(extent.height as f32),
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
        }
    }
}

/// One pool, one primary buffer, re-recorded every frame.
pub struct CommandRecorder {
    buffer: vk::CommandBuffer,
    _pool: CommandPool,
    gpu: Rc<dyn Gpu>,
}

impl CommandRecorder {
    pub fn new(gpu: &Rc<dyn Gpu>) -> Result<Self> {
        let pool = CommandPool::new(gpu, gpu.create_command_pool().call("vkCreateCommandPool")?);
        let buffer = gpu
            .allocate_command_buffer(pool.raw())
            .call("vkAllocateCommandBuffers")?;
        name_object(&**gpu, pool.raw(), "frame command pool");
        name_object(&**gpu, buffer, "frame command buffer");
        Ok(Self {
            buffer,
            _pool: pool,
            gpu: Rc::clone(gpu),
        })
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Records the whole frame. The caller guarantees the previous submission
    /// of this buffer has completed.
    pub fn record(&self, target: &RenderTarget, draw: &DrawResources) -> Result<()> {
        let gpu = &*self.gpu;
        let cmd = self.buffer;

        gpu.reset_command_buffer(cmd).call("vkResetCommandBuffer")?;
        gpu.begin_command_buffer(cmd).call("vkBeginCommandBuffer")?;

        // Contents are cleared, so the old layout can be discarded.
        gpu.cmd_image_barrier(
            cmd,
            &ImageBarrier {
                image: target.image,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                src_access: vk::AccessFlags2::NONE,
                dst_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                dst_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            },
        );

        gpu.cmd_begin_rendering(cmd, target);
        gpu.cmd_bind_pipeline(cmd, draw.pipeline());
        gpu.cmd_set_dynamic_state(cmd, &DynamicPipelineState::for_extent(target.extent));
        gpu.cmd_bind_vertex_buffer(cmd, draw.vertex_buffer());
        gpu.cmd_draw(cmd, draw.vertex_count(), 1);
        gpu.cmd_end_rendering(cmd);

        gpu.cmd_image_barrier(
            cmd,
            &ImageBarrier {
                image: target.image,
                old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
                src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                dst_stage: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
                dst_access: vk::AccessFlags2::NONE,
            },
        );

        gpu.end_command_buffer(cmd).call("vkEndCommandBuffer")?;
        trace!(extent = ?target.extent, "frame recorded");
        Ok(())
    }
}
