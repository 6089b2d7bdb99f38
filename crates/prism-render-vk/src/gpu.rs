// SPDX-License-Identifier: CEPL-1.0
//! The capability table every component talks to.
//!
//! `AshBackend` implements it against a real device; tests use a recording
//! mock. Handles are plain `vk` handles, results are raw `VkResult`s so the
//! callers decide what is recoverable.

use ash::prelude::VkResult;
use ash::vk;

use crate::recorder::DynamicPipelineState;

#[derive(Clone, Copy, Debug)]
pub struct SwapchainDesc {
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
}

/// One queue submission: a single command buffer, one wait, one signal.
#[derive(Clone, Copy, Debug)]
pub struct SubmitDesc {
    pub wait_semaphore: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags2,
    pub command_buffer: vk::CommandBuffer,
    pub signal_semaphore: vk::Semaphore,
    pub fence: vk::Fence,
}

#[derive(Clone, Copy, Debug)]
pub struct PresentDesc {
    pub wait_semaphore: vk::Semaphore,
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
}

/// A color-image layout transition.
#[derive(Clone, Copy, Debug)]
pub struct ImageBarrier {
    pub image: vk::Image,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
}

/// Color attachment for a dynamic-rendering scope. Cleared on load.
#[derive(Clone, Copy, Debug)]
pub struct RenderTarget {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

pub struct PipelineDesc<'a> {
    pub vertex_code: &'a [u32],
    pub fragment_code: &'a [u32],
    pub color_format: vk::Format,
    pub vertex_stride: u32,
    pub attributes: &'a [vk::VertexInputAttributeDescription],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineHandles {
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferAllocation {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

pub trait Gpu {
    fn queue_wait_idle(&self) -> VkResult<()>;
    fn device_wait_idle(&self) -> VkResult<()>;

    // surface
    fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>>;

    // swapchain
    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);

    // sync
    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    // frame protocol
    /// `Ok((index, suboptimal))`, like `vkAcquireNextImageKHR`.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    fn queue_submit(&self, submit: &SubmitDesc) -> VkResult<()>;
    /// `Ok(suboptimal)`, like `vkQueuePresentKHR`.
    fn queue_present(&self, present: &PresentDesc) -> VkResult<bool>;

    // command buffers
    fn create_command_pool(&self) -> VkResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer>;
    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;

    fn cmd_image_barrier(&self, cmd: vk::CommandBuffer, barrier: &ImageBarrier);
    fn cmd_begin_rendering(&self, cmd: vk::CommandBuffer, target: &RenderTarget);
    fn cmd_end_rendering(&self, cmd: vk::CommandBuffer);
    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_set_dynamic_state(&self, cmd: vk::CommandBuffer, state: &DynamicPipelineState);
    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer);
    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32);

    // shader stages and device-visible memory
    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> VkResult<PipelineHandles>;
    fn destroy_pipeline(&self, handles: PipelineHandles);
    fn create_vertex_buffer(&self, bytes: &[u8]) -> VkResult<BufferAllocation>;
    fn destroy_buffer(&self, allocation: BufferAllocation);

    /// Label shown by validation messages and capture tools. A no-op when
    /// debug utils are off.
    fn set_object_name(&self, object_type: vk::ObjectType, handle: u64, name: &str);
}

pub fn name_object<H: vk::Handle>(gpu: &dyn Gpu, handle: H, name: &str) {
    gpu.set_object_name(H::TYPE, handle.as_raw(), name);
}
