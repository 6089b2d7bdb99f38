// SPDX-License-Identifier: CEPL-1.0
//! Scoped ownership for GPU objects: constructing an [`Owned`] takes the
//! handle, dropping it destroys the object through the capability table.

use std::fmt;
use std::rc::Rc;

use ash::vk::{self, Handle};

use crate::gpu::{BufferAllocation, Gpu, PipelineHandles};

pub trait Release: Copy + Default {
    fn is_null(&self) -> bool;
    fn release_with(self, gpu: &dyn Gpu);
}

macro_rules! release_handle {
    ($($ty:ty => $destroy:ident),* $(,)?) => {
        $(
            impl Release for $ty {
                fn is_null(&self) -> bool {
                    self.as_raw() == 0
                }
                fn release_with(self, gpu: &dyn Gpu) {
                    gpu.$destroy(self)
                }
            }
        )*
    };
}

release_handle! {
    vk::Semaphore => destroy_semaphore,
    vk::Fence => destroy_fence,
    vk::ImageView => destroy_image_view,
    vk::SwapchainKHR => destroy_swapchain,
    vk::CommandPool => destroy_command_pool,
}

impl Release for PipelineHandles {
    fn is_null(&self) -> bool {
        self.pipeline.as_raw() == 0 && self.layout.as_raw() == 0
    }
    fn release_with(self, gpu: &dyn Gpu) {
        gpu.destroy_pipeline(self)
    }
}

impl Release for BufferAllocation {
    fn is_null(&self) -> bool {
        self.buffer.as_raw() == 0 && self.memory.as_raw() == 0
    }
    fn release_with(self, gpu: &dyn Gpu) {
        gpu.destroy_buffer(self)
    }
}

pub struct Owned<H: Release> {
    raw: H,
    gpu: Rc<dyn Gpu>,
}

pub type Semaphore = Owned<vk::Semaphore>;
pub type Fence = Owned<vk::Fence>;
pub type ImageView = Owned<vk::ImageView>;
pub type SwapchainHandle = Owned<vk::SwapchainKHR>;
pub type CommandPool = Owned<vk::CommandPool>;
pub type Pipeline = Owned<PipelineHandles>;
pub type Buffer = Owned<BufferAllocation>;

impl<H: Release> Owned<H> {
    pub fn new(gpu: &Rc<dyn Gpu>, raw: H) -> Self {
        Self {
            raw,
            gpu: Rc::clone(gpu),
        }
    }

    #[inline]
    pub fn raw(&self) -> H {
        self.raw
    }

    /// Destroys the object now; later drops are no-ops.
    pub fn release(&mut self) {
        let raw = std::mem::take(&mut self.raw);
        if !raw.is_null() {
            raw.release_with(&*self.gpu);
        }
    }
}

impl<H: Release> Drop for Owned<H> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<H: Release + fmt::Debug> fmt::Debug for Owned<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&self.raw).finish()
    }
}
