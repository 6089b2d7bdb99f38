// SPDX-License-Identifier: CEPL-1.0
//! Semaphores and the fence for a single frame in flight.
//!
//! The acquire semaphore is shared by every frame: pacing on the submission
//! fence guarantees the previous submit consumed it. Present-ordering
//! semaphores are per image index, because a present may still be waiting on
//! semaphore `i` when the host moves on; it is only signaled again after
//! image `i` is re-acquired.

use std::rc::Rc;

use ash::vk;
use tracing::{debug, warn};

use crate::error::{Error, Result, VkResultExt};
use crate::gpu::{name_object, Gpu};
use crate::resources::{Fence, Semaphore};

pub struct FrameSyncSet {
    present_signals: Vec<Semaphore>,
    acquire: Semaphore,
    fence: Fence,
    in_flight: bool,
    gpu: Rc<dyn Gpu>,
}

impl FrameSyncSet {
    pub fn new(gpu: &Rc<dyn Gpu>, image_count: usize) -> Result<Self> {
        let acquire = Semaphore::new(gpu, gpu.create_semaphore().call("vkCreateSemaphore")?);
        // Signaled so the first frame does not block.
        let fence = Fence::new(gpu, gpu.create_fence(true).call("vkCreateFence")?);
        name_object(&**gpu, acquire.raw(), "acquire");
        name_object(&**gpu, fence.raw(), "submission fence");
        let mut set = Self {
            present_signals: Vec::new(),
            acquire,
            fence,
            in_flight: false,
            gpu: Rc::clone(gpu),
        };
        set.rebuild(image_count)?;
        Ok(set)
    }

    pub fn acquire_semaphore(&self) -> vk::Semaphore {
        self.acquire.raw()
    }

    pub fn fence(&self) -> vk::Fence {
        self.fence.raw()
    }

    pub fn present_signal(&self, image_index: u32) -> Result<vk::Semaphore> {
        self.present_signals
            .get(image_index as usize)
            .map(Semaphore::raw)
            .ok_or(Error::ImageIndex {
                index: image_index,
                count: self.present_signals.len(),
            })
    }

    /// Resets the fence right before it is handed to a submit.
    pub fn prepare_submission(&mut self) -> Result<()> {
        self.gpu
            .reset_fence(self.fence.raw())
            .call("vkResetFences")
    }

    pub fn mark_submitted(&mut self) {
        self.in_flight = true;
    }

    /// Blocks until the last submission finished. No-op when nothing is pending.
    pub fn wait_for_submission(&mut self) -> Result<()> {
        if !self.in_flight {
            return Ok(());
        }
        self.gpu
            .wait_for_fence(self.fence.raw(), u64::MAX)
            .call("vkWaitForFences")?;
        self.in_flight = false;
        Ok(())
    }

    /// Replaces the per-image semaphores. The caller has idled the queue.
    pub fn rebuild(&mut self, image_count: usize) -> Result<()> {
        self.present_signals.clear();
        for i in 0..image_count {
            let raw = self.gpu.create_semaphore().call("vkCreateSemaphore")?;
            name_object(&*self.gpu, raw, &format!("present {i}"));
            self.present_signals.push(Semaphore::new(&self.gpu, raw));
        }
        debug!(image_count, "present semaphores rebuilt");
        Ok(())
    }
}

impl Drop for FrameSyncSet {
    fn drop(&mut self) {
        if !self.in_flight {
            return;
        }
        if let Err(e) = self.gpu.wait_for_fence(self.fence.raw(), u64::MAX) {
            warn!("vkWaitForFences at teardown: {e}");
        }
    }
}
