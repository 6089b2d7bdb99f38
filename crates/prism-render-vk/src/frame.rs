// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use ash::vk;
use prism_render::{FrameOutcome, RenderSize, SkipReason};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result, VkResultExt};
use crate::gpu::{Gpu, PresentDesc, SubmitDesc};
use crate::pipeline::{DrawResources, ShaderBlobs};
use crate::recorder::CommandRecorder;
use crate::surface::{cs_name, fmt_name, pick_surface_format};
use crate::swapchain::{Recreation, Swapchain};
use crate::sync::FrameSyncSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Recording,
    /// Work is queued; the image is being handed to presentation.
    Submitted,
    /// Presentation is queued; the host waits for the frame's work.
    Presenting,
    /// A fatal error happened; the loop no longer touches the device.
    Lost,
}

pub struct FrameLoopDesc<'a> {
    pub preferred_format: vk::Format,
    pub hint: RenderSize,
    pub clear_color: [f32; 4],
    pub shaders: &'a ShaderBlobs,
    /// Interleaved position/color vertices.
    pub vertices: &'a [u8],
}

/// acquire -> record -> submit -> present -> pace, one frame in flight.
pub struct FrameLoop {
    // STRICT TEARDOWN ORDER (fields drop top to bottom, after Drop::drop idles
    // the queue and the device): pipeline + buffer, sync objects, command pool,
    // views + chain.
    draw: DrawResources,
    sync: FrameSyncSet,
    recorder: CommandRecorder,
    swapchain: Swapchain,
    state: FrameState,
    lost_during: Option<FrameState>,
    frames_submitted: u64,
    hint: RenderSize,
    clear_color: [f32; 4],
    gpu: Rc<dyn Gpu>,
}

impl FrameLoop {
    pub fn new(gpu: &Rc<dyn Gpu>, desc: &FrameLoopDesc<'_>) -> Result<Self> {
        let formats = gpu
            .surface_formats()
            .call("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        for f in &formats {
            debug!(
                "surface offers {} / {}",
                fmt_name(f.format),
                cs_name(f.color_space)
            );
        }
        let (format, why) =
            pick_surface_format(&formats, desc.preferred_format).ok_or(Error::NoSurfaceFormat)?;
        if format.format != desc.preferred_format {
            warn!(
                "preferred {} not offered, using {}",
                fmt_name(desc.preferred_format),
                fmt_name(format.format)
            );
        }
        info!(
            "surface format: {} / {} ({})",
            fmt_name(format.format),
            cs_name(format.color_space),
            why
        );

        let swapchain = Swapchain::create(gpu, format, desc.hint)?;
        let recorder = CommandRecorder::new(gpu)?;
        let sync = FrameSyncSet::new(gpu, swapchain.image_count())?;
        let draw = DrawResources::new(
            gpu,
            swapchain.format().format,
            desc.shaders,
            desc.vertices,
        )?;

        Ok(Self {
            draw,
            sync,
            recorder,
            swapchain,
            state: FrameState::Idle,
            lost_during: None,
            frames_submitted: 0,
            hint: desc.hint,
            clear_color: desc.clear_color,
            gpu: Rc::clone(gpu),
        })
    }

    /// Runs one iteration. After a fatal error every call returns
    /// [`Error::Lost`].
    pub fn render_frame(&mut self) -> Result<FrameOutcome> {
        if self.state == FrameState::Lost {
            return Err(Error::Lost);
        }
        match self.step() {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("frame loop lost in {:?}: {e}", self.state);
                self.lost_during = Some(self.state);
                self.state = FrameState::Lost;
                Err(e)
            }
        }
    }

    fn step(&mut self) -> Result<FrameOutcome> {
        if self.swapchain.is_stale() || !self.swapchain.is_alive() {
            match self.swapchain.recreate(self.hint)? {
                Recreation::Deferred => return Ok(FrameOutcome::Skipped(SkipReason::ZeroExtent)),
                Recreation::Rebuilt => self.sync.rebuild(self.swapchain.image_count())?,
            }
        }
        // Pacing already waited; this only matters after an interrupted frame.
        self.sync.wait_for_submission()?;

        self.state = FrameState::Acquiring;
        let acquired = self.gpu.acquire_next_image(
            self.swapchain.handle(),
            u64::MAX,
            self.sync.acquire_semaphore(),
        );
        let image_index = match acquired {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    debug!("acquire: suboptimal, rebuilding after this frame");
                    self.swapchain.mark_stale();
                }
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("acquire: out of date");
                self.swapchain.mark_stale();
                self.state = FrameState::Idle;
                return Ok(FrameOutcome::Skipped(SkipReason::OutOfDate));
            }
            Err(result) => {
                return Err(Error::Vk {
                    call: "vkAcquireNextImageKHR",
                    result,
                })
            }
        };

        self.state = FrameState::Recording;
        let target = self.swapchain.target(image_index, self.clear_color)?;
        self.recorder.record(&target, &self.draw)?;

        let present_signal = self.sync.present_signal(image_index)?;
        self.sync.prepare_submission()?;
        self.gpu
            .queue_submit(&SubmitDesc {
                wait_semaphore: self.sync.acquire_semaphore(),
                wait_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                command_buffer: self.recorder.command_buffer(),
                signal_semaphore: present_signal,
                fence: self.sync.fence(),
            })
            .call("vkQueueSubmit2")?;
        self.sync.mark_submitted();
        self.frames_submitted += 1;
        let frame = self.frames_submitted;
        self.state = FrameState::Submitted;

        let presented = match self.gpu.queue_present(&PresentDesc {
            wait_semaphore: present_signal,
            swapchain: self.swapchain.handle(),
            image_index,
        }) {
            Ok(suboptimal) => {
                if suboptimal {
                    debug!("present: suboptimal");
                    self.swapchain.mark_stale();
                }
                true
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("present: out of date, frame {frame} discarded");
                self.swapchain.mark_stale();
                false
            }
            Err(result) => {
                return Err(Error::Vk {
                    call: "vkQueuePresentKHR",
                    result,
                })
            }
        };

        self.state = FrameState::Presenting;
        self.sync.wait_for_submission()?;
        self.state = FrameState::Idle;
        trace!(frame, image_index, presented, "frame done");

        Ok(if presented {
            FrameOutcome::Presented { frame, image_index }
        } else {
            FrameOutcome::Discarded { frame }
        })
    }

    /// New window size; the chain is rebuilt at the start of the next frame.
    pub fn resize(&mut self, size: RenderSize) {
        if size != self.hint {
            debug!("resize to {}x{}", size.width, size.height);
        }
        self.hint = size;
        self.swapchain.mark_stale();
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// The step that failed, once the loop is [`FrameState::Lost`].
    pub fn lost_during(&self) -> Option<FrameState> {
        self.lost_during
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Signaled when the most recent submission has completed.
    pub fn submission_fence(&self) -> vk::Fence {
        self.sync.fence()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        // Nothing below may be destroyed while the GPU still uses it.
        if let Err(e) = self.gpu.queue_wait_idle() {
            warn!("vkQueueWaitIdle at teardown: {e}");
        }
        if let Err(e) = self.gpu.device_wait_idle() {
            warn!("vkDeviceWaitIdle at teardown: {e}");
        }
    }
}
