// SPDX-License-Identifier: CEPL-1.0
//! A `Gpu` that runs no GPU work. It hands out fabricated handles, tracks
//! the state the validation layer would track (binary semaphores, fences,
//! command buffers, the live swapchain), logs every call, and collects
//! protocol violations instead of crashing.
//!
//! Submitted work "completes" when the host waits on its fence or idles the
//! queue. An image handed to present is held until it is acquired again.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use crate::gpu::{
    BufferAllocation, Gpu, ImageBarrier, PipelineDesc, PipelineHandles, PresentDesc,
    RenderTarget, SubmitDesc, SwapchainDesc,
};
use crate::recorder::DynamicPipelineState;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    CreateSwapchain {
        handle: vk::SwapchainKHR,
        extent: (u32, u32),
        images: u32,
    },
    DestroySwapchain(vk::SwapchainKHR),
    CreateView(vk::ImageView),
    DestroyView(vk::ImageView),
    CreateSemaphore(vk::Semaphore),
    DestroySemaphore(vk::Semaphore),
    CreateFence(vk::Fence),
    DestroyFence(vk::Fence),
    WaitFence(vk::Fence),
    ResetFence(vk::Fence),
    Acquire {
        semaphore: vk::Semaphore,
        image_index: u32,
    },
    AcquireFailed(vk::Result),
    Submit {
        wait: vk::Semaphore,
        wait_stage: vk::PipelineStageFlags2,
        signal: vk::Semaphore,
        fence: vk::Fence,
        cmd: vk::CommandBuffer,
    },
    Present {
        wait: vk::Semaphore,
        image_index: u32,
        result: vk::Result,
    },
    QueueWaitIdle,
    DeviceWaitIdle,
    CreateCommandPool(vk::CommandPool),
    DestroyCommandPool(vk::CommandPool),
    ResetCmd,
    BeginCmd,
    EndCmd,
    Barrier {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
        src_stage: vk::PipelineStageFlags2,
        dst_stage: vk::PipelineStageFlags2,
        dst_access: vk::AccessFlags2,
    },
    BeginRendering {
        extent: (u32, u32),
        clear: [f32; 4],
    },
    BindPipeline(vk::Pipeline),
    SetDynamicState {
        viewport_y: f32,
        viewport_height: f32,
        scissor: (u32, u32),
        topology: vk::PrimitiveTopology,
        cull_mode: vk::CullModeFlags,
        front_face: vk::FrontFace,
    },
    BindVertexBuffer(vk::Buffer),
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    EndRendering,
    CreatePipeline(vk::Pipeline),
    DestroyPipeline(vk::Pipeline),
    CreateBuffer {
        buffer: vk::Buffer,
        size: u64,
    },
    DestroyBuffer(vk::Buffer),
    NameObject {
        object_type: vk::ObjectType,
        handle: u64,
        name: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SemState {
    Unsignaled,
    Signaled,
    /// Waited on by a present of this image; free once it is re-acquired.
    HeldByPresent(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FenceState {
    Unsignaled,
    Signaled,
    Pending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CmdState {
    Initial,
    Recording,
    Executable,
    Pending,
}

struct MockChain {
    handle: vk::SwapchainKHR,
    extent: (u32, u32),
    images: Vec<vk::Image>,
    next_acquire: u32,
}

struct State {
    next_handle: u64,
    image_count: u32,
    surface_extent: (u32, u32),
    surface_formats: Vec<vk::SurfaceFormatKHR>,
    chain: Option<MockChain>,
    views: HashMap<vk::ImageView, vk::Image>,
    semaphores: HashMap<vk::Semaphore, SemState>,
    fences: HashMap<vk::Fence, FenceState>,
    pools: HashMap<vk::CommandPool, Vec<vk::CommandBuffer>>,
    cmds: HashMap<vk::CommandBuffer, CmdState>,
    pipelines: HashSet<vk::Pipeline>,
    buffers: HashSet<vk::Buffer>,
    idle_since_submit: bool,
    acquire_calls: u32,
    present_calls: u32,
    capability_calls: u32,
    acquire_script: HashMap<u32, vk::Result>,
    present_script: HashMap<u32, vk::Result>,
    extent_script: HashMap<u32, (u32, u32)>,
    violations: Vec<String>,
}

impl State {
    fn fresh<H: Handle>(&mut self) -> H {
        self.next_handle += 1;
        H::from_raw(self.next_handle)
    }

    fn violation(&mut self, msg: String) {
        self.violations.push(msg);
    }

    /// All submitted work has finished.
    fn complete_all(&mut self) {
        for fence in self.fences.values_mut() {
            if *fence == FenceState::Pending {
                *fence = FenceState::Signaled;
            }
        }
        for cmd in self.cmds.values_mut() {
            if *cmd == CmdState::Pending {
                *cmd = CmdState::Executable;
            }
        }
    }

    fn release_present_holds(&mut self, image: Option<u32>) {
        for sem in self.semaphores.values_mut() {
            if let SemState::HeldByPresent(i) = *sem {
                if image.map_or(true, |want| want == i) {
                    *sem = SemState::Unsignaled;
                }
            }
        }
    }

    fn chain_is_out_of_date(&self) -> bool {
        self.chain
            .as_ref()
            .is_some_and(|c| c.extent != self.surface_extent)
    }
}

pub struct MockGpu {
    state: RefCell<State>,
    events: RefCell<Vec<Event>>,
}

impl MockGpu {
    pub fn new(image_count: u32, width: u32, height: u32) -> Rc<MockGpu> {
        Rc::new(MockGpu {
            state: RefCell::new(State {
                next_handle: 0x1000,
                image_count,
                surface_extent: (width, height),
                surface_formats: vec![vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                }],
                chain: None,
                views: HashMap::new(),
                semaphores: HashMap::new(),
                fences: HashMap::new(),
                pools: HashMap::new(),
                cmds: HashMap::new(),
                pipelines: HashSet::new(),
                buffers: HashSet::new(),
                idle_since_submit: true,
                acquire_calls: 0,
                present_calls: 0,
                capability_calls: 0,
                acquire_script: HashMap::new(),
                present_script: HashMap::new(),
                extent_script: HashMap::new(),
                violations: Vec::new(),
            }),
            events: RefCell::new(Vec::new()),
        })
    }

    fn log(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// Index of the first logged event at or after `from` matching `pred`.
    pub fn position(&self, from: usize, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events
            .borrow()
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, e)| pred(e))
            .map(|(i, _)| i)
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }

    pub fn set_surface_extent(&self, width: u32, height: u32) {
        self.state.borrow_mut().surface_extent = (width, height);
    }

    pub fn set_image_count(&self, image_count: u32) {
        self.state.borrow_mut().image_count = image_count;
    }

    pub fn set_surface_formats(&self, formats: Vec<vk::SurfaceFormatKHR>) {
        self.state.borrow_mut().surface_formats = formats;
    }

    /// The `n`th present call (1-based) returns `result`.
    pub fn fail_present_on(&self, n: u32, result: vk::Result) {
        self.state.borrow_mut().present_script.insert(n, result);
    }

    /// The `n`th acquire call (1-based) returns `result`.
    pub fn fail_acquire_on(&self, n: u32, result: vk::Result) {
        self.state.borrow_mut().acquire_script.insert(n, result);
    }

    /// The `n`th capabilities query from now (1-based) reports this extent
    /// once; later queries see the regular surface extent again.
    pub fn surface_extent_on_query(&self, n: u32, width: u32, height: u32) {
        let mut s = self.state.borrow_mut();
        let at = s.capability_calls + n;
        s.extent_script.insert(at, (width, height));
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    #[track_caller]
    pub fn assert_no_violations(&self) {
        let v = self.violations();
        assert!(v.is_empty(), "protocol violations: {v:#?}");
    }

    pub fn live_objects(&self) -> usize {
        let s = self.state.borrow();
        s.views.len()
            + s.semaphores.len()
            + s.fences.len()
            + s.pools.len()
            + s.pipelines.len()
            + s.buffers.len()
            + usize::from(s.chain.is_some())
    }

    pub fn live_swapchain(&self) -> Option<(vk::SwapchainKHR, (u32, u32), usize)> {
        let s = self.state.borrow();
        s.chain
            .as_ref()
            .map(|c| (c.handle, c.extent, c.images.len()))
    }

    pub fn live_views(&self) -> usize {
        self.state.borrow().views.len()
    }

    /// Most recent debug name given to `handle`.
    pub fn object_name(&self, handle: impl Handle) -> Option<String> {
        let raw = handle.as_raw();
        self.events.borrow().iter().rev().find_map(|e| match e {
            Event::NameObject { handle, name, .. } if *handle == raw => Some(name.clone()),
            _ => None,
        })
    }
}

impl Gpu for MockGpu {
    fn queue_wait_idle(&self) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.complete_all();
        s.release_present_holds(None);
        s.idle_since_submit = true;
        drop(s);
        self.log(Event::QueueWaitIdle);
        Ok(())
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.complete_all();
        s.release_present_holds(None);
        s.idle_since_submit = true;
        drop(s);
        self.log(Event::DeviceWaitIdle);
        Ok(())
    }

    fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        let mut s = self.state.borrow_mut();
        s.capability_calls += 1;
        let call = s.capability_calls;
        let scripted = s.extent_script.remove(&call);
        let (width, height) = scripted.unwrap_or(s.surface_extent);
        Ok(vk::SurfaceCapabilitiesKHR {
            min_image_count: s.image_count.saturating_sub(1).max(1),
            max_image_count: s.image_count,
            current_extent: vk::Extent2D { width, height },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            max_image_array_layers: 1,
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        })
    }

    fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.state.borrow().surface_formats.clone())
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let mut s = self.state.borrow_mut();
        if let Some(old) = s.chain.as_ref().map(|c| c.handle) {
            s.violation(format!("create_swapchain while {old:?} is still alive"));
        }
        let extent = (desc.extent.width, desc.extent.height);
        if extent.0 == 0 || extent.1 == 0 {
            s.violation("create_swapchain with a zero extent".into());
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        if desc.present_mode != vk::PresentModeKHR::FIFO {
            s.violation(format!("present mode {:?}", desc.present_mode));
        }
        let handle: vk::SwapchainKHR = s.fresh();
        let images = (0..desc.min_image_count).map(|_| s.fresh()).collect();
        s.chain = Some(MockChain {
            handle,
            extent,
            images,
            next_acquire: 0,
        });
        drop(s);
        self.log(Event::CreateSwapchain {
            handle,
            extent,
            images: desc.min_image_count,
        });
        Ok(handle)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let s = self.state.borrow();
        match &s.chain {
            Some(c) if c.handle == swapchain => Ok(c.images.clone()),
            _ => Err(vk::Result::ERROR_INITIALIZATION_FAILED),
        }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut s = self.state.borrow_mut();
        if s.chain.as_ref().map(|c| c.handle) != Some(swapchain) {
            s.violation(format!("destroy of unknown swapchain {swapchain:?}"));
            return;
        }
        let Some(chain) = s.chain.take() else {
            return;
        };
        let dangling = s
            .views
            .values()
            .filter(|img| chain.images.contains(img))
            .count();
        if dangling > 0 {
            s.violation(format!("swapchain destroyed with {dangling} live views"));
        }
        if !s.idle_since_submit {
            s.violation("swapchain destroyed without a queue idle after the last submit".into());
        }
        drop(s);
        self.log(Event::DestroySwapchain(swapchain));
    }

    fn create_image_view(&self, image: vk::Image, _format: vk::Format) -> VkResult<vk::ImageView> {
        let mut s = self.state.borrow_mut();
        let view: vk::ImageView = s.fresh();
        s.views.insert(view, image);
        drop(s);
        self.log(Event::CreateView(view));
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let mut s = self.state.borrow_mut();
        if s.views.remove(&view).is_none() {
            s.violation(format!("destroy of unknown view {view:?}"));
        }
        drop(s);
        self.log(Event::DestroyView(view));
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let mut s = self.state.borrow_mut();
        let sem: vk::Semaphore = s.fresh();
        s.semaphores.insert(sem, SemState::Unsignaled);
        drop(s);
        self.log(Event::CreateSemaphore(sem));
        Ok(sem)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut s = self.state.borrow_mut();
        match s.semaphores.remove(&semaphore) {
            None => s.violation(format!("destroy of unknown semaphore {semaphore:?}")),
            Some(SemState::HeldByPresent(i)) => s.violation(format!(
                "semaphore {semaphore:?} destroyed while present of image {i} waits on it"
            )),
            Some(_) => {}
        }
        drop(s);
        self.log(Event::DestroySemaphore(semaphore));
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let mut s = self.state.borrow_mut();
        let fence: vk::Fence = s.fresh();
        let state = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        s.fences.insert(fence, state);
        drop(s);
        self.log(Event::CreateFence(fence));
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut s = self.state.borrow_mut();
        match s.fences.remove(&fence) {
            None => s.violation(format!("destroy of unknown fence {fence:?}")),
            Some(FenceState::Pending) => {
                s.violation(format!("fence {fence:?} destroyed while pending"))
            }
            Some(_) => {}
        }
        drop(s);
        self.log(Event::DestroyFence(fence));
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let result = match s.fences.get(&fence).copied() {
            Some(FenceState::Pending) => {
                s.complete_all();
                Ok(())
            }
            Some(FenceState::Signaled) => Ok(()),
            Some(FenceState::Unsignaled) => {
                s.violation(format!("wait on fence {fence:?} with no work submitted"));
                Err(vk::Result::TIMEOUT)
            }
            None => {
                s.violation(format!("wait on unknown fence {fence:?}"));
                Err(vk::Result::ERROR_UNKNOWN)
            }
        };
        drop(s);
        self.log(Event::WaitFence(fence));
        result
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        match s.fences.get(&fence).copied() {
            Some(FenceState::Pending) => {
                s.violation(format!("reset of pending fence {fence:?}"));
            }
            Some(_) => {
                s.fences.insert(fence, FenceState::Unsignaled);
            }
            None => s.violation(format!("reset of unknown fence {fence:?}")),
        }
        drop(s);
        self.log(Event::ResetFence(fence));
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut s = self.state.borrow_mut();
        s.acquire_calls += 1;
        let call = s.acquire_calls;
        let scripted = s.acquire_script.remove(&call);

        let failure = match scripted {
            Some(r) if r != vk::Result::SUBOPTIMAL_KHR => Some(r),
            _ if s.chain_is_out_of_date() => Some(vk::Result::ERROR_OUT_OF_DATE_KHR),
            _ => None,
        };
        if let Some(r) = failure {
            drop(s);
            self.log(Event::AcquireFailed(r));
            return Err(r);
        }

        if s.semaphores.get(&semaphore).copied() != Some(SemState::Unsignaled) {
            s.violation(format!("acquire signals {semaphore:?} which is not unsignaled"));
        }
        let picked = s
            .chain
            .as_mut()
            .filter(|c| c.handle == swapchain)
            .map(|c| {
                let i = c.next_acquire % c.images.len() as u32;
                c.next_acquire = c.next_acquire.wrapping_add(1);
                i
            });
        let Some(index) = picked else {
            s.violation(format!("acquire from unknown swapchain {swapchain:?}"));
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        };
        s.release_present_holds(Some(index));
        s.semaphores.insert(semaphore, SemState::Signaled);
        drop(s);
        self.log(Event::Acquire {
            semaphore,
            image_index: index,
        });
        Ok((index, scripted == Some(vk::Result::SUBOPTIMAL_KHR)))
    }

    fn queue_submit(&self, submit: &SubmitDesc) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let wait = s.semaphores.get(&submit.wait_semaphore).copied();
        if wait != Some(SemState::Signaled) {
            s.violation(format!(
                "submit waits on {:?} in state {wait:?}",
                submit.wait_semaphore
            ));
        }
        let signal = s.semaphores.get(&submit.signal_semaphore).copied();
        if signal != Some(SemState::Unsignaled) {
            s.violation(format!(
                "submit signals {:?} in state {signal:?}",
                submit.signal_semaphore
            ));
        }
        let fence = s.fences.get(&submit.fence).copied();
        if fence != Some(FenceState::Unsignaled) {
            s.violation(format!("submit with fence in state {fence:?}"));
        }
        let cmd = s.cmds.get(&submit.command_buffer).copied();
        if cmd != Some(CmdState::Executable) {
            s.violation(format!("submit of command buffer in state {cmd:?}"));
        }

        s.semaphores.insert(submit.wait_semaphore, SemState::Unsignaled);
        s.semaphores.insert(submit.signal_semaphore, SemState::Signaled);
        s.fences.insert(submit.fence, FenceState::Pending);
        s.cmds.insert(submit.command_buffer, CmdState::Pending);
        s.idle_since_submit = false;
        drop(s);
        self.log(Event::Submit {
            wait: submit.wait_semaphore,
            wait_stage: submit.wait_stage,
            signal: submit.signal_semaphore,
            fence: submit.fence,
            cmd: submit.command_buffer,
        });
        Ok(())
    }

    fn queue_present(&self, present: &PresentDesc) -> VkResult<bool> {
        let mut s = self.state.borrow_mut();
        s.present_calls += 1;
        let call = s.present_calls;
        let result = match s.present_script.remove(&call) {
            Some(r) => r,
            None if s.chain_is_out_of_date() => vk::Result::ERROR_OUT_OF_DATE_KHR,
            None => vk::Result::SUCCESS,
        };

        let wait = s.semaphores.get(&present.wait_semaphore).copied();
        if wait != Some(SemState::Signaled) {
            s.violation(format!(
                "present waits on {:?} in state {wait:?}",
                present.wait_semaphore
            ));
        }
        if s.chain.as_ref().map(|c| c.handle) != Some(present.swapchain) {
            s.violation(format!("present to unknown swapchain {:?}", present.swapchain));
        }
        s.semaphores
            .insert(present.wait_semaphore, SemState::HeldByPresent(present.image_index));
        drop(s);
        self.log(Event::Present {
            wait: present.wait_semaphore,
            image_index: present.image_index,
            result,
        });
        match result {
            vk::Result::SUCCESS => Ok(false),
            vk::Result::SUBOPTIMAL_KHR => Ok(true),
            err => Err(err),
        }
    }

    fn create_command_pool(&self) -> VkResult<vk::CommandPool> {
        let mut s = self.state.borrow_mut();
        let pool: vk::CommandPool = s.fresh();
        s.pools.insert(pool, Vec::new());
        drop(s);
        self.log(Event::CreateCommandPool(pool));
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut s = self.state.borrow_mut();
        match s.pools.remove(&pool) {
            Some(buffers) => {
                for cmd in buffers {
                    if s.cmds.remove(&cmd) == Some(CmdState::Pending) {
                        s.violation("command pool destroyed with a pending buffer".into());
                    }
                }
            }
            None => s.violation(format!("destroy of unknown pool {pool:?}")),
        }
        drop(s);
        self.log(Event::DestroyCommandPool(pool));
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        let mut s = self.state.borrow_mut();
        let cmd: vk::CommandBuffer = s.fresh();
        match s.pools.get_mut(&pool) {
            Some(buffers) => buffers.push(cmd),
            None => return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
        }
        s.cmds.insert(cmd, CmdState::Initial);
        Ok(cmd)
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        if s.cmds.get(&cmd) == Some(&CmdState::Pending) {
            s.violation("command buffer reset while its submission is pending".into());
        }
        s.cmds.insert(cmd, CmdState::Initial);
        drop(s);
        self.log(Event::ResetCmd);
        Ok(())
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        match s.cmds.get(&cmd).copied() {
            Some(CmdState::Pending) => {
                s.violation("command buffer re-recorded while its submission is pending".into())
            }
            Some(CmdState::Recording) => s.violation("begin on a recording command buffer".into()),
            None => s.violation(format!("begin on unknown command buffer {cmd:?}")),
            _ => {}
        }
        s.cmds.insert(cmd, CmdState::Recording);
        drop(s);
        self.log(Event::BeginCmd);
        Ok(())
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        if s.cmds.get(&cmd) != Some(&CmdState::Recording) {
            s.violation("end on a command buffer that is not recording".into());
        }
        s.cmds.insert(cmd, CmdState::Executable);
        drop(s);
        self.log(Event::EndCmd);
        Ok(())
    }

    fn cmd_image_barrier(&self, _cmd: vk::CommandBuffer, barrier: &ImageBarrier) {
        self.log(Event::Barrier {
            old: barrier.old_layout,
            new: barrier.new_layout,
            src_stage: barrier.src_stage,
            dst_stage: barrier.dst_stage,
            dst_access: barrier.dst_access,
        });
    }

    fn cmd_begin_rendering(&self, _cmd: vk::CommandBuffer, target: &RenderTarget) {
        self.log(Event::BeginRendering {
            extent: (target.extent.width, target.extent.height),
            clear: target.clear_color,
        });
    }

    fn cmd_end_rendering(&self, _cmd: vk::CommandBuffer) {
        self.log(Event::EndRendering);
    }

    fn cmd_bind_pipeline(&self, _cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.log(Event::BindPipeline(pipeline));
    }

    fn cmd_set_dynamic_state(&self, _cmd: vk::CommandBuffer, state: &DynamicPipelineState) {
        self.log(Event::SetDynamicState {
            viewport_y: state.viewport.y,
            viewport_height: state.viewport.height,
            scissor: (state.scissor.extent.width, state.scissor.extent.height),
            topology: state.topology,
            cull_mode: state.cull_mode,
            front_face: state.front_face,
        });
    }

    fn cmd_bind_vertex_buffer(&self, _cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        self.log(Event::BindVertexBuffer(buffer));
    }

    fn cmd_draw(&self, _cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        self.log(Event::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn create_pipeline(&self, _desc: &PipelineDesc<'_>) -> VkResult<PipelineHandles> {
        let mut s = self.state.borrow_mut();
        let handles = PipelineHandles {
            layout: s.fresh(),
            pipeline: s.fresh(),
        };
        s.pipelines.insert(handles.pipeline);
        drop(s);
        self.log(Event::CreatePipeline(handles.pipeline));
        Ok(handles)
    }

    fn destroy_pipeline(&self, handles: PipelineHandles) {
        let mut s = self.state.borrow_mut();
        if !s.pipelines.remove(&handles.pipeline) {
            s.violation(format!("destroy of unknown pipeline {:?}", handles.pipeline));
        }
        drop(s);
        self.log(Event::DestroyPipeline(handles.pipeline));
    }

    fn create_vertex_buffer(&self, bytes: &[u8]) -> VkResult<BufferAllocation> {
        let mut s = self.state.borrow_mut();
        let alloc = BufferAllocation {
            buffer: s.fresh(),
            memory: s.fresh(),
            size: bytes.len() as u64,
        };
        s.buffers.insert(alloc.buffer);
        drop(s);
        self.log(Event::CreateBuffer {
            buffer: alloc.buffer,
            size: alloc.size,
        });
        Ok(alloc)
    }

    fn destroy_buffer(&self, allocation: BufferAllocation) {
        let mut s = self.state.borrow_mut();
        if !s.buffers.remove(&allocation.buffer) {
            s.violation(format!("destroy of unknown buffer {:?}", allocation.buffer));
        }
        drop(s);
        self.log(Event::DestroyBuffer(allocation.buffer));
    }

    fn set_object_name(&self, object_type: vk::ObjectType, handle: u64, name: &str) {
        if handle == 0 {
            self.state
                .borrow_mut()
                .violation(format!("naming a null {object_type:?} as {name:?}"));
        }
        self.log(Event::NameObject {
            object_type,
            handle,
            name: name.to_owned(),
        });
    }
}
