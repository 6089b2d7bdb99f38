// SPDX-License-Identifier: CEPL-1.0
//! The `Gpu` table backed by a real Vulkan 1.3 device through ash.

use std::ffi::{c_void, CStr, CString};

use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use tracing::{debug, error, info, trace, warn};

use crate::context::{
    find_memory_type, pick_queue_family, pick_upload_memory_type, queue_flags_name,
    supports_required_api, version_string, GraphicsContext, MIN_API_VERSION,
};
use crate::error::{Error, Result, VkResultExt};
use crate::gpu::{
    BufferAllocation, Gpu, ImageBarrier, PipelineDesc, PipelineHandles, PresentDesc,
    RenderTarget, SubmitDesc, SwapchainDesc,
};
use crate::recorder::DynamicPipelineState;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENTRY_POINT: &CStr = c"main";

const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || unsafe { (*data).p_message.is_null() } {
        return vk::FALSE;
    }
    let msg = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(target: "vulkan", "{msg}");
    } else {
        trace!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

unsafe fn has_name(names: impl IntoIterator<Item = *const std::ffi::c_char>, want: &CStr) -> bool {
    names
        .into_iter()
        .any(|p| unsafe { CStr::from_ptr(p) } == want)
}

/// Instance-level objects. The surface is normally destroyed by
/// `AshBackend` before the device; whatever is left goes here: surface,
/// messenger, instance.
struct InstanceParts {
    surface_fns: surface::Instance,
    surface: vk::SurfaceKHR,
    debug: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    instance: ash::Instance,
    _entry: Entry,
}

impl Drop for InstanceParts {
    fn drop(&mut self) {
        unsafe {
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_fns.destroy_surface(self.surface, None);
            }
            if let Some((fns, messenger)) = self.debug.take() {
                fns.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    validation: bool,
) -> Result<(ash::Instance, bool)> {
    let loader_version = unsafe { entry.try_enumerate_instance_version() }
        .call("vkEnumerateInstanceVersion")?
        .unwrap_or(vk::API_VERSION_1_0);
    info!("vulkan loader {}", version_string(loader_version));
    if !supports_required_api(loader_version) {
        return Err(Error::UnsupportedApiVersion {
            found: version_string(loader_version),
        });
    }

    let mut extensions = ash_window::enumerate_required_extensions(display_raw)
        .call("enumerate_required_extensions")?
        .to_vec();

    let installed = unsafe { entry.enumerate_instance_layer_properties() }
        .call("vkEnumerateInstanceLayerProperties")?;
    for layer in &installed {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) }.to_string_lossy();
        let about = unsafe { CStr::from_ptr(layer.description.as_ptr()) }.to_string_lossy();
        debug!(
            "instance layer: {name} (Vulkan {}) {about}",
            version_string(layer.spec_version)
        );
    }

    // Validation is best effort: only when asked for and actually installed.
    let mut layers = Vec::new();
    let mut debug = false;
    if validation {
        let has_layer =
            unsafe { has_name(installed.iter().map(|l| l.layer_name.as_ptr()), VALIDATION_LAYER) };
        let exts = unsafe { entry.enumerate_instance_extension_properties(None) }
            .call("vkEnumerateInstanceExtensionProperties")?;
        let has_debug_utils = unsafe {
            has_name(exts.iter().map(|e| e.extension_name.as_ptr()), debug_utils::NAME)
        };
        if has_layer {
            layers.push(VALIDATION_LAYER.as_ptr());
        } else {
            warn!("validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }
        if has_layer && has_debug_utils {
            extensions.push(debug_utils::NAME.as_ptr());
            debug = true;
        }
    }

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: c"prism".as_ptr(),
        application_version: 0,
        p_engine_name: c"prism".as_ptr(),
        engine_version: 0,
        api_version: MIN_API_VERSION,
        ..Default::default()
    };
    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };
    let instance =
        unsafe { entry.create_instance(&create_info, None) }.call("vkCreateInstance")?;
    Ok((instance, debug))
}

unsafe fn create_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> Result<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let fns = debug_utils::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    let messenger = unsafe { fns.create_debug_utils_messenger(&ci, None) }
        .call("vkCreateDebugUtilsMessengerEXT")?;
    Ok((fns, messenger))
}

unsafe fn init_instance_and_surface(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    validation: bool,
) -> Result<InstanceParts> {
    // STRICT ORDER:
    // 1) instance (WSI extensions + optional debug utils)
    // 2) surface from THIS instance
    // 3) later: physical device/queue chosen against this surface
    let dh = display.display_handle()?.as_raw();
    let wh = window.window_handle()?.as_raw();

    let entry = Entry::linked();
    let (instance, debug) = unsafe { create_instance(&entry, dh, validation)? };

    let debug = if debug {
        match unsafe { create_debug_messenger(&entry, &instance) } {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("debug messenger unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let surface_fns = surface::Instance::new(&entry, &instance);
    let surface = match unsafe { ash_window::create_surface(&entry, &instance, dh, wh, None) } {
        Ok(s) => s,
        Err(result) => {
            unsafe {
                if let Some((fns, messenger)) = debug {
                    fns.destroy_debug_utils_messenger(messenger, None);
                }
                instance.destroy_instance(None);
            }
            return Err(Error::Vk {
                call: "ash_window::create_surface",
                result,
            });
        }
    };

    Ok(InstanceParts {
        surface_fns,
        surface,
        debug,
        instance,
        _entry: entry,
    })
}

/// First device that speaks 1.3, has the swapchain extension and a graphics
/// queue able to present to `surface`.
unsafe fn pick_device_and_queue(parts: &InstanceParts) -> Result<(vk::PhysicalDevice, u32)> {
    let instance = &parts.instance;
    let devices =
        unsafe { instance.enumerate_physical_devices() }.call("vkEnumeratePhysicalDevices")?;

    for phys in devices {
        let props = unsafe { instance.get_physical_device_properties(phys) };
        let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy();
        if !supports_required_api(props.api_version) {
            info!(
                "skipping {name}: Vulkan {}",
                version_string(props.api_version)
            );
            continue;
        }

        let exts = unsafe { instance.enumerate_device_extension_properties(phys) }
            .call("vkEnumerateDeviceExtensionProperties")?;
        if !unsafe { has_name(exts.iter().map(|e| e.extension_name.as_ptr()), swapchain::NAME) } {
            info!("skipping {name}: no VK_KHR_swapchain");
            continue;
        }

        let families = unsafe { instance.get_physical_device_queue_family_properties(phys) };
        for (i, q) in families.iter().enumerate() {
            debug!(
                "{name} queue family {i}: [{}] x{}",
                queue_flags_name(q.queue_flags),
                q.queue_count
            );
        }
        let picked = pick_queue_family(&families, |i| unsafe {
            parts
                .surface_fns
                .get_physical_device_surface_support(phys, i, parts.surface)
                .unwrap_or(false)
        });
        if let Some(family) = picked {
            return Ok((phys, family));
        }
        info!("skipping {name}: no graphics queue that can present");
    }
    Err(Error::NoSuitableDevice)
}

unsafe fn create_device(
    instance: &ash::Instance,
    phys: vk::PhysicalDevice,
    queue_family: u32,
) -> Result<ash::Device> {
    let priorities = [1.0_f32];
    let qinfo = vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: queue_family,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    };
    let device_exts = [swapchain::NAME.as_ptr()];

    // STRICT: feats13 chained under feats2; both must outlive create_device.
    let mut feats13 = vk::PhysicalDeviceVulkan13Features {
        s_type: vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES,
        synchronization2: vk::TRUE,
        dynamic_rendering: vk::TRUE,
        ..Default::default()
    };
    let feats2 = vk::PhysicalDeviceFeatures2 {
        s_type: vk::StructureType::PHYSICAL_DEVICE_FEATURES_2,
        p_next: (&mut feats13) as *mut _ as *mut c_void,
        ..Default::default()
    };

    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        p_next: (&feats2) as *const _ as *const c_void,
        queue_create_info_count: 1,
        p_queue_create_infos: &qinfo,
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        ..Default::default()
    };
    unsafe { instance.create_device(phys, &dinfo, None) }.call("vkCreateDevice")
}

pub struct AshBackend {
    context: GraphicsContext,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    swapchain_fns: swapchain::Device,
    // Present only when the debug messenger is.
    object_names: Option<debug_utils::Device>,
    device: ash::Device,
    // Dropped last, after Drop::drop destroyed the device.
    parts: InstanceParts,
}

impl AshBackend {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        validation: bool,
    ) -> Result<Self> {
        let parts = unsafe { init_instance_and_surface(window, display, validation)? };
        let (phys, queue_family_index) = unsafe { pick_device_and_queue(&parts)? };

        let props = unsafe { parts.instance.get_physical_device_properties(phys) };
        let device_name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let memory_properties =
            unsafe { parts.instance.get_physical_device_memory_properties(phys) };
        let memory_type_index =
            pick_upload_memory_type(&memory_properties).ok_or(Error::NoHostVisibleMemory)?;

        let device = unsafe { create_device(&parts.instance, phys, queue_family_index)? };
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        let swapchain_fns = swapchain::Device::new(&parts.instance, &device);
        let object_names = parts
            .debug
            .as_ref()
            .map(|_| debug_utils::Device::new(&parts.instance, &device));

        Ok(Self {
            context: GraphicsContext {
                physical_device: phys,
                device: device.handle(),
                queue,
                queue_family_index,
                memory_type_index,
                device_name,
                api_version: props.api_version,
            },
            memory_properties,
            swapchain_fns,
            object_names,
            device,
            parts,
        })
    }

    pub fn context(&self) -> &GraphicsContext {
        &self.context
    }

    unsafe fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let ci = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_code: code.as_ptr(),
            code_size: std::mem::size_of_val(code),
            ..Default::default()
        };
        unsafe { self.device.create_shader_module(&ci, None) }
    }

    unsafe fn build_pipeline(
        &self,
        desc: &PipelineDesc<'_>,
        vs: vk::ShaderModule,
        fs: vk::ShaderModule,
    ) -> VkResult<PipelineHandles> {
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
        ];

        let binding = vk::VertexInputBindingDescription {
            binding: 0,
            stride: desc.vertex_stride,
            input_rate: vk::VertexInputRate::VERTEX,
        };
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &binding,
            vertex_attribute_description_count: desc.attributes.len() as u32,
            p_vertex_attribute_descriptions: desc.attributes.as_ptr(),
            ..Default::default()
        };
        // Topology, cull mode and front face are dynamic; these are placeholders.
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            ..Default::default()
        };
        let dyn_states = [
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::CULL_MODE,
            vk::DynamicState::FRONT_FACE,
            vk::DynamicState::PRIMITIVE_TOPOLOGY,
        ];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: dyn_states.len() as u32,
            p_dynamic_states: dyn_states.as_ptr(),
            ..Default::default()
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let blend_att = vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::TRUE,
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::R
                | vk::ColorComponentFlags::G
                | vk::ColorComponentFlags::B
                | vk::ColorComponentFlags::A,
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &blend_att,
            ..Default::default()
        };

        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            ..Default::default()
        };
        let layout = unsafe { self.device.create_pipeline_layout(&layout_info, None)? };

        // STRICT: must match the swapchain image format.
        let rendering = vk::PipelineRenderingCreateInfo {
            s_type: vk::StructureType::PIPELINE_RENDERING_CREATE_INFO,
            color_attachment_count: 1,
            p_color_attachment_formats: &desc.color_format,
            ..Default::default()
        };
        let pipeline_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            p_next: (&rendering) as *const _ as *const c_void,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_color_blend_state: &color_blend,
            p_dynamic_state: &dynamic_state,
            layout,
            ..Default::default()
        };

        match unsafe {
            self.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
        } {
            Ok(pipelines) => Ok(PipelineHandles {
                layout,
                pipeline: pipelines[0],
            }),
            Err((_, err)) => {
                unsafe { self.device.destroy_pipeline_layout(layout, None) };
                Err(err)
            }
        }
    }

    fn vertex_memory_type(&self, type_bits: u32) -> Option<u32> {
        let preferred = self.context.memory_type_index;
        if type_bits & (1 << preferred) != 0 {
            return Some(preferred);
        }
        find_memory_type(
            &self.memory_properties,
            type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    unsafe fn fill_buffer(&self, buffer: vk::Buffer, bytes: &[u8]) -> VkResult<vk::DeviceMemory> {
        let req = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = self
            .vertex_memory_type(req.memory_type_bits)
            .ok_or(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)?;
        let mai = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index,
            ..Default::default()
        };
        let memory = unsafe { self.device.allocate_memory(&mai, None)? };
        let upload = unsafe {
            self.device.bind_buffer_memory(buffer, memory, 0).and_then(|()| {
                let dst = self.device.map_memory(
                    memory,
                    0,
                    bytes.len() as vk::DeviceSize,
                    vk::MemoryMapFlags::empty(),
                )?;
                // Host-coherent: no flush needed.
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.cast::<u8>(), bytes.len());
                self.device.unmap_memory(memory);
                Ok(())
            })
        };
        match upload {
            Ok(()) => Ok(memory),
            Err(e) => {
                unsafe { self.device.free_memory(memory, None) };
                Err(e)
            }
        }
    }
}

// STRICT TEARDOWN ORDER:
// - everything created from the device is gone before this runs (FrameLoop)
// - device idle, surface, device
// - InstanceParts: debug messenger, instance
impl Drop for AshBackend {
    fn drop(&mut self) {
        if let Err(e) = Gpu::device_wait_idle(self) {
            warn!("vkDeviceWaitIdle at teardown: {e}");
        }
        unsafe {
            self.parts
                .surface_fns
                .destroy_surface(self.parts.surface, None);
            self.parts.surface = vk::SurfaceKHR::null();
            self.device.destroy_device(None);
        }
    }
}

impl Gpu for AshBackend {
    fn queue_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.queue_wait_idle(self.context.queue) }
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }

    fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.parts
                .surface_fns
                .get_physical_device_surface_capabilities(self.context.physical_device, self.parts.surface)
        }
    }

    fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.parts
                .surface_fns
                .get_physical_device_surface_formats(self.context.physical_device, self.parts.surface)
        }
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        // The previous chain is always destroyed first, so no old_swapchain.
        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: self.parts.surface,
            min_image_count: desc.min_image_count,
            image_format: desc.format.format,
            image_color_space: desc.format.color_space,
            image_extent: desc.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: desc.pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: desc.present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };
        unsafe { self.swapchain_fns.create_swapchain(&info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_fns.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_fns.destroy_swapchain(swapchain, None) }
    }

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView> {
        let info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: COLOR_RANGE,
            ..Default::default()
        };
        unsafe { self.device.create_image_view(&info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::default();
        unsafe { self.device.create_semaphore(&info, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.device.create_fence(&info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, timeout) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_fns
                .acquire_next_image(swapchain, timeout, semaphore, vk::Fence::null())
        }
    }

    fn queue_submit(&self, submit: &SubmitDesc) -> VkResult<()> {
        let wait = vk::SemaphoreSubmitInfo {
            s_type: vk::StructureType::SEMAPHORE_SUBMIT_INFO,
            semaphore: submit.wait_semaphore,
            stage_mask: submit.wait_stage,
            ..Default::default()
        };
        let signal = vk::SemaphoreSubmitInfo {
            s_type: vk::StructureType::SEMAPHORE_SUBMIT_INFO,
            semaphore: submit.signal_semaphore,
            stage_mask: vk::PipelineStageFlags2::ALL_COMMANDS,
            ..Default::default()
        };
        let cmd = vk::CommandBufferSubmitInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_SUBMIT_INFO,
            command_buffer: submit.command_buffer,
            ..Default::default()
        };
        let info = vk::SubmitInfo2 {
            s_type: vk::StructureType::SUBMIT_INFO_2,
            wait_semaphore_info_count: 1,
            p_wait_semaphore_infos: &wait,
            command_buffer_info_count: 1,
            p_command_buffer_infos: &cmd,
            signal_semaphore_info_count: 1,
            p_signal_semaphore_infos: &signal,
            ..Default::default()
        };
        unsafe {
            self.device.queue_submit2(
                self.context.queue,
                std::slice::from_ref(&info),
                submit.fence,
            )
        }
    }

    fn queue_present(&self, present: &PresentDesc) -> VkResult<bool> {
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &present.wait_semaphore,
            swapchain_count: 1,
            p_swapchains: &present.swapchain,
            p_image_indices: &present.image_index,
            ..Default::default()
        };
        unsafe { self.swapchain_fns.queue_present(self.context.queue, &info) }
    }

    fn create_command_pool(&self) -> VkResult<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: self.context.queue_family_index,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        unsafe { self.device.create_command_pool(&info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        // Frees the buffers allocated from it as well.
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let bufs = unsafe { self.device.allocate_command_buffers(&info)? };
        bufs.first()
            .copied()
            .ok_or(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        }
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let info = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe { self.device.begin_command_buffer(cmd, &info) }
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }
    }

    fn cmd_image_barrier(&self, cmd: vk::CommandBuffer, barrier: &ImageBarrier) {
        let b = vk::ImageMemoryBarrier2 {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
            src_stage_mask: barrier.src_stage,
            src_access_mask: barrier.src_access,
            dst_stage_mask: barrier.dst_stage,
            dst_access_mask: barrier.dst_access,
            old_layout: barrier.old_layout,
            new_layout: barrier.new_layout,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image: barrier.image,
            subresource_range: COLOR_RANGE,
            ..Default::default()
        };
        let dep = vk::DependencyInfo {
            s_type: vk::StructureType::DEPENDENCY_INFO,
            image_memory_barrier_count: 1,
            p_image_memory_barriers: &b,
            ..Default::default()
        };
        unsafe { self.device.cmd_pipeline_barrier2(cmd, &dep) }
    }

    fn cmd_begin_rendering(&self, cmd: vk::CommandBuffer, target: &RenderTarget) {
        let color_att = vk::RenderingAttachmentInfo {
            s_type: vk::StructureType::RENDERING_ATTACHMENT_INFO,
            image_view: target.view,
            image_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: target.clear_color,
                },
            },
            ..Default::default()
        };
        let rendering_info = vk::RenderingInfo {
            s_type: vk::StructureType::RENDERING_INFO,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            },
            layer_count: 1,
            color_attachment_count: 1,
            p_color_attachments: &color_att,
            ..Default::default()
        };
        unsafe { self.device.cmd_begin_rendering(cmd, &rendering_info) }
    }

    fn cmd_end_rendering(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_rendering(cmd) }
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline)
        }
    }

    fn cmd_set_dynamic_state(&self, cmd: vk::CommandBuffer, state: &DynamicPipelineState) {
        unsafe {
            self.device
                .cmd_set_viewport(cmd, 0, std::slice::from_ref(&state.viewport));
            self.device
                .cmd_set_scissor(cmd, 0, std::slice::from_ref(&state.scissor));
            self.device
                .cmd_set_primitive_topology(cmd, state.topology);
            self.device.cmd_set_cull_mode(cmd, state.cull_mode);
            self.device.cmd_set_front_face(cmd, state.front_face);
        }
    }

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe { self.device.cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[0]) }
    }

    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        unsafe { self.device.cmd_draw(cmd, vertex_count, instance_count, 0, 0) }
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> VkResult<PipelineHandles> {
        unsafe {
            let vs = self.create_shader_module(desc.vertex_code)?;
            let fs = match self.create_shader_module(desc.fragment_code) {
                Ok(fs) => fs,
                Err(e) => {
                    self.device.destroy_shader_module(vs, None);
                    return Err(e);
                }
            };
            let handles = self.build_pipeline(desc, vs, fs);
            // Modules are only needed during pipeline creation.
            self.device.destroy_shader_module(vs, None);
            self.device.destroy_shader_module(fs, None);
            handles
        }
    }

    fn destroy_pipeline(&self, handles: PipelineHandles) {
        unsafe {
            self.device.destroy_pipeline(handles.pipeline, None);
            self.device.destroy_pipeline_layout(handles.layout, None);
        }
    }

    fn create_vertex_buffer(&self, bytes: &[u8]) -> VkResult<BufferAllocation> {
        let size = bytes.len() as vk::DeviceSize;
        let bci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage: vk::BufferUsageFlags::VERTEX_BUFFER,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        unsafe {
            let buffer = self.device.create_buffer(&bci, None)?;
            match self.fill_buffer(buffer, bytes) {
                Ok(memory) => Ok(BufferAllocation {
                    buffer,
                    memory,
                    size,
                }),
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    Err(e)
                }
            }
        }
    }

    fn destroy_buffer(&self, allocation: BufferAllocation) {
        unsafe {
            self.device.destroy_buffer(allocation.buffer, None);
            self.device.free_memory(allocation.memory, None);
        }
    }

    fn set_object_name(&self, object_type: vk::ObjectType, handle: u64, name: &str) {
        let Some(fns) = &self.object_names else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_OBJECT_NAME_INFO_EXT,
            object_type,
            object_handle: handle,
            p_object_name: name.as_ptr(),
            ..Default::default()
        };
        if let Err(e) = unsafe { fns.set_debug_utils_object_name(&info) } {
            trace!("naming {object_type:?} failed: {e}");
        }
    }
}
