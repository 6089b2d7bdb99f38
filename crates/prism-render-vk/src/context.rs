// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

/// Device-level facts fixed at startup.
#[derive(Clone, Debug)]
pub struct GraphicsContext {
    pub physical_device: vk::PhysicalDevice,
    pub device: vk::Device,
    pub queue: vk::Queue,
    pub queue_family_index: u32,
    /// Host-visible, host-coherent; device-local when the device offers it.
    pub memory_type_index: u32,
    pub device_name: String,
    pub api_version: u32,
}

pub const MIN_API_VERSION: u32 = vk::API_VERSION_1_3;

pub fn version_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

pub fn supports_required_api(version: u32) -> bool {
    let (maj, min) = (vk::api_version_major(version), vk::api_version_minor(version));
    maj > 1 || (maj == 1 && min >= 3)
}

/// First memory type allowed by `type_bits` whose flags contain `required`.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count).find(|&i| {
        (type_bits & (1 << i)) != 0
            && props.memory_types[i as usize]
                .property_flags
                .contains(required)
    })
}

/// Memory type for CPU-written vertex data: prefer memory the GPU reads
/// fast, accept any mappable coherent memory.
pub fn pick_upload_memory_type(props: &vk::PhysicalDeviceMemoryProperties) -> Option<u32> {
    let mappable = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
    find_memory_type(props, u32::MAX, mappable | vk::MemoryPropertyFlags::DEVICE_LOCAL)
        .or_else(|| find_memory_type(props, u32::MAX, mappable))
}

/// Index of the first graphics-capable family that can present.
pub fn pick_queue_family(
    families: &[vk::QueueFamilyProperties],
    mut can_present: impl FnMut(u32) -> bool,
) -> Option<u32> {
    families
        .iter()
        .enumerate()
        .filter(|(_, q)| q.queue_flags.contains(vk::QueueFlags::GRAPHICS) && q.queue_count > 0)
        .map(|(i, _)| i as u32)
        .find(|&i| can_present(i))
}

pub fn queue_flags_name(flags: vk::QueueFlags) -> String {
    let names = [
        (vk::QueueFlags::GRAPHICS, "GRAPHICS"),
        (vk::QueueFlags::COMPUTE, "COMPUTE"),
        (vk::QueueFlags::TRANSFER, "TRANSFER"),
        (vk::QueueFlags::SPARSE_BINDING, "SPARSE_BINDING"),
        (vk::QueueFlags::PROTECTED, "PROTECTED"),
    ];
    names
        .iter()
        .filter(|(bit, _)| flags.contains(*bit))
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}
