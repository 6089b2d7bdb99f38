// SPDX-License-Identifier: CEPL-1.0
//! Presentation policy: which format, extent, image count and transform a
//! swapchain is built with for the current surface state.

use ash::vk;
use prism_render::{ColorFormat, RenderSize};

pub const COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;
pub const PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

pub fn preferred_format(pref: ColorFormat) -> vk::Format {
    match pref {
        ColorFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        ColorFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
    }
}

/// Picks a (format, colorspace) pair in the fixed sRGB colorspace.
pub fn pick_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::Format,
) -> Option<(vk::SurfaceFormatKHR, &'static str)> {
    // A lone UNDEFINED entry means the surface takes anything.
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED {
            let f = vk::SurfaceFormatKHR {
                format: preferred,
                color_space: COLOR_SPACE,
            };
            return Some((f, "unconstrained"));
        }
    }

    let in_srgb = |want: vk::Format| {
        formats
            .iter()
            .copied()
            .find(|f| f.format == want && f.color_space == COLOR_SPACE)
    };

    if let Some(f) = in_srgb(preferred) {
        return Some((f, "preferred"));
    }
    for (fallback, reason) in [
        (vk::Format::B8G8R8A8_SRGB, "sdr_bgra8_srgb"),
        (vk::Format::R8G8B8A8_SRGB, "sdr_rgba8_srgb"),
        (vk::Format::B8G8R8A8_UNORM, "sdr_bgra8_unorm_srgbcs"),
    ] {
        if let Some(f) = in_srgb(fallback) {
            return Some((f, reason));
        }
    }
    formats
        .iter()
        .copied()
        .find(|f| f.color_space == COLOR_SPACE)
        .or_else(|| formats.first().copied())
        .map(|f| (f, "driver_default"))
}

/// `current_extent == u32::MAX` means the window decides, within min/max.
pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

pub fn is_zero_extent(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

/// One more than the minimum, capped by the maximum (0 == no max).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}

pub fn choose_pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

// Info only
pub fn fmt_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        _ => "OTHER",
    }
}

pub fn cs_name(cs: vk::ColorSpaceKHR) -> &'static str {
    match cs {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => "SRGB_NONLINEAR",
        _ => "OTHER",
    }
}
