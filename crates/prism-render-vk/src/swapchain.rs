// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use ash::vk;
use prism_render::RenderSize;
use tracing::{debug, info};

use crate::error::{Error, Result, VkResultExt};
use crate::gpu::{name_object, Gpu, RenderTarget, SwapchainDesc};
use crate::resources::{ImageView, SwapchainHandle};
use crate::surface::{
    choose_image_count, choose_pre_transform, cs_name, extent_from_caps, fmt_name,
    is_zero_extent, PRESENT_MODE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recreation {
    Rebuilt,
    /// The surface has no area; the old chain is kept and stays stale.
    Deferred,
}

/// The presentable images and our views of them.
///
/// Field order is teardown order: views, then the chain.
pub struct Swapchain {
    views: Vec<ImageView>,
    images: Vec<vk::Image>,
    handle: SwapchainHandle,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    stale: bool,
    generation: u64,
    gpu: Rc<dyn Gpu>,
}

struct Chain {
    handle: SwapchainHandle,
    images: Vec<vk::Image>,
    views: Vec<ImageView>,
    extent: vk::Extent2D,
}

fn build_chain(
    gpu: &Rc<dyn Gpu>,
    format: vk::SurfaceFormatKHR,
    hint: RenderSize,
) -> Result<Option<Chain>> {
    let caps = gpu
        .surface_capabilities()
        .call("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
    let extent = extent_from_caps(&caps, hint);
    if is_zero_extent(extent) {
        return Ok(None);
    }

    let desc = SwapchainDesc {
        min_image_count: choose_image_count(&caps),
        format,
        extent,
        pre_transform: choose_pre_transform(&caps),
        present_mode: PRESENT_MODE,
    };
    let handle = SwapchainHandle::new(
        gpu,
        gpu.create_swapchain(&desc).call("vkCreateSwapchainKHR")?,
    );
    let images = gpu
        .swapchain_images(handle.raw())
        .call("vkGetSwapchainImagesKHR")?;
    name_object(&**gpu, handle.raw(), "swapchain");

    let mut views = Vec::with_capacity(images.len());
    for (i, &image) in images.iter().enumerate() {
        let view = gpu
            .create_image_view(image, format.format)
            .call("vkCreateImageView")?;
        name_object(&**gpu, view, &format!("swapchain view {i}"));
        views.push(ImageView::new(gpu, view));
    }

    Ok(Some(Chain {
        handle,
        images,
        views,
        extent,
    }))
}

impl Swapchain {
    pub fn create(gpu: &Rc<dyn Gpu>, format: vk::SurfaceFormatKHR, hint: RenderSize) -> Result<Self> {
        let chain = build_chain(gpu, format, hint)?.ok_or(Error::ZeroExtent)?;
        info!(
            "swapchain: {}x{} {} / {} images={} (FIFO)",
            chain.extent.width,
            chain.extent.height,
            fmt_name(format.format),
            cs_name(format.color_space),
            chain.images.len()
        );
        Ok(Self {
            views: chain.views,
            images: chain.images,
            handle: chain.handle,
            format,
            extent: chain.extent,
            stale: false,
            generation: 0,
            gpu: Rc::clone(gpu),
        })
    }

    /// Rebuilds the chain for the current surface, keeping format and
    /// present policy.
    pub fn recreate(&mut self, hint: RenderSize) -> Result<Recreation> {
        let caps = self
            .gpu
            .surface_capabilities()
            .call("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        if is_zero_extent(extent_from_caps(&caps, hint)) {
            debug!("surface is 0x0, recreation deferred");
            return Ok(Recreation::Deferred);
        }

        // STRICT ORDER: queue idle, views, chain, then the new chain.
        self.gpu.queue_wait_idle().call("vkQueueWaitIdle")?;
        for view in &mut self.views {
            view.release();
        }
        self.views.clear();
        self.images.clear();
        self.handle.release();

        let Some(chain) = build_chain(&self.gpu, self.format, hint)? else {
            // The surface shrank to nothing between the two queries.
            return Ok(Recreation::Deferred);
        };
        self.views = chain.views;
        self.images = chain.images;
        self.handle = chain.handle;
        self.extent = chain.extent;
        self.stale = false;
        self.generation += 1;

        info!(
            "swapchain rebuilt: {}x{} images={} generation={}",
            self.extent.width,
            self.extent.height,
            self.images.len(),
            self.generation
        );
        Ok(Recreation::Rebuilt)
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// False only after a recreation was deferred past the old chain's teardown.
    pub fn is_alive(&self) -> bool {
        !self.images.is_empty()
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle.raw()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target(&self, image_index: u32, clear_color: [f32; 4]) -> Result<RenderTarget> {
        let i = image_index as usize;
        match (self.images.get(i), self.views.get(i)) {
            (Some(&image), Some(view)) => Ok(RenderTarget {
                image,
                view: view.raw(),
                extent: self.extent,
                clear_color,
            }),
            _ => Err(Error::ImageIndex {
                index: image_index,
                count: self.images.len(),
            }),
        }
    }
}
