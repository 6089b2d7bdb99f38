// SPDX-License-Identifier: CEPL-1.0
pub use winit;

use winit::dpi::LogicalSize;
use winit::window::{Window, WindowAttributes};

/// Attributes for the single presentation window.
pub fn window_attributes(title: &str, width: u32, height: u32) -> WindowAttributes {
    Window::default_attributes()
        .with_title(title)
        .with_inner_size(LogicalSize::new(width.max(1), height.max(1)))
}
