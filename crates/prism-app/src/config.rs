// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use prism_render::{ColorFormat, RenderConfig};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "prism".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceFormatCfg {
    #[default]
    Bgra8Srgb,
    Rgba8Srgb,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub surface_format: SurfaceFormatCfg,
    /// Unset means on in debug builds, off in release.
    pub validation: Option<bool>,
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: RenderConfig::default().clear_color,
            surface_format: SurfaceFormatCfg::default(),
            validation: None,
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

impl RenderCfg {
    /// `force_validation` comes from the command line and overrides the file.
    pub fn to_render_config(&self, force_validation: bool) -> RenderConfig {
        let defaults = RenderConfig::default();
        RenderConfig {
            clear_color: self.clear_color,
            color_format: match self.surface_format {
                SurfaceFormatCfg::Bgra8Srgb => ColorFormat::Bgra8Srgb,
                SurfaceFormatCfg::Rgba8Srgb => ColorFormat::Rgba8Srgb,
            },
            validation: force_validation || self.validation.unwrap_or(defaults.validation),
            vertex_shader: self.vertex_shader.clone(),
            fragment_shader: self.fragment_shader.clone(),
        }
    }
}

pub fn parse(text: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str(text)
}

/// Reads the config file. Missing file: defaults. Malformed file: warning, defaults.
pub fn load(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(text) => match parse(&text) {
            Ok(cfg) => {
                info!("config loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("{}: {e}; using defaults", path.display());
                AppCfg::default()
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => AppCfg::default(),
        Err(e) => {
            warn!("cannot read {}: {e}; using defaults", path.display());
            AppCfg::default()
        }
    }
}
