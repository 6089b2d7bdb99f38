// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use prism_core::{init_tracing, FrameStats};
use prism_render::{FrameOutcome, RenderConfig, RenderSize, Renderer};
use prism_render_vk::VkRenderer;
use tracing::{debug, error, info};

use prism_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use config::AppCfg;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file; missing means defaults
    #[arg(long, default_value = "prism.toml")]
    config: PathBuf,
    /// Exit after this many presented frames
    #[arg(long)]
    frames: Option<u64>,
    /// Force validation layers on
    #[arg(long)]
    validation: bool,
}

struct App {
    cfg: AppCfg,
    render_cfg: RenderConfig,
    frame_limit: Option<u64>,

    // renderer before window: the surface must go before the window it targets
    renderer: Option<VkRenderer>,
    window: Option<Window>,
    render_size: RenderSize,

    exiting: bool,
    occluded: bool,
    stats: FrameStats,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(args: &Args, cfg: AppCfg) -> Self {
        let render_cfg = cfg.render.to_render_config(args.validation);
        Self {
            cfg,
            render_cfg,
            frame_limit: args.frames,
            renderer: None,
            window: None,
            render_size: RenderSize::new(0, 0),
            exiting: false,
            occluded: false,
            stats: FrameStats::new(Instant::now()),
            failure: None,
        }
    }

    fn paused(&self) -> bool {
        self.occluded || self.render_size.is_zero()
    }

    /// Records the error, tears the renderer down and leaves the loop.
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.failure = Some(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.renderer = None;
        self.window = None;
        event_loop.exit();
    }

    fn create_window_and_renderer(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = prism_platform::window_attributes(
            &self.cfg.window.title,
            self.cfg.window.width,
            self.cfg.window.height,
        );
        let window = event_loop.create_window(attrs).context("creating the window")?;
        let size = window.inner_size();
        self.render_size = RenderSize::new(size.width, size.height);

        let renderer = VkRenderer::new(&window, &window, self.render_size, &self.render_cfg)?;
        info!(
            "renderer ready: {}x{}",
            self.render_size.width, self.render_size.height
        );

        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        match renderer.render() {
            Ok(FrameOutcome::Presented { .. }) => self.stats.record_presented(),
            Ok(outcome) => {
                debug!(?outcome, "frame not presented");
                self.stats.record_skipped();
            }
            Err(e) => {
                self.fail(event_loop, e.context("rendering a frame"));
                return;
            }
        }

        if let Some(limit) = self.frame_limit {
            if self.stats.total_presented() >= limit {
                info!("presented {limit} frames, exiting");
                self.shutdown(event_loop);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_renderer(event_loop) {
                self.fail(event_loop, e);
                return;
            }
        }

        event_loop.set_control_flow(ControlFlow::Wait);
        info!("resumed → paused={}", self.paused());
        if !self.paused() {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        match &self.window {
            Some(window) if window.id() == window_id => {}
            _ => return,
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                let was_paused = self.paused();
                self.render_size = RenderSize::new(new_size.width, new_size.height);
                info!(
                    "Resized → {}x{} (paused={})",
                    new_size.width,
                    new_size.height,
                    self.paused()
                );
                if let Some(renderer) = self.renderer.as_mut() {
                    if let Err(e) = renderer.resize(self.render_size) {
                        self.fail(event_loop, e.context("resizing"));
                        return;
                    }
                }
                if was_paused && !self.paused() {
                    self.stats.reset(Instant::now());
                }
                if !self.paused() {
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
            }

            WindowEvent::Occluded(occluded) => {
                if self.occluded != occluded {
                    self.occluded = occluded;
                    info!("Occluded={} → paused={}", occluded, self.paused());
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting || self.paused() {
                    return;
                }
                self.redraw(event_loop);
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        let now = Instant::now();
        if self.paused() {
            self.stats.reset(now);
            return;
        }

        // FIFO present paces us, so one redraw per loop turn is enough.
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        if let Some(sample) = self.stats.tick(now) {
            info!(
                "fps ~ {:.1} (presented={}, skipped={})",
                sample.fps, sample.presented, sample.skipped
            );
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = config::load(&args.config);
    let event_loop: EventLoop<()> = EventLoop::new()?;

    let mut app = App::new(&args, cfg);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
