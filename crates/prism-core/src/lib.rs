// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::time::{Duration, Instant};

/// Installs the global fmt subscriber. `RUST_LOG` wins when set, otherwise `info`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// One completed measurement window of [`FrameStats`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FpsSample {
    pub presented: u32,
    pub skipped: u32,
    pub fps: f32,
}

/// Counts frame completions and reports them roughly once per second.
#[derive(Debug)]
pub struct FrameStats {
    window: Duration,
    window_start: Instant,
    presented: u32,
    skipped: u32,
    total_presented: u64,
}

impl FrameStats {
    pub fn new(now: Instant) -> Self {
        Self::with_window(now, Duration::from_secs(1))
    }

    pub fn with_window(now: Instant, window: Duration) -> Self {
        Self {
            window,
            window_start: now,
            presented: 0,
            skipped: 0,
            total_presented: 0,
        }
    }

    pub fn record_presented(&mut self) {
        self.presented = self.presented.saturating_add(1);
        self.total_presented += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped = self.skipped.saturating_add(1);
    }

    pub fn total_presented(&self) -> u64 {
        self.total_presented
    }

    /// Drops the current window without reporting it (used while paused).
    pub fn reset(&mut self, now: Instant) {
        self.window_start = now;
        self.presented = 0;
        self.skipped = 0;
    }

    /// Closes the window once it is at least `window` long.
    pub fn tick(&mut self, now: Instant) -> Option<FpsSample> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        let sample = FpsSample {
            presented: self.presented,
            skipped: self.skipped,
            fps: self.presented as f32 / elapsed.as_secs_f32(),
        };
        self.reset(now);
        Some(sample)
    }
}
