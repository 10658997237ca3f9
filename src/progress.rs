//! Progress reporting for fetch and install operations
//!
//! Progress is surfaced through a line-oriented sink: a one-way notification
//! callback invoked synchronously during fetch with human-readable text. It
//! is purely advisory; there is no backpressure and no ordering guarantee
//! beyond fetch order.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

/// Advisory line sink invoked zero or more times during fetch.
pub type ProgressSink = Arc<dyn Fn(&str) + Send + Sync>;

/// A sink that drops every line. Used by dry runs and tests.
pub fn silent() -> ProgressSink {
    Arc::new(|_line| {})
}

/// A sink that forwards lines to a spinner on stderr.
pub fn spinner() -> ProgressSink {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Arc::new(move |line| {
        pb.set_message(line.trim_end().to_string());
    })
}

/// Bundle-level progress bar for batch operations.
pub struct BatchProgress {
    bundle_pb: ProgressBar,
}

impl BatchProgress {
    /// Create a new batch progress display with total bundle count
    pub fn new(total_bundles: u64) -> Self {
        let bundle_pb = ProgressBar::new(total_bundles);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bundle_pb.set_style(style.progress_chars("#>-"));
        }
        Self { bundle_pb }
    }

    /// Update to show the bundle currently being processed
    pub fn update_bundle(&self, bundle_name: &str) {
        self.bundle_pb.set_message(bundle_name.to_string());
    }

    /// Increment bundle progress
    pub fn inc_bundle(&self) {
        self.bundle_pb.inc(1);
    }

    /// Finish on success
    pub fn finish(&self) {
        self.bundle_pb.finish_and_clear();
    }
}
