//! Stage timing.

use std::time::Instant;
use tracing::info;

/// Logs how long a stage took when finished.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let secs = self.start.elapsed().as_secs_f64();
        if secs >= 60.0 {
            info!("[{:.1}m] {}", secs / 60.0, self.name);
        } else {
            info!("[{:.1}s] {}", secs, self.name);
        }
    }
}
