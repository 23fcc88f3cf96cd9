use std::time::Instant;

/// Measures elapsed wall-clock time for a single operation, used around
/// health-check attempts and pipeline steps in log fields.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
