use std::time::{Duration, Instant};
use tracing::{debug, info, Level};

/// Timer for measuring how long a generation stage takes
pub struct Timer {
    operation: String,
    start: Instant,
    log_level: Level,
    stopped: bool,
}

impl Timer {
    /// Start a new timer with info level logging
    pub fn start(operation: impl Into<String>) -> Self {
        Self::with_level(operation, Level::INFO)
    }

    /// Start a new timer with debug level logging
    pub fn start_debug(operation: impl Into<String>) -> Self {
        Self::with_level(operation, Level::DEBUG)
    }

    fn with_level(operation: impl Into<String>, log_level: Level) -> Self {
        Self {
            operation: operation.into(),
            start: Instant::now(),
            log_level,
            stopped: false,
        }
    }

    /// Get elapsed time without stopping the timer
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and log the duration
    pub fn stop(mut self) {
        self.log(None);
    }

    /// Stop the timer with a custom message
    pub fn stop_with_message(mut self, message: &str) {
        self.log(Some(message));
    }

    fn log(&mut self, message: Option<&str>) {
        self.stopped = true;
        let duration_us = self.start.elapsed().as_micros() as u64;
        let message = message.unwrap_or("");
        if self.log_level == Level::INFO {
            info!(operation = %self.operation, duration_us, message, "Operation completed");
        } else {
            debug!(operation = %self.operation, duration_us, message, "Operation completed");
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        // Early returns through `?` drop the timer without stopping it
        if !self.stopped {
            debug!(
                operation = %self.operation,
                duration_us = self.start.elapsed().as_micros() as u64,
                "Operation abandoned"
            );
        }
    }
}

/// Macro for timing a block of code with debug level
#[macro_export]
macro_rules! time_debug {
    ($operation:expr, $block:block) => {{
        let _timer = $crate::core::metrics::Timer::start_debug($operation);
        let result = $block;
        _timer.stop();
        result
    }};
}
