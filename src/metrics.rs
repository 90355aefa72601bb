use crate::http::Status;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A simple counter that can be incremented atomically
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicUsize,
}

impl Counter {
    /// Create a new counter with an initial value
    pub fn new(initial_value: usize) -> Self {
        Self {
            value: AtomicUsize::new(initial_value),
        }
    }

    /// Increment the counter by a specific amount
    pub fn increment(&self, amount: usize) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Get the current value of the counter
    pub fn value(&self) -> usize {
        self.value.load(Ordering::Relaxed)
    }
}

/// Outcome counters for served requests
#[derive(Debug, Default)]
pub struct ServeMetrics {
    pub ok: Counter,
    pub not_modified: Counter,
    pub not_found: Counter,
    pub server_error: Counter,
    pub other: Counter,
    pub body_bytes_sent: Counter,
}

impl ServeMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one response
    pub fn record(&self, status: Status, body_len: usize) {
        let counter = match status {
            Status::Ok => &self.ok,
            Status::NotModified => &self.not_modified,
            Status::NotFound => &self.not_found,
            Status::InternalServerError => &self.server_error,
            _ => &self.other,
        };
        counter.increment(1);
        self.body_bytes_sent.increment(body_len);
    }

    /// Total responses recorded
    pub fn total(&self) -> usize {
        self.ok.value()
            + self.not_modified.value()
            + self.not_found.value()
            + self.server_error.value()
            + self.other.value()
    }

    /// Get metrics as a formatted string
    pub fn format(&self) -> String {
        format!(
            "responses.200: {}\nresponses.304: {}\nresponses.404: {}\nresponses.500: {}\nresponses.other: {}\nbody_bytes_sent: {}\n",
            self.ok.value(),
            self.not_modified.value(),
            self.not_found.value(),
            self.server_error.value(),
            self.other.value(),
            self.body_bytes_sent.value()
        )
    }
}
