//! Delay providers.
//!
//! Every blocking wait in the crate goes through [`DelayNs`], so tests can
//! run whole prints without sleeping.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Returns immediately and records every requested delay in milliseconds.
///
/// Clones share one record.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    record: Arc<Mutex<Vec<u32>>>,
}

impl RecordingDelay {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded delays, oldest first.
    pub fn delays(&self) -> Vec<u32> {
        self.record.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Sum of recorded delays in milliseconds.
    pub fn total_ms(&self) -> u64 {
        self.delays().iter().map(|d| u64::from(*d)).sum()
    }

    /// Forget recorded delays.
    pub fn clear(&self) {
        if let Ok(mut record) = self.record.lock() {
            record.clear();
        }
    }

    fn push(&self, ms: u32) {
        if let Ok(mut record) = self.record.lock() {
            record.push(ms);
        }
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.push(ns / 1_000_000);
    }

    fn delay_us(&mut self, us: u32) {
        self.push(us / 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.push(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_delay_shares_record() {
        let delay = RecordingDelay::new();
        let mut clone = delay.clone();
        clone.delay_ms(1000);
        clone.delay_ms(250);
        assert_eq!(delay.delays(), vec![1000, 250]);
        assert_eq!(delay.total_ms(), 1250);
        delay.clear();
        assert!(delay.delays().is_empty());
    }
}
