//! Packet pacing against the original capture timeline.

use tokio::time::{sleep_until, Duration, Instant};

/// Schedules sends so inter-packet gaps match the capture, scaled by a
/// speed multiplier.
///
/// The target send time for a packet is computed from a fixed baseline,
/// `start + (offset - first_offset) / speed` on the monotonic clock, not
/// from the previous packet, so scheduling jitter cannot accumulate into
/// drift. A packet already past its target time sends immediately; the
/// schedule never rewinds. Speed 0 disables pacing entirely.
pub struct Scheduler {
    speed: f64,
    baseline: Option<Baseline>,
}

struct Baseline {
    started: Instant,
    first_offset_us: u64,
}

impl Scheduler {
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            baseline: None,
        }
    }

    /// Wait until the packet recorded at `offset_us` is due.
    ///
    /// The first call establishes the baseline and returns immediately.
    pub async fn pace(&mut self, offset_us: u64) {
        if self.speed <= 0.0 {
            return;
        }
        let baseline = self.baseline.get_or_insert_with(|| Baseline {
            started: Instant::now(),
            first_offset_us: offset_us,
        });
        let elapsed_us = offset_us.saturating_sub(baseline.first_offset_us);
        let scaled_us = (elapsed_us as f64 / self.speed) as u64;
        sleep_until(baseline.started + Duration::from_micros(scaled_us)).await;
    }
}
