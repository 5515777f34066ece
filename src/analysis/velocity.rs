//! # Velocity Tracking
//!
//! Per-axis movement speed over three horizons, fed once per sample tick.
//!
//! The instantaneous value is the absolute delta between the two newest
//! samples. The short-term value averages deltas over a fifth of a second;
//! the long-term value averages the short-term series over a full second.
//! All three are unsigned speeds, not signed velocities.

/// Rolling movement speed for one analog axis.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    fps: usize,
    tick: usize,
    /// Newest fps/5 raw samples, ring-indexed by tick.
    buffer: Vec<f32>,
    /// One short-term value per tick of the last second.
    history: Vec<f32>,
    instant: f32,
    short_term: f32,
    long_term: f32,
}

impl VelocityTracker {
    /// Creates a tracker for a stream sampled `fps` times per second.
    #[must_use]
    pub fn new(fps: u32) -> Self {
        let fps = fps.max(1) as usize;
        Self {
            fps,
            tick: 0,
            buffer: vec![0.0; (fps / 5).max(1)],
            history: vec![0.0; fps],
            instant: 0.0,
            short_term: 0.0,
            long_term: 0.0,
        }
    }

    /// Absolute sample-to-sample delta between the buffer slot and its
    /// predecessor.
    fn delta_at(&self, index: usize) -> f32 {
        let len = self.buffer.len();
        (self.buffer[index % len] - self.buffer[(index + len - 1) % len]).abs()
    }

    /// Feeds the next sample and refreshes all three horizons.
    pub fn tick(&mut self, value: f32) {
        self.tick = (self.tick + 1) % self.fps;
        let slot = self.tick % self.buffer.len();
        self.buffer[slot] = value;

        self.instant = self.delta_at(slot);
        let len = self.buffer.len();
        self.short_term = (0..len).map(|i| self.delta_at(i)).sum::<f32>() / len as f32;
        self.history[self.tick] = self.short_term;
        self.long_term = self.history.iter().sum::<f32>() / self.fps as f32;
    }

    /// Speed between the two newest samples.
    #[must_use]
    pub fn instant(&self) -> f32 {
        self.instant
    }

    /// Mean speed over the last fifth of a second.
    #[must_use]
    pub fn short_term(&self) -> f32 {
        self.short_term
    }

    /// Mean short-term speed over the last second.
    #[must_use]
    pub fn long_term(&self) -> f32 {
        self.long_term
    }
}

/// Trigger axes use the same machinery as stick axes.
pub type TriggerVelocityTracker = VelocityTracker;

/// Paired trackers for a two-axis stick.
#[derive(Debug, Clone)]
pub struct StickVelocityTracker {
    x: VelocityTracker,
    y: VelocityTracker,
}

impl StickVelocityTracker {
    #[must_use]
    pub fn new(fps: u32) -> Self {
        Self {
            x: VelocityTracker::new(fps),
            y: VelocityTracker::new(fps),
        }
    }

    pub fn tick(&mut self, x: f32, y: f32) {
        self.x.tick(x);
        self.y.tick(y);
    }

    #[must_use]
    pub fn x(&self) -> &VelocityTracker {
        &self.x
    }

    #[must_use]
    pub fn y(&self) -> &VelocityTracker {
        &self.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPS: u32 = 60;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_new_tracker_reports_zero() {
        let tracker = VelocityTracker::new(FPS);
        assert_close(tracker.instant(), 0.0);
        assert_close(tracker.short_term(), 0.0);
        assert_close(tracker.long_term(), 0.0);
    }

    #[test]
    fn test_constant_input_settles_to_zero() {
        let mut tracker = VelocityTracker::new(FPS);
        // One full second plus the short-term window flushes the transient
        // from the initial zeroed buffers.
        for _ in 0..80 {
            tracker.tick(0.5);
        }
        assert_close(tracker.instant(), 0.0);
        assert_close(tracker.short_term(), 0.0);
        assert_close(tracker.long_term(), 0.0);
    }

    #[test]
    fn test_instant_is_latest_delta() {
        let mut tracker = VelocityTracker::new(FPS);
        for _ in 0..20 {
            tracker.tick(0.0);
        }
        tracker.tick(0.25);
        assert_close(tracker.instant(), 0.25);
        tracker.tick(0.25);
        assert_close(tracker.instant(), 0.0);
    }

    #[test]
    fn test_alternating_input_saturates_instant_and_short_term() {
        let mut tracker = VelocityTracker::new(FPS);
        for i in 0..100 {
            tracker.tick((i % 2) as f32);
            if i >= 12 {
                assert_close(tracker.instant(), 1.0);
                assert_close(tracker.short_term(), 1.0);
            }
        }
        assert_close(tracker.long_term(), 1.0);
    }

    #[test]
    fn test_instant_is_unsigned() {
        let mut tracker = VelocityTracker::new(FPS);
        for _ in 0..20 {
            tracker.tick(0.5);
        }
        tracker.tick(0.1);
        assert_close(tracker.instant(), 0.4);
    }

    #[test]
    fn test_short_term_averages_the_window() {
        let mut tracker = VelocityTracker::new(FPS);
        for _ in 0..20 {
            tracker.tick(0.0);
        }
        tracker.tick(0.6);
        // The step contributes twice around the ring, all other deltas are
        // zero. Window is fps/5 slots wide.
        assert_close(tracker.short_term(), 0.6 * 2.0 / 12.0);
    }

    #[test]
    fn test_long_term_lags_short_term() {
        let mut tracker = VelocityTracker::new(FPS);
        for _ in 0..20 {
            tracker.tick(0.0);
        }
        tracker.tick(1.0);
        assert!(tracker.long_term() < tracker.short_term());
        assert!(tracker.long_term() > 0.0);
    }

    #[test]
    fn test_low_fps_keeps_one_slot_buffer() {
        // fps below five would otherwise size the ring to zero.
        let mut tracker = VelocityTracker::new(3);
        tracker.tick(1.0);
        tracker.tick(0.0);
        assert_close(tracker.instant(), 0.0);
    }

    #[test]
    fn test_stick_tracks_axes_independently() {
        let mut stick = StickVelocityTracker::new(FPS);
        for _ in 0..20 {
            stick.tick(0.0, 0.5);
        }
        stick.tick(0.3, 0.5);
        assert_close(stick.x().instant(), 0.3);
        assert_close(stick.y().instant(), 0.0);
    }
}
