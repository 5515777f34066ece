//! # Press Density
//!
//! How busy the player's fingers are, as a recency-weighted press rate.
//!
//! Every tick records the number of rising button edges in that frame into a
//! sixty-second ring. The density reading splits the ring, counted backwards
//! from the newest slot, into three age brackets and mixes their per-slot
//! press rates with weights favoring the recent past:
//!
//! | Bracket (age) | Share of ring | Weight |
//! |---------------|---------------|--------|
//! | newest        | 1/8           | 0.75   |
//! | middle        | 3/8           | 0.15   |
//! | oldest        | 1/2           | 0.10   |

use crate::input::{ButtonId, InputSample};

/// Face, bumper, stick and menu buttons. Trigger pulls are analog gestures
/// and would dominate the count.
const MONITORED: [ButtonId; 11] = [
    ButtonId::A,
    ButtonId::B,
    ButtonId::X,
    ButtonId::Y,
    ButtonId::LeftBumper,
    ButtonId::RightBumper,
    ButtonId::Back,
    ButtonId::Start,
    ButtonId::LeftStick,
    ButtonId::RightStick,
    ButtonId::Guide,
];

/// Rolling press-rate tracker over the last sixty seconds.
#[derive(Debug, Clone)]
pub struct DensityTracker {
    fps: usize,
    tick: usize,
    time_tick: usize,
    /// Rising-edge counts, one slot per tick, sixty seconds deep.
    buffer: Vec<u32>,
    last_state: [bool; MONITORED.len()],
}

impl DensityTracker {
    #[must_use]
    pub fn new(fps: u32) -> Self {
        let fps = fps.max(1) as usize;
        Self {
            fps,
            tick: 0,
            time_tick: 0,
            buffer: vec![0; 60 * fps],
            last_state: [false; MONITORED.len()],
        }
    }

    fn position(&self) -> usize {
        self.tick + self.time_tick * self.fps
    }

    /// Records the rising edges of one frame.
    pub fn tick(&mut self, sample: &InputSample) {
        self.tick = (self.tick + 1) % self.fps;
        if self.tick == 0 {
            self.time_tick = (self.time_tick + 1) % 60;
        }

        let mut edges = 0;
        for (slot, id) in MONITORED.iter().enumerate() {
            let pressed = sample.button(*id);
            if pressed && !self.last_state[slot] {
                edges += 1;
            }
            self.last_state[slot] = pressed;
        }
        let position = self.position();
        self.buffer[position] = edges;
    }

    /// Weighted presses-per-second reading.
    #[must_use]
    pub fn get(&self) -> f32 {
        let len = self.buffer.len();
        let position = self.position();
        let brackets = [
            (0, len / 8, 0.75_f32),
            (len / 8, len / 2, 0.15),
            (len / 2, len, 0.10),
        ];

        brackets
            .into_iter()
            .map(|(from, to, weight)| {
                let presses: u32 = (from..to)
                    .map(|age| self.buffer[(position + len - age) % len])
                    .sum();
                weight * presses as f32 / (to - from) as f32 * 60.0
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPS: u32 = 60;

    fn pressed(id: ButtonId) -> InputSample {
        let mut sample = InputSample::default();
        match id {
            ButtonId::A => sample.btn_a = true,
            ButtonId::B => sample.btn_b = true,
            _ => unimplemented!("extend as tests need more buttons"),
        }
        sample
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-5,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_idle_density_is_zero() {
        let mut tracker = DensityTracker::new(FPS);
        for _ in 0..100 {
            tracker.tick(&InputSample::default());
        }
        assert_close(tracker.get(), 0.0);
    }

    #[test]
    fn test_single_fresh_press_reads_the_newest_bracket() {
        let mut tracker = DensityTracker::new(FPS);
        tracker.tick(&pressed(ButtonId::A));

        // One edge in the newest bracket of 450 slots.
        assert_close(tracker.get(), 0.75 / 450.0 * 60.0);
    }

    #[test]
    fn test_held_button_counts_one_edge() {
        let mut tracker = DensityTracker::new(FPS);
        for _ in 0..30 {
            tracker.tick(&pressed(ButtonId::A));
        }
        assert_close(tracker.get(), 0.75 / 450.0 * 60.0);
    }

    #[test]
    fn test_release_and_repress_counts_two_edges() {
        let mut tracker = DensityTracker::new(FPS);
        tracker.tick(&pressed(ButtonId::A));
        tracker.tick(&InputSample::default());
        tracker.tick(&pressed(ButtonId::A));
        assert_close(tracker.get(), 2.0 * 0.75 / 450.0 * 60.0);
    }

    #[test]
    fn test_simultaneous_presses_count_separately() {
        let mut tracker = DensityTracker::new(FPS);
        let mut sample = InputSample::default();
        sample.btn_a = true;
        sample.btn_b = true;
        tracker.tick(&sample);
        assert_close(tracker.get(), 2.0 * 0.75 / 450.0 * 60.0);
    }

    #[test]
    fn test_trigger_pulls_are_not_counted() {
        let mut tracker = DensityTracker::new(FPS);
        let mut sample = InputSample::default();
        sample.btn_lt = true;
        sample.btn_rt = true;
        sample.left_trigger = 1.0;
        tracker.tick(&sample);
        assert_close(tracker.get(), 0.0);
    }

    #[test]
    fn test_press_ages_into_lighter_brackets() {
        let mut tracker = DensityTracker::new(FPS);
        tracker.tick(&pressed(ButtonId::A));
        let fresh = tracker.get();

        // Roll the press into the middle bracket.
        for _ in 0..500 {
            tracker.tick(&InputSample::default());
        }
        let aged = tracker.get();
        assert_close(aged, 0.15 / 1350.0 * 60.0);
        assert!(aged < fresh);

        // And into the oldest bracket.
        for _ in 0..1400 {
            tracker.tick(&InputSample::default());
        }
        assert_close(tracker.get(), 0.10 / 1800.0 * 60.0);
    }

    #[test]
    fn test_press_expires_after_sixty_seconds() {
        let mut tracker = DensityTracker::new(FPS);
        tracker.tick(&pressed(ButtonId::A));
        for _ in 0..3600 {
            tracker.tick(&InputSample::default());
        }
        assert_close(tracker.get(), 0.0);
    }
}
