//! # Motion Analysis
//!
//! Continuous descriptors of how the controller is being played, updated
//! once per sample tick alongside the event core.
//!
//! | Type | Role |
//! |------|------|
//! | [`AnalysisEngine`] | Owns every tracker and fans samples out to them |
//! | [`VelocityTracker`] | Movement speed of one axis over three horizons |
//! | [`DensityTracker`] | Recency-weighted button press rate |
//! | [`AnalysisSnapshot`] | Serializable point-in-time reading |

mod density;
mod velocity;

use serde::Serialize;

use crate::config::Config;
use crate::input::InputSample;

pub use density::DensityTracker;
pub use velocity::{StickVelocityTracker, TriggerVelocityTracker, VelocityTracker};

/// All motion trackers for one controller.
#[derive(Debug, Clone)]
pub struct AnalysisEngine {
    left_stick: StickVelocityTracker,
    right_stick: StickVelocityTracker,
    left_trigger: TriggerVelocityTracker,
    right_trigger: TriggerVelocityTracker,
    density: DensityTracker,
}

impl AnalysisEngine {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let fps = config.timing.fps;
        Self {
            left_stick: StickVelocityTracker::new(fps),
            right_stick: StickVelocityTracker::new(fps),
            left_trigger: TriggerVelocityTracker::new(fps),
            right_trigger: TriggerVelocityTracker::new(fps),
            density: DensityTracker::new(fps),
        }
    }

    /// Feeds one frame to every tracker.
    pub fn tick(&mut self, sample: &InputSample) {
        self.left_stick.tick(sample.left_x, sample.left_y);
        self.right_stick.tick(sample.right_x, sample.right_y);
        self.left_trigger.tick(sample.left_trigger);
        self.right_trigger.tick(sample.right_trigger);
        self.density.tick(sample);
    }

    #[must_use]
    pub fn left_stick(&self) -> &StickVelocityTracker {
        &self.left_stick
    }

    #[must_use]
    pub fn right_stick(&self) -> &StickVelocityTracker {
        &self.right_stick
    }

    #[must_use]
    pub fn left_trigger(&self) -> &TriggerVelocityTracker {
        &self.left_trigger
    }

    #[must_use]
    pub fn right_trigger(&self) -> &TriggerVelocityTracker {
        &self.right_trigger
    }

    #[must_use]
    pub fn density(&self) -> &DensityTracker {
        &self.density
    }

    /// Long-term velocities and density as one serializable reading.
    #[must_use]
    pub fn snapshot(&self) -> AnalysisSnapshot {
        AnalysisSnapshot {
            left_x_velocity: self.left_stick.x().long_term(),
            left_y_velocity: self.left_stick.y().long_term(),
            right_x_velocity: self.right_stick.x().long_term(),
            right_y_velocity: self.right_stick.y().long_term(),
            left_trigger_velocity: self.left_trigger.long_term(),
            right_trigger_velocity: self.right_trigger.long_term(),
            press_density: self.density.get(),
        }
    }
}

/// Point-in-time analysis reading, ready for logging or downstream mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalysisSnapshot {
    pub left_x_velocity: f32,
    pub left_y_velocity: f32,
    pub right_x_velocity: f32,
    pub right_y_velocity: f32,
    pub left_trigger_velocity: f32,
    pub right_trigger_velocity: f32,
    pub press_density: f32,
}
