use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Error;

/// Linear motion model for the redetect radius: `frames_missing * x + b` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpeed {
    pub x: f32,
    pub b: f32,
}

impl Default for ObjectSpeed {
    fn default() -> Self {
        Self { x: 20.0, b: 50.0 }
    }
}

impl ObjectSpeed {
    #[inline]
    pub fn radius(&self, frames_missing: u32) -> f32 {
        frames_missing as f32 * self.x + self.b
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceCostConfig {
    pub weight: f32,
    /// Per class id speed, falls back to `default_obj_speed`.
    pub obj_speed: HashMap<i32, ObjectSpeed>,
    pub default_obj_speed: ObjectSpeed,
}

impl Default for DistanceCostConfig {
    fn default() -> Self {
        Self {
            weight: 0.0,
            obj_speed: HashMap::new(),
            default_obj_speed: ObjectSpeed::default(),
        }
    }
}

impl DistanceCostConfig {
    pub fn speed_for(&self, class_id: i32) -> &ObjectSpeed {
        self.obj_speed
            .get(&class_id)
            .unwrap_or(&self.default_obj_speed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorCostConfig {
    pub weight: f32,
    /// Crop expansion relative to the box width.
    pub margin_x: f32,
    /// Crop expansion relative to the box height.
    pub margin_y: f32,
    /// Histogram bins per color channel.
    pub bins: usize,
    /// Blend factor of a new histogram into the track histogram, 1.0 replaces it.
    pub color_filter_alpha: f32,
    /// Cost used when one of the two histograms is missing.
    pub missing_penalty: f32,
}

impl Default for ColorCostConfig {
    fn default() -> Self {
        Self {
            weight: 0.0,
            margin_x: 0.0,
            margin_y: 0.0,
            bins: 8,
            color_filter_alpha: 1.0,
            missing_penalty: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentCostConfig {
    pub iou_weight: f32,
    pub distance_cost: DistanceCostConfig,
    pub color_cost: ColorCostConfig,
    /// Matches with a cost at or above this value are rejected.
    pub assignment_threshold: f32,
}

impl Default for AssignmentCostConfig {
    fn default() -> Self {
        Self {
            iou_weight: 1.0,
            distance_cost: DistanceCostConfig::default(),
            color_cost: ColorCostConfig::default(),
            assignment_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionConfig {
    /// Extrapolates the last two sensor updates.
    ConstantVelocity,
    /// Constant velocity Kalman filter over the box center.
    Kalman {
        /// Measurement noise.
        r: f32,
        /// Initial state covariance.
        p: f32,
        /// Process noise.
        q: f32,
        /// Number of sensor updates for which the raw detection is used
        /// instead of the filter estimate.
        kalman_delay: usize,
    },
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig::ConstantVelocity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub assignment_cost_config: AssignmentCostConfig,
    pub motion: MotionConfig,
    /// Misses tolerated before a track dies.
    pub max_age: u32,
    /// Misses tolerated before a track stops being active.
    pub max_active_misses: u32,
    /// Consecutive hits needed to become active.
    pub min_detections_active: u32,
    /// Total hits needed to count as a valid track.
    pub min_detections_valid: u32,
    /// Share of the predicted box that an occlusion box must cover.
    pub occlusion_coverage: f32,
    pub keep_dead_tracks: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            assignment_cost_config: AssignmentCostConfig::default(),
            motion: MotionConfig::default(),
            max_age: 10,
            max_active_misses: 2,
            min_detections_active: 3,
            min_detections_valid: 3,
            occlusion_coverage: 0.5,
            keep_dead_tracks: false,
        }
    }
}

fn check(cond: bool, msg: &str) -> Result<(), Error> {
    if cond {
        Ok(())
    } else {
        Err(Error::InvalidConfig(msg.to_string()))
    }
}

fn check_weight(weight: f32, name: &str) -> Result<(), Error> {
    check(
        weight.is_finite() && weight >= 0.0,
        &format!("{} must be a finite non-negative number, got {}", name, weight),
    )
}

impl TrackerConfig {
    pub fn from_json_str(src: &str) -> Result<Self, Error> {
        let config: TrackerConfig = serde_json::from_str(src)?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let src = std::fs::read_to_string(path)?;

        Self::from_json_str(&src)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let cost = &self.assignment_cost_config;

        check_weight(cost.iou_weight, "iou_weight")?;
        check_weight(cost.distance_cost.weight, "distance_cost.weight")?;
        check_weight(cost.color_cost.weight, "color_cost.weight")?;

        check(
            cost.assignment_threshold.is_finite() && cost.assignment_threshold > 0.0,
            "assignment_threshold must be positive",
        )?;

        for (class_id, speed) in cost
            .distance_cost
            .obj_speed
            .iter()
            .map(|(id, s)| (Some(*id), s))
            .chain(std::iter::once((None, &cost.distance_cost.default_obj_speed)))
        {
            check(
                speed.x.is_finite() && speed.x >= 0.0 && speed.b.is_finite() && speed.b > 0.0,
                &format!(
                    "obj_speed for class {:?} needs x >= 0 and b > 0, got {:?}",
                    class_id, speed
                ),
            )?;
        }

        let color = &cost.color_cost;
        check(
            color.margin_x.is_finite() && color.margin_x >= 0.0,
            "color_cost.margin_x must be non-negative",
        )?;
        check(
            color.margin_y.is_finite() && color.margin_y >= 0.0,
            "color_cost.margin_y must be non-negative",
        )?;
        check(color.bins > 0 && color.bins <= 256, "color_cost.bins must be in 1..=256")?;
        check(
            color.color_filter_alpha > 0.0 && color.color_filter_alpha <= 1.0,
            "color_cost.color_filter_alpha must be in (0, 1]",
        )?;
        check(
            color.missing_penalty.is_finite() && color.missing_penalty >= 0.0,
            "color_cost.missing_penalty must be non-negative",
        )?;

        if let MotionConfig::Kalman { r, p, q, .. } = self.motion {
            check(
                r.is_finite() && r > 0.0 && p.is_finite() && p > 0.0 && q.is_finite() && q >= 0.0,
                "kalman filter needs r > 0, p > 0 and q >= 0",
            )?;
        }

        check(
            self.max_active_misses < self.max_age,
            "max_active_misses must be below max_age",
        )?;
        check(
            (0.0..=1.0).contains(&self.occlusion_coverage),
            "occlusion_coverage must be in [0, 1]",
        )?;

        Ok(())
    }
}
