use serde_derive::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::bbox::{BBox, Ltrb};
use crate::config::{MotionConfig, ObjectSpeed, TrackerConfig};
use crate::detection::{ClassIdentifier, Detection};
use crate::histogram::ColorHistogram;
use crate::predictor::Predictor;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackState {
    /// Created, not enough sensor updates yet.
    Tentative,
    Active,
    /// Active, but covered by an occlusion box. Keeps the box of its last update.
    Occluded,
    /// Missed for too long. Terminal.
    Dead,
}

/// Tracking information of one sensor update of a track.
#[derive(Serialize, Debug, Clone)]
pub struct TrackEvent {
    pub detection: Detection,
    pub timestamp: SystemTime,
    pub state: TrackState,
    pub frame_id: u64,
    pub track_id: u64,
    /// Center displacement since the previous event, in pixels per frame.
    pub speed: f32,
}

impl TrackEvent {
    #[inline]
    pub fn bbox(&self) -> &BBox<Ltrb> {
        &self.detection.bbox
    }

    /// Export representation.
    ///
    /// `raw_type` keeps the class identifier as an object and the timestamp as
    /// seconds and nanoseconds since the epoch, otherwise they are flattened to
    /// `"<id>_<name>"` and milliseconds since the epoch. `reduced` exports only
    /// the box corners and the class id.
    pub fn to_value(&self, raw_type: bool, reduced: bool) -> Value {
        let bbox = self.bbox();
        let since_epoch = self
            .timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let class_identifier = if raw_type {
            json!({
                "class_id": self.detection.class_identifier.class_id,
                "class_name": self.detection.class_identifier.class_name,
            })
        } else {
            json!(self.detection.class_identifier.to_string())
        };

        let bounding_box = if reduced {
            json!({
                "box": bbox.as_slice(),
                "class_id": self.detection.class_id(),
            })
        } else {
            json!({
                "box": {
                    "xmin": bbox.left(),
                    "ymin": bbox.top(),
                    "xmax": bbox.right(),
                    "ymax": bbox.bottom(),
                },
                "width": bbox.width(),
                "height": bbox.height(),
                "class_identifier": class_identifier,
                "score": self.detection.score,
            })
        };

        let timestamp = if raw_type {
            json!({
                "secs_since_epoch": since_epoch.as_secs(),
                "nanos_since_epoch": since_epoch.subsec_nanos(),
            })
        } else {
            json!(since_epoch.as_millis() as u64)
        };

        json!({
            "bounding_box": bounding_box,
            "timestamp": timestamp,
            "state": self.state,
            "frame_id": self.frame_id,
            "track_id": self.track_id,
            "speed": self.speed,
        })
    }
}

/// Per track thresholds, resolved once from the tracker config.
#[derive(Debug, Clone, Copy)]
pub struct TrackParams {
    pub max_age: u32,
    pub max_active_misses: u32,
    pub min_detections_active: u32,
    pub min_detections_valid: u32,
    pub occlusion_coverage: f32,
    pub color_filter_alpha: f32,
    pub obj_speed: ObjectSpeed,
    pub motion: MotionConfig,
}

impl TrackParams {
    pub fn new(config: &TrackerConfig, class_id: i32) -> Self {
        let cost = &config.assignment_cost_config;

        Self {
            max_age: config.max_age,
            max_active_misses: config.max_active_misses,
            min_detections_active: config.min_detections_active,
            min_detections_valid: config.min_detections_valid,
            occlusion_coverage: config.occlusion_coverage,
            color_filter_alpha: cost.color_cost.color_filter_alpha,
            obj_speed: *cost.distance_cost.speed_for(class_id),
            motion: config.motion,
        }
    }
}

/// Hit and miss bookkeeping of a track.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lifecycle {
    /// Consecutive matched frames.
    pub hit_streak: u32,
    /// Consecutive unmatched frames.
    pub miss_streak: u32,
    /// Frames since creation, including the creation frame.
    pub age: u32,
    pub total_hits: u32,
}

impl Lifecycle {
    fn born() -> Self {
        Self {
            hit_streak: 1,
            miss_streak: 0,
            age: 1,
            total_hits: 1,
        }
    }

    fn hit(&mut self) {
        self.hit_streak += 1;
        self.total_hits += 1;
        self.miss_streak = 0;
        self.age += 1;
    }

    fn miss(&mut self) {
        self.hit_streak = 0;
        self.miss_streak += 1;
        self.age += 1;
    }

    #[inline]
    pub fn exceeds_misses(&self, tolerance: u32) -> bool {
        self.miss_streak > tolerance
    }

    #[inline]
    pub fn reaches_hits(&self, min_hits: u32) -> bool {
        self.total_hits >= min_hits
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    track_id: u64,
    class_identifier: ClassIdentifier,
    params: TrackParams,
    state: TrackState,
    lifecycle: Lifecycle,
    events: BTreeMap<u64, TrackEvent>,
    color_hist: Option<ColorHistogram>,
    predictor: Predictor,
    predicted: BBox<Ltrb>,
    redetect_radius: f32,
}

impl Track {
    pub fn new(
        track_id: u64,
        detection: &Detection,
        frame_id: u64,
        color_hist: Option<ColorHistogram>,
        params: TrackParams,
    ) -> Self {
        let state = if params.min_detections_active <= 1 {
            TrackState::Active
        } else {
            TrackState::Tentative
        };

        let mut events = BTreeMap::new();
        events.insert(
            frame_id,
            TrackEvent {
                detection: detection.clone(),
                timestamp: SystemTime::now(),
                state,
                frame_id,
                track_id,
                speed: 0.0,
            },
        );

        Self {
            track_id,
            class_identifier: detection.class_identifier.clone(),
            params,
            state,
            lifecycle: Lifecycle::born(),
            events,
            color_hist,
            predictor: Predictor::new(&params.motion, detection.bbox.center(), frame_id),
            predicted: detection.bbox,
            redetect_radius: params.obj_speed.radius(0),
        }
    }

    /// Moves the motion estimate to `frame_id`, widens the redetect radius by
    /// the frames passed since the last sensor update and checks whether the
    /// predicted box is hidden by one of `occlusions`.
    pub fn predict(&mut self, frame_id: u64, occlusions: Option<&[BBox<Ltrb>]>) {
        if self.state == TrackState::Dead {
            return;
        }

        self.predictor.predict(frame_id);

        let frames_missing = frame_id.saturating_sub(self.predictor.last_update_frame_id());
        self.redetect_radius = self
            .params
            .obj_speed
            .radius(frames_missing.min(u32::MAX as u64) as u32);

        let last_bbox = *self.latest_event().bbox();

        if self.state == TrackState::Active {
            let candidate = last_bbox.with_center(self.predictor.position());
            let occluded = occlusions
                .map(|boxes| {
                    boxes
                        .iter()
                        .any(|o| candidate.coverage_by(o) > self.params.occlusion_coverage)
                })
                .unwrap_or(false);

            if occluded {
                tracing::debug!(track_id = self.track_id, frame_id, "track occluded");
                self.state = TrackState::Occluded;
            }
        }

        self.predicted = if self.state == TrackState::Occluded {
            last_bbox
        } else {
            last_bbox.with_center(self.predictor.position())
        };

        if !self.predicted.is_finite() {
            self.predicted = last_bbox;
        }
    }

    /// Sensor update with the detection matched at `frame_id`.
    pub fn update(&mut self, detection: &Detection, frame_id: u64) {
        if self.state == TrackState::Dead {
            return;
        }

        let speed = {
            let last = self.latest_event();
            let frames = frame_id.saturating_sub(last.frame_id).max(1) as f32;
            let speed = last.bbox().center_distance(&detection.bbox) / frames;

            if speed.is_finite() {
                speed
            } else {
                0.0
            }
        };

        self.predictor.update(detection.bbox.center(), frame_id);
        self.lifecycle.hit();

        match self.state {
            TrackState::Occluded => self.state = TrackState::Active,
            TrackState::Tentative
                if self.lifecycle.hit_streak >= self.params.min_detections_active =>
            {
                tracing::debug!(track_id = self.track_id, frame_id, "track activated");
                self.state = TrackState::Active;
            }
            _ => (),
        }

        self.events.insert(
            frame_id,
            TrackEvent {
                detection: detection.clone(),
                timestamp: SystemTime::now(),
                state: self.state,
                frame_id,
                track_id: self.track_id,
                speed,
            },
        );

        self.predicted = detection.bbox;
        self.redetect_radius = self.params.obj_speed.radius(0);
    }

    /// No detection was matched this frame.
    pub fn mark_missed(&mut self) {
        if self.state == TrackState::Dead {
            return;
        }

        self.lifecycle.miss();

        if self.lifecycle.exceeds_misses(self.params.max_age) {
            tracing::debug!(
                track_id = self.track_id,
                misses = self.lifecycle.miss_streak,
                "track died"
            );

            self.state = TrackState::Dead;

            if let Some((_, event)) = self.events.iter_mut().next_back() {
                event.state = TrackState::Dead;
            }
        }
    }

    /// Stores the histogram of the latest matched detection, blended into the
    /// current one when `color_filter_alpha < 1`.
    pub fn set_color_histogram(&mut self, hist: &ColorHistogram) {
        match &mut self.color_hist {
            Some(current) if self.params.color_filter_alpha < 1.0 => {
                current.blend(hist, self.params.color_filter_alpha)
            }
            _ => self.color_hist = Some(hist.clone()),
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state != TrackState::Dead
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.state, TrackState::Active | TrackState::Occluded)
            && !self.lifecycle.exceeds_misses(self.params.max_active_misses)
    }

    /// Enough sensor updates to not be a one frame glitch.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.lifecycle.reaches_hits(self.params.min_detections_valid)
    }

    #[inline]
    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    #[inline]
    pub fn class_identifier(&self) -> &ClassIdentifier {
        &self.class_identifier
    }

    #[inline]
    pub fn state(&self) -> TrackState {
        self.state
    }

    #[inline]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[inline]
    pub fn events(&self) -> &BTreeMap<u64, TrackEvent> {
        &self.events
    }

    pub fn latest_event(&self) -> &TrackEvent {
        // a track is born with an event and never loses one
        self.events
            .values()
            .next_back()
            .expect("track without events")
    }

    #[inline]
    pub fn predicted_bbox(&self) -> &BBox<Ltrb> {
        &self.predicted
    }

    #[inline]
    pub fn redetect_radius(&self) -> f32 {
        self.redetect_radius
    }

    #[inline]
    pub fn color_histogram(&self) -> Option<&ColorHistogram> {
        self.color_hist.as_ref()
    }

    #[inline]
    pub fn current_speed(&self) -> f32 {
        self.latest_event().speed
    }

    #[inline]
    pub fn last_sensor_update_frame_id(&self) -> u64 {
        self.latest_event().frame_id
    }

    pub fn start_time(&self) -> SystemTime {
        self.events
            .values()
            .next()
            .map(|e| e.timestamp)
            .unwrap_or_else(SystemTime::now)
    }

    /// Time of the last sensor update once the track is no longer active.
    pub fn stop_time(&self) -> Option<SystemTime> {
        if self.is_active() {
            None
        } else {
            Some(self.latest_event().timestamp)
        }
    }

    #[inline]
    pub fn to_value(&self, raw_type: bool, reduced: bool) -> Value {
        self.latest_event().to_value(raw_type, reduced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TrackParams {
        TrackParams::new(
            &TrackerConfig {
                max_age: 2,
                max_active_misses: 1,
                min_detections_active: 3,
                min_detections_valid: 2,
                ..Default::default()
            },
            0,
        )
    }

    fn det(l: f32, t: f32, r: f32, b: f32) -> Detection {
        Detection::new(ClassIdentifier::new(0, "person"), BBox::ltrb(l, t, r, b), 0.9)
    }

    #[test]
    fn new_track_is_tentative_with_one_event() {
        let t = Track::new(0, &det(0., 0., 10., 10.), 5, None, params());

        assert_eq!(t.state(), TrackState::Tentative);
        assert_eq!(t.events().len(), 1);
        assert_eq!(t.latest_event().frame_id, 5);
        assert_eq!(*t.lifecycle(), Lifecycle::born());
        assert!(t.is_alive());
        assert!(!t.is_active());
        assert!(!t.is_valid());
    }

    #[test]
    fn activates_after_enough_hits() {
        let mut t = Track::new(0, &det(0., 0., 10., 10.), 0, None, params());

        t.predict(1, None);
        t.update(&det(2., 0., 12., 10.), 1);
        assert_eq!(t.state(), TrackState::Tentative);
        assert!(t.is_valid());

        t.predict(2, None);
        t.update(&det(4., 0., 14., 10.), 2);
        assert_eq!(t.state(), TrackState::Active);
        assert!(t.is_active());
        assert_eq!(t.events().len(), 3);
        assert!((t.current_speed() - 2.0).abs() < 1e-6);
        assert_eq!(t.lifecycle().hit_streak, 3);
        assert_eq!(t.lifecycle().age, 3);
    }

    #[test]
    fn dies_after_too_many_misses() {
        let mut t = Track::new(0, &det(0., 0., 10., 10.), 0, None, params());

        for frame in 1..=2 {
            t.predict(frame, None);
            t.mark_missed();
            assert!(t.is_alive());
        }

        t.predict(3, None);
        t.mark_missed();
        assert!(!t.is_alive());
        assert_eq!(t.state(), TrackState::Dead);
        assert_eq!(t.latest_event().state, TrackState::Dead);
        assert_eq!(t.events().len(), 1);

        // dead is terminal
        t.update(&det(0., 0., 10., 10.), 4);
        assert_eq!(t.events().len(), 1);
        assert!(!t.is_alive());
    }

    #[test]
    fn misses_make_active_track_inactive_before_dead() {
        let p = TrackParams {
            min_detections_active: 1,
            ..params()
        };
        let mut t = Track::new(0, &det(0., 0., 10., 10.), 0, None, p);
        assert!(t.is_active());

        t.predict(1, None);
        t.mark_missed();
        assert!(t.is_active());

        t.predict(2, None);
        t.mark_missed();
        assert!(!t.is_active());
        assert!(t.is_alive());
        assert!(t.stop_time().is_some());

        t.predict(3, None);
        t.update(&det(0., 0., 10., 10.), 3);
        assert!(t.is_active());
        assert_eq!(t.lifecycle().miss_streak, 0);
        assert_eq!(t.lifecycle().hit_streak, 1);
        assert_eq!(t.lifecycle().age, 4);
    }

    #[test]
    fn redetect_radius_grows_while_missing() {
        let mut t = Track::new(0, &det(0., 0., 10., 10.), 0, None, params());
        let speed = ObjectSpeed::default();

        t.predict(1, None);
        assert_eq!(t.redetect_radius(), speed.radius(1));
        t.mark_missed();

        t.predict(2, None);
        assert_eq!(t.redetect_radius(), speed.radius(2));
    }

    #[test]
    fn prediction_follows_velocity() {
        let mut t = Track::new(0, &det(0., 0., 10., 10.), 0, None, params());
        t.predict(1, None);
        t.update(&det(10., 0., 20., 10.), 1);

        t.predict(2, None);
        assert_eq!(*t.predicted_bbox(), BBox::ltrb(20., 0., 30., 10.));
    }

    #[test]
    fn occlusion_freezes_active_track() {
        let p = TrackParams {
            min_detections_active: 1,
            ..params()
        };
        let mut t = Track::new(0, &det(0., 0., 10., 10.), 0, None, p);
        t.predict(1, None);
        t.update(&det(10., 0., 20., 10.), 1);

        let wall = [BBox::ltrb(15., -5., 40., 15.)];
        t.predict(2, Some(&wall));
        assert_eq!(t.state(), TrackState::Occluded);
        assert!(t.is_active());
        assert_eq!(*t.predicted_bbox(), BBox::ltrb(10., 0., 20., 10.));

        t.update(&det(12., 0., 22., 10.), 2);
        assert_eq!(t.state(), TrackState::Active);
    }

    #[test]
    fn export_representations() {
        let t = Track::new(7, &det(1., 2., 3., 4.), 0, None, params());

        let full = t.to_value(false, false);
        assert_eq!(full["track_id"], 7);
        assert_eq!(full["state"], "TENTATIVE");
        assert_eq!(full["bounding_box"]["class_identifier"], "0_person");
        assert_eq!(full["bounding_box"]["box"]["xmax"], 3.0);
        assert!(full["timestamp"].is_u64());

        let raw = t.to_value(true, true);
        assert_eq!(raw["bounding_box"]["box"], json!([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(raw["bounding_box"]["class_id"], 0);
        assert!(raw["timestamp"]["secs_since_epoch"].is_u64());
    }
}
