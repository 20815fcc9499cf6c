use ndarray::prelude::*;
use serde_derive::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::assignment;
use crate::config::TrackerConfig;
use crate::cost::{CostModel, DetectionView, TrackView};
use crate::detection::{ClassIdentifier, Detection};
use crate::error::Error;
use crate::frame::Frame;
use crate::histogram::ColorHistogram;
use crate::track::{Track, TrackParams};
use crate::Tracking;

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
}

impl Summary {
    fn of<I: IntoIterator<Item = f32>>(values: I) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        if count == 0 {
            return None;
        }

        Some(Self {
            min,
            max,
            avg: sum / count as f32,
        })
    }
}

/// Aggregates over the event history of one track.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct TrackStatistics {
    /// Only positive speed samples are taken into account.
    #[serde(rename = "speed_info")]
    pub speed: Summary,
    #[serde(rename = "width_info")]
    pub width: Summary,
    #[serde(rename = "height_info")]
    pub height: Summary,
}

/// Matches the detections of every frame to the known tracks of one object
/// class by solving a minimum cost assignment.
pub struct HungarianTracker {
    config: TrackerConfig,
    cost_model: CostModel,
    object_class_identifier: ClassIdentifier,
    tracks: Vec<Track>,
    current_frame_id: u64,
    track_id_counter: u64,
}

impl HungarianTracker {
    pub fn new(
        config: TrackerConfig,
        object_class_identifier: ClassIdentifier,
    ) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            cost_model: CostModel::new(&config.assignment_cost_config),
            config,
            object_class_identifier,
            tracks: Vec::with_capacity(64),
            current_frame_id: 0,
            track_id_counter: 0,
        })
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn object_class_identifier(&self) -> &ClassIdentifier {
        &self.object_class_identifier
    }

    #[inline]
    pub fn current_frame_id(&self) -> u64 {
        self.current_frame_id
    }

    /// Id the next created track will get.
    #[inline]
    pub fn track_id_counter(&self) -> u64 {
        self.track_id_counter
    }

    /// All currently managed tracks, dead ones included when they are kept.
    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn alive_tracks(&self) -> Vec<&Track> {
        self.tracks.iter().filter(|t| t.is_alive()).collect()
    }

    pub fn active_tracks(&self) -> Vec<&Track> {
        self.tracks.iter().filter(|t| t.is_active()).collect()
    }

    pub fn valid_tracks(&self) -> Vec<&Track> {
        self.tracks.iter().filter(|t| t.is_valid()).collect()
    }

    /// Latest event of every track in its export representation.
    pub fn to_list(&self, raw_type: bool, reduced: bool) -> Vec<Value> {
        self.tracks
            .iter()
            .map(|t| t.to_value(raw_type, reduced))
            .collect()
    }

    /// Speed, width and height summaries of every valid track. Tracks without
    /// a positive speed sample are left out.
    pub fn compute_track_statistics(&self) -> BTreeMap<u64, TrackStatistics> {
        self.tracks
            .iter()
            .filter(|t| t.is_valid())
            .filter_map(|t| {
                let events = t.events().values();

                let stats = TrackStatistics {
                    speed: Summary::of(events.clone().map(|e| e.speed).filter(|s| *s > 0.0))?,
                    width: Summary::of(events.clone().map(|e| e.bbox().width()))?,
                    height: Summary::of(events.map(|e| e.bbox().height()))?,
                };

                Some((t.track_id(), stats))
            })
            .collect()
    }

    fn color_histograms(&self, frame: &Frame) -> Vec<Option<ColorHistogram>> {
        let color = &self.config.assignment_cost_config.color_cost;

        match &frame.image {
            Some(image) if self.cost_model.uses_color() => frame
                .iter()
                .map(|det| {
                    ColorHistogram::from_region(
                        image.view(),
                        det.bbox(),
                        color.margin_x,
                        color.margin_y,
                        color.bins,
                    )
                })
                .collect(),
            _ => vec![None; frame.len()],
        }
    }

    /// Rows are the tracks at `rows`, columns the detections.
    fn cost_matrix(
        &self,
        rows: &[usize],
        detections: &[Detection],
        hists: &[Option<ColorHistogram>],
    ) -> Array2<f32> {
        Array2::from_shape_fn((rows.len(), detections.len()), |(r, c)| {
            let track = &self.tracks[rows[r]];

            let cost = self.cost_model.cost(
                &TrackView {
                    predicted: track.predicted_bbox(),
                    redetect_radius: track.redetect_radius(),
                    color_hist: track.color_histogram(),
                },
                &DetectionView {
                    bbox: detections[c].bbox(),
                    color_hist: hists[c].as_ref(),
                },
            );

            tracing::trace!(track_id = track.track_id(), detection = c, cost, "pair cost");

            cost
        })
    }

    /// Runs one frame through predict, cost, assignment, update and pruning.
    pub fn next(&mut self, frame: &Frame) {
        let frame_id = self.current_frame_id;
        let threshold = self.config.assignment_cost_config.assignment_threshold;

        let hists = self.color_histograms(frame);

        let alive: Vec<usize> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_alive())
            .map(|(idx, _)| idx)
            .collect();

        let occlusions = frame.occlusions.as_deref();
        for &idx in &alive {
            self.tracks[idx].predict(frame_id, occlusions);
        }

        let mut are_detections_assigned = vec![false; frame.len()];
        let mut are_tracks_matched = vec![false; alive.len()];

        if !alive.is_empty() && !frame.is_empty() {
            let costs = self.cost_matrix(&alive, &frame.detections, &hists);

            for (row, col) in assignment::solve(costs.view()) {
                let cost = costs[(row, col)];

                if cost.is_nan() || cost >= threshold {
                    continue;
                }

                if are_detections_assigned[col] || are_tracks_matched[row] {
                    tracing::warn!(row, col, "assignment returned a pair twice, ignoring it");
                    continue;
                }

                let track = &mut self.tracks[alive[row]];
                track.update(&frame.detections[col], frame_id);

                if let Some(hist) = &hists[col] {
                    track.set_color_histogram(hist);
                }

                are_detections_assigned[col] = true;
                are_tracks_matched[row] = true;
            }
        }

        for (row, &idx) in alive.iter().enumerate() {
            if !are_tracks_matched[row] {
                self.tracks[idx].mark_missed();
            }
        }

        let mut created = 0;
        for (col, (det, hist)) in frame.iter().zip(hists).enumerate() {
            if are_detections_assigned[col] {
                continue;
            }

            let params = TrackParams::new(&self.config, det.class_id());
            self.tracks
                .push(Track::new(self.track_id_counter, det, frame_id, hist, params));

            self.track_id_counter += 1;
            created += 1;
        }

        tracing::debug!(
            frame_id,
            detections = frame.len(),
            alive = alive.len(),
            matched = are_tracks_matched.iter().filter(|m| **m).count(),
            created,
            "frame processed"
        );

        self.current_frame_id += 1;

        if !self.config.keep_dead_tracks {
            self.tracks.retain(|t| t.is_alive());
        }
    }
}

impl Tracking for HungarianTracker {
    #[inline]
    fn next(&mut self, frame: &Frame) {
        HungarianTracker::next(self, frame)
    }

    #[inline]
    fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

impl fmt::Display for HungarianTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tracks", self.tracks.len())
    }
}
