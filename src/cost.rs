//! Association cost between one predicted track and one detection.
//!
//! Every cue is a small pure function; [`CostModel::cost`] sums them with their
//! configured weights and never evaluates a cue whose weight is not positive.

use crate::bbox::{BBox, Ltrb};
use crate::config::AssignmentCostConfig;
use crate::histogram::ColorHistogram;

#[inline]
pub fn iou_cost(predicted: &BBox<Ltrb>, detected: &BBox<Ltrb>) -> f32 {
    1.0 - predicted.iou(detected)
}

#[inline]
pub fn norm_dist_cost(predicted: &BBox<Ltrb>, detected: &BBox<Ltrb>, redetect_radius: f32) -> f32 {
    let dist = predicted.center_distance(detected);

    if redetect_radius > f32::EPSILON {
        dist / redetect_radius
    } else {
        dist / f32::EPSILON
    }
}

#[inline]
pub fn color_cost(
    track_hist: Option<&ColorHistogram>,
    det_hist: Option<&ColorHistogram>,
    missing_penalty: f32,
) -> f32 {
    match (track_hist, det_hist) {
        (Some(a), Some(b)) => a.distance(b),
        _ => missing_penalty,
    }
}

/// What the cost model needs to know about a track.
pub struct TrackView<'a> {
    pub predicted: &'a BBox<Ltrb>,
    pub redetect_radius: f32,
    pub color_hist: Option<&'a ColorHistogram>,
}

/// What the cost model needs to know about a detection.
pub struct DetectionView<'a> {
    pub bbox: &'a BBox<Ltrb>,
    pub color_hist: Option<&'a ColorHistogram>,
}

#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    pub iou_weight: f32,
    pub distance_weight: f32,
    pub color_weight: f32,
    pub missing_color_penalty: f32,
}

impl CostModel {
    pub fn new(config: &AssignmentCostConfig) -> Self {
        Self {
            iou_weight: config.iou_weight,
            distance_weight: config.distance_cost.weight,
            color_weight: config.color_cost.weight,
            missing_color_penalty: config.color_cost.missing_penalty,
        }
    }

    #[inline]
    pub fn uses_color(&self) -> bool {
        self.color_weight > 0.0
    }

    pub fn cost(&self, track: &TrackView<'_>, det: &DetectionView<'_>) -> f32 {
        let mut total = 0.0;

        if self.iou_weight > 0.0 {
            total += self.iou_weight * iou_cost(track.predicted, det.bbox);
        }

        if self.distance_weight > 0.0 {
            total += self.distance_weight
                * norm_dist_cost(track.predicted, det.bbox, track.redetect_radius);
        }

        if self.color_weight > 0.0 {
            total += self.color_weight
                * color_cost(track.color_hist, det.color_hist, self.missing_color_penalty);
        }

        if total.is_finite() {
            total
        } else {
            f32::MAX
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(iou: f32, dist: f32, color: f32) -> CostModel {
        CostModel {
            iou_weight: iou,
            distance_weight: dist,
            color_weight: color,
            missing_color_penalty: 10.0,
        }
    }

    #[test]
    fn single_cues() {
        let a = BBox::ltrb(0., 0., 10., 10.);
        let b = BBox::ltrb(5., 0., 15., 10.);

        assert!((iou_cost(&a, &b) - 2.0 / 3.0).abs() < 1e-6);
        assert!((norm_dist_cost(&a, &b, 10.0) - 0.5).abs() < 1e-6);
        assert_eq!(color_cost(None, None, 10.0), 10.0);
    }

    #[test]
    fn weighted_sum() {
        let a = BBox::ltrb(0., 0., 10., 10.);
        let b = BBox::ltrb(5., 0., 15., 10.);
        let track = TrackView {
            predicted: &a,
            redetect_radius: 10.0,
            color_hist: None,
        };
        let det = DetectionView {
            bbox: &b,
            color_hist: None,
        };

        let cost = model(3.0, 2.0, 0.5).cost(&track, &det);
        // 3 * 2/3 + 2 * 0.5 + 0.5 * 10
        assert!((cost - 8.0).abs() < 1e-5);
    }

    #[test]
    fn zero_weights_skip_cues() {
        let a = BBox::ltrb(0., 0., 10., 10.);
        let b = BBox::ltrb(500., 500., 510., 510.);
        // a zero radius would be infinite if the distance cue was evaluated
        let track = TrackView {
            predicted: &a,
            redetect_radius: 0.0,
            color_hist: None,
        };
        let det = DetectionView {
            bbox: &b,
            color_hist: None,
        };

        assert_eq!(model(0.0, 0.0, 0.0).cost(&track, &det), 0.0);
        assert_eq!(model(1.0, 0.0, 0.0).cost(&track, &det), 1.0);
    }
}
