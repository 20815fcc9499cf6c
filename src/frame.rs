use ndarray::prelude::*;

use crate::bbox::{BBox, Ltrb};
use crate::detection::Detection;

/// Everything the tracker consumes for one video frame.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub detections: Vec<Detection>,
    /// Full image as `(height, width, channel)`, used for color histograms.
    pub image: Option<Array3<u8>>,
    /// Boxes of other objects that may hide tracks of this class.
    pub occlusions: Option<Vec<BBox<Ltrb>>>,
}

impl Frame {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            image: None,
            occlusions: None,
        }
    }

    pub fn with_image(mut self, image: Array3<u8>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_occlusions(mut self, occlusions: Vec<BBox<Ltrb>>) -> Self {
        self.occlusions = Some(occlusions);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
