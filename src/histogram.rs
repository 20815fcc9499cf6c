use ndarray::prelude::*;

use crate::bbox::{BBox, Ltrb};

/// L1 normalized joint color histogram of an image region.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorHistogram {
    bins: usize,
    hist: Array1<f32>,
}

impl ColorHistogram {
    /// Builds the histogram over `bbox` grown by the given margins and clipped
    /// to the image. Returns `None` when nothing of the region is inside the
    /// image or the image is not a three channel one.
    pub fn from_region(
        image: ArrayView3<'_, u8>,
        bbox: &BBox<Ltrb>,
        margin_x: f32,
        margin_y: f32,
        bins: usize,
    ) -> Option<Self> {
        let (height, width, channels) = image.dim();

        if channels < 3 || bins == 0 || !bbox.is_finite() {
            return None;
        }

        let region = bbox.expand(margin_x, margin_y);

        let x0 = region.left().floor().max(0.) as usize;
        let y0 = region.top().floor().max(0.) as usize;
        let x1 = (region.right().ceil().max(0.) as usize).min(width);
        let y1 = (region.bottom().ceil().max(0.) as usize).min(height);

        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        let crop = image.slice(s![y0..y1, x0..x1, ..3]);
        let mut hist = Array1::<f32>::zeros(bins * bins * bins);

        for px in crop.lanes(Axis(2)) {
            let r = px[0] as usize * bins / 256;
            let g = px[1] as usize * bins / 256;
            let b = px[2] as usize * bins / 256;

            hist[(r * bins + g) * bins + b] += 1.0;
        }

        let total = hist.sum();
        if total <= 0. {
            return None;
        }

        hist /= total;

        Some(Self { bins, hist })
    }

    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    #[inline]
    pub fn values(&self) -> ArrayView1<'_, f32> {
        self.hist.view()
    }

    /// Alternative chi-square distance, `2 * sum((a - b)^2 / (a + b))`.
    /// Zero for equal histograms, at most 4 for disjoint normalized ones.
    /// Histograms with a different layout are treated as fully disjoint.
    pub fn distance(&self, other: &ColorHistogram) -> f32 {
        if self.hist.len() != other.hist.len() {
            return 4.0;
        }

        2.0 * self
            .hist
            .iter()
            .zip(other.hist.iter())
            .filter(|(a, b)| *a + *b > 0.)
            .map(|(a, b)| (a - b) * (a - b) / (a + b))
            .sum::<f32>()
    }

    /// Exponential smoothing towards `other`: `(1 - alpha) * self + alpha * other`.
    pub fn blend(&mut self, other: &ColorHistogram, alpha: f32) {
        if self.hist.len() != other.hist.len() || alpha >= 1.0 {
            *self = other.clone();
            return;
        }

        self.hist
            .zip_mut_with(&other.hist, |a, b| *a = (1.0 - alpha) * *a + alpha * b);
    }
}
