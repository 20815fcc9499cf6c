use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(transparent)]
pub struct BBox<F: BBoxFormat>([f32; 4], #[serde(skip)] PhantomData<F>);

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

/// All the geometry the tracker needs is computed on the corner format.
impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], Default::default())
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2] - self.0[0]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3] - self.0[1]
    }

    /// Area of the box, zero for inverted or empty boxes.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.) * self.height().max(0.)
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        na::Point2::new(
            (self.0[0] + self.0[2]) / 2.0,
            (self.0[1] + self.0[3]) / 2.0,
        )
    }

    /// Same size, moved so that its center lands on `center`.
    pub fn with_center(&self, center: na::Point2<f32>) -> Self {
        let (w2, h2) = (self.width() / 2.0, self.height() / 2.0);

        Self::ltrb(center.x - w2, center.y - h2, center.x + w2, center.y + h2)
    }

    pub fn intersection_area(&self, other: &BBox<Ltrb>) -> f32 {
        let i_xmin = self.left().max(other.left());
        let i_xmax = self.right().min(other.right());
        let i_ymin = self.top().max(other.top());
        let i_ymax = self.bottom().min(other.bottom());

        (i_xmax - i_xmin).max(0.) * (i_ymax - i_ymin).max(0.)
    }

    pub fn iou(&self, other: &BBox<Ltrb>) -> f32 {
        let i_area = self.intersection_area(other);
        let union = self.area() + other.area() - i_area;

        if union <= 0. || !union.is_finite() {
            return 0.;
        }

        i_area / union
    }

    /// Share of this box covered by `other`, in [0, 1].
    pub fn coverage_by(&self, other: &BBox<Ltrb>) -> f32 {
        let area = self.area();

        if area <= 0. || !area.is_finite() {
            return 0.;
        }

        self.intersection_area(other) / area
    }

    /// Euclidean distance between the box centers.
    #[inline]
    pub fn center_distance(&self, other: &BBox<Ltrb>) -> f32 {
        na::distance(&self.center(), &other.center())
    }

    /// Grows the box by `margin_x * width` on the left and right and
    /// `margin_y * height` on the top and bottom.
    pub fn expand(&self, margin_x: f32, margin_y: f32) -> Self {
        let dx = self.width().max(0.) * margin_x;
        let dy = self.height().max(0.) * margin_y;

        Self::ltrb(
            self.left() - dx,
            self.top() - dy,
            self.right() + dx,
            self.bottom() + dy,
        )
    }
}
