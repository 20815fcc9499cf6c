use nalgebra as na;

use crate::config::MotionConfig;

/// Constant velocity Kalman filter over the box center.
///
/// State is `(x, dx, y, dy)` in pixels and pixels per frame, the measurement
/// is the `(x, y)` center of a detection.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    pub x: na::Vector4<f32>,
    pub p: na::Matrix4<f32>,
    f: na::Matrix4<f32>,
    h: na::Matrix2x4<f32>,
    r: na::Matrix2<f32>,
    q: na::Matrix4<f32>,
}

impl KalmanFilter {
    pub fn new(center: na::Point2<f32>, r: f32, p: f32, q: f32) -> Self {
        #[rustfmt::skip]
        let f = na::Matrix4::new(
            1.0, 1.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 1.0,
            0.0, 0.0, 0.0, 1.0,
        );

        #[rustfmt::skip]
        let h = na::Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
        );

        Self {
            x: na::Vector4::new(center.x, 0.0, center.y, 0.0),
            p: na::Matrix4::identity() * p,
            f,
            h,
            r: na::Matrix2::identity() * r,
            q: na::Matrix4::identity() * q,
        }
    }

    pub fn predict(&mut self) {
        self.x = self.f * self.x;
        self.p = self.f * self.p * self.f.transpose() + self.q;
    }

    pub fn update(&mut self, z: na::Point2<f32>) {
        let y = na::Vector2::new(z.x, z.y) - self.h * self.x;
        let s = self.h * self.p * self.h.transpose() + self.r;

        let s_inv = match s.try_inverse() {
            Some(inv) => inv,
            None => {
                tracing::trace!("singular innovation covariance, skipping kalman update");
                return;
            }
        };

        let k = self.p * self.h.transpose() * s_inv;

        self.x += k * y;
        self.p = (na::Matrix4::identity() - k * self.h) * self.p;
    }

    #[inline]
    pub fn position(&self) -> na::Point2<f32> {
        na::Point2::new(self.x[0], self.x[2])
    }

    #[inline]
    pub fn velocity(&self) -> na::Vector2<f32> {
        na::Vector2::new(self.x[1], self.x[3])
    }
}

#[derive(Debug, Clone)]
enum Model {
    ConstantVelocity {
        prev: Option<(u64, na::Point2<f32>)>,
    },
    Kalman {
        kf: KalmanFilter,
        delay: usize,
    },
}

/// Motion estimate of a single track, advanced once per frame.
#[derive(Debug, Clone)]
pub struct Predictor {
    model: Model,
    last_update: (u64, na::Point2<f32>),
    num_updates: usize,
    frame_id: u64,
}

impl Predictor {
    pub fn new(config: &MotionConfig, center: na::Point2<f32>, frame_id: u64) -> Self {
        let model = match *config {
            MotionConfig::ConstantVelocity => Model::ConstantVelocity { prev: None },
            MotionConfig::Kalman {
                r,
                p,
                q,
                kalman_delay,
            } => Model::Kalman {
                kf: KalmanFilter::new(center, r, p, q),
                delay: kalman_delay,
            },
        };

        Self {
            model,
            last_update: (frame_id, center),
            num_updates: 1,
            frame_id,
        }
    }

    /// Advances the estimate to `frame_id`. Calling it again for the same
    /// frame does nothing.
    pub fn predict(&mut self, frame_id: u64) {
        if frame_id <= self.frame_id {
            return;
        }

        if let Model::Kalman { kf, .. } = &mut self.model {
            for _ in self.frame_id..frame_id {
                kf.predict();
            }
        }

        self.frame_id = frame_id;
    }

    pub fn update(&mut self, center: na::Point2<f32>, frame_id: u64) {
        self.predict(frame_id);

        match &mut self.model {
            Model::ConstantVelocity { prev } => {
                *prev = Some(self.last_update);
            }
            Model::Kalman { kf, .. } => kf.update(center),
        }

        self.last_update = (frame_id, center);
        self.num_updates += 1;
    }

    /// Estimated velocity in pixels per frame.
    pub fn velocity(&self) -> na::Vector2<f32> {
        match &self.model {
            Model::ConstantVelocity { prev: Some((prev_frame, prev)) } => {
                let (last_frame, last) = self.last_update;
                let dt = last_frame.saturating_sub(*prev_frame).max(1) as f32;

                (last - *prev) / dt
            }
            Model::ConstantVelocity { prev: None } => na::Vector2::zeros(),
            Model::Kalman { kf, .. } => kf.velocity(),
        }
    }

    /// Estimated center at the frame of the last `predict`/`update`.
    pub fn position(&self) -> na::Point2<f32> {
        let (last_frame, last) = self.last_update;

        match &self.model {
            Model::ConstantVelocity { .. } => {
                let dt = self.frame_id.saturating_sub(last_frame) as f32;
                let pos = last + self.velocity() * dt;

                if pos.coords.iter().all(|v| v.is_finite()) {
                    pos
                } else {
                    last
                }
            }
            Model::Kalman { kf, delay } => {
                let pos = kf.position();

                if self.num_updates <= *delay || !pos.coords.iter().all(|v| v.is_finite()) {
                    last
                } else {
                    pos
                }
            }
        }
    }

    #[inline]
    pub fn last_update_frame_id(&self) -> u64 {
        self.last_update.0
    }
}
