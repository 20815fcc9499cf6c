pub mod assignment;
pub mod bbox;
pub mod config;
pub mod cost;
pub mod detection;
pub mod error;
pub mod frame;
pub mod histogram;
pub mod track;
pub mod tracker;

mod predictor;

pub use config::TrackerConfig;
pub use detection::{ClassIdentifier, Detection};
pub use frame::Frame;
pub use track::{Track, TrackEvent, TrackState};
pub use tracker::{HungarianTracker, TrackStatistics};

/// Frame by frame multi object tracking.
pub trait Tracking {
    /// Feeds the detections of the next frame.
    fn next(&mut self, frame: &Frame);

    fn tracks(&self) -> &[Track];
}
