use serde_derive::{Deserialize, Serialize};
use std::fmt;

use crate::bbox::{BBox, Ltrb};

/// Numeric id plus human readable name of an object class.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassIdentifier {
    pub class_id: i32,
    pub class_name: String,
}

impl ClassIdentifier {
    pub fn new<S: ToString>(class_id: i32, class_name: S) -> Self {
        Self {
            class_id,
            class_name: class_name.to_string(),
        }
    }
}

impl fmt::Display for ClassIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.class_id, self.class_name)
    }
}

/// One box reported by the detector for a single frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_identifier: ClassIdentifier,
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "p", default = "default_score")]
    pub score: f32,
}

fn default_score() -> f32 {
    1.0
}

impl Detection {
    pub fn new(class_identifier: ClassIdentifier, bbox: BBox<Ltrb>, score: f32) -> Self {
        Self {
            class_identifier,
            bbox,
            score,
        }
    }

    #[inline(always)]
    pub fn class_id(&self) -> i32 {
        self.class_identifier.class_id
    }

    #[inline(always)]
    pub fn bbox(&self) -> &BBox<Ltrb> {
        &self.bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_identifier_display() {
        assert_eq!(ClassIdentifier::new(3, "car").to_string(), "3_car");
    }

    #[test]
    fn detection_from_json() {
        let det: Detection = serde_json::from_str(
            r#"{"class_identifier": {"class_id": 0, "class_name": "person"}, "bbox": [1, 2, 3, 4]}"#,
        )
        .unwrap();

        assert_eq!(det.class_id(), 0);
        assert_eq!(det.bbox, BBox::ltrb(1., 2., 3., 4.));
        assert_eq!(det.score, 1.0);
    }
}
