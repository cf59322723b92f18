use serde::{Deserialize, Serialize};
use std::fmt;

/// Box reported alongside a detection. The decision logic never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One per-object result from the inference collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

/// Physical state of the watched door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    #[default]
    Unknown,
    Open,
    Closed,
}

impl DoorState {
    pub fn as_str(self) -> &'static str {
        match self {
            DoorState::Unknown => "unknown",
            DoorState::Open => "open",
            DoorState::Closed => "closed",
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one batch of detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Open,
    Closed,
    /// Nothing authoritative in this batch; keep the previous state.
    NoChange,
}

impl Verdict {
    pub fn door_state(self) -> Option<DoorState> {
        match self {
            Verdict::Open => Some(DoorState::Open),
            Verdict::Closed => Some(DoorState::Closed),
            Verdict::NoChange => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn door_state_serializes_lowercase() {
        let json = serde_json::to_string(&DoorState::Closed).unwrap();
        assert_eq!(json, "\"closed\"");
        assert_eq!(DoorState::default(), DoorState::Unknown);
    }

    #[test]
    fn verdict_maps_to_door_state() {
        assert_eq!(Verdict::Open.door_state(), Some(DoorState::Open));
        assert_eq!(Verdict::NoChange.door_state(), None);
    }
}
