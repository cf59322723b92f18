use serde::Serialize;
use tokio::sync::watch;

use crate::interface::{DoorState, RawDetection};

/// Everything the presentation layer shows about the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopStatus {
    pub door_state: DoorState,
    pub is_model_loaded: bool,
    pub inference_status: String,
    pub last_inference_results: Vec<RawDetection>,
    pub capture_status: String,
    pub is_saving: bool,
    pub save_status: String,
    pub images_saved: usize,
    pub last_image_kb: Option<usize>,
}

impl Default for LoopStatus {
    fn default() -> Self {
        Self {
            door_state: DoorState::Unknown,
            is_model_loaded: false,
            inference_status: String::new(),
            last_inference_results: Vec::new(),
            capture_status: "Idle".into(),
            is_saving: false,
            save_status: String::new(),
            images_saved: 0,
            last_image_kb: None,
        }
    }
}

/// Write side of the loop status.
///
/// Owned by the orchestrator task, which makes it the only writer. Readers
/// subscribe and get a `watch::Receiver` that cannot mutate anything.
pub struct StatusBoard {
    tx: watch::Sender<LoopStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LoopStatus::default());
        Self { tx }
    }

    pub fn update(&self, apply: impl FnOnce(&mut LoopStatus)) {
        self.tx.send_modify(apply);
    }

    pub fn snapshot(&self) -> LoopStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopStatus> {
        self.tx.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
