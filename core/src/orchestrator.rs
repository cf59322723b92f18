//! Single-writer control loop fed by one event queue.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::decision::DetectionClassifier;
use crate::interface::{
    DoorState, FrameSource, ImageStore, InferenceEngine, ProcessedImage, RawDetection,
    StateNotifier, Verdict,
};
use crate::prelude::{
    CycleError, InferenceError, LoopConfig, OrchestratorConfig, PipelineError, StoreError,
};
use crate::processing::ImagePipeline;
use crate::schedule::{CaptureScheduler, ScheduleObserver, ScheduleSnapshot, SchedulerDelegate};
use crate::telemetry::{LoopStatus, MetricsRecorder, MetricsSnapshot, StatusBoard};

/// Requests from outside the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Reset,
    /// Zero the stored-image count, lifting a reached collection cap.
    ResetCounter,
    Probe,
    ReloadModel,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleEvent {
    CountdownComplete,
    PhotoCapture { photos_taken: u64 },
}

/// Everything the orchestrator reacts to, in arrival order.
#[derive(Debug)]
pub enum LoopEvent {
    Command(Command),
    Schedule(ScheduleEvent),
    FrameProcessed {
        cycle: u64,
        result: Result<ProcessedImage, CycleError>,
    },
    Inferred {
        cycle: u64,
        result: Result<Vec<RawDetection>, InferenceError>,
    },
    Stored(Result<usize, StoreError>),
    ModelLoaded(Result<(), InferenceError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("control loop has shut down")]
pub struct LoopClosed;

/// External collaborators the loop drives.
#[derive(Clone)]
pub struct Collaborators {
    pub frames: Arc<dyn FrameSource>,
    pub inference: Arc<dyn InferenceEngine>,
    pub store: Option<Arc<dyn ImageStore>>,
    pub notifier: Arc<dyn StateNotifier>,
}

struct QueueDelegate {
    tx: mpsc::UnboundedSender<LoopEvent>,
}

impl SchedulerDelegate for QueueDelegate {
    fn on_countdown_complete(&self) {
        let _ = self
            .tx
            .send(LoopEvent::Schedule(ScheduleEvent::CountdownComplete));
    }

    fn on_photo_capture(&self, photos_taken: u64) {
        let _ = self
            .tx
            .send(LoopEvent::Schedule(ScheduleEvent::PhotoCapture { photos_taken }));
    }
}

/// Cloneable remote control and read path for the running loop.
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<LoopEvent>,
    status: watch::Receiver<LoopStatus>,
    schedule: ScheduleObserver,
    metrics: Arc<MetricsRecorder>,
}

impl OrchestratorHandle {
    pub fn send(&self, command: Command) -> Result<(), LoopClosed> {
        self.tx
            .send(LoopEvent::Command(command))
            .map_err(|_| LoopClosed)
    }

    pub fn start(&self) -> Result<(), LoopClosed> {
        self.send(Command::Start)
    }

    pub fn stop(&self) -> Result<(), LoopClosed> {
        self.send(Command::Stop)
    }

    pub fn reset(&self) -> Result<(), LoopClosed> {
        self.send(Command::Reset)
    }

    pub fn reset_counter(&self) -> Result<(), LoopClosed> {
        self.send(Command::ResetCounter)
    }

    pub fn probe(&self) -> Result<(), LoopClosed> {
        self.send(Command::Probe)
    }

    pub fn reload_model(&self) -> Result<(), LoopClosed> {
        self.send(Command::ReloadModel)
    }

    pub fn shutdown(&self) -> Result<(), LoopClosed> {
        self.send(Command::Shutdown)
    }

    pub fn status(&self) -> LoopStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopStatus> {
        self.status.clone()
    }

    pub fn schedule(&self) -> ScheduleSnapshot {
        self.schedule.snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

pub struct CaptureOrchestrator {
    config: OrchestratorConfig,
    scheduler: CaptureScheduler,
    pipeline: Arc<ImagePipeline>,
    classifier: DetectionClassifier,
    collaborators: Collaborators,
    status: StatusBoard,
    metrics: Arc<MetricsRecorder>,
    tx: mpsc::UnboundedSender<LoopEvent>,
    rx: mpsc::UnboundedReceiver<LoopEvent>,
    current: DoorState,
    next_cycle: u64,
    /// First cycle id dispatched by the current run.
    run_floor: u64,
    last_applied: Option<u64>,
    saves_in_flight: usize,
}

impl CaptureOrchestrator {
    pub fn new(config: LoopConfig, collaborators: Collaborators) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            scheduler: CaptureScheduler::new(config.schedule),
            pipeline: Arc::new(ImagePipeline::new(config.pipeline)),
            classifier: DetectionClassifier::new(&config.classifier),
            config: config.orchestrator,
            collaborators,
            status: StatusBoard::new(),
            metrics: Arc::new(MetricsRecorder::new()),
            tx,
            rx,
            current: DoorState::Unknown,
            next_cycle: 0,
            run_floor: 0,
            last_applied: None,
            saves_in_flight: 0,
        }
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            tx: self.tx.clone(),
            status: self.status.subscribe(),
            schedule: self.scheduler.observer(),
            metrics: self.metrics.clone(),
        }
    }

    pub fn door_state(&self) -> DoorState {
        self.current
    }

    pub fn status(&self) -> LoopStatus {
        self.status.snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Loads the model, then drains the event queue until `Shutdown`.
    pub async fn run(mut self) {
        self.load_model();
        while let Some(event) = self.rx.recv().await {
            if self.handle_event(event) == Flow::Shutdown {
                break;
            }
        }
        self.scheduler.stop();
        info!("control loop shut down in state {}", self.current);
    }

    fn handle_event(&mut self, event: LoopEvent) -> Flow {
        match event {
            LoopEvent::Command(command) => return self.on_command(command),
            LoopEvent::Schedule(ScheduleEvent::CountdownComplete) => {
                info!("countdown finished, starting photo capture");
                self.status
                    .update(|status| status.capture_status = "Capturing".into());
            }
            LoopEvent::Schedule(ScheduleEvent::PhotoCapture { photos_taken }) => {
                self.on_photo_capture(photos_taken)
            }
            LoopEvent::FrameProcessed { cycle, result } => self.on_frame_processed(cycle, result),
            LoopEvent::Inferred { cycle, result } => self.on_inferred(cycle, result),
            LoopEvent::Stored(result) => self.on_stored(result),
            LoopEvent::ModelLoaded(result) => self.on_model_loaded(result),
        }
        Flow::Continue
    }

    fn on_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Start => self.start(),
            Command::Stop => {
                self.scheduler.stop();
                self.status
                    .update(|status| status.capture_status = "Stopped".into());
            }
            Command::Reset => {
                self.scheduler.reset();
                self.status
                    .update(|status| status.capture_status = "Idle".into());
            }
            Command::ResetCounter => self.reset_counter(),
            Command::Probe => {
                let notifier = self.collaborators.notifier.clone();
                tokio::spawn(async move {
                    if let Err(err) = notifier.probe().await {
                        debug!("probe finished with error: {}", err);
                    }
                });
            }
            Command::ReloadModel => self.load_model(),
            Command::Shutdown => return Flow::Shutdown,
        }
        Flow::Continue
    }

    fn collection_complete(&self) -> bool {
        let saved = self.status.snapshot().images_saved;
        self.config.max_images.is_some_and(|max| saved >= max)
    }

    fn start(&mut self) {
        if self.collection_complete() {
            info!("collection already complete, not starting");
            self.status
                .update(|status| status.capture_status = "Collection complete".into());
            return;
        }
        self.run_floor = self.next_cycle;
        self.last_applied = None;
        self.scheduler.start(QueueDelegate {
            tx: self.tx.clone(),
        });
        self.status
            .update(|status| status.capture_status = "Countdown".into());
    }

    fn reset_counter(&mut self) {
        if let Some(store) = &self.collaborators.store {
            store.reset_count();
        }
        info!("stored image count reset");
        let capped = self.collection_complete();
        self.status.update(|status| {
            status.images_saved = 0;
            status.save_status = String::new();
            if capped {
                status.capture_status = "Idle".into();
            }
        });
    }

    fn finish_collection(&mut self) {
        info!("collection complete, stopping capture");
        self.scheduler.stop();
        self.status
            .update(|status| status.capture_status = "Collection complete".into());
    }

    fn load_model(&mut self) {
        self.status.update(|status| {
            status.is_model_loaded = false;
            status.inference_status = "Loading model...".into();
        });
        let inference = self.collaborators.inference.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = inference.load().await;
            let _ = tx.send(LoopEvent::ModelLoaded(result));
        });
    }

    fn on_model_loaded(&mut self, result: Result<(), InferenceError>) {
        match result {
            Ok(()) => {
                info!("model loaded");
                self.status.update(|status| {
                    status.is_model_loaded = true;
                    status.inference_status = "Model loaded successfully".into();
                });
            }
            Err(err) => {
                warn!("model loading failed: {}", err);
                let ready = self.collaborators.inference.is_ready();
                let text = match &err {
                    InferenceError::NotConfigured(_) => inference_failure_text(&err),
                    InferenceError::Failed(reason) => format!("Model loading failed: {}", reason),
                    InferenceError::ModelNotReady => format!("Model loading failed: {}", err),
                };
                self.status.update(|status| {
                    status.is_model_loaded = ready;
                    status.inference_status = text;
                });
            }
        }
    }

    fn on_photo_capture(&mut self, photos_taken: u64) {
        if !self.scheduler.is_running() {
            debug!("ignoring capture tick {} queued before stop", photos_taken);
            return;
        }
        if self.collection_complete() {
            self.finish_collection();
            return;
        }

        let cycle = self.next_cycle;
        self.next_cycle += 1;
        self.metrics.record_dispatched();
        self.status
            .update(|status| status.capture_status = format!("Capturing photo {}", photos_taken));

        let frames = self.collaborators.frames.clone();
        let pipeline = self.pipeline.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = capture_and_process(frames, pipeline).await;
            let _ = tx.send(LoopEvent::FrameProcessed { cycle, result });
        });
    }

    /// Whether a result from `cycle` may still touch loop state.
    fn accepts(&self, cycle: u64) -> bool {
        self.scheduler.is_running() && cycle >= self.run_floor
    }

    fn discard(&self, cycle: u64, what: &str) {
        debug!("discarding {} of cycle {}", what, cycle);
        self.metrics.record_discarded();
    }

    fn on_frame_processed(&mut self, cycle: u64, result: Result<ProcessedImage, CycleError>) {
        if !self.accepts(cycle) {
            self.discard(cycle, "frame");
            return;
        }
        let image = match result {
            Ok(image) => image,
            Err(err) => {
                warn!("cycle {} skipped: {}", cycle, err);
                self.metrics.record_error();
                self.status
                    .update(|status| status.capture_status = err.to_string());
                return;
            }
        };

        info!("cycle {}: processed image size {}KB", cycle, image.size_kb());
        self.status
            .update(|status| status.last_image_kb = Some(image.size_kb()));
        self.dispatch_store(&image);

        let inference = self.collaborators.inference.clone();
        if !inference.is_ready() {
            warn!("cycle {}: model not loaded yet", cycle);
            self.metrics.record_error();
            self.status
                .update(|status| status.inference_status = inference_failure_text(&InferenceError::ModelNotReady));
            return;
        }

        self.status
            .update(|status| status.inference_status = "Running inference...".into());
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = inference.detect(&image).await;
            let _ = tx.send(LoopEvent::Inferred { cycle, result });
        });
    }

    fn dispatch_store(&mut self, image: &ProcessedImage) {
        let Some(store) = self.collaborators.store.clone() else {
            return;
        };
        self.saves_in_flight += 1;
        self.status.update(|status| {
            status.is_saving = true;
            status.save_status = "Saving image...".into();
        });
        let image = image.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = store.store(&image).await;
            let _ = tx.send(LoopEvent::Stored(result));
        });
    }

    fn on_stored(&mut self, result: Result<usize, StoreError>) {
        self.saves_in_flight = self.saves_in_flight.saturating_sub(1);
        let saving = self.saves_in_flight > 0;
        match result {
            Ok(total) => {
                self.status.update(|status| {
                    status.is_saving = saving;
                    status.images_saved = total;
                    status.save_status = format!("Saved {} images", total);
                });
                if self.scheduler.is_running() && self.collection_complete() {
                    self.finish_collection();
                }
            }
            Err(err) => {
                warn!("image not saved: {}", err);
                let text = match &err {
                    StoreError::PermissionDenied(_) => "Photo library access denied".to_string(),
                    StoreError::StoreFailed(reason) => format!("Failed to save: {}", reason),
                };
                self.status.update(|status| {
                    status.is_saving = saving;
                    status.save_status = text;
                });
            }
        }
    }

    fn on_inferred(&mut self, cycle: u64, result: Result<Vec<RawDetection>, InferenceError>) {
        if !self.accepts(cycle) {
            self.discard(cycle, "inference result");
            return;
        }
        let detections = match result {
            Ok(detections) => detections,
            Err(err) => {
                warn!("cycle {}: {}", cycle, err);
                self.metrics.record_error();
                self.status
                    .update(|status| status.inference_status = inference_failure_text(&err));
                return;
            }
        };
        if self.config.discard_stale && self.last_applied.is_some_and(|last| cycle < last) {
            self.discard(cycle, "stale inference result");
            return;
        }
        self.last_applied = Some(cycle);
        self.metrics.record_completed();

        for (index, detection) in detections.iter().enumerate() {
            debug!(
                "cycle {} detection {}: {} ({:.2})",
                cycle,
                index + 1,
                detection.label,
                detection.confidence
            );
        }
        let verdict = self.classifier.classify(&detections);
        let text = if detections.is_empty() {
            "No detections found".to_string()
        } else {
            format!("Found {} objects", detections.len())
        };
        self.status.update(|status| {
            status.inference_status = text;
            status.last_inference_results = detections;
        });
        self.apply_verdict(cycle, verdict);
    }

    fn apply_verdict(&mut self, cycle: u64, verdict: Verdict) {
        let Some(state) = verdict.door_state() else {
            debug!("cycle {}: no authoritative label", cycle);
            return;
        };
        if state == self.current {
            debug!("cycle {}: door still {}", cycle, state);
            return;
        }

        info!("cycle {}: door {} -> {}", cycle, self.current, state);
        self.current = state;
        self.status.update(|status| status.door_state = state);
        self.metrics.record_notification();

        let notifier = self.collaborators.notifier.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(state).await {
                debug!("notification for {} lost: {}", state, err);
            }
        });
    }
}

async fn capture_and_process(
    frames: Arc<dyn FrameSource>,
    pipeline: Arc<ImagePipeline>,
) -> Result<ProcessedImage, CycleError> {
    let raw = frames.request_frame().await?;
    let processed = tokio::task::spawn_blocking(move || pipeline.process(&raw))
        .await
        .map_err(|err| PipelineError::Internal(err.to_string()))??;
    Ok(processed)
}

fn inference_failure_text(err: &InferenceError) -> String {
    match err {
        InferenceError::ModelNotReady => "Model not loaded".into(),
        InferenceError::NotConfigured(what) => format!("Please configure {}", what),
        InferenceError::Failed(reason) => format!("Inference failed: {}", reason),
    }
}
