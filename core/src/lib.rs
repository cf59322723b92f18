//! Core control loop for the Doorwatch camera agent.
//!
//! A countdown then a fixed-cadence capture schedule drive frames through a
//! normalisation pipeline, an object-detection collaborator and a two-pass
//! classifier. Door-state changes are pushed to an actuator controller over
//! HTTP, once per change.

pub mod decision;
pub mod interface;
pub mod notify;
pub mod orchestrator;
pub mod prelude;
pub mod processing;
pub mod schedule;
pub mod telemetry;

pub use orchestrator::{CaptureOrchestrator, Collaborators, Command, OrchestratorHandle};
pub use prelude::{LoopConfig, ProcessingStage, StageInput, StageOutput};
