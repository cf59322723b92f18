pub mod scheduler;

pub use scheduler::{CaptureScheduler, Phase, ScheduleObserver, ScheduleSnapshot, SchedulerDelegate};
