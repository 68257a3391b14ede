// src/lib.rs
pub mod capture;
pub mod config;
pub mod core;
pub mod monitoring;
pub mod pacing;
pub mod resources;

// Re-export the main types
pub use crate::core::{ComponentLogger, GovernorError, GovernorResult, LogContext};
pub use pacing::{CapturedFrame, FramePacer, FrameScheduler, PacerDriver, PacerHandle};
pub use resources::{ResourceInterface, ResourcePool, ScopedReservation, SharedResource};
