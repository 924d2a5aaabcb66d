//! Preview capture core for livecap
//!
//! Drives thumbnail and animated-preview capture of an embedded window and
//! keeps the hosting window still while a capture sequence runs.

pub mod config;
pub mod controller;
pub mod events;
pub mod guard;
pub mod host;
pub mod logging;
pub mod state;
#[cfg(windows)]
pub mod win32;

pub use config::{CaptureSource, PreviewConfig};
pub use controller::PreviewController;
pub use events::{CaptureStage, PreviewEvent};
pub use guard::{CaptureGuard, CloseDecision, GeometryChange, GeometryPolicy};
pub use host::{FixedHost, PreviewHost, TargetKind};
pub use state::{CaptureSession, CaptureState, LoopMode, StateMachine};

use capture_gdi::CaptureError;
use export::ExportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("A capture sequence is already running")]
    Busy,

    #[error("Capture worker has stopped")]
    WorkerGone,
}

pub type PreviewResult<T> = Result<T, PreviewError>;
