//! Events delivered to the UI

use crossbeam_channel::Sender;
use std::fmt::Display;
use std::path::PathBuf;
use tracing::error;

/// Which part of the pipeline an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    ThumbnailLoop,
    Thumbnail,
    Animation,
}

/// Within one sequence the order is always `ThumbnailReady`, frame
/// `Progress`, `PreviewReady`, then `Progress(100.0)`.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewEvent {
    /// The target is embedded and can be sampled
    TargetAttached,
    ThumbnailReady(PathBuf),
    /// Only sent when an animation was recorded
    PreviewReady(PathBuf),
    /// Percent, 0 to 100
    Progress(f64),
    Failed { stage: CaptureStage, message: String },
}

/// Fire-and-forget sender; a dropped receiver is not an error
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: Sender<PreviewEvent>,
}

impl EventSink {
    pub fn new(tx: Sender<PreviewEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: PreviewEvent) {
        let _ = self.tx.send(event);
    }

    pub fn progress(&self, percent: f64) {
        self.send(PreviewEvent::Progress(percent.clamp(0.0, 100.0)));
    }

    pub fn failed(&self, stage: CaptureStage, err: impl Display) {
        error!(?stage, error = %err, "capture step failed");
        self.send(PreviewEvent::Failed {
            stage,
            message: err.to_string(),
        });
    }
}
