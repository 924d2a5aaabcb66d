//! Capture loop controller
//!
//! One worker thread owns every capture. Commands are handled one at a time,
//! so a one-shot sequence can never overlap the periodic thumbnail loop or
//! another sequence.

use crate::config::{CaptureSource, PreviewConfig};
use crate::events::{CaptureStage, EventSink, PreviewEvent};
use crate::guard::{CaptureGuard, CloseDecision};
use crate::host::{PreviewHost, TargetKind};
use crate::state::{CaptureSession, CaptureState, LoopMode, StateMachine};
use crate::{PreviewError, PreviewResult};
use capture_gdi::{CaptureTarget, FrameBuffer, FrameGrabber};
use crossbeam_channel::{never, select, tick, unbounded, Receiver, RecvError, Sender};
use export::{save_still, FrameSequence, GifExportConfig, GifExporter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Capture worker commands
enum Command {
    StartThumbnailLoop { output_dir: PathBuf },
    StartCapture { output_dir: PathBuf },
    StopThumbnailLoop,
    Shutdown,
}

/// Handle to the capture worker
pub struct PreviewController {
    cmd_tx: Sender<Command>,
    events: EventSink,
    guard: CaptureGuard,
    attached: AtomicBool,
    worker: Option<JoinHandle<()>>,
}

impl PreviewController {
    /// Start the worker. Events arrive on the returned receiver.
    pub fn spawn<H, G>(
        host: H,
        grabber: G,
        config: PreviewConfig,
    ) -> PreviewResult<(Self, Receiver<PreviewEvent>)>
    where
        H: PreviewHost + Send + 'static,
        G: FrameGrabber + Send + 'static,
    {
        config.validate()?;

        let (cmd_tx, cmd_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let events = EventSink::new(event_tx);
        let guard = CaptureGuard::new();

        let worker = CaptureWorker::new(host, grabber, config, guard.clone(), events.clone());
        let handle = thread::Builder::new()
            .name("preview-capture".into())
            .spawn(move || worker.run(cmd_rx))?;

        Ok((
            Self {
                cmd_tx,
                events,
                guard,
                attached: AtomicBool::new(false),
                worker: Some(handle),
            },
            event_rx,
        ))
    }

    /// Read-only view of the capture state for the hosting window
    pub fn guard(&self) -> CaptureGuard {
        self.guard.clone()
    }

    /// Report that the target is embedded. Only the first call emits.
    pub fn notify_target_attached(&self) {
        if !self.attached.swap(true, Ordering::SeqCst) {
            self.events.send(PreviewEvent::TargetAttached);
        }
    }

    /// Refresh a temporary thumbnail in `output_dir` on every interval tick.
    pub fn start_thumbnail_loop(&self, output_dir: impl Into<PathBuf>) -> PreviewResult<()> {
        self.send(Command::StartThumbnailLoop {
            output_dir: output_dir.into(),
        })
    }

    pub fn stop_thumbnail_loop(&self) -> PreviewResult<()> {
        self.send(Command::StopThumbnailLoop)
    }

    /// Capture the final thumbnail and, if enabled, the animated preview.
    ///
    /// The guard engages before this returns, so a close request that races
    /// the worker is already deferred. Refused with `Busy` while a sequence
    /// is still running.
    pub fn start_capture(&self, output_dir: impl Into<PathBuf>) -> PreviewResult<()> {
        if !self.guard.try_engage(CaptureState::CapturingStill) {
            return Err(PreviewError::Busy);
        }
        if let Err(e) = self.send(Command::StartCapture {
            output_dir: output_dir.into(),
        }) {
            self.guard.set(CaptureState::Idle);
            return Err(e);
        }
        Ok(())
    }

    /// Shut the worker down unless a capture is in flight.
    pub fn close(&mut self) -> CloseDecision {
        let decision = self.guard.request_close();
        if decision == CloseDecision::Proceed {
            self.shutdown();
        }
        decision
    }

    fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    fn send(&self, cmd: Command) -> PreviewResult<()> {
        self.cmd_tx.send(cmd).map_err(|_| PreviewError::WorkerGone)
    }
}

impl Drop for PreviewController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Result of one periodic tick
#[derive(Debug, PartialEq)]
enum TickOutcome {
    /// No periodic loop is running
    Idle,
    /// Static target already captured
    Unchanged,
    Captured { path: PathBuf, deleted: Option<PathBuf> },
    Failed,
}

/// Clears the guard and reports completion however a sequence ends
struct SequenceFinish {
    guard: CaptureGuard,
    events: EventSink,
}

impl Drop for SequenceFinish {
    fn drop(&mut self) {
        self.guard.set(CaptureState::Idle);
        self.events.progress(100.0);
    }
}

struct CaptureWorker<H, G> {
    host: H,
    grabber: G,
    config: PreviewConfig,
    guard: CaptureGuard,
    events: EventSink,
    exporter: GifExporter,
    machine: StateMachine,
    ticker: Receiver<Instant>,
    /// Loop thumbnail left behind when the loop stopped, removed on teardown
    stale_thumbnail: Option<PathBuf>,
}

impl<H: PreviewHost, G: FrameGrabber> CaptureWorker<H, G> {
    fn new(host: H, grabber: G, config: PreviewConfig, guard: CaptureGuard, events: EventSink) -> Self {
        let exporter = GifExporter::new(GifExportConfig {
            sample_factor: config.quantize_sample_factor,
            ..Default::default()
        });
        Self {
            host,
            grabber,
            config,
            guard,
            events,
            exporter,
            machine: StateMachine::new(),
            ticker: never(),
            stale_thumbnail: None,
        }
    }

    fn run(mut self, commands: Receiver<Command>) {
        debug!("capture worker started");
        loop {
            let ticker = self.ticker.clone();
            let keep_running = select! {
                recv(commands) -> cmd => self.handle(cmd),
                recv(ticker) -> _ => {
                    if let TickOutcome::Captured { path, deleted: Some(old) } = self.on_tick() {
                        debug!(new = %path.display(), old = %old.display(), "thumbnail replaced");
                    }
                    true
                }
            };
            if !keep_running {
                break;
            }
        }
        self.teardown();
    }

    fn handle(&mut self, cmd: Result<Command, RecvError>) -> bool {
        match cmd {
            Ok(Command::StartThumbnailLoop { output_dir }) => self.start_periodic(output_dir),
            Ok(Command::StartCapture { output_dir }) => self.run_sequence(output_dir),
            Ok(Command::StopThumbnailLoop) => self.stop_periodic(),
            Ok(Command::Shutdown) | Err(_) => return false,
        }
        true
    }

    fn start_periodic(&mut self, output_dir: PathBuf) {
        let session = CaptureSession::new(output_dir, self.host.target_handle());
        if !self.machine.start_periodic(session) {
            self.events
                .failed(CaptureStage::ThumbnailLoop, "a capture task is already running");
            return;
        }
        self.ticker = tick(self.config.thumbnail_interval());
        info!(interval_ms = self.config.thumbnail_interval_ms, "thumbnail loop started");
    }

    fn stop_periodic(&mut self) {
        self.ticker = never();
        if let Some(session) = self.machine.stop_periodic() {
            if let Some(path) = session.last_thumbnail {
                if let Some(older) = self.stale_thumbnail.replace(path) {
                    let _ = remove_temp(&older);
                }
            }
            info!("thumbnail loop stopped");
        }
    }

    fn on_tick(&mut self) -> TickOutcome {
        if self.machine.mode() != LoopMode::Periodic {
            return TickOutcome::Idle;
        }
        let kind = self.host.target_kind();
        let Some(session) = self.machine.session_mut() else {
            return TickOutcome::Idle;
        };
        // A picture cannot change after the first capture.
        if session.last_thumbnail.is_some() && kind == TargetKind::StaticImage {
            return TickOutcome::Unchanged;
        }

        let output_dir = session.output_dir.clone();
        let mut deleted = None;
        let mut stop = false;
        if let Some(previous) = session.last_thumbnail.take() {
            match remove_temp(&previous) {
                Ok(()) => deleted = Some(previous),
                Err(e) => {
                    warn!(path = %previous.display(), error = %e, "cannot delete previous thumbnail, stopping loop");
                    stop = true;
                }
            }
        }

        let outcome = match self.capture_still(&output_dir) {
            Ok(path) => {
                if let Some(session) = self.machine.session_mut() {
                    session.last_thumbnail = Some(path.clone());
                }
                self.events.send(PreviewEvent::ThumbnailReady(path.clone()));
                TickOutcome::Captured { path, deleted }
            }
            Err(e) => {
                self.events.failed(CaptureStage::ThumbnailLoop, e);
                TickOutcome::Failed
            }
        };

        if stop {
            self.stop_periodic();
        }
        outcome
    }

    fn run_sequence(&mut self, output_dir: PathBuf) {
        self.stop_periodic();

        let _finish = SequenceFinish {
            guard: self.guard.clone(),
            events: self.events.clone(),
        };
        let session = CaptureSession::new(output_dir.clone(), self.host.target_handle());
        if !self.machine.begin_one_shot(session) {
            self.events
                .failed(CaptureStage::Thumbnail, "periodic loop is still running");
            return;
        }
        info!(output_dir = %output_dir.display(), "capture sequence started");

        self.capture_sequence(&output_dir);
        self.machine.finish_one_shot();
    }

    fn capture_sequence(&mut self, output_dir: &Path) {
        self.guard.set(CaptureState::CapturingStill);
        thread::sleep(self.config.settle_delay());

        match self.capture_still(output_dir) {
            Ok(path) => {
                info!(path = %path.display(), "thumbnail saved");
                self.events.send(PreviewEvent::ThumbnailReady(path));
            }
            Err(e) => self.events.failed(CaptureStage::Thumbnail, e),
        }

        if !self.config.animation_enabled || self.host.target_kind() == TargetKind::StaticImage {
            debug!("animation skipped");
            return;
        }

        self.guard.set(CaptureState::CapturingSequence);
        match self.capture_animation(output_dir) {
            Ok(path) => self.events.send(PreviewEvent::PreviewReady(path)),
            Err(e) => self.events.failed(CaptureStage::Animation, e),
        }
    }

    /// Sample `total_frames` frames at the capture cadence and encode them
    /// at the playback cadence. Failed frames are skipped, not retried.
    fn capture_animation(&self, output_dir: &Path) -> PreviewResult<PathBuf> {
        let total = self.config.total_frames;
        let delay = self.config.capture_delay();
        let mut sequence = FrameSequence::with_capacity(total);

        for i in 0..total {
            match self.grab() {
                Ok(frame) => sequence.push(frame),
                Err(e) => warn!(frame = i, error = %e, "frame skipped"),
            }
            thread::sleep(delay);
            self.events.progress((i * 100 / total) as f64);
        }
        debug!(captured = sequence.len(), total, "frames collected");

        let path = output_dir.join(random_file_name("gif"));
        self.exporter
            .save_animation(&sequence, &path, self.config.playback_delay_ms())?;
        Ok(path)
    }

    fn capture_still(&self, output_dir: &Path) -> PreviewResult<PathBuf> {
        let frame = self.grab()?;
        let path = output_dir.join(random_file_name("jpg"));
        save_still(&frame, &path, self.config.jpeg_quality)?;
        Ok(path)
    }

    /// Resolve the target from the host and capture it. Never cached.
    fn grab(&self) -> PreviewResult<FrameBuffer> {
        let target = match self.config.source {
            CaptureSource::Region => CaptureTarget::ScreenRegion(self.host.capture_rectangle()?),
            CaptureSource::Window => CaptureTarget::Window(self.host.target_handle()),
        };
        Ok(self.grabber.grab(&target)?)
    }

    fn teardown(&mut self) {
        self.stop_periodic();
        if let Some(path) = self.stale_thumbnail.take() {
            if let Err(e) = remove_temp(&path) {
                debug!(path = %path.display(), error = %e, "temporary thumbnail left behind");
            }
        }
        self.guard.set(CaptureState::Idle);
        debug!("capture worker stopped");
    }
}

/// Delete a temporary file. A file that is already gone counts as deleted.
fn remove_temp(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn random_file_name(extension: &str) -> String {
    format!("{}.{extension}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_gdi::{CaptureError, CaptureResult, Rect, WindowHandle};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU32;

    struct TestHost {
        kind: TargetKind,
    }

    impl PreviewHost for TestHost {
        fn target_handle(&self) -> WindowHandle {
            WindowHandle(0x1000)
        }

        fn target_kind(&self) -> TargetKind {
            self.kind
        }

        fn capture_rectangle(&self) -> CaptureResult<Rect> {
            Ok(Rect::new(100, 100, 24, 16))
        }
    }

    /// Each grab returns a different shade. Every target asked for is recorded.
    #[derive(Default)]
    struct Shades {
        calls: AtomicU32,
        fail: bool,
        fail_odd_calls: bool,
        targets: Mutex<Vec<CaptureTarget>>,
    }

    impl FrameGrabber for Shades {
        fn grab(&self, target: &CaptureTarget) -> CaptureResult<FrameBuffer> {
            self.targets.lock().push(*target);
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail || (self.fail_odd_calls && n % 2 == 1) {
                return Err(CaptureError::CaptureFailure("BitBlt failed".into()));
            }
            let (width, height) = match *target {
                CaptureTarget::ScreenRegion(rect) => (rect.width, rect.height),
                CaptureTarget::Window(_) => (20, 10),
            };
            let shade = (n * 40 % 256) as u8;
            Ok(FrameBuffer::solid(width, height, [shade, 255 - shade, 90, 255]))
        }
    }

    fn test_config() -> PreviewConfig {
        PreviewConfig {
            settle_delay_ms: 0,
            capture_fps: 1000,
            total_frames: 5,
            ..Default::default()
        }
    }

    fn worker(kind: TargetKind, grabber: Shades) -> (CaptureWorker<TestHost, Shades>, Receiver<PreviewEvent>) {
        worker_with(kind, grabber, test_config())
    }

    fn worker_with(
        kind: TargetKind,
        grabber: Shades,
        config: PreviewConfig,
    ) -> (CaptureWorker<TestHost, Shades>, Receiver<PreviewEvent>) {
        let (tx, rx) = unbounded();
        let worker = CaptureWorker::new(TestHost { kind }, grabber, config, CaptureGuard::new(), EventSink::new(tx));
        (worker, rx)
    }

    fn gif_frames(path: &Path) -> usize {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(fs::File::open(path).unwrap()).unwrap();
        let mut count = 0;
        while decoder.read_next_frame().unwrap().is_some() {
            count += 1;
        }
        count
    }

    fn files_in(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn three_ticks_delete_two_predecessors() {
        let dir = tempfile::tempdir().unwrap();
        let (mut worker, events) = worker(TargetKind::MovingSource, Shades::default());
        worker.start_periodic(dir.path().to_path_buf());

        let outcomes: Vec<_> = (0..3).map(|_| worker.on_tick()).collect();
        let mut paths = Vec::new();
        let mut deletions = 0;
        for outcome in outcomes {
            match outcome {
                TickOutcome::Captured { path, deleted } => {
                    if let Some(deleted) = deleted {
                        assert_eq!(Some(&deleted), paths.last());
                        deletions += 1;
                    }
                    paths.push(path);
                }
                other => panic!("unexpected tick: {other:?}"),
            }
        }
        assert_eq!(deletions, 2);

        let emitted: Vec<_> = events.try_iter().collect();
        assert_eq!(
            emitted,
            paths.iter().cloned().map(PreviewEvent::ThumbnailReady).collect::<Vec<_>>()
        );
        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[1], paths[2]);
        assert_ne!(paths[0], paths[2]);
        assert_eq!(files_in(dir.path()), 1);
        assert!(paths[2].exists());
    }

    #[test]
    fn static_target_is_captured_once() {
        let dir = tempfile::tempdir().unwrap();
        let (mut worker, events) = worker(TargetKind::StaticImage, Shades::default());
        worker.start_periodic(dir.path().to_path_buf());

        assert!(matches!(worker.on_tick(), TickOutcome::Captured { deleted: None, .. }));
        assert_eq!(worker.on_tick(), TickOutcome::Unchanged);
        assert_eq!(worker.on_tick(), TickOutcome::Unchanged);
        assert_eq!(events.try_iter().count(), 1);
        assert_eq!(files_in(dir.path()), 1);
    }

    #[test]
    fn missing_previous_thumbnail_counts_as_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let (mut worker, _events) = worker(TargetKind::MovingSource, Shades::default());
        worker.start_periodic(dir.path().to_path_buf());

        let TickOutcome::Captured { path, .. } = worker.on_tick() else {
            panic!("first tick did not capture");
        };
        fs::remove_file(&path).unwrap();

        assert!(matches!(worker.on_tick(), TickOutcome::Captured { deleted: Some(_), .. }));
        assert_eq!(worker.machine.mode(), LoopMode::Periodic);
    }

    #[test]
    fn undeletable_thumbnail_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut worker, _events) = worker(TargetKind::MovingSource, Shades::default());
        worker.start_periodic(dir.path().to_path_buf());

        let TickOutcome::Captured { path, .. } = worker.on_tick() else {
            panic!("first tick did not capture");
        };
        // A directory in its place cannot be removed with remove_file.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(matches!(worker.on_tick(), TickOutcome::Captured { deleted: None, .. }));
        assert_eq!(worker.machine.mode(), LoopMode::Stopped);
        assert_eq!(worker.on_tick(), TickOutcome::Idle);
    }

    #[test]
    fn sequence_preempts_periodic_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut worker, events) = worker(TargetKind::MovingSource, Shades::default());
        worker.start_periodic(dir.path().to_path_buf());
        worker.on_tick();

        worker.run_sequence(dir.path().to_path_buf());
        assert_eq!(worker.machine.mode(), LoopMode::Stopped);
        assert_eq!(worker.on_tick(), TickOutcome::Idle);
        assert!(worker.stale_thumbnail.is_some());

        let emitted: Vec<_> = events.try_iter().collect();
        assert!(matches!(emitted.last(), Some(PreviewEvent::Progress(p)) if *p == 100.0));
        assert!(emitted.iter().any(|e| matches!(e, PreviewEvent::PreviewReady(_))));

        worker.teardown();
        // Sequence thumbnail and preview stay; the loop's temp file is gone.
        assert_eq!(files_in(dir.path()), 2);
    }

    #[test]
    fn failed_captures_still_release_the_guard() {
        let dir = tempfile::tempdir().unwrap();
        let grabber = Shades {
            fail: true,
            ..Default::default()
        };
        let (mut worker, events) = worker(TargetKind::MovingSource, grabber);
        let guard = worker.guard.clone();

        worker.run_sequence(dir.path().to_path_buf());

        assert_eq!(guard.state(), CaptureState::Idle);
        let emitted: Vec<_> = events.try_iter().collect();
        assert!(matches!(
            emitted.first(),
            Some(PreviewEvent::Failed { stage: CaptureStage::Thumbnail, .. })
        ));
        assert!(emitted
            .iter()
            .any(|e| matches!(e, PreviewEvent::Failed { stage: CaptureStage::Animation, .. })));
        assert!(!emitted.iter().any(|e| matches!(e, PreviewEvent::PreviewReady(_))));
        assert_eq!(emitted.last(), Some(&PreviewEvent::Progress(100.0)));
        assert_eq!(files_in(dir.path()), 0);
    }

    #[test]
    fn second_loop_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut worker, events) = worker(TargetKind::MovingSource, Shades::default());
        worker.start_periodic(dir.path().to_path_buf());
        worker.start_periodic(dir.path().to_path_buf());
        assert!(matches!(
            events.try_recv(),
            Ok(PreviewEvent::Failed { stage: CaptureStage::ThumbnailLoop, .. })
        ));
        assert_eq!(worker.machine.mode(), LoopMode::Periodic);
    }

    #[test]
    fn failed_frames_are_skipped_and_cadence_holds() {
        let dir = tempfile::tempdir().unwrap();
        let grabber = Shades {
            fail_odd_calls: true,
            ..Default::default()
        };
        let config = PreviewConfig {
            total_frames: 6,
            ..test_config()
        };
        let (mut worker, events) = worker_with(TargetKind::MovingSource, grabber, config);

        worker.run_sequence(dir.path().to_path_buf());

        let emitted: Vec<_> = events.try_iter().collect();
        assert!(matches!(emitted.first(), Some(PreviewEvent::ThumbnailReady(_))));
        let progress: Vec<f64> = emitted
            .iter()
            .filter_map(|e| match e {
                PreviewEvent::Progress(p) if *p < 100.0 => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0.0, 16.0, 33.0, 50.0, 66.0, 83.0]);

        // Grab 0 is the thumbnail; frame grabs 1, 3 and 5 fail.
        let animation = emitted
            .iter()
            .find_map(|e| match e {
                PreviewEvent::PreviewReady(path) => Some(path.clone()),
                _ => None,
            })
            .expect("animation was not saved");
        assert_eq!(gif_frames(&animation), 3);
        assert_eq!(worker.grabber.calls.load(Ordering::SeqCst), 7);
        assert_eq!(emitted.last(), Some(&PreviewEvent::Progress(100.0)));
    }

    #[test]
    fn window_source_grabs_the_host_handle() {
        let dir = tempfile::tempdir().unwrap();
        let config = PreviewConfig {
            source: CaptureSource::Window,
            ..test_config()
        };
        let (mut worker, events) = worker_with(TargetKind::MovingSource, Shades::default(), config);
        worker.start_periodic(dir.path().to_path_buf());

        assert!(matches!(worker.on_tick(), TickOutcome::Captured { .. }));
        assert_eq!(
            *worker.grabber.targets.lock(),
            vec![CaptureTarget::Window(WindowHandle(0x1000))]
        );
        assert!(matches!(events.try_recv(), Ok(PreviewEvent::ThumbnailReady(_))));
    }
}
