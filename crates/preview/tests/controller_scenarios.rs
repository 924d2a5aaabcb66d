use capture_gdi::{CaptureResult, CaptureTarget, FrameBuffer, FrameGrabber, Rect, WindowHandle};
use crossbeam_channel::Receiver;
use preview::{
    CaptureState, CloseDecision, GeometryChange, PreviewConfig, PreviewController, PreviewError,
    PreviewEvent, PreviewHost, TargetKind,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const WIDTH: u32 = 32;
const HEIGHT: u32 = 24;

struct Host {
    kind: TargetKind,
}

impl PreviewHost for Host {
    fn target_handle(&self) -> WindowHandle {
        WindowHandle(0x2a)
    }

    fn target_kind(&self) -> TargetKind {
        self.kind
    }

    fn capture_rectangle(&self) -> CaptureResult<Rect> {
        Ok(Rect::new(40, 60, WIDTH, HEIGHT))
    }
}

/// A bar sweeping across a fixed background
#[derive(Default)]
struct SweepingBar {
    frame: AtomicU32,
    delay: Duration,
}

impl FrameGrabber for SweepingBar {
    fn grab(&self, target: &CaptureTarget) -> CaptureResult<FrameBuffer> {
        std::thread::sleep(self.delay);
        let CaptureTarget::ScreenRegion(rect) = target else {
            panic!("expected a region target, got {target:?}");
        };
        let n = self.frame.fetch_add(1, Ordering::SeqCst);
        let bar = n % rect.width;
        let mut frame = FrameBuffer::solid(rect.width, rect.height, [20, 40, 160, 255]);
        for y in 0..rect.height {
            let i = ((y * rect.width + bar) * 4) as usize;
            frame.data[i..i + 4].copy_from_slice(&[250, 220, 10, 255]);
        }
        Ok(frame)
    }
}

fn fast_config() -> PreviewConfig {
    PreviewConfig {
        settle_delay_ms: 0,
        capture_fps: 1000,
        ..Default::default()
    }
}

fn events_until_done(events: &Receiver<PreviewEvent>) -> Vec<PreviewEvent> {
    let mut seen = Vec::new();
    loop {
        let event = events
            .recv_timeout(Duration::from_secs(30))
            .expect("capture sequence did not finish");
        let done = event == PreviewEvent::Progress(100.0);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn gif_frame_count(path: &Path) -> usize {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options
        .read_info(BufReader::new(File::open(path).unwrap()))
        .unwrap();
    let mut count = 0;
    while decoder.read_next_frame().unwrap().is_some() {
        count += 1;
    }
    count
}

#[test]
fn moving_source_emits_thumbnail_progress_preview_then_done() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, events) = PreviewController::spawn(
        Host { kind: TargetKind::MovingSource },
        SweepingBar::default(),
        fast_config(),
    )
    .unwrap();

    controller.start_capture(dir.path()).unwrap();
    let seen = events_until_done(&events);

    assert_eq!(seen.len(), 63, "{seen:?}");
    let PreviewEvent::ThumbnailReady(thumbnail) = &seen[0] else {
        panic!("first event was {:?}", seen[0]);
    };
    assert_eq!(thumbnail.extension().unwrap(), "jpg");
    assert!(thumbnail.exists());

    let progress: Vec<f64> = seen[1..61]
        .iter()
        .map(|e| match e {
            PreviewEvent::Progress(p) => *p,
            other => panic!("expected progress, got {other:?}"),
        })
        .collect();
    assert_eq!(progress.first(), Some(&0.0));
    assert_eq!(progress.last(), Some(&98.0));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));

    let PreviewEvent::PreviewReady(animation) = &seen[61] else {
        panic!("expected the preview, got {:?}", seen[61]);
    };
    assert_eq!(animation.extension().unwrap(), "gif");
    assert_eq!(gif_frame_count(animation), 60);
    assert_eq!(seen[62], PreviewEvent::Progress(100.0));

    assert_eq!(controller.guard().state(), CaptureState::Idle);
    assert_eq!(controller.close(), CloseDecision::Proceed);
}

#[test]
fn static_image_skips_the_animation() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, events) = PreviewController::spawn(
        Host { kind: TargetKind::StaticImage },
        SweepingBar::default(),
        fast_config(),
    )
    .unwrap();

    controller.start_capture(dir.path()).unwrap();
    let seen = events_until_done(&events);

    assert_eq!(seen.len(), 2, "{seen:?}");
    assert!(matches!(seen[0], PreviewEvent::ThumbnailReady(_)));
    assert_eq!(seen[1], PreviewEvent::Progress(100.0));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn disabled_animation_only_saves_the_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let config = PreviewConfig {
        animation_enabled: false,
        ..fast_config()
    };
    let (controller, events) = PreviewController::spawn(
        Host { kind: TargetKind::MovingSource },
        SweepingBar::default(),
        config,
    )
    .unwrap();

    controller.start_capture(dir.path()).unwrap();
    let seen = events_until_done(&events);
    assert!(!seen.iter().any(|e| matches!(e, PreviewEvent::PreviewReady(_))));
    assert_eq!(seen.len(), 2);
}

#[test]
fn close_is_deferred_until_the_sequence_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let grabber = SweepingBar {
        delay: Duration::from_millis(2),
        ..Default::default()
    };
    let (mut controller, events) =
        PreviewController::spawn(Host { kind: TargetKind::MovingSource }, grabber, fast_config())
            .unwrap();
    let guard = controller.guard();

    controller.start_capture(dir.path()).unwrap();
    assert!(guard.is_engaged());
    assert_eq!(controller.close(), CloseDecision::Deferred);

    let mut change = GeometryChange::new(0, 0, 800, 600);
    assert!(guard.filter_geometry_change(&mut change));
    assert!(!change.moves());
    assert!(!change.resizes());

    events_until_done(&events);
    assert_eq!(guard.state(), CaptureState::Idle);
    assert_eq!(controller.close(), CloseDecision::Proceed);
}

#[test]
fn target_attached_is_reported_once() {
    let (controller, events) = PreviewController::spawn(
        Host { kind: TargetKind::MovingSource },
        SweepingBar::default(),
        fast_config(),
    )
    .unwrap();

    controller.notify_target_attached();
    controller.notify_target_attached();

    assert_eq!(events.try_recv(), Ok(PreviewEvent::TargetAttached));
    assert!(events.try_recv().is_err());
}

#[test]
fn invalid_config_is_rejected_before_spawning() {
    let config = PreviewConfig {
        total_frames: 0,
        ..Default::default()
    };
    let result = PreviewController::spawn(
        Host { kind: TargetKind::MovingSource },
        SweepingBar::default(),
        config,
    );
    assert!(result.is_err());
}

#[test]
fn thumbnail_loop_replaces_its_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = PreviewConfig {
        thumbnail_interval_ms: 20,
        ..fast_config()
    };
    let (mut controller, events) = PreviewController::spawn(
        Host { kind: TargetKind::MovingSource },
        SweepingBar::default(),
        config,
    )
    .unwrap();

    controller.start_thumbnail_loop(dir.path()).unwrap();
    let mut thumbnails = Vec::new();
    while thumbnails.len() < 3 {
        match events.recv_timeout(Duration::from_secs(10)).unwrap() {
            PreviewEvent::ThumbnailReady(path) => thumbnails.push(path),
            other => panic!("unexpected event {other:?}"),
        }
    }
    controller.stop_thumbnail_loop().unwrap();
    assert_ne!(thumbnails[0], thumbnails[1]);
    assert_ne!(thumbnails[1], thumbnails[2]);
    assert!(!thumbnails[0].exists());

    // The worker removes the last loop thumbnail on shutdown.
    assert_eq!(controller.close(), CloseDecision::Proceed);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn second_capture_is_refused_while_one_is_running() {
    let dir = tempfile::tempdir().unwrap();
    let grabber = SweepingBar {
        delay: Duration::from_millis(2),
        ..Default::default()
    };
    let (mut controller, events) =
        PreviewController::spawn(Host { kind: TargetKind::MovingSource }, grabber, fast_config())
            .unwrap();

    controller.start_capture(dir.path()).unwrap();
    assert!(matches!(
        controller.start_capture(dir.path()),
        Err(PreviewError::Busy)
    ));

    let seen = events_until_done(&events);
    assert_eq!(seen.len(), 63);
    // Only one sequence was queued, so nothing follows its completion.
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(controller.close(), CloseDecision::Proceed);

    let (mut controller, events) = PreviewController::spawn(
        Host { kind: TargetKind::StaticImage },
        SweepingBar::default(),
        fast_config(),
    )
    .unwrap();
    controller.start_capture(dir.path()).unwrap();
    events_until_done(&events);
    controller.start_capture(dir.path()).unwrap();
    events_until_done(&events);
    assert_eq!(controller.close(), CloseDecision::Proceed);
}
