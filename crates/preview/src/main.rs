//! livecap - capture a thumbnail and animated preview of a screen region
//!
//! Usage: livecap <output-dir> <x> <y> <width> <height>
//!
//! Settings are read from `livecap.toml` in the working directory when present.

use anyhow::{bail, Context};
use capture_gdi::Rect;
use preview::logging::init_logging;
use preview::PreviewConfig;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "livecap.toml";

struct Args {
    output_dir: PathBuf,
    rect: Rect,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 5 {
        bail!("usage: livecap <output-dir> <x> <y> <width> <height>");
    }
    let int = |i: usize, name: &str| -> anyhow::Result<i64> {
        args[i]
            .parse()
            .with_context(|| format!("{name} must be an integer, got {:?}", args[i]))
    };
    Ok(Args {
        output_dir: PathBuf::from(&args[0]),
        rect: Rect::new(
            int(1, "x")? as i32,
            int(2, "y")? as i32,
            u32::try_from(int(3, "width")?).context("width must be positive")?,
            u32::try_from(int(4, "height")?).context("height must be positive")?,
        ),
    })
}

fn load_config() -> anyhow::Result<PreviewConfig> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        Ok(PreviewConfig::load(path)?)
    } else {
        Ok(PreviewConfig::default())
    }
}

fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let config = load_config()?;
    init_logging(&config.log_level);

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("cannot create {}", args.output_dir.display()))?;
    args.rect.validate()?;

    run(args, config)
}

#[cfg(windows)]
fn run(args: Args, config: PreviewConfig) -> anyhow::Result<()> {
    use capture_gdi::{GdiSurfaceApi, PixelCapture, WindowHandle};
    use preview::{FixedHost, PreviewController, PreviewEvent, TargetKind};
    use tracing::info;
    use windows::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

    let foreground = unsafe { GetForegroundWindow() };
    let host = FixedHost {
        handle: WindowHandle(foreground.0 as isize),
        kind: TargetKind::MovingSource,
        rect: args.rect,
    };

    let (mut controller, events) =
        PreviewController::spawn(host, PixelCapture::new(GdiSurfaceApi), config)?;
    controller.notify_target_attached();
    controller.start_capture(&args.output_dir)?;

    for event in events.iter() {
        match event {
            PreviewEvent::ThumbnailReady(path) => println!("thumbnail: {}", path.display()),
            PreviewEvent::PreviewReady(path) => println!("preview: {}", path.display()),
            PreviewEvent::Failed { stage, message } => eprintln!("{stage:?} failed: {message}"),
            PreviewEvent::Progress(p) if p >= 100.0 => break,
            PreviewEvent::Progress(_) | PreviewEvent::TargetAttached => {}
        }
    }

    controller.close();
    info!("done");
    Ok(())
}

#[cfg(not(windows))]
fn run(_args: Args, _config: PreviewConfig) -> anyhow::Result<()> {
    bail!("livecap captures through GDI and only runs on Windows")
}
