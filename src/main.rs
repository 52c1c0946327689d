use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;
use vowin::platform::{NativeWindow, Platform};
use vowin::{
    ChannelSink, ControlError, EventFlags, InputEvent, Key, KeyEvent, KeyState, Request, Response,
    VideoWindow, WindowHandle, WindowOptions, config,
};

#[derive(Parser)]
#[command(name = "vowin", about = "Open a video output window and log what it reports")]
struct Args {
    /// Path to config file (default: ~/.config/vowin/window.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Start in fullscreen, whatever the config says
    #[arg(short, long)]
    fullscreen: bool,

    /// Content width to size the window for
    #[arg(long, default_value_t = 1280)]
    width: i32,

    /// Content height to size the window for
    #[arg(long, default_value_t = 720)]
    height: i32,
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vowin")
        .join("window.toml")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut options = match config::load_or_default(args.config.as_deref(), &default_config_path())
    {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            return ExitCode::FAILURE;
        }
    };
    if args.fullscreen {
        options.fullscreen = true;
    }

    if let Err(err) = run(options, (args.width, args.height)).await {
        error!("{err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(windows)]
async fn run(options: WindowOptions, content: (i32, i32)) -> anyhow::Result<()> {
    run_on(vowin::platform::windows::Win32Platform::new(), options, content).await
}

#[cfg(not(windows))]
async fn run(options: WindowOptions, content: (i32, i32)) -> anyhow::Result<()> {
    tracing::warn!("no native window system on this host, using the headless backend");
    run_on(vowin::platform::headless::HeadlessPlatform::new(), options, content).await
}

async fn run_on<P: Platform>(
    platform: P,
    options: WindowOptions,
    (width, height): (i32, i32),
) -> anyhow::Result<()> {
    let (sink, mut input) = ChannelSink::new();
    let events = Arc::new(Notify::new());
    let on_events = Arc::clone(&events);

    // Creation blocks until the GUI thread has a window
    let window = tokio::task::spawn_blocking(move || {
        VideoWindow::builder(platform, Arc::new(sink))
            .options(options)
            .on_events(move |_| on_events.notify_one())
            .create()
    })
    .await?
    .context("failed to open the video window")?;
    let handle = window.handle();
    info!(native_handle = ?handle.native_handle(), "window open");

    let resize = handle.clone();
    let size = tokio::task::spawn_blocking(move || resize.request_resize_for_new_content(width, height))
        .await??;
    info!(w = size.0, h = size.1, "sized for {width}x{height} content");

    report_display(&handle).await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            event = input.recv() => {
                let Some(event) = event else { break };
                if !handle_input(&handle, event).await? {
                    break;
                }
            }
            _ = events.notified() => {
                let flags = handle.poll_events();
                if flags.contains(EventFlags::RESIZE) {
                    let (w, h) = handle.client_size();
                    info!(w, h, "client area resized");
                }
                if flags.contains(EventFlags::ICC_PROFILE_CHANGED) {
                    report_display(&handle).await;
                }
                debug!(?flags, "window events");
            }
        }
    }

    tokio::task::spawn_blocking(move || window.terminate_and_join()).await?;
    info!("window closed");
    Ok(())
}

/// Run a control request without blocking the runtime
async fn control<W: NativeWindow + 'static>(
    handle: &WindowHandle<W>,
    request: Request,
) -> anyhow::Result<Result<Response, ControlError>> {
    let handle = handle.clone();
    Ok(tokio::task::spawn_blocking(move || handle.control(request)).await?)
}

/// React to one input event. Returns false when the demo should quit.
async fn handle_input<W: NativeWindow + 'static>(
    handle: &WindowHandle<W>,
    event: InputEvent,
) -> anyhow::Result<bool> {
    let InputEvent::Key(KeyEvent { key, state, .. }) = &event else {
        info!(?event, "input");
        return Ok(true);
    };
    match (key, state) {
        (Key::CloseWindow, _) => {
            info!("close requested");
            return Ok(false);
        }
        (Key::Char('q'), KeyState::Down | KeyState::Press) => return Ok(false),
        (Key::Char('f'), KeyState::Down | KeyState::Press) => {
            let fullscreen = matches!(
                control(handle, Request::GetFullscreen).await?,
                Ok(Response::Bool(true))
            );
            control(handle, Request::SetFullscreen(!fullscreen)).await??;
        }
        _ => info!(%key, ?state, "key"),
    }
    Ok(true)
}

async fn report_display<W: NativeWindow + 'static>(handle: &WindowHandle<W>) {
    match control(handle, Request::GetDisplayFps).await {
        Ok(Ok(Response::RefreshRate(hz))) => info!(hz, "display refresh rate"),
        other => debug!(?other, "no refresh rate"),
    }
    match control(handle, Request::GetDisplayNames).await {
        Ok(Ok(Response::DisplayNames(names))) => info!(?names, "window is on"),
        other => debug!(?other, "no display names"),
    }
    match control(handle, Request::GetIccProfile).await {
        Ok(Ok(Response::IccProfile(profile))) => info!(bytes = profile.len(), "color profile"),
        other => debug!(?other, "no color profile"),
    }
}
