//! Control façade
//!
//! [`VideoWindow`] owns the GUI thread; [`WindowHandle`] is what the
//! playback/render side keeps. Every request is marshalled onto the GUI thread
//! with a synchronous dispatch and runs against the window state there. Only
//! [`WindowHandle::poll_events`], [`WindowHandle::client_size`] and
//! [`WindowHandle::native_handle`] read shared state directly.
//!
//! All blocking calls here must be made from a plain thread (or
//! `tokio::task::spawn_blocking`), never from an async task.

use crate::config::WindowOptions;
use crate::dispatch::{DispatchError, DispatchQueue};
use crate::gui::{self, Gui, GuiSetup};
use crate::input::InputSink;
use crate::input::keymap::{self, KeyMap};
use crate::platform::{NativeHandle, NativeWindow, Platform, PlatformError};
use crate::state::{EventCallback, EventFlags, Lifecycle, PlaybackState, SharedState};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

/// Requests understood by [`WindowHandle::control`]
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SetFullscreen(bool),
    GetFullscreen,
    SetOntop(bool),
    SetBorder(bool),
    /// Client size outside fullscreen
    GetUnfsWindowSize,
    SetUnfsWindowSize { w: i32, h: i32 },
    GetMinimized,
    SetCursorVisible(bool),
    /// Keep the display and system awake
    KillScreensaver,
    RestoreScreensaver,
    SetTitle(String),
    UpdatePlaybackState(PlaybackState),
    GetDisplayFps,
    /// Monitors intersecting the window
    GetDisplayNames,
    GetIccProfile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Done,
    Bool(bool),
    Size(i32, i32),
    RefreshRate(f64),
    DisplayNames(Vec<String>),
    IccProfile(Vec<u8>),
}

/// A request that changed nothing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("not implemented on this platform")]
    NotImplemented,
    #[error("request failed: {0}")]
    Failed(String),
}

impl From<PlatformError> for ControlError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Unsupported(_) => ControlError::NotImplemented,
            other => ControlError::Failed(other.to_string()),
        }
    }
}

impl From<DispatchError> for ControlError {
    fn from(err: DispatchError) -> Self {
        ControlError::Failed(err.to_string())
    }
}

/// Outcome of a control request, as a plain status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStatus {
    Handled,
    NotImplemented,
    Failed,
}

pub fn status_of<T>(result: &Result<T, ControlError>) -> ControlStatus {
    match result {
        Ok(_) => ControlStatus::Handled,
        Err(ControlError::NotImplemented) => ControlStatus::NotImplemented,
        Err(ControlError::Failed(_)) => ControlStatus::Failed,
    }
}

#[derive(Debug, Error)]
pub enum CreateError {
    #[error("failed to spawn the GUI thread")]
    Spawn(#[source] std::io::Error),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("GUI thread exited during start-up")]
    ThreadExited,
}

/// Cloneable handle to a running window, usable from any thread
pub struct WindowHandle<W> {
    queue: Arc<DispatchQueue<Gui<W>>>,
    shared: Arc<SharedState>,
}

impl<W> Clone for WindowHandle<W> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<W: NativeWindow + 'static> WindowHandle<W> {
    /// Run a request on the GUI thread and wait for its outcome.
    pub fn control(&self, request: Request) -> Result<Response, ControlError> {
        trace!(?request, "control");
        self.queue.submit_sync(move |gui| gui.control(request))?
    }

    /// Take every pending event flag. Never blocks.
    pub fn poll_events(&self) -> EventFlags {
        self.shared.drain()
    }

    /// Client size as of the last resize the GUI thread saw
    pub fn client_size(&self) -> (i32, i32) {
        self.shared.client_size()
    }

    /// Reconfigure for content of the given logical size; returns the client
    /// size the window ends up with.
    pub fn request_resize_for_new_content(&self, w: i32, h: i32) -> Result<(i32, i32), ControlError> {
        Ok(self.queue.submit_sync(move |gui| gui.reconfig(w, h))?)
    }

    /// Run `f` on the GUI thread with the native window and wait for it.
    pub fn run_on_gui_thread<F, R>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut W) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.queue.submit_sync(move |gui| f(gui.window_mut()))
    }

    /// Native window handle; fixed once creation succeeded
    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.shared.native_handle()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle()
    }

    #[cfg(test)]
    pub(crate) fn with_gui<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Gui<W>) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.queue.submit_sync(f).unwrap()
    }
}

/// Configures a window before its GUI thread starts
pub struct WindowBuilder<P: Platform> {
    platform: P,
    sink: Arc<dyn InputSink>,
    options: WindowOptions,
    keymap: KeyMap,
    on_events: Option<EventCallback>,
}

impl<P: Platform> WindowBuilder<P> {
    pub fn options(mut self, options: WindowOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the default virtual-key table
    pub fn keymap(mut self, keymap: KeyMap) -> Self {
        self.keymap = keymap;
        self
    }

    /// Called on the GUI thread whenever event flags are raised
    pub fn on_events(mut self, callback: impl Fn(EventFlags) + Send + Sync + 'static) -> Self {
        self.on_events = Some(Box::new(callback));
        self
    }

    /// Start the GUI thread and wait until the window exists.
    pub fn create(self) -> Result<VideoWindow<P::Window>, CreateError> {
        let shared = Arc::new(SharedState::new(self.on_events));
        let queue = Arc::new(DispatchQueue::new());
        let (ready_tx, ready_rx) = oneshot::channel();

        let setup = GuiSetup {
            options: self.options,
            shared: Arc::clone(&shared),
            queue: Arc::clone(&queue),
            sink: self.sink,
            keymap: self.keymap,
        };
        let platform = self.platform;
        let thread = std::thread::Builder::new()
            .name("vowin-gui".to_string())
            .spawn(move || gui::run(platform, setup, ready_tx))
            .map_err(CreateError::Spawn)?;

        let outcome = match ready_rx.blocking_recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(CreateError::Platform(err)),
            Err(_) => Err(CreateError::ThreadExited),
        };
        if let Err(err) = outcome {
            if thread.join().is_err() {
                error!("GUI thread panicked during start-up");
            }
            return Err(err);
        }

        debug!(handle = ?shared.native_handle(), "window created");
        Ok(VideoWindow {
            handle: WindowHandle { queue, shared },
            thread: Some(thread),
        })
    }
}

/// Owner of a window and its GUI thread.
///
/// Dropping it terminates the window and joins the thread.
pub struct VideoWindow<W: NativeWindow + 'static> {
    handle: WindowHandle<W>,
    thread: Option<JoinHandle<()>>,
}

impl<W: NativeWindow + 'static> VideoWindow<W> {
    /// Start configuring a window on `platform`, delivering input to `sink`.
    pub fn builder<P>(platform: P, sink: Arc<dyn InputSink>) -> WindowBuilder<P>
    where
        P: Platform<Window = W>,
    {
        WindowBuilder {
            platform,
            sink,
            options: WindowOptions::default(),
            keymap: keymap::lookup,
            on_events: None,
        }
    }

    pub fn handle(&self) -> WindowHandle<W> {
        self.handle.clone()
    }

    /// Destroy the window and wait for the GUI thread to finish.
    pub fn terminate_and_join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if let Err(err) = self.handle.queue.submit_sync(|gui| gui.terminate()) {
            debug!(%err, "GUI thread already gone");
        }
        if thread.join().is_err() {
            error!("GUI thread panicked");
        }
    }
}

impl<W: NativeWindow + 'static> std::ops::Deref for VideoWindow<W> {
    type Target = WindowHandle<W>;

    fn deref(&self) -> &WindowHandle<W> {
        &self.handle
    }
}

impl<W: NativeWindow + 'static> Drop for VideoWindow<W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
