//! The GUI thread
//!
//! [`run`] is the body of the thread that owns the native window. It creates
//! the window, releases the start-up barrier, pumps messages into [`Gui`] and
//! finally drains the dispatch queue so no caller is left waiting.
//!
//! [`Gui`] is the only place the window and its [`WindowState`] live. Messages
//! reach it through [`MessageHandler::handle`]; other threads reach it only
//! through tasks on the dispatch queue, which run from the same handler when
//! the pump delivers [`Message::Wake`].

use crate::config::WindowOptions;
use crate::control::{ControlError, Request, Response};
use crate::dispatch::DispatchQueue;
use crate::display::load_color_profile;
use crate::geometry::{
    HitArea, Rect, ResizeEdge, add_borders, aspect_locked_resize, borderless_hit_test,
    content_aspect, fit_to_screen, monitors_intersecting, screen_rect_for,
};
use crate::input::InputSink;
use crate::input::decode::{decode_key, releases_all};
use crate::input::drop::DropHandler;
use crate::input::keymap::{KeyMap, vk};
use crate::key::{Key, KeyEvent, KeyState, Modifiers, MouseButton};
use crate::platform::{
    CreateParams, ExecutionState, Message, MessageHandler, NativeHandle, NativeWindow, Platform,
    PlatformError, Reply, TaskbarProgress, WindowLayer, WindowStyle,
};
use crate::state::{EventFlags, Lifecycle, SharedState, WindowState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// Bounded wait of the fallback loop that serves callers once the window is gone
const FALLBACK_WAIT: Duration = Duration::from_secs(1);

/// Everything the GUI thread needs besides the platform
pub(crate) struct GuiSetup<W> {
    pub options: WindowOptions,
    pub shared: Arc<SharedState>,
    pub queue: Arc<DispatchQueue<Gui<W>>>,
    pub sink: Arc<dyn InputSink>,
    pub keymap: KeyMap,
}

pub(crate) struct Gui<W> {
    window: W,
    pub(crate) state: WindowState,
    pub(crate) options: WindowOptions,
    shared: Arc<SharedState>,
    queue: Arc<DispatchQueue<Gui<W>>>,
    sink: Arc<dyn InputSink>,
    keymap: KeyMap,
    drop_target: Arc<DropHandler>,
}

/// Drops queued work if the thread unwinds before its final drain
struct AbandonOnUnwind<'a, C>(&'a DispatchQueue<C>);

impl<C> Drop for AbandonOnUnwind<'_, C> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abandon();
        }
    }
}

/// Body of the GUI thread.
///
/// `ready` fires once, after the window exists or creation failed.
pub(crate) fn run<P: Platform>(
    mut platform: P,
    setup: GuiSetup<P::Window>,
    ready: oneshot::Sender<Result<(), PlatformError>>,
) {
    let shared = Arc::clone(&setup.shared);
    let queue = Arc::clone(&setup.queue);
    let _guard = AbandonOnUnwind(&*queue);

    shared.set_lifecycle(Lifecycle::Creating);
    queue.bind_consumer();
    platform.disable_ime();

    let parent = setup.options.wid.map(NativeHandle);
    let params = CreateParams {
        title: setup.options.title.clone(),
        parent,
        style: style_for(&setup.options, parent.is_some(), false),
    };
    let window = match platform.create_window(&params) {
        Ok(window) => window,
        Err(err) => {
            error!(%err, "failed to create window");
            queue.abandon();
            shared.set_lifecycle(Lifecycle::Exited);
            let _ = ready.send(Err(err));
            return;
        }
    };

    let mut gui = Gui::new(window, setup, parent);
    gui.init();
    shared.set_lifecycle(Lifecycle::Running);
    if ready.send(Ok(())).is_err() {
        // Creator is gone; nobody can ever ask us to terminate
        warn!("window creator went away during start-up");
        gui.terminate();
    }

    platform.run_message_loop(&mut gui);

    // The pump stops with the window. Keep answering callers until told to go.
    while !gui.state.terminate {
        queue.process(&mut gui, FALLBACK_WAIT);
    }
    queue.close_and_drain(&mut gui);
    gui.teardown();
    drop(gui);
    shared.set_lifecycle(Lifecycle::Exited);
}

/// Decoration for the given state
fn style_for(options: &WindowOptions, embedded: bool, fullscreen: bool) -> WindowStyle {
    if embedded {
        WindowStyle::Child
    } else if options.border && !fullscreen {
        WindowStyle::Framed
    } else {
        WindowStyle::Borderless
    }
}

impl<W: NativeWindow + 'static> Gui<W> {
    fn new(window: W, setup: GuiSetup<W>, parent: Option<NativeHandle>) -> Self {
        let drop_target = Arc::new(DropHandler::new(Arc::clone(&setup.sink)));
        Self {
            window,
            state: WindowState::new(parent),
            options: setup.options,
            shared: setup.shared,
            queue: setup.queue,
            sink: setup.sink,
            keymap: setup.keymap,
            drop_target,
        }
    }

    pub(crate) fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    /// One-time setup after creation. Everything here is best-effort.
    fn init(&mut self) {
        self.shared
            .set_native_handle(Some(self.window.native_handle()));

        if let Err(err) = self.window.register_drop_target(self.drop_target.clone()) {
            warn!(%err, "failed to enable drag and drop");
        }
        if self.state.is_embedded() {
            // The parent keeps keyboard focus and mouse input
            self.window.set_enabled(false);
        } else if let Err(err) = self.window.init_taskbar() {
            debug!(%err, "taskbar integration unavailable");
        }

        self.state.cursor_visible = true;
        self.update_screen_rect();
        let (w, h) = self.window.client_size();
        self.shared.publish_client_size(w, h);
        self.queue.set_wakeup(Some(self.window.waker()));
    }

    fn modifiers(&self) -> Modifiers {
        self.window
            .keyboard_state()
            .modifiers(self.sink.use_alt_gr())
    }

    fn style(&self) -> WindowStyle {
        style_for(
            &self.options,
            self.state.is_embedded(),
            self.state.geometry.fullscreen,
        )
    }

    /// Recompute the placement screen for the current fullscreen state
    fn update_screen_rect(&mut self) {
        let fullscreen = self.state.geometry.fullscreen;
        let layout = self.window.monitor_layout();
        self.state.screen_rect = screen_rect_for(self.options.selector(fullscreen), fullscreen, &layout);
    }

    /// Refresh monitor-dependent values if the window changed monitors
    fn update_display_info(&mut self) {
        let monitor = self.window.current_monitor();
        let window = &self.window;
        let events = self
            .state
            .display
            .update(monitor, || window.display_info(monitor));
        self.shared.signal(events);
    }

    fn force_update_display_info(&mut self) {
        self.state.display.invalidate();
        self.update_display_info();
    }

    fn update_playback_state(&mut self) {
        if !self.state.taskbar_button_created {
            return;
        }
        let progress = TaskbarProgress::from_playback(&self.state.playback);
        if let Err(err) = self.window.set_taskbar_progress(progress) {
            debug!(%err, "failed to update taskbar progress");
        }
    }

    /// Apply position, size, decoration and layer from the current options.
    pub(crate) fn reinit_window_state(&mut self) {
        if self.state.is_embedded() {
            return;
        }

        let want_fullscreen = self.options.fullscreen;
        let toggle = want_fullscreen != self.state.geometry.fullscreen;
        let layer = if self.options.ontop {
            WindowLayer::TopMost
        } else {
            WindowLayer::Normal
        };

        // The screen depends on the mode we are switching to
        let layout = self.window.monitor_layout();
        self.state.screen_rect = screen_rect_for(
            self.options.selector(want_fullscreen),
            want_fullscreen,
            &layout,
        );
        self.state
            .geometry
            .apply_fullscreen(want_fullscreen, self.state.screen_rect);
        if toggle {
            self.window.mark_fullscreen(want_fullscreen);
        }

        let style = self.style();
        self.window.set_style(style);
        let borders = self.window.borders(style);

        if !want_fullscreen
            && let Some(client) = fit_to_screen(
                self.state.geometry.client_rect(),
                borders,
                self.state.screen_rect,
                self.options.fit_border,
            )
        {
            self.state.geometry.place(client);
        }

        let window_rect = add_borders(self.state.geometry.client_rect(), borders);
        debug!(
            x = window_rect.x0,
            y = window_rect.y0,
            w = window_rect.width(),
            h = window_rect.height(),
            "reset window bounds"
        );
        self.window.set_placement(window_rect, layer);
        self.shared
            .publish_client_size(self.state.geometry.w, self.state.geometry.h);
        self.shared.signal(EventFlags::RESIZE);
    }

    /// Adapt the window to content of `w` x `h`; the first call also shows it.
    ///
    /// Returns the resulting client size.
    pub(crate) fn reconfig(&mut self, w: i32, h: i32) -> (i32, i32) {
        let mut reset_size = self.state.content_size != (w, h);
        self.state.content_size = (w, h);
        let mut first_placement = false;

        let (new_w, new_h) = if self.state.is_embedded() {
            // An embedded window always matches its parent
            self.state.bounds_initialized = true;
            self.window.client_size()
        } else {
            if !self.state.bounds_initialized {
                self.state.bounds_initialized = true;
                reset_size = true;
                first_placement = true;
                let (x, y) = self.initial_position(w, h);
                let geometry = &mut self.state.geometry;
                geometry.x = x;
                geometry.prev_x = x;
                geometry.y = y;
                geometry.prev_y = y;
            }
            if reset_size {
                self.state.geometry.prev_w = w;
                self.state.geometry.prev_h = h;
                (w, h)
            } else {
                self.window.client_size()
            }
        };

        let geometry = &mut self.state.geometry;
        if !first_placement {
            // Keep the window centred where it was
            geometry.x += geometry.w / 2 - new_w / 2;
            geometry.y += geometry.h / 2 - new_h / 2;
        }
        geometry.w = new_w;
        geometry.h = new_h;

        self.reinit_window_state();
        (self.state.geometry.w, self.state.geometry.h)
    }

    /// Where a client area of `w` x `h` first appears
    fn initial_position(&mut self, w: i32, h: i32) -> (i32, i32) {
        if let Some(position) = self.options.position {
            return (position.x, position.y);
        }
        self.update_screen_rect();
        let screen = self.state.screen_rect;
        (
            screen.x0 + (screen.width() - w) / 2,
            screen.y0 + (screen.height() - h) / 2,
        )
    }

    /// Execute one control request.
    pub(crate) fn control(&mut self, request: Request) -> Result<Response, ControlError> {
        if self.state.destroyed {
            return Err(ControlError::Failed("window is destroyed".to_string()));
        }
        // Destruction may still be on its way through the pump
        if self.state.terminate {
            return Err(ControlError::Failed("window is terminating".to_string()));
        }

        match request {
            Request::SetFullscreen(fullscreen) => {
                self.options.fullscreen = fullscreen;
                if self.state.bounds_initialized && fullscreen != self.state.geometry.fullscreen {
                    self.reinit_window_state();
                }
                Ok(Response::Done)
            }
            Request::GetFullscreen => Ok(Response::Bool(self.state.geometry.fullscreen)),
            Request::SetOntop(ontop) => {
                self.options.ontop = ontop;
                self.reinit_if_placed();
                Ok(Response::Done)
            }
            Request::SetBorder(border) => {
                self.options.border = border;
                self.reinit_if_placed();
                Ok(Response::Done)
            }
            Request::GetUnfsWindowSize => {
                self.require_bounds()?;
                let (w, h) = self.state.geometry.unfullscreen_size();
                Ok(Response::Size(w, h))
            }
            Request::SetUnfsWindowSize { w, h } => {
                self.require_bounds()?;
                if w <= 0 || h <= 0 {
                    return Err(ControlError::Failed(format!("invalid window size {w}x{h}")));
                }
                self.state.geometry.set_unfullscreen_size(w, h);
                self.reinit_window_state();
                Ok(Response::Done)
            }
            Request::GetMinimized => Ok(Response::Bool(self.window.is_minimized())),
            Request::SetCursorVisible(visible) => {
                self.state.cursor_visible = visible;
                if self.state.can_set_cursor && self.state.tracking_mouse {
                    self.window.set_cursor_visible(visible);
                }
                Ok(Response::Done)
            }
            Request::KillScreensaver => {
                self.window.set_execution_state(ExecutionState::KeepAwake)?;
                self.state.disable_screensaver = true;
                Ok(Response::Done)
            }
            Request::RestoreScreensaver => {
                self.window.set_execution_state(ExecutionState::Default)?;
                self.state.disable_screensaver = false;
                Ok(Response::Done)
            }
            Request::SetTitle(title) => {
                self.window.set_title(&title)?;
                Ok(Response::Done)
            }
            Request::UpdatePlaybackState(playback) => {
                self.state.playback = playback;
                self.update_playback_state();
                Ok(Response::Done)
            }
            Request::GetDisplayFps => {
                self.update_display_info();
                Ok(Response::RefreshRate(self.state.display.refresh_hz()))
            }
            Request::GetDisplayNames => {
                let layout = self.window.monitor_layout();
                Ok(Response::DisplayNames(monitors_intersecting(
                    self.state.geometry.client_rect(),
                    &layout,
                )))
            }
            Request::GetIccProfile => {
                self.update_display_info();
                let Some(path) = self.state.display.color_profile() else {
                    return Err(ControlError::Failed("no color profile".to_string()));
                };
                load_color_profile(path)
                    .map(Response::IccProfile)
                    .map_err(|err| {
                        warn!(%err, "failed to load color profile");
                        ControlError::Failed(err.to_string())
                    })
            }
        }
    }

    /// Options given before the first reconfiguration are applied by it
    fn reinit_if_placed(&mut self) {
        if self.state.bounds_initialized {
            self.reinit_window_state();
        }
    }

    fn require_bounds(&self) -> Result<(), ControlError> {
        if self.state.bounds_initialized {
            Ok(())
        } else {
            Err(ControlError::Failed(
                "window bounds are not initialized".to_string(),
            ))
        }
    }

    /// Begin shutdown: destroy the window and stop the fallback wait.
    pub(crate) fn terminate(&mut self) {
        self.state.terminate = true;
        self.shared.set_lifecycle(Lifecycle::Terminating);
        if !self.state.destroyed {
            self.window.destroy();
        }
        self.queue.interrupt();
    }

    /// Release what the thread acquired, after the queue is closed
    fn teardown(&mut self) {
        if !self.state.destroyed {
            self.window.destroy();
        }
        if let Err(err) = self.window.set_execution_state(ExecutionState::Default) {
            trace!(%err, "could not restore execution state");
        }
    }

    fn on_destroyed(&mut self) -> Reply {
        if self.state.destroyed {
            return Reply::Default;
        }
        // Without terminate, someone else destroyed the window (the parent,
        // in embedded mode)
        if !self.state.terminate {
            info!("window destroyed externally");
            self.sink.put_key(KeyEvent::press(Key::CloseWindow));
        }
        self.window.revoke_drop_target();
        self.shared.set_native_handle(None);
        self.state.destroyed = true;
        Reply::Consumed
    }

    fn on_moved(&mut self, x: i32, y: i32) {
        if !self.window.is_minimized() {
            self.state.geometry.x = x;
            self.state.geometry.y = y;
        }
        // May now intersect other monitors
        self.shared.signal(EventFlags::WIN_STATE);
        self.update_display_info();
        debug!(x, y, "move window");
    }

    fn on_resized(&mut self, w: i32, h: i32) {
        if w > 0 && h > 0 {
            self.state.geometry.w = w;
            self.state.geometry.h = h;
            self.shared.publish_client_size(w, h);
            self.shared.signal(EventFlags::RESIZE);
            debug!(w, h, "resize window");
        }
        // Minimized or restored
        self.shared.signal(EventFlags::WIN_STATE);
        self.update_display_info();
    }

    fn on_sizing(&mut self, edge: ResizeEdge, rect: Rect) -> Reply {
        if self.options.keepaspect
            && self.options.keepaspect_window
            && !self.state.geometry.fullscreen
            && !self.state.is_embedded()
        {
            let (w, h) = self.state.content_size;
            let borders = self.window.borders(self.style());
            return Reply::Sizing(aspect_locked_resize(edge, rect, borders, content_aspect(w, h)));
        }
        Reply::Default
    }

    fn on_hit_test(&self, x: i32, y: i32) -> Reply {
        if self.options.border || self.state.geometry.fullscreen || self.state.is_embedded() {
            return Reply::Default;
        }
        if self.window.is_maximized() {
            return Reply::HitTest(HitArea::Client);
        }
        let geometry = &self.state.geometry;
        Reply::HitTest(borderless_hit_test(
            x - geometry.x,
            y - geometry.y,
            geometry.w,
            geometry.h,
            self.window.frame_metrics(),
        ))
    }

    fn on_key_down(&mut self, vkey: u32, scancode: u32, extended: bool, repeat: bool, sys: bool) -> Reply {
        // The system only opens the window menu for keys it translates itself
        if sys && vkey == vk::SPACE {
            self.window.open_system_menu();
            return Reply::Consumed;
        }
        if !repeat {
            let key = (self.keymap)(vkey, extended).or_else(|| {
                let keys = self.window.keyboard_state();
                let use_alt_gr = self.sink.use_alt_gr();
                decode_key(&self.window, keys, vkey, scancode, use_alt_gr, &mut self.state.utf16)
                    .and_then(Key::from_codepoint)
            });
            if let Some(key) = key {
                let modifiers = self.modifiers();
                trace!(%key, ?modifiers, "key down");
                self.sink.put_key(KeyEvent::new(key, modifiers, KeyState::Down));
            }
        }
        // F10 would otherwise enter menu mode
        if vkey == vk::F10 {
            Reply::Consumed
        } else {
            Reply::Default
        }
    }

    fn on_key_up(&mut self, vkey: u32) -> Reply {
        // Releasing everything means no key can get stuck
        if releases_all(vkey) {
            self.sink.release_all();
        }
        if vkey == vk::F10 {
            Reply::Consumed
        } else {
            Reply::Default
        }
    }

    fn on_char(&mut self, unit: u16) -> Reply {
        match self.state.utf16.feed(unit) {
            None => Reply::Consumed,
            // Control characters keep their default handling
            Some(c) if c < 0x20 => Reply::Default,
            Some(c) => {
                if let Some(key) = Key::from_codepoint(c) {
                    let modifiers = self.modifiers();
                    self.sink
                        .put_key(KeyEvent::new(key, modifiers, KeyState::Press));
                }
                Reply::Consumed
            }
        }
    }

    fn on_set_cursor(&mut self, in_client: bool) -> Reply {
        self.state.can_set_cursor = in_client;
        if in_client && !self.state.cursor_visible {
            self.window.set_cursor_visible(false);
            return Reply::Consumed;
        }
        Reply::Default
    }

    fn on_mouse_move(&mut self, x: i32, y: i32) {
        if !self.state.tracking_mouse {
            self.state.tracking_mouse = self.window.track_mouse_leave();
            self.sink.put_key(KeyEvent::press(Key::MouseEnter));
        }
        // Spurious moves with unchanged coordinates are common
        if self.state.mouse_pos != Some((x, y)) {
            self.state.mouse_pos = Some((x, y));
            self.sink.mouse_move(x, y);
        }
    }

    fn on_mouse_button(&mut self, button: MouseButton, down: bool, x: i32, y: i32) -> Reply {
        let modifiers = self.modifiers();
        let state = if down { KeyState::Down } else { KeyState::Up };
        self.sink
            .put_key(KeyEvent::new(Key::Mouse(button), modifiers, state));

        // A plain left press outside any bound area drags the window
        if self.sink.mouse_enabled()
            && button == MouseButton::Left
            && down
            && modifiers.is_empty()
            && !self.state.geometry.fullscreen
            && !self.state.is_embedded()
            && !self.sink.test_dragging(x, y)
        {
            self.window.set_capture(false);
            self.window.begin_drag();
            self.sink.put_key(KeyEvent::new(
                Key::Mouse(MouseButton::Left),
                Modifiers::NONE,
                KeyState::Up,
            ));
            return Reply::Consumed;
        }

        self.window.set_capture(down);
        Reply::Default
    }

    fn on_wheel(&mut self, delta: i32) -> Reply {
        let button = if delta > 0 {
            MouseButton::WheelUp
        } else {
            MouseButton::WheelDown
        };
        let modifiers = self.modifiers();
        self.sink
            .put_key(KeyEvent::new(Key::Mouse(button), modifiers, KeyState::Press));
        self.window.set_capture(false);
        Reply::Default
    }
}

impl<W: NativeWindow + 'static> MessageHandler for Gui<W> {
    fn handle(&mut self, message: Message) -> Reply {
        match message {
            Message::Wake => {
                let queue = Arc::clone(&self.queue);
                queue.process(self, Duration::ZERO);
                Reply::Consumed
            }
            Message::Paint => {
                self.shared.signal(EventFlags::EXPOSE);
                Reply::Default
            }
            Message::Moved { x, y } => {
                self.on_moved(x, y);
                Reply::Default
            }
            Message::Resized { w, h } => {
                self.on_resized(w, h);
                Reply::Default
            }
            Message::Sizing { edge, rect } => self.on_sizing(edge, rect),
            Message::Close => {
                // Closing is the player's decision; the window stays
                self.sink.put_key(KeyEvent::press(Key::CloseWindow));
                Reply::Consumed
            }
            Message::Destroyed => self.on_destroyed(),
            Message::ScreensaverRequest => {
                if self.state.disable_screensaver {
                    debug!("killing screensaver");
                    Reply::Consumed
                } else {
                    Reply::Default
                }
            }
            Message::HitTest { x, y } => self.on_hit_test(x, y),
            Message::KeyDown {
                vkey,
                scancode,
                extended,
                repeat,
                sys,
            } => self.on_key_down(vkey, scancode, extended, repeat, sys),
            Message::KeyUp { vkey } => self.on_key_up(vkey),
            Message::Char { unit } => self.on_char(unit),
            Message::FocusLost => {
                self.sink.release_all();
                self.state.utf16.reset();
                Reply::Default
            }
            Message::SetCursor { in_client } => self.on_set_cursor(in_client),
            Message::MouseMove { x, y } => {
                self.on_mouse_move(x, y);
                Reply::Default
            }
            Message::MouseLeave => {
                self.state.tracking_mouse = false;
                self.sink.put_key(KeyEvent::press(Key::MouseLeave));
                Reply::Default
            }
            Message::MouseButton { button, down, x, y } => self.on_mouse_button(button, down, x, y),
            Message::Wheel { delta, .. } => self.on_wheel(delta),
            Message::DisplayChanged => {
                self.force_update_display_info();
                Reply::Default
            }
            Message::TaskbarButtonCreated => {
                self.state.taskbar_button_created = true;
                self.update_playback_state();
                Reply::Consumed
            }
        }
    }
}
