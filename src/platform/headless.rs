//! Headless window system
//!
//! An in-memory stand-in for a real window system. Windows have geometry,
//! style and a message queue but nothing is drawn. Every side effect a backend
//! would perform is recorded as a [`PlatformCall`] instead, and a
//! [`HeadlessController`] lets another thread inject user input and system
//! events and inspect what the window did.
//!
//! Geometry changes made through [`NativeWindow::set_placement`] come back as
//! `Moved`/`Resized` messages, like on a real window system.

use super::{
    CreateParams, ExecutionState, Message, MessageHandler, NativeHandle, NativeWindow, Platform,
    PlatformError, Reply, TaskbarProgress, WindowLayer, WindowStyle,
};
use crate::dispatch::Wakeup;
use crate::display::{DisplayInfo, normalize_refresh_rate};
use crate::geometry::{
    Borders, FrameMetrics, MonitorId, MonitorInfo, MonitorLayout, Rect, follow_parent,
    remove_borders,
};
use crate::input::decode::{KeyboardState, Layout};
use crate::input::drop::{DropData, DropEffect, DropTarget};
use crate::input::keymap::vk;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use tracing::{debug, trace};

/// Decoration of a framed headless window
pub const FRAMED_BORDERS: Borders = Borders {
    left: 8,
    top: 31,
    right: 8,
    bottom: 8,
};

/// Client size of a freshly created top-level window
const INITIAL_SIZE: (i32, i32) = (100, 100);

/// Client size a parent window offers an embedded one
const PARENT_CLIENT_SIZE: (i32, i32) = (640, 480);

static WINDOW_CLASS: OnceLock<u64> = OnceLock::new();
static CLASS_REGISTRATIONS: AtomicUsize = AtomicUsize::new(0);
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(0x1000);

/// Register the process-wide window class, once.
fn window_class() -> u64 {
    *WINDOW_CLASS.get_or_init(|| {
        CLASS_REGISTRATIONS.fetch_add(1, Ordering::SeqCst);
        debug!("registered headless window class");
        0xC1A5
    })
}

/// How many times the window class was registered in this process
pub fn class_registrations() -> usize {
    CLASS_REGISTRATIONS.load(Ordering::SeqCst)
}

/// Recorded side effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    DisableIme,
    Create(CreateParams),
    SetStyle(WindowStyle),
    SetPlacement { window: Rect, layer: WindowLayer },
    SetTitle(String),
    SetCursorVisible(bool),
    TrackMouseLeave,
    SetCapture(bool),
    BeginDrag,
    OpenSystemMenu,
    SetEnabled(bool),
    SetExecutionState(ExecutionState),
    RegisterDropTarget,
    RevokeDropTarget,
    InitTaskbar,
    SetTaskbarProgress(TaskbarProgress),
    MarkFullscreen(bool),
    Destroy,
}

enum Event {
    Message(Message),
    Quit,
}

struct World {
    queue: VecDeque<Event>,
    calls: Vec<PlatformCall>,
    replies: Vec<(Message, Reply)>,
    monitors: Vec<MonitorInfo>,
    refresh_rates: HashMap<MonitorId, u32>,
    profiles: HashMap<MonitorId, PathBuf>,
    client: Rect,
    style: WindowStyle,
    minimized: bool,
    maximized: bool,
    keyboard: KeyboardState,
    drop_target: Option<Arc<dyn DropTarget>>,
    /// Client size of the parent an embedded window sits in
    parent_client: Option<(i32, i32)>,
    created: bool,
    destroyed: bool,
    fail_create: bool,
    fail_drop_target: bool,
    unsupported: bool,
}

impl World {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            calls: Vec::new(),
            replies: Vec::new(),
            monitors: vec![MonitorInfo {
                id: MonitorId(1),
                name: r"\\.\DISPLAY1".to_string(),
                rect: Rect::new(0, 0, 1920, 1080),
                primary: true,
            }],
            refresh_rates: HashMap::new(),
            profiles: HashMap::new(),
            client: Rect::default(),
            style: WindowStyle::Framed,
            minimized: false,
            maximized: false,
            keyboard: KeyboardState::default(),
            drop_target: None,
            parent_client: None,
            created: false,
            destroyed: false,
            fail_create: false,
            fail_drop_target: false,
            unsupported: false,
        }
    }

    fn post(&mut self, message: Message) {
        self.queue.push_back(Event::Message(message));
    }

    fn primary(&self) -> Option<&MonitorInfo> {
        self.monitors
            .iter()
            .find(|m| m.primary)
            .or_else(|| self.monitors.first())
    }

    fn current_monitor(&self) -> MonitorId {
        let (cx, cy) = self.client.center();
        self.monitors
            .iter()
            .find(|m| m.rect.contains(cx, cy))
            .or_else(|| self.primary())
            .map_or(MonitorId(0), |m| m.id)
    }

    fn virtual_screen(&self) -> Rect {
        self.monitors
            .iter()
            .map(|m| m.rect)
            .reduce(|a, b| {
                Rect::new(
                    a.x0.min(b.x0),
                    a.y0.min(b.y0),
                    a.x1.max(b.x1),
                    a.y1.max(b.y1),
                )
            })
            .unwrap_or_default()
    }

    /// Queue the destruction sequence, once
    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.drop_target = None;
        self.post(Message::Destroyed);
        self.queue.push_back(Event::Quit);
    }
}

#[derive(Default)]
struct Shared {
    world: Mutex<Option<World>>,
    cond: Condvar,
}

impl Shared {
    fn lock(&self) -> WorldGuard<'_> {
        let mut guard = self.world.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(World::new());
        }
        WorldGuard(guard)
    }
}

struct WorldGuard<'a>(MutexGuard<'a, Option<World>>);

impl std::ops::Deref for WorldGuard<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        // Populated by Shared::lock
        self.0.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl std::ops::DerefMut for WorldGuard<'_> {
    fn deref_mut(&mut self) -> &mut World {
        self.0.as_mut().unwrap_or_else(|| unreachable!())
    }
}

/// The headless [`Platform`]
pub struct HeadlessPlatform {
    shared: Arc<Shared>,
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
        }
    }

    /// Handle for driving and inspecting this platform from another thread
    pub fn controller(&self) -> HeadlessController {
        HeadlessController {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Platform for HeadlessPlatform {
    type Window = HeadlessWindow;

    fn disable_ime(&mut self) {
        self.shared.lock().calls.push(PlatformCall::DisableIme);
    }

    fn create_window(&mut self, params: &CreateParams) -> Result<HeadlessWindow, PlatformError> {
        let class = window_class();
        let mut world = self.shared.lock();
        if world.fail_create {
            return Err(PlatformError::CreateWindow(
                "window creation refused".to_string(),
            ));
        }
        world.calls.push(PlatformCall::Create(params.clone()));
        world.created = true;
        world.style = params.style;
        let (w, h) = if params.parent.is_some() {
            PARENT_CLIENT_SIZE
        } else {
            INITIAL_SIZE
        };
        world.client = Rect::from_size(0, 0, w, h);
        world.parent_client = params.parent.map(|_| PARENT_CLIENT_SIZE);

        let handle = NativeHandle(NEXT_HANDLE.fetch_add(1, Ordering::SeqCst));
        trace!(class, handle = ?handle, "created headless window");
        Ok(HeadlessWindow {
            shared: Arc::clone(&self.shared),
            handle,
        })
    }

    fn run_message_loop(&mut self, handler: &mut (dyn MessageHandler + 'static)) {
        loop {
            let event = {
                let mut guard = self.shared.world.lock().unwrap_or_else(|e| e.into_inner());
                loop {
                    if let Some(event) = guard.as_mut().and_then(|w| w.queue.pop_front()) {
                        break event;
                    }
                    guard = self
                        .shared
                        .cond
                        .wait(guard)
                        .unwrap_or_else(|e| e.into_inner());
                }
            };
            match event {
                Event::Message(message) => {
                    let reply = handler.handle(message.clone());
                    self.shared.lock().replies.push((message, reply));
                    self.shared.cond.notify_all();
                }
                Event::Quit => break,
            }
        }
        debug!("headless message loop exited");
    }
}

/// A headless native window
pub struct HeadlessWindow {
    shared: Arc<Shared>,
    handle: NativeHandle,
}

impl HeadlessWindow {
    fn record(&self, call: PlatformCall) {
        self.shared.lock().calls.push(call);
    }

    fn post(&self, messages: impl IntoIterator<Item = Message>) {
        let mut world = self.shared.lock();
        for message in messages {
            world.post(message);
        }
        drop(world);
        self.shared.cond.notify_all();
    }

    fn capability(&self, name: &'static str) -> Result<(), PlatformError> {
        if self.shared.lock().unsupported {
            Err(PlatformError::Unsupported(name))
        } else {
            Ok(())
        }
    }
}

impl Layout for HeadlessWindow {
    /// A plain US layout: letters, digits and space. Ctrl+letter types a
    /// control code and Ctrl+Alt types nothing.
    fn to_unicode(&self, vkey: u32, _scancode: u32, keys: &KeyboardState) -> u32 {
        let ctrl = keys.is_down(vk::CONTROL);
        let alt = keys.is_down(vk::MENU);
        let shift = keys.is_down(vk::SHIFT);
        match vkey {
            0x41..=0x5A if ctrl && alt => 0,
            0x41..=0x5A if ctrl => vkey - 0x40,
            0x41..=0x5A if shift => vkey,
            0x41..=0x5A => vkey + 0x20,
            0x30..=0x39 if !ctrl && !alt => vkey,
            vk::SPACE => 0x20,
            _ => 0,
        }
    }
}

impl NativeWindow for HeadlessWindow {
    fn native_handle(&self) -> NativeHandle {
        self.handle
    }

    fn waker(&self) -> Wakeup {
        let shared = Arc::clone(&self.shared);
        Arc::new(move || {
            let mut world = shared.lock();
            if world.destroyed {
                return;
            }
            world.post(Message::Wake);
            drop(world);
            shared.cond.notify_all();
        })
    }

    fn borders(&self, style: WindowStyle) -> Borders {
        match style {
            WindowStyle::Framed => FRAMED_BORDERS,
            WindowStyle::Borderless | WindowStyle::Child => Borders::NONE,
        }
    }

    fn set_style(&mut self, style: WindowStyle) {
        let mut world = self.shared.lock();
        world.style = style;
        world.calls.push(PlatformCall::SetStyle(style));
    }

    fn set_placement(&mut self, window: Rect, layer: WindowLayer) {
        let borders = self.borders(self.shared.lock().style);
        let client = remove_borders(window, borders);
        let mut world = self.shared.lock();
        world.calls.push(PlatformCall::SetPlacement { window, layer });
        let old = world.client;
        world.client = client;
        world.minimized = false;
        if (old.x0, old.y0) != (client.x0, client.y0) {
            world.post(Message::Moved {
                x: client.x0,
                y: client.y0,
            });
        }
        if (old.width(), old.height()) != (client.width(), client.height()) {
            world.post(Message::Resized {
                w: client.width(),
                h: client.height(),
            });
        }
        drop(world);
        self.shared.cond.notify_all();
    }

    fn client_size(&self) -> (i32, i32) {
        let world = self.shared.lock();
        if world.minimized {
            return (0, 0);
        }
        (world.client.width(), world.client.height())
    }

    fn is_minimized(&self) -> bool {
        self.shared.lock().minimized
    }

    fn is_maximized(&self) -> bool {
        self.shared.lock().maximized
    }

    fn current_monitor(&self) -> MonitorId {
        self.shared.lock().current_monitor()
    }

    fn monitor_layout(&self) -> MonitorLayout {
        let world = self.shared.lock();
        MonitorLayout {
            monitors: world.monitors.clone(),
            current: Some(world.current_monitor()),
            virtual_screen: world.virtual_screen(),
        }
    }

    fn display_info(&self, monitor: MonitorId) -> DisplayInfo {
        let world = self.shared.lock();
        let reported = world.refresh_rates.get(&monitor).copied().unwrap_or(60);
        DisplayInfo {
            refresh_hz: normalize_refresh_rate(reported),
            color_profile: world.profiles.get(&monitor).cloned(),
        }
    }

    fn frame_metrics(&self) -> FrameMetrics {
        FrameMetrics {
            frame: 8,
            diagonal: 17,
        }
    }

    fn keyboard_state(&self) -> KeyboardState {
        self.shared.lock().keyboard
    }

    fn set_title(&mut self, title: &str) -> Result<(), PlatformError> {
        self.capability("window titles")?;
        self.record(PlatformCall::SetTitle(title.to_string()));
        Ok(())
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        self.record(PlatformCall::SetCursorVisible(visible));
    }

    fn track_mouse_leave(&mut self) -> bool {
        self.record(PlatformCall::TrackMouseLeave);
        true
    }

    fn set_capture(&mut self, capture: bool) {
        self.record(PlatformCall::SetCapture(capture));
    }

    fn begin_drag(&mut self) {
        self.record(PlatformCall::BeginDrag);
    }

    fn open_system_menu(&mut self) {
        self.record(PlatformCall::OpenSystemMenu);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.record(PlatformCall::SetEnabled(enabled));
    }

    fn set_execution_state(&mut self, state: ExecutionState) -> Result<(), PlatformError> {
        self.capability("execution state")?;
        self.record(PlatformCall::SetExecutionState(state));
        Ok(())
    }

    fn register_drop_target(&mut self, target: Arc<dyn DropTarget>) -> Result<(), PlatformError> {
        let mut world = self.shared.lock();
        if world.fail_drop_target {
            return Err(PlatformError::Os {
                call: "RegisterDragDrop",
                message: "drop target refused".to_string(),
            });
        }
        world.drop_target = Some(target);
        world.calls.push(PlatformCall::RegisterDropTarget);
        Ok(())
    }

    fn revoke_drop_target(&mut self) {
        let mut world = self.shared.lock();
        world.drop_target = None;
        world.calls.push(PlatformCall::RevokeDropTarget);
    }

    fn init_taskbar(&mut self) -> Result<(), PlatformError> {
        self.capability("taskbar")?;
        self.record(PlatformCall::InitTaskbar);
        Ok(())
    }

    fn set_taskbar_progress(&mut self, progress: TaskbarProgress) -> Result<(), PlatformError> {
        self.capability("taskbar")?;
        self.record(PlatformCall::SetTaskbarProgress(progress));
        Ok(())
    }

    fn mark_fullscreen(&mut self, fullscreen: bool) {
        self.record(PlatformCall::MarkFullscreen(fullscreen));
    }

    fn destroy(&mut self) {
        let mut world = self.shared.lock();
        world.calls.push(PlatformCall::Destroy);
        world.destroy();
        drop(world);
        self.shared.cond.notify_all();
    }
}

/// Drives a headless platform from outside the GUI thread
#[derive(Clone)]
pub struct HeadlessController {
    shared: Arc<Shared>,
}

impl HeadlessController {
    fn with_world<R>(&self, f: impl FnOnce(&mut World) -> R) -> R {
        let result = f(&mut self.shared.lock());
        self.shared.cond.notify_all();
        result
    }

    /// Deliver a raw message to the window
    pub fn post(&self, message: Message) {
        self.with_world(|w| w.post(message));
    }

    /// Press a key: updates the keyboard state, then delivers the key-down
    pub fn key_down(&self, vkey: u32) {
        self.with_world(|w| {
            w.keyboard.press(vkey);
            let sys = w.keyboard.is_down(vk::MENU);
            w.post(Message::KeyDown {
                vkey,
                scancode: 0,
                extended: false,
                repeat: false,
                sys,
            });
        });
    }

    pub fn key_up(&self, vkey: u32) {
        self.with_world(|w| {
            w.keyboard.clear(vkey);
            w.post(Message::KeyUp { vkey });
        });
    }

    /// Change the keyboard state without sending a message (modifiers held
    /// before focus, for example)
    pub fn hold(&self, vkeys: &[u32]) {
        self.with_world(|w| {
            for &k in vkeys {
                w.keyboard.press(k);
            }
        });
    }

    pub fn release_keys(&self) {
        self.with_world(|w| w.keyboard = KeyboardState::default());
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.with_world(|w| {
            w.minimized = minimized;
            let (cw, ch) = if minimized {
                (0, 0)
            } else {
                (w.client.width(), w.client.height())
            };
            w.post(Message::Resized { w: cw, h: ch });
        });
    }

    /// Resize the client area as an interactive drag would, keeping the
    /// top-left corner
    pub fn user_resize(&self, w: i32, h: i32) {
        self.with_world(|world| {
            world.client = Rect::from_size(world.client.x0, world.client.y0, w, h);
            world.post(Message::Resized { w, h });
        });
    }

    /// Resize the parent of an embedded window; the window follows it
    pub fn resize_parent(&self, w: i32, h: i32) {
        self.with_world(|world| {
            if world.destroyed || world.parent_client.is_none() {
                return;
            }
            world.parent_client = Some((w, h));
            let child = (world.client.width(), world.client.height());
            if let Some((w, h)) = follow_parent(child, (w, h)) {
                world.client = Rect::from_size(world.client.x0, world.client.y0, w, h);
                world.post(Message::Resized { w, h });
            }
        });
    }

    pub fn set_maximized(&self, maximized: bool) {
        self.with_world(|w| w.maximized = maximized);
    }

    /// Replace the monitor arrangement and notify the window
    pub fn set_monitors(&self, monitors: Vec<MonitorInfo>) {
        self.with_world(|w| {
            w.monitors = monitors;
            w.post(Message::DisplayChanged);
        });
    }

    /// Integer refresh rate the "driver" reports for `monitor`
    pub fn set_refresh_rate(&self, monitor: MonitorId, hz: u32) {
        self.with_world(|w| {
            w.refresh_rates.insert(monitor, hz);
        });
    }

    pub fn set_color_profile(&self, monitor: MonitorId, path: Option<PathBuf>) {
        self.with_world(|w| match path {
            Some(path) => {
                w.profiles.insert(monitor, path);
            }
            None => {
                w.profiles.remove(&monitor);
            }
        });
    }

    /// Make the next window creation fail
    pub fn fail_create(&self) {
        self.with_world(|w| w.fail_create = true);
    }

    /// Make drop-target registration fail
    pub fn fail_drop_target(&self) {
        self.with_world(|w| w.fail_drop_target = true);
    }

    /// Report titles, execution state and the taskbar as unsupported
    pub fn set_unsupported(&self, unsupported: bool) {
        self.with_world(|w| w.unsupported = unsupported);
    }

    /// Destroy the window from outside, as a parent window or the user might
    pub fn destroy_window(&self) {
        self.with_world(|w| w.destroy());
    }

    /// Drag `data` over the window and drop it
    pub fn drag_and_drop(&self, data: DropData, append: bool) -> Option<DropEffect> {
        let target = self.shared.lock().drop_target.clone()?;
        target.on_enter(&data, DropEffect::Copy);
        target.on_over();
        Some(target.on_drop(data, append))
    }

    pub fn has_drop_target(&self) -> bool {
        self.shared.lock().drop_target.is_some()
    }

    /// Client rect as the window system sees it
    pub fn client_rect(&self) -> Rect {
        self.shared.lock().client
    }

    pub fn style(&self) -> WindowStyle {
        self.shared.lock().style
    }

    pub fn is_created(&self) -> bool {
        self.shared.lock().created
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.lock().destroyed
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.shared.lock().calls.clone()
    }

    /// Clear all recorded calls
    pub fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    /// Every handled message with the handler's reply, oldest first
    pub fn replies(&self) -> Vec<(Message, Reply)> {
        self.shared.lock().replies.clone()
    }

    /// Reply given to the most recent handled message matching `pred`
    pub fn reply_to(&self, pred: impl Fn(&Message) -> bool) -> Option<Reply> {
        self.shared
            .lock()
            .replies
            .iter()
            .rev()
            .find(|(m, _)| pred(m))
            .map(|(_, r)| *r)
    }

    /// Assert that a specific call was made
    pub fn assert_called(&self, call: &PlatformCall) {
        let calls = self.calls();
        assert!(
            calls.contains(call),
            "Expected {call:?} but got calls: {calls:?}"
        );
    }

    /// Assert that no call matching `pred` was made
    pub fn assert_not_called(&self, pred: impl Fn(&PlatformCall) -> bool) {
        let calls = self.calls();
        assert!(
            !calls.iter().any(pred),
            "Expected no matching call but got: {calls:?}"
        );
    }

    /// The last placement requested by the window
    pub fn last_placement(&self) -> Option<(Rect, WindowLayer)> {
        self.shared.lock().calls.iter().rev().find_map(|c| match c {
            PlatformCall::SetPlacement { window, layer } => Some((*window, *layer)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    struct Echo(Vec<Message>);

    impl MessageHandler for Echo {
        fn handle(&mut self, message: Message) -> Reply {
            self.0.push(message);
            Reply::Consumed
        }
    }

    fn params() -> CreateParams {
        CreateParams {
            title: "test".into(),
            parent: None,
            style: WindowStyle::Framed,
        }
    }

    #[test]
    fn test_class_registered_once() {
        let mut a = HeadlessPlatform::new();
        let mut b = HeadlessPlatform::new();
        let wa = a.create_window(&params()).unwrap();
        let wb = b.create_window(&params()).unwrap();
        assert!(wa.native_handle() != wb.native_handle());
        assert!(class_registrations() == 1);
    }

    #[test]
    fn test_placement_reports_geometry() {
        let mut platform = HeadlessPlatform::new();
        let controller = platform.controller();
        let mut window = platform.create_window(&params()).unwrap();

        let client = Rect::from_size(100, 100, 800, 600);
        window.set_placement(crate::geometry::add_borders(client, FRAMED_BORDERS), WindowLayer::Normal);
        assert!(controller.client_rect() == client);
        window.destroy();

        let mut echo = Echo(Vec::new());
        platform.run_message_loop(&mut echo);
        assert!(
            echo.0
                == vec![
                    Message::Moved { x: 100, y: 100 },
                    Message::Resized { w: 800, h: 600 },
                    Message::Destroyed,
                ]
        );
    }

    #[test]
    fn test_waker_silent_after_destroy() {
        let mut platform = HeadlessPlatform::new();
        let mut window = platform.create_window(&params()).unwrap();
        let wake = window.waker();
        wake();
        window.destroy();
        wake();

        let mut echo = Echo(Vec::new());
        platform.run_message_loop(&mut echo);
        assert!(echo.0 == vec![Message::Wake, Message::Destroyed]);
    }

    #[test]
    fn test_create_failure() {
        let mut platform = HeadlessPlatform::new();
        platform.controller().fail_create();
        assert!(let Err(PlatformError::CreateWindow(_)) = platform.create_window(&params()));
    }

    #[test]
    fn test_layout() {
        let platform = HeadlessPlatform::new();
        let window = HeadlessWindow {
            shared: Arc::clone(&platform.shared),
            handle: NativeHandle(1),
        };
        let mut keys = KeyboardState::default();
        assert!(window.to_unicode(0x41, 0, &keys) == 'a' as u32);
        keys.press(vk::SHIFT);
        assert!(window.to_unicode(0x41, 0, &keys) == 'A' as u32);
        keys.press(vk::CONTROL);
        assert!(window.to_unicode(0x41, 0, &keys) == 0x01);
        keys.press(vk::MENU);
        assert!(window.to_unicode(0x41, 0, &keys) == 0);
    }
}
