//! Win32 backend
//!
//! Architecture:
//! - One window per GUI thread, created by [`Win32Platform::create_window`]
//! - `run_message_loop` pumps with GetMessageW/DispatchMessageW; the window
//!   procedure decodes each message into a [`Message`] and hands it to the
//!   handler registered for the pump
//! - Messages sent to the window while the handler is already running (from
//!   SetWindowPos or DestroyWindow inside a task) are queued and delivered as
//!   soon as the outer call returns, so the handler is never re-entered
//! - Cross-thread wake-ups are a posted WM_USER
//!
//! Key Win32 APIs:
//! - CreateWindowExW + a process-wide window class for the window itself
//! - SetWindowLongPtrW(GWL_STYLE) + SetWindowPos for decoration and placement
//! - An OLE IDropTarget for dropped files and URLs
//! - A WH_CALLWNDPROC hook (same process) or a WinEvent hook (other process)
//!   so an embedded window follows its parent's size
//! - ITaskbarList3 for fullscreen marking and playback progress
//! - EnumDisplayMonitors, EnumDisplaySettingsW and GetICMProfileW for displays
//! - SetThreadExecutionState to keep the screensaver away

use super::{
    CreateParams, ExecutionState, Message, MessageHandler, NativeHandle, NativeWindow, Platform,
    PlatformError, Reply, TaskbarProgress, WindowLayer, WindowStyle,
};
use crate::dispatch::Wakeup;
use crate::display::{DisplayInfo, normalize_refresh_rate};
use crate::geometry::{
    Borders, FrameMetrics, HitArea, MonitorId, MonitorInfo, MonitorLayout, Rect, ResizeEdge,
    follow_parent,
};
use crate::input::decode::{KeyboardState, Layout, last_typed_unit};
use crate::input::drop::{DropData, DropEffect, DropTarget};
use crate::key::MouseButton;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace, warn};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINTL, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    CreateDCW, DEVMODEW, DeleteDC, ENUM_CURRENT_SETTINGS, EnumDisplayMonitors,
    EnumDisplaySettingsW, GetMonitorInfoW, HDC, HMONITOR, MONITOR_DEFAULTTOPRIMARY, MONITORINFO,
    MONITORINFOEXW, MonitorFromWindow,
};
use windows::Win32::System::Com::{
    CLSCTX_INPROC_SERVER, CoCreateInstance, DVASPECT_CONTENT, FORMATETC, IDataObject,
    TYMED_HGLOBAL,
};
use windows::Win32::System::DataExchange::RegisterClipboardFormatW;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Memory::{GlobalLock, GlobalUnlock};
use windows::Win32::System::Ole::{
    CF_HDROP, DROPEFFECT, DROPEFFECT_COPY, DROPEFFECT_LINK, DROPEFFECT_MOVE, DROPEFFECT_NONE,
    IDropTarget, IDropTarget_Impl, OleInitialize, OleUninitialize, RegisterDragDrop,
    ReleaseStgMedium, RevokeDragDrop,
};
use windows::Win32::System::SystemServices::{MK_SHIFT, MODIFIERKEYS_FLAGS};
use windows::Win32::System::Threading::GetCurrentProcessId;
use windows::Win32::UI::Accessibility::{HWINEVENTHOOK, SetWinEventHook, UnhookWinEvent};
use windows::Win32::System::Power::{
    ES_CONTINUOUS, ES_DISPLAY_REQUIRED, ES_SYSTEM_REQUIRED, SetThreadExecutionState,
};
use windows::Win32::UI::ColorSystem::GetICMProfileW;
use windows::Win32::UI::Input::Ime::ImmDisableIME;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    EnableWindow, GetKeyboardState, ReleaseCapture, SetCapture, TME_LEAVE, TRACKMOUSEEVENT,
    ToUnicode, TrackMouseEvent,
};
use windows::Win32::UI::Shell::{
    DragQueryFileW, HDROP, ITaskbarList3, TBPF_NOPROGRESS, TBPF_NORMAL, TBPF_PAUSED, TaskbarList,
};
use windows::Win32::UI::WindowsAndMessaging::*;
use windows::core::{BOOL, HSTRING, PCWSTR, PWSTR, Ref, implement, w};

const CLASS_NAME: PCWSTR = w!("vowin");
const WAKE_MESSAGE: u32 = WM_USER;
/// Ask ToUnicode not to touch the kernel-mode keyboard state (dead keys)
const TO_UNICODE_KEEP_STATE: u32 = 1 << 2;

static WINDOW_CLASS: OnceLock<u16> = OnceLock::new();

thread_local! {
    /// Handler of the pump running on this thread
    static HANDLER: Cell<Option<*mut (dyn MessageHandler + 'static)>> = const { Cell::new(None) };
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
    static DEFERRED: RefCell<VecDeque<Message>> = const { RefCell::new(VecDeque::new()) };
}

fn os_error(call: &'static str, err: windows::core::Error) -> PlatformError {
    PlatformError::Os {
        call,
        message: err.message(),
    }
}

fn wide_to_string(wide: &[u16]) -> String {
    let end = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    OsString::from_wide(&wide[..end])
        .to_string_lossy()
        .into_owned()
}

const fn loword(value: usize) -> u16 {
    (value & 0xFFFF) as u16
}

const fn hiword(value: usize) -> u16 {
    ((value >> 16) & 0xFFFF) as u16
}

/// Signed coordinates packed into an LPARAM
const fn point_from_lparam(lparam: LPARAM) -> (i32, i32) {
    let raw = lparam.0 as usize;
    (loword(raw) as i16 as i32, hiword(raw) as i16 as i32)
}

fn to_rect(rect: RECT) -> Rect {
    Rect::new(rect.left, rect.top, rect.right, rect.bottom)
}

fn from_rect(rect: Rect) -> RECT {
    RECT {
        left: rect.x0,
        top: rect.y0,
        right: rect.x1,
        bottom: rect.y1,
    }
}

fn style_bits(style: WindowStyle) -> WINDOW_STYLE {
    match style {
        WindowStyle::Framed => WS_OVERLAPPEDWINDOW,
        // Keeps minimizing from the taskbar working
        WindowStyle::Borderless => WS_POPUP | WS_MINIMIZEBOX,
        WindowStyle::Child => WS_CHILD | WS_CLIPSIBLINGS,
    }
}

/// Per-window data reachable from the window procedure
struct WindowData {
    destroyed: Arc<AtomicBool>,
    taskbar_button_created: u32,
}

/// Data of `hwnd`, if it is one of ours and still alive
///
/// # Safety
/// Must be called on the thread that owns `hwnd`.
unsafe fn window_data<'a>(hwnd: HWND) -> Option<&'a WindowData> {
    let ptr = unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) } as *const WindowData;
    // SAFETY: set from Rc::into_raw in WM_NCCREATE, released in WM_NCDESTROY
    unsafe { ptr.as_ref() }
}

/// Hand a message to the pump's handler.
///
/// Returns `None` if there is no handler or the message had to be deferred.
fn dispatch(message: Message) -> Option<Reply> {
    let handler = HANDLER.with(Cell::get)?;
    if DISPATCHING.with(|d| d.replace(true)) {
        trace!(?message, "deferring nested message");
        DEFERRED.with(|q| q.borrow_mut().push_back(message));
        return None;
    }

    // SAFETY: the pointer is valid while run_message_loop is on the stack of
    // this thread, and DISPATCHING rules out a second live borrow
    let reply = unsafe { (*handler).handle(message) };
    while let Some(next) = DEFERRED.with(|q| q.borrow_mut().pop_front()) {
        unsafe { (*handler).handle(next) };
    }
    DISPATCHING.with(|d| d.set(false));
    Some(reply)
}

fn resize_edge(wparam: WPARAM) -> Option<ResizeEdge> {
    Some(match wparam.0 as u32 {
        WMSZ_LEFT => ResizeEdge::Left,
        WMSZ_RIGHT => ResizeEdge::Right,
        WMSZ_TOP => ResizeEdge::Top,
        WMSZ_TOPLEFT => ResizeEdge::TopLeft,
        WMSZ_TOPRIGHT => ResizeEdge::TopRight,
        WMSZ_BOTTOM => ResizeEdge::Bottom,
        WMSZ_BOTTOMLEFT => ResizeEdge::BottomLeft,
        WMSZ_BOTTOMRIGHT => ResizeEdge::BottomRight,
        _ => return None,
    })
}

fn hit_code(area: HitArea) -> u32 {
    match area {
        HitArea::Client => HTCLIENT,
        HitArea::Left => HTLEFT,
        HitArea::Right => HTRIGHT,
        HitArea::Top => HTTOP,
        HitArea::TopLeft => HTTOPLEFT,
        HitArea::TopRight => HTTOPRIGHT,
        HitArea::Bottom => HTBOTTOM,
        HitArea::BottomLeft => HTBOTTOMLEFT,
        HitArea::BottomRight => HTBOTTOMRIGHT,
    }
}

/// Decode a window message. `None` leaves it to DefWindowProc untouched.
fn decode(data: &WindowData, msg: u32, wparam: WPARAM, lparam: LPARAM) -> Option<Message> {
    let button = |button, down| {
        let (x, y) = point_from_lparam(lparam);
        Message::MouseButton { button, down, x, y }
    };
    let message = match msg {
        WAKE_MESSAGE => Message::Wake,
        WM_PAINT => Message::Paint,
        WM_MOVE => {
            let (x, y) = point_from_lparam(lparam);
            Message::Moved { x, y }
        }
        WM_SIZE => Message::Resized {
            w: loword(lparam.0 as usize) as i32,
            h: hiword(lparam.0 as usize) as i32,
        },
        WM_SIZING => {
            // SAFETY: WM_SIZING carries a pointer to the proposed window RECT
            let rect = unsafe { *(lparam.0 as *const RECT) };
            Message::Sizing {
                edge: resize_edge(wparam)?,
                rect: to_rect(rect),
            }
        }
        WM_CLOSE => Message::Close,
        WM_DESTROY => Message::Destroyed,
        WM_SYSCOMMAND => match (wparam.0 as u32) & 0xFFF0 {
            SC_SCREENSAVE | SC_MONITORPOWER => Message::ScreensaverRequest,
            _ => return None,
        },
        WM_NCHITTEST => {
            let (x, y) = point_from_lparam(lparam);
            Message::HitTest { x, y }
        }
        WM_KEYDOWN | WM_SYSKEYDOWN => {
            let flags = lparam.0 as usize;
            Message::KeyDown {
                vkey: wparam.0 as u32,
                scancode: ((flags >> 16) & 0xFF) as u32,
                extended: flags & (1 << 24) != 0,
                repeat: flags & (1 << 30) != 0,
                sys: msg == WM_SYSKEYDOWN,
            }
        }
        WM_KEYUP | WM_SYSKEYUP => Message::KeyUp {
            vkey: wparam.0 as u32,
        },
        WM_CHAR | WM_SYSCHAR => Message::Char {
            unit: wparam.0 as u16,
        },
        WM_KILLFOCUS => Message::FocusLost,
        // A zero mouse message means a menu is open
        WM_SETCURSOR => Message::SetCursor {
            in_client: u32::from(loword(lparam.0 as usize)) == HTCLIENT
                && hiword(lparam.0 as usize) != 0,
        },
        WM_MOUSEMOVE => {
            let (x, y) = point_from_lparam(lparam);
            Message::MouseMove { x, y }
        }
        WM_MOUSELEAVE => Message::MouseLeave,
        WM_LBUTTONDOWN => button(MouseButton::Left, true),
        WM_LBUTTONUP => button(MouseButton::Left, false),
        WM_MBUTTONDOWN => button(MouseButton::Middle, true),
        WM_MBUTTONUP => button(MouseButton::Middle, false),
        WM_RBUTTONDOWN => button(MouseButton::Right, true),
        WM_RBUTTONUP => button(MouseButton::Right, false),
        WM_XBUTTONDOWN | WM_XBUTTONUP => {
            let which = if u32::from(hiword(wparam.0)) == u32::from(XBUTTON1) {
                MouseButton::Back
            } else {
                MouseButton::Forward
            };
            button(which, msg == WM_XBUTTONDOWN)
        }
        WM_MOUSEWHEEL => {
            let (x, y) = point_from_lparam(lparam);
            Message::Wheel {
                delta: hiword(wparam.0) as i16 as i32,
                x,
                y,
            }
        }
        WM_DISPLAYCHANGE => Message::DisplayChanged,
        _ if msg == data.taskbar_button_created && msg != 0 => Message::TaskbarButtonCreated,
        _ => return None,
    };
    Some(message)
}

/// Turn the handler's reply into the message result, or `None` for
/// DefWindowProc.
fn encode(reply: Reply, msg: u32, lparam: LPARAM) -> Option<LRESULT> {
    match reply {
        Reply::Default => None,
        Reply::Sizing(rect) => {
            // SAFETY: same pointer the WM_SIZING message carried
            unsafe { *(lparam.0 as *mut RECT) = from_rect(rect) };
            Some(LRESULT(1))
        }
        Reply::HitTest(area) => Some(LRESULT(hit_code(area) as isize)),
        Reply::Consumed => Some(match msg {
            WM_SETCURSOR | WM_XBUTTONDOWN | WM_XBUTTONUP => LRESULT(1),
            _ => LRESULT(0),
        }),
    }
}

/// Files listed in a dropped HDROP
unsafe fn dropped_files(hdrop: HDROP) -> Vec<PathBuf> {
    let count = unsafe { DragQueryFileW(hdrop, u32::MAX, None) };
    (0..count)
        .filter_map(|i| {
            let len = unsafe { DragQueryFileW(hdrop, i, None) } as usize;
            let mut buf = vec![0u16; len + 1];
            let copied = unsafe { DragQueryFileW(hdrop, i, Some(&mut buf)) } as usize;
            (copied > 0).then(|| PathBuf::from(OsString::from_wide(&buf[..copied])))
        })
        .collect()
}

fn hglobal_format(format: u16) -> FORMATETC {
    FORMATETC {
        cfFormat: format,
        ptd: std::ptr::null_mut(),
        dwAspect: DVASPECT_CONTENT.0 as u32,
        lindex: -1,
        tymed: TYMED_HGLOBAL.0 as u32,
    }
}

/// Strongest effect allowed by an OLE effect mask
fn drop_effect(mask: DROPEFFECT) -> DropEffect {
    if mask.0 & DROPEFFECT_COPY.0 != 0 {
        DropEffect::Copy
    } else if mask.0 & DROPEFFECT_MOVE.0 != 0 {
        DropEffect::Move
    } else if mask.0 & DROPEFFECT_LINK.0 != 0 {
        DropEffect::Link
    } else {
        DropEffect::None
    }
}

/// Mask reported back to OLE: the source's offer if accepted, nothing otherwise
fn granted_mask(effect: DropEffect, offered: DROPEFFECT) -> DROPEFFECT {
    match effect {
        DropEffect::None => DROPEFFECT_NONE,
        _ => offered,
    }
}

/// OLE side of drag and drop; decodes the data object and hands it to the
/// shared [`DropTarget`]
#[implement(IDropTarget)]
struct OleDropTarget {
    target: Arc<dyn DropTarget>,
    /// Mask granted when the drag entered
    granted: Cell<DROPEFFECT>,
    url_format: u16,
}

impl OleDropTarget {
    fn read(&self, data: &IDataObject) -> DropData {
        if let Ok(mut medium) = unsafe { data.GetData(&hglobal_format(CF_HDROP.0)) } {
            let hglobal = unsafe { medium.u.hGlobal };
            let mut paths = Vec::new();
            if !unsafe { GlobalLock(hglobal) }.is_null() {
                paths = unsafe { dropped_files(HDROP(hglobal.0)) };
                let _ = unsafe { GlobalUnlock(hglobal) };
            }
            unsafe { ReleaseStgMedium(&mut medium) };
            return DropData::Files(paths);
        }

        if let Ok(mut medium) = unsafe { data.GetData(&hglobal_format(self.url_format)) } {
            let hglobal = unsafe { medium.u.hGlobal };
            let text = unsafe { GlobalLock(hglobal) } as *const u16;
            let mut url = String::new();
            if !text.is_null() {
                url = unsafe { PCWSTR(text).to_string() }.unwrap_or_default();
                let _ = unsafe { GlobalUnlock(hglobal) };
            }
            unsafe { ReleaseStgMedium(&mut medium) };
            if !url.is_empty() {
                return DropData::Url(url);
            }
        }
        DropData::Other
    }
}

impl IDropTarget_Impl for OleDropTarget_Impl {
    fn DragEnter(
        &self,
        data: Ref<'_, IDataObject>,
        _keys: MODIFIERKEYS_FLAGS,
        _pt: &POINTL,
        effect: *mut DROPEFFECT,
    ) -> windows::core::Result<()> {
        let offered = data.ok().map_or(DropData::Other, |data| self.read(data));
        // SAFETY: OLE passes a valid in/out effect pointer
        let proposed = unsafe { *effect };
        let granted = granted_mask(self.target.on_enter(&offered, drop_effect(proposed)), proposed);
        self.granted.set(granted);
        unsafe { *effect = granted };
        Ok(())
    }

    fn DragOver(
        &self,
        _keys: MODIFIERKEYS_FLAGS,
        _pt: &POINTL,
        effect: *mut DROPEFFECT,
    ) -> windows::core::Result<()> {
        let granted = granted_mask(self.target.on_over(), self.granted.get());
        unsafe { *effect = granted };
        Ok(())
    }

    fn DragLeave(&self) -> windows::core::Result<()> {
        self.target.on_leave();
        Ok(())
    }

    fn Drop(
        &self,
        data: Ref<'_, IDataObject>,
        keys: MODIFIERKEYS_FLAGS,
        _pt: &POINTL,
        effect: *mut DROPEFFECT,
    ) -> windows::core::Result<()> {
        let dropped = data.ok().map_or(DropData::Other, |data| self.read(data));
        let append = keys.0 & MK_SHIFT.0 != 0;
        let granted = granted_mask(self.target.on_drop(dropped, append), self.granted.get());
        unsafe { *effect = granted };
        Ok(())
    }
}

/// Resize our window inside `parent` to the parent's client area.
///
/// Hooks fire for every window of the parent's thread, so anything that is
/// not a parent of one of our windows is skipped.
fn resize_child(parent: HWND) {
    let Ok(child) = (unsafe { FindWindowExW(Some(parent), None, CLASS_NAME, PCWSTR::null()) })
    else {
        return;
    };
    let Ok(module) = (unsafe { GetModuleHandleW(None) }) else {
        return;
    };
    if unsafe { GetWindowLongPtrW(child, GWLP_HINSTANCE) } != module.0 as isize {
        return;
    }

    let mut child_rect = RECT::default();
    let mut parent_rect = RECT::default();
    if unsafe { GetClientRect(child, &mut child_rect) }.is_err()
        || unsafe { GetClientRect(parent, &mut parent_rect) }.is_err()
    {
        return;
    }
    let Some((w, h)) = follow_parent(
        (child_rect.right, child_rect.bottom),
        (parent_rect.right, parent_rect.bottom),
    ) else {
        return;
    };
    let flags = SWP_ASYNCWINDOWPOS | SWP_NOACTIVATE | SWP_NOZORDER | SWP_NOOWNERZORDER;
    if let Err(err) = unsafe { SetWindowPos(child, None, 0, 0, w, h, flags) } {
        debug!(%err, "failed to follow parent size");
    }
}

unsafe extern "system" fn parent_window_hook(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 {
        // SAFETY: WH_CALLWNDPROC passes a CWPSTRUCT for HC_ACTION
        let call = unsafe { &*(lparam.0 as *const CWPSTRUCT) };
        if call.message == WM_WINDOWPOSCHANGED {
            resize_child(call.hwnd);
        }
    }
    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

unsafe extern "system" fn parent_event_hook(
    _hook: HWINEVENTHOOK,
    event: u32,
    hwnd: HWND,
    object: i32,
    child: i32,
    _thread: u32,
    _time: u32,
) {
    if event != EVENT_OBJECT_LOCATIONCHANGE
        || hwnd.is_invalid()
        || object != OBJID_WINDOW.0
        || child != CHILDID_SELF as i32
    {
        return;
    }
    resize_child(hwnd);
}

/// Keeps an embedded window sized to its parent, removed on drop
enum ParentHook {
    /// Parent lives in this process
    Window(HHOOK),
    /// Parent belongs to another process; slower, but crosses the boundary
    Event(HWINEVENTHOOK),
}

impl ParentHook {
    fn install(parent: HWND) -> Option<Self> {
        let mut pid = 0;
        let tid = unsafe { GetWindowThreadProcessId(parent, Some(&mut pid)) };
        if pid == unsafe { GetCurrentProcessId() } {
            match unsafe { SetWindowsHookExW(WH_CALLWNDPROC, Some(parent_window_hook), None, tid) } {
                Ok(hook) => Some(ParentHook::Window(hook)),
                Err(err) => {
                    warn!(%err, "failed to hook parent window");
                    None
                }
            }
        } else {
            let hook = unsafe {
                SetWinEventHook(
                    EVENT_OBJECT_LOCATIONCHANGE,
                    EVENT_OBJECT_LOCATIONCHANGE,
                    None,
                    Some(parent_event_hook),
                    pid,
                    tid,
                    WINEVENT_OUTOFCONTEXT,
                )
            };
            if hook.is_invalid() {
                warn!("failed to hook parent window events");
                return None;
            }
            Some(ParentHook::Event(hook))
        }
    }
}

impl Drop for ParentHook {
    fn drop(&mut self) {
        match *self {
            ParentHook::Window(hook) => {
                let _ = unsafe { UnhookWindowsHookEx(hook) };
            }
            ParentHook::Event(hook) => {
                let _ = unsafe { UnhookWinEvent(hook) };
            }
        }
    }
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_NCCREATE => {
            // SAFETY: lpCreateParams is the Rc::into_raw pointer from create_window
            let create = unsafe { &*(lparam.0 as *const CREATESTRUCTW) };
            unsafe { SetWindowLongPtrW(hwnd, GWLP_USERDATA, create.lpCreateParams as isize) };
            return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
        }
        WM_NCDESTROY => {
            let ptr = unsafe { SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0) } as *const WindowData;
            if !ptr.is_null() {
                // SAFETY: balances the Rc::into_raw handed over at creation
                drop(unsafe { Rc::from_raw(ptr) });
            }
            return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
        }
        _ => {}
    }

    let Some(data) = (unsafe { window_data(hwnd) }) else {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    };

    let reply = decode(data, msg, wparam, lparam)
        .and_then(dispatch)
        .and_then(|reply| encode(reply, msg, lparam));

    if msg == WM_DESTROY {
        data.destroyed.store(true, Ordering::Release);
        unsafe { PostQuitMessage(0) };
        return LRESULT(0);
    }

    match reply {
        Some(result) => result,
        None => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

fn register_class() -> Result<u16, PlatformError> {
    if let Some(&atom) = WINDOW_CLASS.get() {
        return Ok(atom);
    }
    let instance = unsafe { GetModuleHandleW(None) }.map_err(|e| os_error("GetModuleHandleW", e))?;
    let cursor = unsafe { LoadCursorW(None, IDC_ARROW) }.unwrap_or_default();
    let class = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        style: CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(window_proc),
        hInstance: instance.into(),
        hCursor: cursor,
        lpszClassName: CLASS_NAME,
        ..Default::default()
    };
    let atom = unsafe { RegisterClassExW(&class) };
    if atom == 0 {
        return Err(os_error(
            "RegisterClassExW",
            windows::core::Error::from_win32(),
        ));
    }
    debug!(atom, "registered window class");
    Ok(*WINDOW_CLASS.get_or_init(|| atom))
}

/// The Win32 [`Platform`]
#[derive(Default)]
pub struct Win32Platform {
    ole_initialized: bool,
}

impl Win32Platform {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drop for Win32Platform {
    fn drop(&mut self) {
        if self.ole_initialized {
            unsafe { OleUninitialize() };
        }
    }
}

impl Platform for Win32Platform {
    type Window = Win32Window;

    fn disable_ime(&mut self) {
        // Keys are decoded from WM_KEYDOWN; an IME would swallow them
        if !unsafe { ImmDisableIME(0) }.as_bool() {
            debug!("failed to disable IME");
        }
    }

    fn create_window(&mut self, params: &CreateParams) -> Result<Win32Window, PlatformError> {
        // Also initializes COM (single-threaded apartment) for the taskbar
        if !self.ole_initialized {
            self.ole_initialized = unsafe { OleInitialize(None) }.is_ok();
        }
        register_class()?;
        let instance = unsafe { GetModuleHandleW(None) }.map_err(|e| os_error("GetModuleHandleW", e))?;

        let parent = params.parent.map(|handle| HWND(handle.0 as _));
        let (x, y, w, h) = match parent {
            Some(parent) => {
                let mut rect = RECT::default();
                unsafe { GetClientRect(parent, &mut rect) }
                    .map_err(|e| os_error("GetClientRect", e))?;
                (0, 0, rect.right, rect.bottom)
            }
            None => (CW_USEDEFAULT, CW_USEDEFAULT, 100, 100),
        };

        let data = Rc::new(WindowData {
            destroyed: Arc::new(AtomicBool::new(false)),
            taskbar_button_created: unsafe { RegisterWindowMessageW(w!("TaskbarButtonCreated")) },
        });
        let raw = Rc::into_raw(Rc::clone(&data));
        let title = HSTRING::from(params.title.as_str());

        let ex_style = if parent.is_some() {
            WS_EX_NOPARENTNOTIFY
        } else {
            WINDOW_EX_STYLE::default()
        };
        let created = unsafe {
            CreateWindowExW(
                ex_style,
                CLASS_NAME,
                &title,
                style_bits(params.style),
                x,
                y,
                w,
                h,
                parent,
                None,
                Some(instance.into()),
                Some(raw.cast()),
            )
        };
        let hwnd = match created {
            Ok(hwnd) => hwnd,
            Err(err) => {
                // WM_NCCREATE may not have run; only reclaim if nobody took it
                if Rc::strong_count(&data) == 2 {
                    drop(unsafe { Rc::from_raw(raw) });
                }
                return Err(PlatformError::CreateWindow(err.message()));
            }
        };

        debug!(hwnd = ?hwnd.0, embedded = parent.is_some(), "created window");
        Ok(Win32Window {
            hwnd,
            data,
            taskbar: None,
            drop_target: None,
            _parent_hook: parent.and_then(ParentHook::install),
        })
    }

    fn run_message_loop(&mut self, handler: &mut (dyn MessageHandler + 'static)) {
        HANDLER.with(|h| h.set(Some(handler as *mut _)));
        let mut msg = MSG::default();
        // No TranslateMessage: characters are decoded from key-down
        while unsafe { GetMessageW(&mut msg, None, 0, 0) }.as_bool() {
            unsafe { DispatchMessageW(&msg) };
        }
        HANDLER.with(|h| h.set(None));
        DEFERRED.with(|q| q.borrow_mut().clear());
        debug!("message loop exited");
    }
}

/// A Win32 top-level or child window
pub struct Win32Window {
    hwnd: HWND,
    data: Rc<WindowData>,
    taskbar: Option<ITaskbarList3>,
    drop_target: Option<IDropTarget>,
    /// Unhooks on drop
    _parent_hook: Option<ParentHook>,
}

impl Win32Window {
    fn is_destroyed(&self) -> bool {
        self.data.destroyed.load(Ordering::Acquire)
    }

    fn monitor_info(monitor: HMONITOR) -> Option<MONITORINFOEXW> {
        let mut info = MONITORINFOEXW::default();
        info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;
        let ok = unsafe { GetMonitorInfoW(monitor, &mut info as *mut _ as *mut MONITORINFO) };
        ok.as_bool().then_some(info)
    }
}

impl Layout for Win32Window {
    fn to_unicode(&self, vkey: u32, scancode: u32, keys: &KeyboardState) -> u32 {
        let mut buf = [0u16; 16];
        let len = unsafe { ToUnicode(vkey, scancode, Some(&keys.0), &mut buf, TO_UNICODE_KEEP_STATE) };
        last_typed_unit(&buf, len)
    }
}

impl NativeWindow for Win32Window {
    fn native_handle(&self) -> NativeHandle {
        NativeHandle(self.hwnd.0 as u64)
    }

    fn waker(&self) -> Wakeup {
        let raw = self.hwnd.0 as isize;
        let destroyed = Arc::clone(&self.data.destroyed);
        Arc::new(move || {
            if destroyed.load(Ordering::Acquire) {
                return;
            }
            if let Err(err) =
                unsafe { PostMessageW(Some(HWND(raw as _)), WAKE_MESSAGE, WPARAM(0), LPARAM(0)) }
            {
                trace!(%err, "failed to post wake-up");
            }
        })
    }

    fn borders(&self, style: WindowStyle) -> Borders {
        let mut rect = RECT::default();
        if unsafe { AdjustWindowRectEx(&mut rect, style_bits(style), false, WINDOW_EX_STYLE::default()) }
            .is_err()
        {
            return Borders::NONE;
        }
        Borders {
            left: -rect.left,
            top: -rect.top,
            right: rect.right,
            bottom: rect.bottom,
        }
    }

    fn set_style(&mut self, style: WindowStyle) {
        let all = WS_OVERLAPPEDWINDOW | WS_POPUP | WS_CHILD | WS_CLIPSIBLINGS;
        let current = unsafe { GetWindowLongPtrW(self.hwnd, GWL_STYLE) } as u32;
        let updated = (current & !all.0) | style_bits(style).0;
        unsafe { SetWindowLongPtrW(self.hwnd, GWL_STYLE, updated as isize) };
    }

    fn set_placement(&mut self, window: Rect, layer: WindowLayer) {
        let after = match layer {
            WindowLayer::TopMost => HWND_TOPMOST,
            WindowLayer::Normal => HWND_NOTOPMOST,
        };
        let result = unsafe {
            SetWindowPos(
                self.hwnd,
                Some(after),
                window.x0,
                window.y0,
                window.width(),
                window.height(),
                SWP_FRAMECHANGED | SWP_SHOWWINDOW,
            )
        };
        if let Err(err) = result {
            warn!(%err, "SetWindowPos failed");
        }
    }

    fn client_size(&self) -> (i32, i32) {
        let mut rect = RECT::default();
        if unsafe { GetClientRect(self.hwnd, &mut rect) }.is_err() {
            return (0, 0);
        }
        (rect.right - rect.left, rect.bottom - rect.top)
    }

    fn is_minimized(&self) -> bool {
        unsafe { IsIconic(self.hwnd) }.as_bool()
    }

    fn is_maximized(&self) -> bool {
        unsafe { IsZoomed(self.hwnd) }.as_bool()
    }

    fn current_monitor(&self) -> MonitorId {
        let monitor = unsafe { MonitorFromWindow(self.hwnd, MONITOR_DEFAULTTOPRIMARY) };
        MonitorId(monitor.0 as u64)
    }

    fn monitor_layout(&self) -> MonitorLayout {
        unsafe extern "system" fn collect(
            monitor: HMONITOR,
            _hdc: HDC,
            _clip: *mut RECT,
            data: LPARAM,
        ) -> BOOL {
            // SAFETY: data is the Vec passed to EnumDisplayMonitors below
            let monitors = unsafe { &mut *(data.0 as *mut Vec<MonitorInfo>) };
            if let Some(info) = Win32Window::monitor_info(monitor) {
                monitors.push(MonitorInfo {
                    id: MonitorId(monitor.0 as u64),
                    name: wide_to_string(&info.szDevice),
                    rect: to_rect(info.monitorInfo.rcMonitor),
                    primary: info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
                });
            }
            BOOL(1)
        }

        let mut monitors: Vec<MonitorInfo> = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                None,
                None,
                Some(collect),
                LPARAM(&mut monitors as *mut Vec<MonitorInfo> as isize),
            );
        }
        let virtual_screen = unsafe {
            Rect::from_size(
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
                GetSystemMetrics(SM_CXVIRTUALSCREEN),
                GetSystemMetrics(SM_CYVIRTUALSCREEN),
            )
        };
        MonitorLayout {
            monitors,
            current: Some(self.current_monitor()),
            virtual_screen,
        }
    }

    fn display_info(&self, monitor: MonitorId) -> DisplayInfo {
        let Some(info) = Self::monitor_info(HMONITOR(monitor.0 as _)) else {
            return DisplayInfo::default();
        };
        let device = PCWSTR(info.szDevice.as_ptr());

        let mut mode = DEVMODEW {
            dmSize: std::mem::size_of::<DEVMODEW>() as u16,
            ..Default::default()
        };
        let refresh_hz = if unsafe { EnumDisplaySettingsW(device, ENUM_CURRENT_SETTINGS, &mut mode) }
            .as_bool()
        {
            normalize_refresh_rate(mode.dmDisplayFrequency)
        } else {
            0.0
        };

        let mut color_profile = None;
        let hdc = unsafe { CreateDCW(device, PCWSTR::null(), PCWSTR::null(), None) };
        if !hdc.is_invalid() {
            let mut buf = [0u16; 260];
            let mut len = buf.len() as u32;
            if unsafe { GetICMProfileW(hdc, &mut len, Some(PWSTR(buf.as_mut_ptr()))) }.as_bool() {
                color_profile = Some(PathBuf::from(wide_to_string(&buf)));
            }
            unsafe {
                let _ = DeleteDC(hdc);
            }
        }

        DisplayInfo {
            refresh_hz,
            color_profile,
        }
    }

    fn frame_metrics(&self) -> FrameMetrics {
        unsafe {
            FrameMetrics::from_system(
                GetSystemMetrics(SM_CXSIZEFRAME),
                GetSystemMetrics(SM_CXPADDEDBORDER),
                GetSystemMetrics(SM_CXBORDER),
            )
        }
    }

    fn keyboard_state(&self) -> KeyboardState {
        let mut keys = KeyboardState::default();
        if unsafe { GetKeyboardState(&mut keys.0) }.is_err() {
            return KeyboardState::default();
        }
        keys
    }

    fn set_title(&mut self, title: &str) -> Result<(), PlatformError> {
        unsafe { SetWindowTextW(self.hwnd, &HSTRING::from(title)) }
            .map_err(|e| os_error("SetWindowTextW", e))
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        let cursor = if visible {
            unsafe { LoadCursorW(None, IDC_ARROW) }.ok()
        } else {
            None
        };
        unsafe { SetCursor(cursor) };
    }

    fn track_mouse_leave(&mut self) -> bool {
        let mut track = TRACKMOUSEEVENT {
            cbSize: std::mem::size_of::<TRACKMOUSEEVENT>() as u32,
            dwFlags: TME_LEAVE,
            hwndTrack: self.hwnd,
            dwHoverTime: 0,
        };
        unsafe { TrackMouseEvent(&mut track) }.is_ok()
    }

    fn set_capture(&mut self, capture: bool) {
        if capture {
            unsafe { SetCapture(self.hwnd) };
        } else {
            let _ = unsafe { ReleaseCapture() };
        }
    }

    fn begin_drag(&mut self) {
        // Posted, so the modal move loop runs outside the message handler
        let _ = unsafe { ReleaseCapture() };
        let result = unsafe {
            PostMessageW(
                Some(self.hwnd),
                WM_NCLBUTTONDOWN,
                WPARAM(HTCAPTION as usize),
                LPARAM(0),
            )
        };
        if let Err(err) = result {
            debug!(%err, "failed to start window drag");
        }
    }

    fn open_system_menu(&mut self) {
        let _ = unsafe {
            PostMessageW(
                Some(self.hwnd),
                WM_SYSCOMMAND,
                WPARAM(SC_KEYMENU as usize),
                LPARAM(b' ' as isize),
            )
        };
    }

    fn set_enabled(&mut self, enabled: bool) {
        let _ = unsafe { EnableWindow(self.hwnd, enabled) };
    }

    fn set_execution_state(&mut self, state: ExecutionState) -> Result<(), PlatformError> {
        let flags = match state {
            ExecutionState::Default => ES_CONTINUOUS,
            ExecutionState::KeepAwake => ES_CONTINUOUS | ES_SYSTEM_REQUIRED | ES_DISPLAY_REQUIRED,
        };
        if unsafe { SetThreadExecutionState(flags) }.0 == 0 {
            return Err(PlatformError::Os {
                call: "SetThreadExecutionState",
                message: "rejected".to_string(),
            });
        }
        Ok(())
    }

    fn register_drop_target(&mut self, target: Arc<dyn DropTarget>) -> Result<(), PlatformError> {
        let url_format = unsafe { RegisterClipboardFormatW(w!("UniformResourceLocatorW")) } as u16;
        let ole: IDropTarget = OleDropTarget {
            target,
            granted: Cell::new(DROPEFFECT_NONE),
            url_format,
        }
        .into();
        unsafe { RegisterDragDrop(self.hwnd, &ole) }.map_err(|e| os_error("RegisterDragDrop", e))?;
        self.drop_target = Some(ole);
        Ok(())
    }

    fn revoke_drop_target(&mut self) {
        if self.drop_target.take().is_none() || self.is_destroyed() {
            return;
        }
        if let Err(err) = unsafe { RevokeDragDrop(self.hwnd) } {
            debug!(%err, "failed to revoke drop target");
        }
    }

    fn init_taskbar(&mut self) -> Result<(), PlatformError> {
        let taskbar: ITaskbarList3 = unsafe { CoCreateInstance(&TaskbarList, None, CLSCTX_INPROC_SERVER) }
            .map_err(|e| os_error("CoCreateInstance(TaskbarList)", e))?;
        unsafe { taskbar.HrInit() }.map_err(|e| os_error("ITaskbarList::HrInit", e))?;
        self.taskbar = Some(taskbar);
        Ok(())
    }

    fn set_taskbar_progress(&mut self, progress: TaskbarProgress) -> Result<(), PlatformError> {
        let Some(taskbar) = &self.taskbar else {
            return Err(PlatformError::Unsupported("taskbar progress"));
        };
        let (state, value) = match progress {
            TaskbarProgress::Hidden => (TBPF_NOPROGRESS, None),
            TaskbarProgress::Normal(percent) => (TBPF_NORMAL, Some(percent)),
            TaskbarProgress::Paused(percent) => (TBPF_PAUSED, Some(percent)),
        };
        unsafe {
            taskbar
                .SetProgressState(self.hwnd, state)
                .map_err(|e| os_error("ITaskbarList3::SetProgressState", e))?;
            if let Some(percent) = value {
                taskbar
                    .SetProgressValue(self.hwnd, u64::from(percent), 100)
                    .map_err(|e| os_error("ITaskbarList3::SetProgressValue", e))?;
            }
        }
        Ok(())
    }

    fn mark_fullscreen(&mut self, fullscreen: bool) {
        let Some(taskbar) = &self.taskbar else {
            return;
        };
        if let Err(err) = unsafe { taskbar.MarkFullscreenWindow(self.hwnd, fullscreen) } {
            debug!(%err, "failed to mark fullscreen window");
        }
    }

    fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        if let Err(err) = unsafe { DestroyWindow(self.hwnd) } {
            warn!(%err, "DestroyWindow failed");
        }
    }
}
