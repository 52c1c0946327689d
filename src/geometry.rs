//! Window geometry engine
//!
//! Pure computations over rectangles: border conversion, fullscreen
//! save/restore, oversized-window letterboxing, aspect-locked interactive
//! resizing and monitor selection. Nothing here talks to the window system;
//! callers pass in the border metrics and monitor layout they observed.

use glob_match::glob_match;
use tracing::{debug, info};

/// Rectangle in screen coordinates, `x1`/`y1` exclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub const fn from_size(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    pub const fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub const fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub const fn center(&self) -> (i32, i32) {
        (self.x0 + self.width() / 2, self.y0 + self.height() / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Thickness of the window decoration on each side, for one window style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Borders {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Borders {
    pub const NONE: Borders = Borders {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    pub const fn horizontal(&self) -> i32 {
        self.left + self.right
    }

    pub const fn vertical(&self) -> i32 {
        self.top + self.bottom
    }
}

/// Client rectangle -> window rectangle
pub fn add_borders(client: Rect, b: Borders) -> Rect {
    Rect::new(
        client.x0 - b.left,
        client.y0 - b.top,
        client.x1 + b.right,
        client.y1 + b.bottom,
    )
}

/// Window rectangle -> client rectangle
pub fn remove_borders(window: Rect, b: Borders) -> Rect {
    Rect::new(
        window.x0 + b.left,
        window.y0 + b.top,
        window.x1 - b.right,
        window.y1 - b.bottom,
    )
}

/// Client-area geometry plus the saved windowed geometry while fullscreen.
///
/// `x`/`y` are the top-left of the client area in screen space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub prev_x: i32,
    pub prev_y: i32,
    pub prev_w: i32,
    pub prev_h: i32,
    pub fullscreen: bool,
}

impl WindowGeometry {
    pub fn client_rect(&self) -> Rect {
        Rect::from_size(self.x, self.y, self.w, self.h)
    }

    pub fn saved_rect(&self) -> Rect {
        Rect::from_size(self.prev_x, self.prev_y, self.prev_w, self.prev_h)
    }

    /// Move the live geometry without touching the saved one.
    pub fn place(&mut self, client: Rect) {
        self.x = client.x0;
        self.y = client.y0;
        self.w = client.width();
        self.h = client.height();
    }

    /// Switch to fullscreen on `screen`.
    ///
    /// The windowed geometry is saved only on the windowed -> fullscreen
    /// transition; calling this again while fullscreen just re-targets the
    /// screen.
    pub fn enter_fullscreen(&mut self, screen: Rect) {
        if !self.fullscreen {
            self.prev_x = self.x;
            self.prev_y = self.y;
            self.prev_w = self.w;
            self.prev_h = self.h;
            self.fullscreen = true;
            debug!(
                x = self.prev_x,
                y = self.prev_y,
                w = self.prev_w,
                h = self.prev_h,
                "save window bounds"
            );
        }
        self.place(screen);
    }

    /// Restore the saved windowed geometry. No-op when not fullscreen.
    pub fn exit_fullscreen(&mut self) {
        if !self.fullscreen {
            return;
        }
        self.fullscreen = false;
        self.place(self.saved_rect());
        debug!(
            x = self.x,
            y = self.y,
            w = self.w,
            h = self.h,
            "restore window bounds"
        );
    }

    /// Apply the wanted fullscreen state. Returns true if it toggled.
    pub fn apply_fullscreen(&mut self, want: bool, screen: Rect) -> bool {
        let toggled = want != self.fullscreen;
        if want {
            self.enter_fullscreen(screen);
        } else {
            self.exit_fullscreen();
        }
        toggled
    }

    /// Resize the client area, keeping its centre where it was.
    pub fn recenter(&mut self, w: i32, h: i32) {
        self.x += self.w / 2 - w / 2;
        self.y += self.h / 2 - h / 2;
        self.w = w;
        self.h = h;
    }

    /// Size the window would have outside fullscreen
    pub fn unfullscreen_size(&self) -> (i32, i32) {
        if self.fullscreen {
            (self.prev_w, self.prev_h)
        } else {
            (self.w, self.h)
        }
    }

    /// Change the windowed size around its centre. While fullscreen, only the
    /// saved geometry is edited.
    pub fn set_unfullscreen_size(&mut self, w: i32, h: i32) {
        if self.fullscreen {
            self.prev_x += self.prev_w / 2 - w / 2;
            self.prev_y += self.prev_h / 2 - h / 2;
            self.prev_w = w;
            self.prev_h = h;
        } else {
            self.recenter(w, h);
        }
    }
}

/// Shrink an oversized window to fit `screen`, letterboxing the client area.
///
/// With `fit_border` the whole window (decoration included) must fit,
/// otherwise only the client area. Returns the new client rectangle, centred
/// on the old window's centre, or `None` when nothing needs to change.
pub fn fit_to_screen(client: Rect, borders: Borders, screen: Rect, fit_border: bool) -> Option<Rect> {
    if client.is_empty() {
        return None;
    }
    let window = add_borders(client, borders);
    let (o_w, o_h) = if fit_border {
        (window.width(), window.height())
    } else {
        (client.width(), client.height())
    };
    let (screen_w, screen_h) = (screen.width(), screen.height());
    if o_w <= screen_w && o_h <= screen_h {
        return None;
    }
    debug!("requested window size larger than the screen");

    let (mut n_w, mut n_h) = if fit_border {
        (screen_w - borders.horizontal(), screen_h - borders.vertical())
    } else {
        (screen_w, screen_h)
    };
    if n_w <= 0 || n_h <= 0 {
        return None;
    }

    // Letterbox using the client aspect, not the decorated window's
    let aspect = client.width() as f64 / client.height() as f64;
    let screen_aspect = n_w as f64 / n_h as f64;
    if aspect > screen_aspect {
        n_h = (n_w as f64 / aspect) as i32;
    } else {
        n_w = (n_h as f64 * aspect) as i32;
    }

    let (cx, cy) = window.center();
    let win_w = n_w + borders.horizontal();
    let win_h = n_h + borders.vertical();
    let left = cx - win_w / 2;
    let top = cy - win_h / 2;
    Some(Rect::from_size(
        left + borders.left,
        top + borders.top,
        n_w,
        n_h,
    ))
}

/// Edge or corner being dragged during an interactive resize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEdge {
    Left,
    Right,
    Top,
    TopLeft,
    TopRight,
    Bottom,
    BottomLeft,
    BottomRight,
}

impl ResizeEdge {
    /// Which side of the rectangle follows the dragged edge to keep the
    /// aspect: 0=left, 1=top, 2=right, 3=bottom.
    const fn adjusted_side(self) -> usize {
        match self {
            ResizeEdge::Left | ResizeEdge::Right => 3,
            ResizeEdge::Top | ResizeEdge::Bottom => 2,
            ResizeEdge::TopLeft | ResizeEdge::TopRight => 1,
            ResizeEdge::BottomLeft | ResizeEdge::BottomRight => 3,
        }
    }
}

/// Adjust a proposed window rectangle so its client area matches `aspect`.
///
/// Exactly one side moves, chosen from the dragged edge.
pub fn aspect_locked_resize(
    edge: ResizeEdge,
    proposed: Rect,
    borders: Borders,
    aspect: f32,
) -> Rect {
    let client = remove_borders(proposed, borders);
    let (c_w, c_h) = (client.width() as f32, client.height() as f32);
    let d_w = (c_h * aspect - c_w) as i32;
    let d_h = (c_w / aspect - c_h) as i32;
    let deltas = [d_w, d_h, -d_w, -d_h];
    let mut sides = [proposed.x0, proposed.y0, proposed.x1, proposed.y1];
    let side = edge.adjusted_side();
    sides[side] -= deltas[side];
    Rect::new(sides[0], sides[1], sides[2], sides[3])
}

/// Content aspect used for aspect locking; a zero height counts as one.
pub fn content_aspect(w: i32, h: i32) -> f32 {
    w as f32 / h.max(1) as f32
}

/// Opaque monitor identity, stable while the monitor is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    pub id: MonitorId,
    /// Device name, e.g. `\\.\DISPLAY1`
    pub name: String,
    pub rect: Rect,
    pub primary: bool,
}

/// Monitor arrangement as seen from one window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorLayout {
    /// In enumeration order
    pub monitors: Vec<MonitorInfo>,
    /// Monitor the window system associates with the window
    pub current: Option<MonitorId>,
    /// Union of every monitor
    pub virtual_screen: Rect,
}

impl MonitorLayout {
    pub fn primary(&self) -> Option<&MonitorInfo> {
        self.monitors
            .iter()
            .find(|m| m.primary)
            .or_else(|| self.monitors.first())
    }

    pub fn get(&self, id: MonitorId) -> Option<&MonitorInfo> {
        self.monitors.iter().find(|m| m.id == id)
    }

    fn primary_rect(&self) -> Rect {
        self.primary()
            .map(|m| m.rect)
            .unwrap_or(self.virtual_screen)
    }
}

/// Which monitor the window should be placed on
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MonitorSelector {
    /// The monitor the window currently lives on
    #[default]
    Current,
    Primary,
    /// Zero-based, in enumeration order
    Index(usize),
    /// Glob matched against the device name
    Name(String),
    /// Every monitor at once; only honoured in fullscreen
    All,
}

impl std::fmt::Display for MonitorSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorSelector::Current => f.write_str("current"),
            MonitorSelector::Primary => f.write_str("primary"),
            MonitorSelector::Index(i) => write!(f, "{i}"),
            MonitorSelector::Name(name) => f.write_str(name),
            MonitorSelector::All => f.write_str("all"),
        }
    }
}

/// Resolve a monitor selector into the screen rectangle used for placement.
///
/// Missing indices and unmatched names fall back to the primary monitor.
pub fn screen_rect_for(selector: &MonitorSelector, fullscreen: bool, layout: &MonitorLayout) -> Rect {
    match selector {
        MonitorSelector::All if fullscreen => layout.virtual_screen,
        MonitorSelector::Current | MonitorSelector::All => layout
            .current
            .and_then(|id| layout.get(id))
            .map(|m| m.rect)
            .unwrap_or_else(|| layout.primary_rect()),
        MonitorSelector::Primary => layout.primary_rect(),
        MonitorSelector::Index(index) => match layout.monitors.get(*index) {
            Some(monitor) => monitor.rect,
            None => {
                info!("screen {index} does not exist, falling back to primary");
                layout.primary_rect()
            }
        },
        MonitorSelector::Name(pattern) => {
            match layout.monitors.iter().find(|m| glob_match(pattern, &m.name)) {
                Some(monitor) => monitor.rect,
                None => {
                    info!("no screen matches '{pattern}', falling back to primary");
                    layout.primary_rect()
                }
            }
        }
    }
}

/// Names of the monitors intersecting `client`, the associated monitor first.
pub fn monitors_intersecting(client: Rect, layout: &MonitorLayout) -> Vec<String> {
    let associated = layout.current.and_then(|id| layout.get(id));
    let mut names: Vec<String> = associated.iter().map(|m| m.name.clone()).collect();
    names.extend(
        layout
            .monitors
            .iter()
            .filter(|m| Some(m.id) != layout.current && m.rect.intersects(&client))
            .map(|m| m.name.clone()),
    );
    names
}

/// Client size an embedded window should take when its parent's client area
/// is `parent`, or `None` if it already matches.
pub fn follow_parent(child: (i32, i32), parent: (i32, i32)) -> Option<(i32, i32)> {
    (child != parent).then_some(parent)
}

/// Part of a window under the pointer, for non-client hit testing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitArea {
    Client,
    Left,
    Right,
    Top,
    TopLeft,
    TopRight,
    Bottom,
    BottomLeft,
    BottomRight,
}

/// Resize-handle sizes the window system uses for framed windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetrics {
    /// Thickness of the sizing border
    pub frame: i32,
    /// Length of the corner handles along each edge
    pub diagonal: i32,
}

impl FrameMetrics {
    /// From the system's sizing frame, padded border and border widths
    pub const fn from_system(size_frame: i32, padded_border: i32, border: i32) -> Self {
        let frame = size_frame + padded_border;
        Self {
            frame,
            diagonal: frame * 2 + border,
        }
    }
}

/// Sizing handles for a window without decoration.
///
/// `x`/`y` are relative to the client area of size `w` x `h`.
pub fn borderless_hit_test(x: i32, y: i32, w: i32, h: i32, metrics: FrameMetrics) -> HitArea {
    let FrameMetrics { frame, diagonal } = metrics;
    if y < frame {
        if x < diagonal {
            return HitArea::TopLeft;
        }
        if x >= w - diagonal {
            return HitArea::TopRight;
        }
        return HitArea::Top;
    }
    if y >= h - frame {
        if x < diagonal {
            return HitArea::BottomLeft;
        }
        if x >= w - diagonal {
            return HitArea::BottomRight;
        }
        return HitArea::Bottom;
    }
    if x < frame {
        return HitArea::Left;
    }
    if x >= w - frame {
        return HitArea::Right;
    }
    HitArea::Client
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    const FRAMED: Borders = Borders {
        left: 8,
        top: 31,
        right: 8,
        bottom: 8,
    };

    fn layout() -> MonitorLayout {
        MonitorLayout {
            monitors: vec![
                MonitorInfo {
                    id: MonitorId(1),
                    name: r"\\.\DISPLAY1".into(),
                    rect: Rect::new(0, 0, 1920, 1080),
                    primary: true,
                },
                MonitorInfo {
                    id: MonitorId(2),
                    name: r"\\.\DISPLAY2".into(),
                    rect: Rect::new(1920, 0, 4480, 1440),
                    primary: false,
                },
            ],
            current: Some(MonitorId(2)),
            virtual_screen: Rect::new(0, 0, 4480, 1440),
        }
    }

    #[test]
    fn test_borders_round_trip() {
        for r in [
            Rect::new(100, 100, 900, 700),
            Rect::new(-1920, -20, -10, 1060),
            Rect::new(0, 0, 0, 0),
        ] {
            assert!(remove_borders(add_borders(r, FRAMED), FRAMED) == r);
            assert!(add_borders(remove_borders(r, FRAMED), FRAMED) == r);
        }
        assert!(add_borders(Rect::new(10, 10, 20, 20), Borders::NONE) == Rect::new(10, 10, 20, 20));
    }

    #[test]
    fn test_fullscreen_save_restore() {
        let mut geo = WindowGeometry::default();
        geo.place(Rect::from_size(100, 100, 800, 600));

        geo.enter_fullscreen(Rect::new(0, 0, 1920, 1080));
        assert!(geo.client_rect() == Rect::new(0, 0, 1920, 1080));
        assert!(geo.saved_rect() == Rect::from_size(100, 100, 800, 600));

        geo.exit_fullscreen();
        assert!(!geo.fullscreen);
        assert!(geo.client_rect() == Rect::from_size(100, 100, 800, 600));
    }

    #[test]
    fn test_fullscreen_twice_keeps_first_snapshot() {
        let mut geo = WindowGeometry::default();
        geo.place(Rect::from_size(-50, 20, 640, 360));
        geo.enter_fullscreen(Rect::new(0, 0, 1920, 1080));
        geo.enter_fullscreen(Rect::new(1920, 0, 4480, 1440));
        assert!(geo.client_rect() == Rect::new(1920, 0, 4480, 1440));

        geo.exit_fullscreen();
        assert!(geo.client_rect() == Rect::from_size(-50, 20, 640, 360));
        // A second exit is a no-op
        geo.exit_fullscreen();
        assert!(geo.client_rect() == Rect::from_size(-50, 20, 640, 360));
    }

    #[test]
    fn test_apply_fullscreen_reports_toggle() {
        let mut geo = WindowGeometry::default();
        geo.place(Rect::from_size(0, 0, 10, 10));
        let screen = Rect::new(0, 0, 100, 100);
        assert!(geo.apply_fullscreen(true, screen));
        assert!(!geo.apply_fullscreen(true, screen));
        assert!(geo.apply_fullscreen(false, screen));
        assert!(!geo.apply_fullscreen(false, screen));
    }

    #[test]
    fn test_set_unfullscreen_size() {
        let mut geo = WindowGeometry::default();
        geo.place(Rect::from_size(100, 100, 800, 600));
        geo.set_unfullscreen_size(400, 300);
        assert!(geo.client_rect() == Rect::from_size(300, 250, 400, 300));

        geo.enter_fullscreen(Rect::new(0, 0, 1920, 1080));
        geo.set_unfullscreen_size(800, 600);
        // Live geometry stays on the screen, saved geometry is recentred
        assert!(geo.client_rect() == Rect::new(0, 0, 1920, 1080));
        assert!(geo.unfullscreen_size() == (800, 600));
        geo.exit_fullscreen();
        assert!(geo.client_rect() == Rect::from_size(100, 100, 800, 600));
    }

    #[test]
    fn test_fit_to_screen_letterboxes() {
        let screen = Rect::new(0, 0, 1920, 1080);
        let client = Rect::from_size(-100, 0, 3840, 1600);
        let fitted = fit_to_screen(client, FRAMED, screen, true).unwrap();
        let window = add_borders(fitted, FRAMED);

        assert!(window.width() <= screen.width());
        assert!(window.height() <= screen.height());

        let before = client.width() as f64 / client.height() as f64;
        let after = fitted.width() as f64 / fitted.height() as f64;
        assert!((before - after).abs() < 0.01);

        let (ox, oy) = add_borders(client, FRAMED).center();
        let (nx, ny) = window.center();
        assert!((ox - nx).abs() <= 1);
        assert!((oy - ny).abs() <= 1);
    }

    #[test]
    fn test_fit_to_screen_client_only() {
        let screen = Rect::new(0, 0, 1920, 1080);
        // Fits as a client area, only the decoration overflows
        let client = Rect::from_size(0, 0, 1920, 1080);
        assert!(fit_to_screen(client, FRAMED, screen, false).is_none());
        assert!(fit_to_screen(client, FRAMED, screen, true).is_some());

        let tall = Rect::from_size(0, 0, 1000, 2000);
        let fitted = fit_to_screen(tall, FRAMED, screen, false).unwrap();
        assert!(fitted.height() == 1080);
        assert!(fitted.width() == 540);
    }

    #[test]
    fn test_fit_to_screen_small_window_untouched() {
        let screen = Rect::new(0, 0, 1920, 1080);
        assert!(fit_to_screen(Rect::from_size(10, 10, 640, 480), FRAMED, screen, true).is_none());
    }

    #[test]
    fn test_aspect_locked_resize_right_edge_moves_bottom() {
        // Client 800x500 proposed, content is 2:1
        let proposed = add_borders(Rect::from_size(100, 100, 800, 500), FRAMED);
        let adjusted = aspect_locked_resize(ResizeEdge::Right, proposed, FRAMED, 2.0);
        let client = remove_borders(adjusted, FRAMED);
        assert!(adjusted.x0 == proposed.x0);
        assert!(adjusted.x1 == proposed.x1);
        assert!(adjusted.y0 == proposed.y0);
        assert!(client.height() == 400);
    }

    #[test]
    fn test_aspect_locked_resize_edge_table() {
        let proposed = add_borders(Rect::from_size(0, 0, 1000, 1000), FRAMED);
        let aspect = 2.0;
        let moved = |edge| {
            let r = aspect_locked_resize(edge, proposed, FRAMED, aspect);
            [
                r.x0 != proposed.x0,
                r.y0 != proposed.y0,
                r.x1 != proposed.x1,
                r.y1 != proposed.y1,
            ]
        };
        assert!(moved(ResizeEdge::Left) == [false, false, false, true]);
        assert!(moved(ResizeEdge::Bottom) == [false, false, true, false]);
        assert!(moved(ResizeEdge::Top) == [false, false, true, false]);
        assert!(moved(ResizeEdge::TopLeft) == [false, true, false, false]);
        assert!(moved(ResizeEdge::TopRight) == [false, true, false, false]);
        assert!(moved(ResizeEdge::BottomRight) == [false, false, false, true]);

        let r = aspect_locked_resize(ResizeEdge::TopLeft, proposed, FRAMED, aspect);
        assert!(remove_borders(r, FRAMED).height() == 500);
        let r = aspect_locked_resize(ResizeEdge::Bottom, proposed, FRAMED, aspect);
        assert!(remove_borders(r, FRAMED).width() == 2000);
    }

    #[test]
    fn test_content_aspect_zero_height() {
        assert!(content_aspect(640, 0) == 640.0);
        assert!(content_aspect(1920, 1080) == 1920.0 / 1080.0);
    }

    #[test]
    fn test_screen_rect_for() {
        let layout = layout();
        let primary = Rect::new(0, 0, 1920, 1080);
        let second = Rect::new(1920, 0, 4480, 1440);

        assert!(screen_rect_for(&MonitorSelector::Current, false, &layout) == second);
        assert!(screen_rect_for(&MonitorSelector::Primary, false, &layout) == primary);
        assert!(screen_rect_for(&MonitorSelector::Index(1), false, &layout) == second);
        assert!(screen_rect_for(&MonitorSelector::Index(7), false, &layout) == primary);
        assert!(screen_rect_for(&MonitorSelector::All, true, &layout) == layout.virtual_screen);
        // "all" means nothing for a windowed window
        assert!(screen_rect_for(&MonitorSelector::All, false, &layout) == second);
    }

    #[test]
    fn test_screen_rect_by_name() {
        let layout = layout();
        let by_name = |pattern: &str| {
            screen_rect_for(&MonitorSelector::Name(pattern.into()), false, &layout)
        };
        assert!(by_name("*DISPLAY2") == Rect::new(1920, 0, 4480, 1440));
        assert!(by_name("*HDMI*") == Rect::new(0, 0, 1920, 1080));
    }

    #[test]
    fn test_current_without_association_is_primary() {
        let mut layout = layout();
        layout.current = None;
        assert!(screen_rect_for(&MonitorSelector::Current, false, &layout) == Rect::new(0, 0, 1920, 1080));
    }

    #[test]
    fn test_monitors_intersecting() {
        let mut layout = layout();
        let spanning = Rect::from_size(1800, 100, 400, 300);
        assert!(monitors_intersecting(spanning, &layout) == vec![r"\\.\DISPLAY2", r"\\.\DISPLAY1"]);

        layout.current = Some(MonitorId(1));
        let left_only = Rect::from_size(100, 100, 400, 300);
        assert!(monitors_intersecting(left_only, &layout) == vec![r"\\.\DISPLAY1"]);
    }

    #[test]
    fn test_follow_parent() {
        assert!(follow_parent((640, 480), (800, 450)) == Some((800, 450)));
        assert!(follow_parent((800, 450), (800, 450)) == None);
    }

    #[test]
    fn test_borderless_hit_test() {
        let metrics = FrameMetrics::from_system(4, 4, 1);
        assert!(metrics == FrameMetrics { frame: 8, diagonal: 17 });
        let hit = |x, y| borderless_hit_test(x, y, 800, 600, metrics);
        assert!(hit(0, 0) == HitArea::TopLeft);
        assert!(hit(400, 2) == HitArea::Top);
        assert!(hit(799, 0) == HitArea::TopRight);
        assert!(hit(5, 599) == HitArea::BottomLeft);
        assert!(hit(400, 595) == HitArea::Bottom);
        assert!(hit(790, 598) == HitArea::BottomRight);
        assert!(hit(3, 300) == HitArea::Left);
        assert!(hit(795, 300) == HitArea::Right);
        assert!(hit(400, 300) == HitArea::Client);
        // The corner band includes the one-pixel border
        assert!(hit(16, 2) == HitArea::TopLeft);
        assert!(hit(17, 2) == HitArea::Top);
    }
}
