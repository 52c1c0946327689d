//! Per-monitor display information: refresh rate and colour profile
//!
//! The values are cached for the monitor the window currently lives on and
//! only re-queried when that monitor changes (or a refresh is forced after a
//! display-mode change).

use crate::geometry::MonitorId;
use crate::state::EventFlags;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Profiles larger than this are rejected
pub const MAX_PROFILE_SIZE: u64 = 100_000_000;

/// Turn the integer refresh rate reported by the display driver into Hz.
///
/// Drivers round NTSC-style rates down, so 59 almost certainly means
/// 60/1.001. 0 and 1 mean "hardware default" and are reported as unknown.
pub fn normalize_refresh_rate(reported: u32) -> f64 {
    match reported {
        0 | 1 => 0.0,
        23 | 29 | 47 | 59 | 71 | 89 | 95 | 119 | 143 => (reported as f64 + 1.0) / 1.001,
        hz => hz as f64,
    }
}

/// What the window system reports for one monitor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayInfo {
    pub refresh_hz: f64,
    pub color_profile: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct DisplayTracker {
    monitor: Option<MonitorId>,
    refresh_hz: f64,
    color_profile: Option<PathBuf>,
}

impl DisplayTracker {
    pub fn monitor(&self) -> Option<MonitorId> {
        self.monitor
    }

    pub fn refresh_hz(&self) -> f64 {
        self.refresh_hz
    }

    pub fn color_profile(&self) -> Option<&Path> {
        self.color_profile.as_deref()
    }

    /// Forget the cached monitor so the next update re-queries.
    pub fn invalidate(&mut self) {
        self.monitor = None;
    }

    /// Record the window's current monitor, querying its details if it changed.
    ///
    /// Returns the events the caller should signal.
    pub fn update(
        &mut self,
        monitor: MonitorId,
        query: impl FnOnce() -> DisplayInfo,
    ) -> EventFlags {
        if self.monitor == Some(monitor) {
            return EventFlags::empty();
        }
        self.monitor = Some(monitor);

        let info = query();
        let mut events = EventFlags::empty();

        if info.refresh_hz != self.refresh_hz {
            debug!(fps = info.refresh_hz, "display-fps");
            if info.refresh_hz == 0.0 {
                warn!("couldn't determine monitor refresh rate");
            }
            self.refresh_hz = info.refresh_hz;
            events |= EventFlags::WIN_STATE;
        }

        if info.color_profile != self.color_profile {
            if let Some(path) = &info.color_profile {
                debug!(path = %path.display(), "color-profile");
            }
            self.color_profile = info.color_profile;
            events |= EventFlags::ICC_PROFILE_CHANGED;
        }

        events
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read color profile {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("color profile {path} is too large ({size} bytes)")]
    TooLarge { path: PathBuf, size: u64 },
    #[error("color profile {path} is empty")]
    Empty { path: PathBuf },
}

/// Read an ICC profile from disk.
pub fn load_color_profile(path: &Path) -> Result<Vec<u8>, ProfileError> {
    let io_err = |source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > MAX_PROFILE_SIZE {
        return Err(ProfileError::TooLarge {
            path: path.to_path_buf(),
            size,
        });
    }
    let bytes = std::fs::read(path).map_err(io_err)?;
    if bytes.is_empty() {
        return Err(ProfileError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(bytes)
}
