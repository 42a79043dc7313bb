//! # Display Region Registry
//!
//! Fixed rectangular zones of the 800x480 panel used for partial refresh and
//! per-zone redraws. Regions are plain data: construction fixes them for the
//! lifetime of the process and every draw operation addresses exactly one of
//! them.
//!
//! Zones may overlap. `MusicMode` covers the area that `Clock` and `Date`
//! normally occupy; callers pick a mutually exclusive set of zones per
//! display mode rather than relying on the registry to prevent overlap.

use crate::surface::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// A rectangular region of the display, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bounding box as `(left, top, right, bottom)`, right/bottom exclusive.
    pub const fn bounds(&self) -> (u32, u32, u32, u32) {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

/// Named display zones. A closed set: the layout is fixed at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Zone {
    /// Center - large clock.
    Clock,
    /// Below clock - date line.
    Date,
    /// Top left - weather.
    Weather,
    /// Bottom strip - flight info.
    Flight,
    /// Very bottom - now playing with album art.
    NowPlaying,
    /// Top right - alert status.
    Status,
    /// Center area taken over in music mode.
    MusicMode,
    /// Top right - mini clock shown during music mode.
    ClockMini,
    /// The whole panel.
    Full,
}

impl Zone {
    /// The fixed rectangle assigned to this zone.
    pub const fn region(self) -> Region {
        match self {
            Zone::Clock => Region::new(200, 160, 400, 160),
            Zone::Date => Region::new(250, 320, 300, 40),
            Zone::Weather => Region::new(0, 0, 250, 100),
            Zone::Flight => Region::new(0, 365, 800, 55),
            Zone::NowPlaying => Region::new(0, 420, 800, 60),
            Zone::Status => Region::new(550, 0, 250, 60),
            Zone::MusicMode => Region::new(0, 100, 800, 300),
            Zone::ClockMini => Region::new(700, 10, 100, 40),
            Zone::Full => Region::new(0, 0, DISPLAY_WIDTH, DISPLAY_HEIGHT),
        }
    }
}
