//! # VectorClock E-Paper Display
//!
//! Driver application for a Raspberry Pi clock dashboard on a Waveshare
//! 4.26" e-paper panel. It polls a local dashboard server for weather, the
//! closest aircraft overhead, special aircraft alerts, and Spotify playback,
//! and composes them into fixed screen regions.
//!
//! E-paper constraints shape the whole design: full refreshes are slow and
//! flash the panel, partial refreshes are fast but accumulate ghosting. The
//! scheduler therefore updates the clock with one partial refresh per minute,
//! the flight strip only when its contents change, and forces a full
//! anti-ghosting redraw every six hours.
//!
//! ## Structure
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`regions`]: the fixed 800x480 zone layout
//! - [`surface`]: byte-per-pixel framebuffer and 1-bit packing
//! - [`font`]: TrueType rasterization with a built-in mono fallback
//! - [`dither`]: Floyd-Steinberg, Atkinson, and ordered dithering
//! - [`art`]: single-URL album art cache with dithered variants
//! - [`server`]: blocking client for the dashboard server
//! - [`screen`]: per-region renderers
//! - [`sink`]: display sink trait, PNG preview sink
//! - [`scheduler`]: full/partial refresh state machine
//!
//! With the `hardware` feature on Linux, [`epd4in26`] drives the real panel
//! over SPI/GPIO; everywhere else the preview sink writes PNGs.

pub mod art;
pub mod config;
pub mod dither;
pub mod font;
pub mod regions;
pub mod scheduler;
pub mod screen;
pub mod server;
pub mod sink;
pub mod surface;

#[cfg(all(target_os = "linux", feature = "hardware"))]
pub mod epd4in26;

pub use config::Config;
pub use dither::DitherAlgorithm;
pub use scheduler::RefreshScheduler;
pub use sink::{DisplaySink, PreviewSink, SinkError};
