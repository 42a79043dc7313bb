//! # Display Sinks
//!
//! Abstraction over where a rendered surface goes: the physical panel or a
//! PNG file on disk. The scheduler only speaks this trait, so simulation mode
//! is a constructor-time substitution and nothing downstream can tell.

use crate::surface::Surface;
use image::GrayImage;
use log::info;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink cannot do partial refreshes; callers fall back to full.
    #[error("partial refresh not supported by this sink")]
    Unsupported,
    #[error("display I/O failed: {0}")]
    Io(String),
}

/// Something that can show a rendered surface.
pub trait DisplaySink {
    fn full_refresh(&mut self, surface: &Surface) -> Result<(), SinkError>;
    fn partial_refresh(&mut self, surface: &Surface) -> Result<(), SinkError>;

    /// Blank the physical panel. File sinks have nothing to blank.
    fn clear(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Put the panel into deep sleep before process exit.
    fn sleep(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes every push as a grayscale PNG. Used in preview mode and whenever
/// no panel hardware is available.
pub struct PreviewSink {
    path: PathBuf,
}

impl PreviewSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn save(&self, surface: &Surface) -> Result<(), SinkError> {
        let image = GrayImage::from_raw(
            surface.width(),
            surface.height(),
            surface.as_raw().to_vec(),
        )
        .ok_or_else(|| SinkError::Io("surface buffer size mismatch".to_string()))?;
        image
            .save(&self.path)
            .map_err(|e| SinkError::Io(e.to_string()))?;
        info!("Preview written to {}", self.path.display());
        Ok(())
    }
}

impl Default for PreviewSink {
    fn default() -> Self {
        Self::new("epaper_preview.png")
    }
}

impl DisplaySink for PreviewSink {
    fn full_refresh(&mut self, surface: &Surface) -> Result<(), SinkError> {
        self.save(surface)
    }

    fn partial_refresh(&mut self, surface: &Surface) -> Result<(), SinkError> {
        self.save(surface)
    }
}
