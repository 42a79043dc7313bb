//! # Album Art Cache
//!
//! Fetches album art over HTTP and keeps both the source image and its
//! dithered variants cached, keyed by URL, algorithm, and target size. Only
//! one URL is cached at a time; a track change evicts everything for the
//! previous track. The cache makes at most one network fetch per URL, so the
//! 15-second render loop never refetches art for the song already showing.

use crate::dither::{dither, DitherAlgorithm};
use anyhow::Context;
use image::{imageops::FilterType, DynamicImage, GrayImage};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

/// Thumbnail edge length used in the now-playing strip.
pub const THUMBNAIL_SIZE: u32 = 50;
/// Large art edge length used in music mode.
pub const MUSIC_MODE_SIZE: u32 = 180;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ART_BYTES: u64 = 4 * 1024 * 1024;

/// How the now-playing information is laid out on screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Small thumbnail in the bottom strip.
    #[default]
    Thumbnail,
    /// Large centered art replacing the clock area.
    Music,
}

/// Server-controlled rendering preferences for the now-playing display.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct DisplaySettings {
    #[serde(rename = "displayMode", default)]
    pub display_mode: DisplayMode,
    #[serde(rename = "ditherAlgorithm", default)]
    pub dither_algorithm: DitherAlgorithm,
    #[serde(rename = "showAlbumArt", default = "default_show_album_art")]
    pub show_album_art: bool,
}

fn default_show_album_art() -> bool {
    true
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            display_mode: DisplayMode::Thumbnail,
            dither_algorithm: DitherAlgorithm::Floyd,
            show_album_art: true,
        }
    }
}

/// Where the cache gets source images from. Production uses HTTP; tests
/// substitute a counting or failing source.
pub trait ImageSource {
    fn fetch(&self, url: &str) -> anyhow::Result<DynamicImage>;
}

/// Fetches and decodes images with a shared blocking HTTP agent.
pub struct HttpImageSource {
    agent: ureq::Agent,
}

impl HttpImageSource {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(FETCH_TIMEOUT)
                .build(),
        }
    }
}

impl Default for HttpImageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSource for HttpImageSource {
    fn fetch(&self, url: &str) -> anyhow::Result<DynamicImage> {
        let response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("fetching album art from {url}"))?;
        let capacity = response
            .header("Content-Length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(64 * 1024);
        let mut bytes = Vec::with_capacity(capacity);
        response
            .into_reader()
            .take(MAX_ART_BYTES)
            .read_to_end(&mut bytes)
            .context("reading album art body")?;
        image::load_from_memory(&bytes).context("decoding album art")
    }
}

/// Single-URL album art cache with per-(algorithm, size) dithered variants.
pub struct ArtCache {
    source: Box<dyn ImageSource>,
    settings: DisplaySettings,
    cached_url: Option<String>,
    cached_source: Option<DynamicImage>,
    variants: HashMap<(DitherAlgorithm, u32), GrayImage>,
}

impl ArtCache {
    pub fn new(source: Box<dyn ImageSource>) -> Self {
        Self {
            source,
            settings: DisplaySettings::default(),
            cached_url: None,
            cached_source: None,
            variants: HashMap::new(),
        }
    }

    pub fn settings(&self) -> DisplaySettings {
        self.settings
    }

    /// Apply new server settings. Changing the dither algorithm does not
    /// evict anything: old variants stay keyed under their own algorithm
    /// and the next lookup simply produces a new one.
    pub fn set_settings(&mut self, settings: DisplaySettings) {
        if settings != self.settings {
            debug!(
                "Display settings changed: mode {:?}, dither {}, art {}",
                settings.display_mode, settings.dither_algorithm, settings.show_album_art
            );
        }
        self.settings = settings;
    }

    /// Dithered art for `url` at `size`, fetching and converting on demand.
    ///
    /// Returns `None` when art is disabled, the URL is empty, or the fetch
    /// fails. A failed fetch leaves the previous cache contents untouched so
    /// the display keeps showing the last good art.
    pub fn get_dithered(&mut self, url: &str, size: u32) -> Option<&GrayImage> {
        if !self.settings.show_album_art || url.is_empty() {
            return None;
        }

        if self.cached_url.as_deref() != Some(url) {
            match self.source.fetch(url) {
                Ok(img) => {
                    self.cached_url = Some(url.to_string());
                    self.cached_source = Some(img);
                    self.variants.clear();
                }
                Err(err) => {
                    warn!("Album art fetch failed: {err:#}");
                    return None;
                }
            }
        }

        let algorithm = self.settings.dither_algorithm;
        let key = (algorithm, size);
        if !self.variants.contains_key(&key) {
            let source = self.cached_source.as_ref()?;
            let resized = source
                .resize_exact(size, size, FilterType::Lanczos3)
                .to_luma8();
            self.variants.insert(key, dither(&resized, algorithm));
        }
        self.variants.get(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingSource {
        fetches: Rc<Cell<u32>>,
    }

    impl ImageSource for CountingSource {
        fn fetch(&self, _url: &str) -> anyhow::Result<DynamicImage> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(
                4,
                4,
                image::Luma([90]),
            )))
        }
    }

    struct FailingSource;

    impl ImageSource for FailingSource {
        fn fetch(&self, _url: &str) -> anyhow::Result<DynamicImage> {
            anyhow::bail!("connection refused")
        }
    }

    fn counting_cache() -> (ArtCache, Rc<Cell<u32>>) {
        let fetches = Rc::new(Cell::new(0));
        let cache = ArtCache::new(Box::new(CountingSource {
            fetches: Rc::clone(&fetches),
        }));
        (cache, fetches)
    }

    #[test]
    fn repeated_lookups_fetch_once() {
        let (mut cache, fetches) = counting_cache();
        for _ in 0..5 {
            assert!(cache.get_dithered("http://art/a.jpg", THUMBNAIL_SIZE).is_some());
        }
        assert_eq!(fetches.get(), 1);
    }

    #[test]
    fn different_sizes_share_one_fetch() {
        let (mut cache, fetches) = counting_cache();
        let thumb = cache
            .get_dithered("http://art/a.jpg", THUMBNAIL_SIZE)
            .map(GrayImage::dimensions);
        let large = cache
            .get_dithered("http://art/a.jpg", MUSIC_MODE_SIZE)
            .map(GrayImage::dimensions);
        assert_eq!(thumb, Some((THUMBNAIL_SIZE, THUMBNAIL_SIZE)));
        assert_eq!(large, Some((MUSIC_MODE_SIZE, MUSIC_MODE_SIZE)));
        assert_eq!(fetches.get(), 1);
    }

    #[test]
    fn url_change_evicts_and_refetches() {
        let (mut cache, fetches) = counting_cache();
        cache.get_dithered("http://art/a.jpg", THUMBNAIL_SIZE);
        cache.get_dithered("http://art/b.jpg", THUMBNAIL_SIZE);
        // Switching back re-fetches, proving the first URL was evicted.
        cache.get_dithered("http://art/a.jpg", THUMBNAIL_SIZE);
        assert_eq!(fetches.get(), 3);
    }

    #[test]
    fn algorithm_change_reuses_the_fetched_source() {
        let (mut cache, fetches) = counting_cache();
        cache.get_dithered("http://art/a.jpg", THUMBNAIL_SIZE);
        cache.set_settings(DisplaySettings {
            dither_algorithm: DitherAlgorithm::Ordered,
            ..DisplaySettings::default()
        });
        assert!(cache.get_dithered("http://art/a.jpg", THUMBNAIL_SIZE).is_some());
        assert_eq!(fetches.get(), 1);
    }

    #[test]
    fn disabled_art_returns_none_without_fetching() {
        let (mut cache, fetches) = counting_cache();
        cache.set_settings(DisplaySettings {
            show_album_art: false,
            ..DisplaySettings::default()
        });
        assert!(cache.get_dithered("http://art/a.jpg", THUMBNAIL_SIZE).is_none());
        assert_eq!(fetches.get(), 0);
    }

    #[test]
    fn empty_url_returns_none() {
        let (mut cache, fetches) = counting_cache();
        assert!(cache.get_dithered("", THUMBNAIL_SIZE).is_none());
        assert_eq!(fetches.get(), 0);
    }

    #[test]
    fn fetch_failure_keeps_the_previous_art() {
        let fetches = Rc::new(Cell::new(0));
        let mut cache = ArtCache::new(Box::new(CountingSource {
            fetches: Rc::clone(&fetches),
        }));
        assert!(cache.get_dithered("http://art/a.jpg", THUMBNAIL_SIZE).is_some());

        cache.source = Box::new(FailingSource);
        assert!(cache.get_dithered("http://art/b.jpg", THUMBNAIL_SIZE).is_none());
        // The old URL still answers from cache, no source call needed.
        cache.source = Box::new(FailingSource);
        assert!(cache.get_dithered("http://art/a.jpg", THUMBNAIL_SIZE).is_some());
    }

    #[test]
    fn output_is_two_level() {
        let (mut cache, _) = counting_cache();
        let art = cache
            .get_dithered("http://art/a.jpg", THUMBNAIL_SIZE)
            .cloned()
            .unwrap();
        assert!(art.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn settings_deserialize_from_server_json() {
        let settings: DisplaySettings = serde_json::from_str(
            r#"{"displayMode":"music","ditherAlgorithm":"atkinson","showAlbumArt":false}"#,
        )
        .unwrap();
        assert_eq!(settings.display_mode, DisplayMode::Music);
        assert_eq!(settings.dither_algorithm, DitherAlgorithm::Atkinson);
        assert!(!settings.show_album_art);

        let defaults: DisplaySettings = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, DisplaySettings::default());
    }
}
