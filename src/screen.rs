//! # Region Renderers
//!
//! One drawing routine per display zone. Every renderer clears its own region
//! first and paints only data it was handed; nothing here fetches. The
//! scheduler decides which renderers run and when the surface is pushed.

use crate::art::{ArtCache, DisplayMode, MUSIC_MODE_SIZE, THUMBNAIL_SIZE};
use crate::font::FontStore;
use crate::regions::Zone;
use crate::server::{Flight, NowPlaying, SpecialAlerts, Weather};
use crate::surface::{Surface, DISPLAY_WIDTH};
use chrono::{DateTime, Local};
use log::debug;

/// Feet-to-meters divisor for flight levels (100 ft = 30.48 m).
const FLIGHT_LEVEL_METERS: f64 = 30.48;

/// Owns the drawing surface and fonts; renderers borrow both.
pub struct Screen {
    pub surface: Surface,
    fonts: FontStore,
}

impl Screen {
    pub fn new(fonts: FontStore) -> Self {
        Self {
            surface: Surface::new(),
            fonts,
        }
    }

    /// Large centered clock, `HH:MM`.
    pub fn draw_clock(&mut self, now: DateTime<Local>) {
        let region = Zone::Clock.region();
        self.surface.clear_region(region);

        let time_str = now.format("%H:%M").to_string();
        let style = self.fonts.style(120);
        let (_, text_height) = style.measure(&time_str);
        let y = region.y + region.height.saturating_sub(text_height) / 2;
        style.draw_centered(&mut self.surface, region.x, y, region.width, &time_str);
    }

    /// Date line below the clock, e.g. "Friday, 29 August".
    pub fn draw_date(&mut self, now: DateTime<Local>) {
        let region = Zone::Date.region();
        self.surface.clear_region(region);

        let date_str = now.format("%A, %d %B").to_string();
        self.fonts
            .style(24)
            .draw_centered(&mut self.surface, region.x, region.y + 5, region.width, &date_str);
    }

    /// Temperature, condition, and humidity in the top-left corner.
    /// Silently draws nothing without a temperature reading.
    pub fn draw_weather(&mut self, weather: Option<&Weather>) {
        let region = Zone::Weather.region();
        self.surface.clear_region(region);

        let Some(weather) = weather else { return };
        let Some(temp) = weather.temp else { return };

        self.fonts.style(36).draw(
            &mut self.surface,
            region.x + 10,
            region.y + 10,
            &format!("{}\u{b0}C", format_number(temp)),
        );

        let condition = format!(
            "{} {}",
            weather.icon.as_deref().unwrap_or(""),
            weather.condition.as_deref().unwrap_or("")
        );
        self.fonts.style(18).draw(
            &mut self.surface,
            region.x + 10,
            region.y + 55,
            condition.trim(),
        );

        if let Some(humidity) = weather.humidity {
            self.fonts.style(18).draw(
                &mut self.surface,
                region.x + 10,
                region.y + 78,
                &format!("{}% humidity", format_number(humidity)),
            );
        }
    }

    /// Closest-aircraft strip, or a scanning placeholder when empty.
    pub fn draw_flight(&mut self, flight: Option<&Flight>) {
        let region = Zone::Flight.region();
        self.surface.clear_region(region);

        let Some(flight) = flight else {
            self.fonts.style(20).draw(
                &mut self.surface,
                10,
                region.y + 40,
                "Scanning for aircraft...",
            );
            return;
        };

        let y = region.y + 10;
        let callsign = if flight.callsign.is_empty() {
            &flight.icao24
        } else {
            &flight.callsign
        };
        self.fonts.style(28).draw(&mut self.surface, 10, y, callsign);
        self.fonts.style(22).draw(
            &mut self.surface,
            350,
            y + 5,
            &format!("{} km away", format_number(flight.distance)),
        );

        let info = flight_info_line(flight);
        if !info.is_empty() {
            self.fonts.style(18).draw(&mut self.surface, 10, y + 40, &info);
        }
    }

    /// Alert indicators in the top-right corner, at most two lines, in
    /// priority order: emergency, military, VIP.
    pub fn draw_status(&mut self, alerts: &SpecialAlerts) {
        let region = Zone::Status.region();
        self.surface.clear_region(region);

        let mut lines: Vec<String> = Vec::new();
        if !alerts.emergency.is_empty() {
            lines.push("EMERGENCY".to_string());
        }
        if !alerts.military.is_empty() {
            lines.push(format!("MIL ({})", alerts.military.len()));
        }
        if !alerts.vip.is_empty() {
            lines.push("VIP".to_string());
        }

        let style = self.fonts.style(16);
        let mut y = region.y + 5;
        for line in lines.iter().take(2) {
            style.draw(&mut self.surface, region.x + 5, y, line);
            y += 22;
        }
    }

    /// Bottom strip with track, artist, and an optional thumbnail. The
    /// thumbnail only renders in thumbnail mode; music mode handles its own
    /// art in the takeover layout.
    pub fn draw_now_playing(&mut self, now_playing: Option<&NowPlaying>, art: &mut ArtCache) {
        let region = Zone::NowPlaying.region();
        self.surface.clear_region(region);

        let Some(np) = now_playing.filter(|np| np.playing) else {
            return;
        };
        debug!("Now playing: {} - {}", np.artist, np.track);

        let art_x = 10;
        let mut art_width = 0;
        if art.settings().display_mode == DisplayMode::Thumbnail {
            if let Some(url) = np.art_url() {
                let url = url.to_string();
                if let Some(dithered) = art.get_dithered(&url, THUMBNAIL_SIZE) {
                    let art_y = region.y + (region.height - THUMBNAIL_SIZE) / 2;
                    let dithered = dithered.clone();
                    self.surface.paste(&dithered, art_x, art_y);
                    art_width = THUMBNAIL_SIZE + 15;
                }
            }
        }

        if np.artist.is_empty() || np.track.is_empty() {
            return;
        }

        let max_len = if art_width > 0 { 50 } else { 60 };
        let track = truncate_with_ellipsis(&np.track, max_len);
        let artist = truncate_with_ellipsis(&np.artist, max_len);
        let text_x = art_x + art_width;

        self.fonts.style(16).draw(
            &mut self.surface,
            text_x,
            region.y + 8,
            &format!("\u{266a} {track}"),
        );
        self.fonts
            .style(12)
            .draw(&mut self.surface, text_x, region.y + 30, &artist);
    }

    /// Music-mode takeover: large centered art with track info beneath and a
    /// mini clock in the corner. Returns false when any prerequisite is
    /// missing (nothing playing, no art URL, fetch or dither unavailable) so
    /// the caller can fall back to the normal layout.
    pub fn draw_music_mode(
        &mut self,
        now_playing: Option<&NowPlaying>,
        art: &mut ArtCache,
        now: DateTime<Local>,
    ) -> bool {
        let Some(np) = now_playing.filter(|np| np.playing) else {
            return false;
        };
        let Some(url) = np.art_url().map(str::to_string) else {
            return false;
        };
        let Some(dithered) = art.get_dithered(&url, MUSIC_MODE_SIZE).cloned() else {
            return false;
        };

        let region = Zone::MusicMode.region();
        let art_x = (DISPLAY_WIDTH - MUSIC_MODE_SIZE) / 2;
        let art_y = region.y + 10;
        self.surface.paste(&dithered, art_x, art_y);

        let info_y = art_y + MUSIC_MODE_SIZE + 15;
        let track = truncate_with_cap(&np.track, 35, 32);
        self.fonts
            .style(24)
            .draw_centered(&mut self.surface, 0, info_y, DISPLAY_WIDTH, &track);

        let artist = truncate_with_cap(&np.artist, 40, 37);
        self.fonts
            .style(18)
            .draw_centered(&mut self.surface, 0, info_y + 30, DISPLAY_WIDTH, &artist);

        let mini = Zone::ClockMini.region();
        let time_str = now.format("%H:%M").to_string();
        self.fonts
            .style(20)
            .draw(&mut self.surface, mini.x, mini.y, &time_str);

        true
    }

    /// Redraw only the corner clock, used for minute ticks in music mode.
    pub fn draw_mini_clock(&mut self, now: DateTime<Local>) {
        let region = Zone::ClockMini.region();
        self.surface.clear_region(region);
        let time_str = now.format("%H:%M").to_string();
        self.fonts
            .style(20)
            .draw(&mut self.surface, region.x, region.y, &time_str);
    }
}

/// Second flight line: typecode, bracketed registration, and flight level,
/// joined by bullets. Flight level is the altitude in hundreds of feet,
/// rounded to the nearest level.
pub fn flight_info_line(flight: &Flight) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(typecode) = &flight.typecode {
        parts.push(typecode.clone());
    }
    if let Some(registration) = &flight.registration {
        parts.push(format!("[{registration}]"));
    }
    if let Some(altitude) = flight.altitude {
        parts.push(format!(
            "FL{:03}",
            (altitude / FLIGHT_LEVEL_METERS).round() as i64
        ));
    }
    parts.join(" \u{2022} ")
}

/// Truncate to `max_len` characters, replacing the tail with "..." when over.
pub(crate) fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    truncate_with_cap(s, max_len, max_len.saturating_sub(3))
}

fn truncate_with_cap(s: &str, max_len: usize, keep: usize) -> String {
    if s.chars().count() > max_len {
        let head: String = s.chars().take(keep).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

/// Render a float without a trailing ".0" when it is a whole number.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
