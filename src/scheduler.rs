//! # Refresh Scheduler
//!
//! Decides when the panel sees a full refresh versus a cheap partial one.
//! E-paper ghosts when driven with partials forever, so a full refresh runs
//! at least every anti-ghosting interval; between those, the clock updates
//! once per minute and the flight strip only when its contents change.

use crate::art::{ArtCache, DisplayMode};
use crate::screen::Screen;
use crate::server::{Flight, NowPlaying, SpecialAlerts, Weather};
use crate::sink::{DisplaySink, SinkError};
use chrono::{Local, Timelike};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

pub struct RefreshScheduler {
    screen: Screen,
    art: ArtCache,
    sink: Box<dyn DisplaySink>,
    full_refresh_interval: Duration,
    /// None until the first full refresh, which therefore happens
    /// immediately.
    last_full_refresh: Option<Instant>,
    /// Minute-of-hour shown by the clock, None before the first render.
    current_minute: Option<u32>,
    /// Callsign currently shown in the flight strip.
    current_flight: Option<String>,
    music_mode_active: bool,
}

impl RefreshScheduler {
    pub fn new(
        screen: Screen,
        art: ArtCache,
        sink: Box<dyn DisplaySink>,
        full_refresh_interval: Duration,
    ) -> Self {
        Self {
            screen,
            art,
            sink,
            full_refresh_interval,
            last_full_refresh: None,
            current_minute: None,
            current_flight: None,
            music_mode_active: false,
        }
    }

    pub fn art_mut(&mut self) -> &mut ArtCache {
        &mut self.art
    }

    pub fn music_mode_active(&self) -> bool {
        self.music_mode_active
    }

    /// Redraw everything and push a full refresh.
    ///
    /// Music mode takes over the center when the server asks for it, art is
    /// enabled, and something is playing; weather, flight, and status stay
    /// visible on top. Otherwise the standard layout is drawn.
    pub fn render_full(
        &mut self,
        weather: Option<&Weather>,
        flight: Option<&Flight>,
        alerts: &SpecialAlerts,
        now_playing: Option<&NowPlaying>,
    ) -> Result<(), SinkError> {
        let now = Local::now();
        self.screen.surface.clear();

        let settings = self.art.settings();
        let wants_music = settings.display_mode == DisplayMode::Music
            && settings.show_album_art
            && now_playing.is_some_and(|np| np.playing);
        let music_rendered =
            wants_music && self.screen.draw_music_mode(now_playing, &mut self.art, now);

        if music_rendered {
            self.screen.draw_weather(weather);
            self.screen.draw_flight(flight);
            self.screen.draw_status(alerts);
        } else {
            self.screen.draw_clock(now);
            self.screen.draw_date(now);
            self.screen.draw_weather(weather);
            self.screen.draw_flight(flight);
            self.screen.draw_status(alerts);
            self.screen.draw_now_playing(now_playing, &mut self.art);
        }
        self.music_mode_active = music_rendered;

        self.sink.full_refresh(&self.screen.surface)?;
        self.last_full_refresh = Some(Instant::now());
        self.current_minute = Some(now.minute());
        self.current_flight = flight.map(|f| f.callsign.clone());
        info!(
            "Full refresh complete{}",
            if music_rendered { " (music mode)" } else { "" }
        );
        Ok(())
    }

    /// Update the clock area once per wall-clock minute. Within the same
    /// minute this is a no-op.
    pub fn partial_update_clock(&mut self) -> Result<(), SinkError> {
        let now = Local::now();
        if self.current_minute == Some(now.minute()) {
            return Ok(());
        }

        if self.music_mode_active {
            self.screen.draw_mini_clock(now);
        } else {
            self.screen.draw_clock(now);
            self.screen.draw_date(now);
        }
        let result = self.push_partial();
        // The minute advances even if the push failed; retrying the same
        // frame every 15 s would wear the panel for nothing.
        self.current_minute = Some(now.minute());
        result
    }

    /// Update the flight strip and alert corner when their contents change.
    /// No-op when the closest callsign is unchanged and no alerts are active.
    pub fn partial_update_flight(
        &mut self,
        flight: Option<&Flight>,
        alerts: &SpecialAlerts,
    ) -> Result<(), SinkError> {
        let callsign = flight.map(|f| f.callsign.clone());
        if callsign == self.current_flight && alerts.is_empty() {
            return Ok(());
        }

        self.screen.draw_flight(flight);
        self.screen.draw_status(alerts);
        let result = self.push_partial();
        self.current_flight = callsign;
        result
    }

    /// True once the anti-ghosting interval has elapsed since the last full
    /// refresh.
    pub fn needs_full_refresh(&self) -> bool {
        match self.last_full_refresh {
            Some(last) => last.elapsed() > self.full_refresh_interval,
            None => true,
        }
    }

    /// White out the surface and panel; the next render starts fresh.
    pub fn clear(&mut self) -> Result<(), SinkError> {
        self.screen.surface.clear();
        self.sink.clear()?;
        self.last_full_refresh = Some(Instant::now());
        Ok(())
    }

    /// Put the panel to sleep on shutdown.
    pub fn shutdown(&mut self) {
        if let Err(err) = self.sink.sleep() {
            warn!("Display sleep failed: {err}");
        }
    }

    /// Push a partial frame, falling back to a full push when the sink does
    /// not support partials. The fallback deliberately leaves
    /// `last_full_refresh` alone: it is a transport substitute, not an
    /// anti-ghosting refresh of its own.
    fn push_partial(&mut self) -> Result<(), SinkError> {
        match self.sink.partial_refresh(&self.screen.surface) {
            Err(SinkError::Unsupported) => {
                debug!("Partial refresh unsupported, pushing full frame");
                self.sink.full_refresh(&self.screen.surface)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontStore;
    use crate::surface::Surface;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Push {
        Full,
        Partial,
    }

    struct RecordingSink {
        pushes: Rc<RefCell<Vec<Push>>>,
        partial_supported: bool,
    }

    impl DisplaySink for RecordingSink {
        fn full_refresh(&mut self, _surface: &Surface) -> Result<(), SinkError> {
            self.pushes.borrow_mut().push(Push::Full);
            Ok(())
        }

        fn partial_refresh(&mut self, _surface: &Surface) -> Result<(), SinkError> {
            if !self.partial_supported {
                return Err(SinkError::Unsupported);
            }
            self.pushes.borrow_mut().push(Push::Partial);
            Ok(())
        }
    }

    struct NoArt;

    impl crate::art::ImageSource for NoArt {
        fn fetch(&self, _url: &str) -> anyhow::Result<image::DynamicImage> {
            anyhow::bail!("no art in tests")
        }
    }

    fn scheduler_with(
        partial_supported: bool,
        interval: Duration,
    ) -> (RefreshScheduler, Rc<RefCell<Vec<Push>>>) {
        let pushes = Rc::new(RefCell::new(Vec::new()));
        let sink = RecordingSink {
            pushes: Rc::clone(&pushes),
            partial_supported,
        };
        let scheduler = RefreshScheduler::new(
            Screen::new(FontStore::builtin()),
            ArtCache::new(Box::new(NoArt)),
            Box::new(sink),
            interval,
        );
        (scheduler, pushes)
    }

    fn flight(callsign: &str) -> Flight {
        Flight {
            icao24: "abc123".into(),
            callsign: callsign.into(),
            latitude: -33.8,
            longitude: 151.2,
            altitude: Some(9144.0),
            velocity: None,
            distance: 10.0,
            typecode: None,
            registration: None,
        }
    }

    #[test]
    fn starts_stale_and_settles_after_render_full() {
        let (mut scheduler, pushes) = scheduler_with(true, Duration::from_secs(3600));
        assert!(scheduler.needs_full_refresh());
        scheduler
            .render_full(None, None, &SpecialAlerts::default(), None)
            .unwrap();
        assert!(!scheduler.needs_full_refresh());
        assert_eq!(*pushes.borrow(), vec![Push::Full]);
    }

    #[test]
    fn needs_full_refresh_after_the_interval_elapses() {
        let (mut scheduler, _) = scheduler_with(true, Duration::from_secs(3600));
        scheduler
            .render_full(None, None, &SpecialAlerts::default(), None)
            .unwrap();
        assert!(!scheduler.needs_full_refresh());
        // Shrinking the interval simulates the anti-ghosting deadline
        // passing without sleeping in the test.
        scheduler.full_refresh_interval = Duration::ZERO;
        std::thread::sleep(Duration::from_millis(2));
        assert!(scheduler.needs_full_refresh());
    }

    #[test]
    fn clock_partial_noops_within_the_same_minute() {
        let (mut scheduler, pushes) = scheduler_with(true, Duration::from_secs(3600));
        scheduler
            .render_full(None, None, &SpecialAlerts::default(), None)
            .unwrap();
        // render_full recorded the current minute, so no push happens now.
        scheduler.partial_update_clock().unwrap();
        assert_eq!(*pushes.borrow(), vec![Push::Full]);
    }

    #[test]
    fn clock_partial_pushes_once_per_minute_crossing() {
        let (mut scheduler, pushes) = scheduler_with(true, Duration::from_secs(3600));
        // A minute value no wall clock reports forces a crossing.
        scheduler.current_minute = Some(60);
        scheduler.partial_update_clock().unwrap();
        assert_eq!(*pushes.borrow(), vec![Push::Partial]);
        // The minute is now current, so a second call is a no-op.
        scheduler.partial_update_clock().unwrap();
        assert_eq!(*pushes.borrow(), vec![Push::Partial]);
    }

    #[test]
    fn flight_partial_noops_when_unchanged_and_quiet() {
        let (mut scheduler, pushes) = scheduler_with(true, Duration::from_secs(3600));
        let qf12 = flight("QFA12");
        scheduler
            .render_full(None, Some(&qf12), &SpecialAlerts::default(), None)
            .unwrap();
        scheduler
            .partial_update_flight(Some(&qf12), &SpecialAlerts::default())
            .unwrap();
        assert_eq!(*pushes.borrow(), vec![Push::Full]);
    }

    #[test]
    fn flight_partial_pushes_on_callsign_change() {
        let (mut scheduler, pushes) = scheduler_with(true, Duration::from_secs(3600));
        scheduler
            .render_full(None, Some(&flight("QFA12")), &SpecialAlerts::default(), None)
            .unwrap();
        scheduler
            .partial_update_flight(Some(&flight("JST506")), &SpecialAlerts::default())
            .unwrap();
        assert_eq!(*pushes.borrow(), vec![Push::Full, Push::Partial]);
        // The new callsign became the snapshot.
        scheduler
            .partial_update_flight(Some(&flight("JST506")), &SpecialAlerts::default())
            .unwrap();
        assert_eq!(pushes.borrow().len(), 2);
    }

    #[test]
    fn active_alerts_force_a_flight_push() {
        let (mut scheduler, pushes) = scheduler_with(true, Duration::from_secs(3600));
        let qf12 = flight("QFA12");
        scheduler
            .render_full(None, Some(&qf12), &SpecialAlerts::default(), None)
            .unwrap();
        let alerts = SpecialAlerts {
            military: vec![serde_json::json!({})],
            ..SpecialAlerts::default()
        };
        scheduler.partial_update_flight(Some(&qf12), &alerts).unwrap();
        assert_eq!(*pushes.borrow(), vec![Push::Full, Push::Partial]);
    }

    #[test]
    fn flight_disappearing_triggers_a_push() {
        let (mut scheduler, pushes) = scheduler_with(true, Duration::from_secs(3600));
        scheduler
            .render_full(None, Some(&flight("QFA12")), &SpecialAlerts::default(), None)
            .unwrap();
        scheduler
            .partial_update_flight(None, &SpecialAlerts::default())
            .unwrap();
        assert_eq!(*pushes.borrow(), vec![Push::Full, Push::Partial]);
    }

    #[test]
    fn unsupported_partial_falls_back_to_full_without_resetting_the_timer() {
        let (mut scheduler, pushes) = scheduler_with(false, Duration::from_secs(3600));
        scheduler
            .render_full(None, None, &SpecialAlerts::default(), None)
            .unwrap();
        scheduler.full_refresh_interval = Duration::ZERO;
        std::thread::sleep(Duration::from_millis(2));
        assert!(scheduler.needs_full_refresh());

        scheduler.current_minute = Some(60);
        scheduler.partial_update_clock().unwrap();

        assert_eq!(*pushes.borrow(), vec![Push::Full, Push::Full]);
        // The fallback push is a transport detail; anti-ghosting still fires.
        assert!(scheduler.needs_full_refresh());
    }

    #[test]
    fn clear_resets_the_timer_and_whites_the_surface() {
        let (mut scheduler, _) = scheduler_with(true, Duration::from_secs(3600));
        scheduler.clear().unwrap();
        assert!(!scheduler.needs_full_refresh());
        assert!(scheduler.screen.surface.as_raw().iter().all(|&p| p == 255));
    }

    #[test]
    fn music_mode_minute_tick_touches_only_the_mini_clock() {
        let (mut scheduler, pushes) = scheduler_with(true, Duration::from_secs(3600));
        scheduler.music_mode_active = true;
        scheduler.current_minute = Some(60);
        scheduler.partial_update_clock().unwrap();

        assert_eq!(*pushes.borrow(), vec![Push::Partial]);
        let surface = &scheduler.screen.surface;
        assert!(surface.region_has_ink(crate::regions::Zone::ClockMini.region()));
        // The big clock region overlaps the album art and must stay untouched.
        assert!(!surface.region_has_ink(crate::regions::Zone::Clock.region()));
    }

    #[test]
    fn music_mode_stays_off_in_thumbnail_mode() {
        let (mut scheduler, _) = scheduler_with(true, Duration::from_secs(3600));
        let np = NowPlaying {
            playing: true,
            track: "Track".into(),
            artist: "Artist".into(),
            album_art_small: Some("http://art/x.jpg".into()),
            ..NowPlaying::default()
        };
        scheduler
            .render_full(None, None, &SpecialAlerts::default(), Some(&np))
            .unwrap();
        assert!(!scheduler.music_mode_active());
    }
}
