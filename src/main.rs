//! # VectorClock E-Paper Entry Point
//!
//! Wires configuration, the dashboard client, fonts, the art cache, and a
//! display sink into the cooperative render loop. Everything runs on one
//! thread: network polls, rendering, and panel pushes are sequenced so the
//! display never tears between partial updates.

#[cfg(test)]
mod tests;

use clap::Parser;
use log::{error, info, warn};
use simple_signal::Signal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use vectorclock_lib::art::{ArtCache, HttpImageSource};
use vectorclock_lib::config::Config;
use vectorclock_lib::font::FontStore;
use vectorclock_lib::scheduler::RefreshScheduler;
use vectorclock_lib::screen::Screen;
use vectorclock_lib::server::{Client, Flight, NowPlaying, SpecialAlerts, Weather};
use vectorclock_lib::sink::{DisplaySink, PreviewSink};

/// Backoff after an iteration-level failure.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "vectorclock-epaper",
    about = "Clock, weather, flight and now-playing dashboard for a 4.26\" e-paper panel"
)]
struct Opt {
    /// Render to epaper_preview.png instead of the panel
    #[arg(long)]
    preview: bool,

    /// Path to a configuration file (default: vectorclock.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    simplelog::SimpleLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
    )?;

    let opt = Opt::parse();
    let config = match &opt.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    info!("Dashboard server: {}", config.server.base_url);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        simple_signal::set_handler(&[Signal::Int, Signal::Term], move |signals| {
            info!("Received {signals:?}, shutting down");
            shutdown.store(true, Ordering::SeqCst);
        });
    }

    let sink = select_sink(&config, opt.preview);
    let fonts = FontStore::discover(&config.display.font_paths);
    let mut client = Client::new(config.server.base_url.clone());

    let mut art = ArtCache::new(Box::new(HttpImageSource::new()));
    if let Some(settings) = client.display_settings() {
        art.set_settings(settings);
    }
    client.refresh_location();

    let scheduler = RefreshScheduler::new(
        Screen::new(fonts),
        art,
        sink,
        config.full_refresh_interval(),
    );

    let mut app = App {
        client,
        scheduler,
        config,
        weather: None,
        flight: None,
        alerts: SpecialAlerts::default(),
        now_playing: None,
        last_weather_update: None,
        last_flight_check: None,
    };

    app.refresh_all_data();
    if let Err(err) = app.scheduler.render_full(
        app.weather.as_ref(),
        app.flight.as_ref(),
        &app.alerts,
        app.now_playing.as_ref(),
    ) {
        error!("Initial render failed: {err}");
    }
    sleep_until(seconds_to_next_minute(), &shutdown);

    while !shutdown.load(Ordering::SeqCst) {
        let started = Instant::now();
        if let Err(err) = app.tick() {
            error!("Loop iteration failed: {err}");
            sleep_until(ERROR_BACKOFF, &shutdown);
            continue;
        }

        // Wake for the next minute boundary or the next flight poll,
        // whichever comes first.
        let until_minute = seconds_to_next_minute();
        let budget = until_minute.min(app.config.flight_check_interval());
        let sleep_for = budget
            .saturating_sub(started.elapsed())
            .max(Duration::from_secs(1));
        sleep_until(sleep_for, &shutdown);
    }

    app.scheduler.shutdown();
    info!("Shutdown complete");
    Ok(())
}

/// Pick the display sink: hardware when built for it, PNG preview otherwise.
/// Hardware init failure degrades to preview so the loop still runs.
fn select_sink(config: &Config, force_preview: bool) -> Box<dyn DisplaySink> {
    if force_preview {
        info!("Preview mode, rendering to PNG");
        return Box::new(PreviewSink::default());
    }

    #[cfg(all(target_os = "linux", feature = "hardware"))]
    {
        match vectorclock_lib::epd4in26::HardwareSink::open(&config.display.hardware) {
            Ok(sink) => return Box::new(sink),
            Err(err) => warn!("Panel init failed ({err}), falling back to preview"),
        }
    }
    #[cfg(not(all(target_os = "linux", feature = "hardware")))]
    {
        let _ = config;
        warn!("Built without hardware support, rendering to PNG");
    }

    Box::new(PreviewSink::default())
}

/// All loop state: the data client, the scheduler, and the latest readings
/// with their poll timestamps.
struct App {
    client: Client,
    scheduler: RefreshScheduler,
    config: Config,
    weather: Option<Weather>,
    flight: Option<Flight>,
    alerts: SpecialAlerts,
    now_playing: Option<NowPlaying>,
    last_weather_update: Option<Instant>,
    last_flight_check: Option<Instant>,
}

impl App {
    /// Fetch everything at once, used before the first render.
    fn refresh_all_data(&mut self) {
        let now = Instant::now();
        self.weather = self.client.weather();
        self.last_weather_update = Some(now);
        self.refresh_fast_data(now);
    }

    /// Poll the fast-cadence endpoints. Display settings are deliberately
    /// not re-fetched here: they are read once at startup and held for the
    /// life of the process.
    fn refresh_fast_data(&mut self, now: Instant) {
        self.flight = self.client.closest_flight();
        self.alerts = self.client.special_alerts();
        self.now_playing = self.client.now_playing();
        self.last_flight_check = Some(now);
    }

    /// One loop iteration: poll whatever is due, then render. Data refresh
    /// always happens before the render decision so a full refresh never
    /// paints stale readings.
    fn tick(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();

        if due(self.last_weather_update, now, self.config.weather_update_interval()) {
            self.weather = self.client.weather();
            self.last_weather_update = Some(now);
        }
        if due(self.last_flight_check, now, self.config.flight_check_interval()) {
            self.refresh_fast_data(now);
        }

        if self.scheduler.needs_full_refresh() {
            self.scheduler.render_full(
                self.weather.as_ref(),
                self.flight.as_ref(),
                &self.alerts,
                self.now_playing.as_ref(),
            )?;
        } else {
            self.scheduler.partial_update_clock()?;
            self.scheduler
                .partial_update_flight(self.flight.as_ref(), &self.alerts)?;
        }
        Ok(())
    }
}

fn due(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    match last {
        Some(last) => now.duration_since(last) >= interval,
        None => true,
    }
}

/// Time remaining until the next wall-clock minute boundary.
fn seconds_to_next_minute() -> Duration {
    use chrono::{Local, Timelike};
    let second = Local::now().second() as u64;
    Duration::from_secs(60 - second.min(59))
}

/// Sleep in one-second slices so a shutdown signal interrupts promptly.
fn sleep_until(total: Duration, shutdown: &Arc<AtomicBool>) {
    let deadline = Instant::now() + total;
    while Instant::now() < deadline && !shutdown.load(Ordering::SeqCst) {
        let remaining = deadline - Instant::now();
        thread::sleep(remaining.min(Duration::from_secs(1)));
    }
}
