//! Waveshare 4.26" (800x480) e-paper driver.
//!
//! Follows the vendor's EPD_4in26 reference sequence over SPI: reset, soft
//! start, RAM window setup, frame write, then an update cycle selected by the
//! control byte (0xF7 full, 0xFF partial). BUSY is polled with a timeout so a
//! wedged panel surfaces as an error instead of hanging the loop.

use crate::config::HardwarePins;
use crate::sink::{DisplaySink, SinkError};
use crate::surface::Surface;
use log::{debug, info, warn};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::thread;
use std::time::{Duration, Instant};

const SPI_CLOCK_HZ: u32 = 4_000_000;
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub const EPD_WIDTH: u32 = 800;
pub const EPD_HEIGHT: u32 = 480;

pub struct Epd4in26 {
    spi: Spi,
    dc: OutputPin,
    rst: OutputPin,
    busy: InputPin,
}

impl Epd4in26 {
    /// Open SPI and GPIO and run the panel init sequence.
    pub fn open(pins: &HardwarePins) -> Result<Self, SinkError> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|e| SinkError::Io(format!("SPI open: {e}")))?;
        let gpio = Gpio::new().map_err(|e| SinkError::Io(format!("GPIO open: {e}")))?;
        let dc = gpio
            .get(pins.dc_pin)
            .map_err(|e| SinkError::Io(format!("DC pin: {e}")))?
            .into_output();
        let rst = gpio
            .get(pins.rst_pin)
            .map_err(|e| SinkError::Io(format!("RST pin: {e}")))?
            .into_output();
        let busy = gpio
            .get(pins.busy_pin)
            .map_err(|e| SinkError::Io(format!("BUSY pin: {e}")))?
            .into_input();

        let mut epd = Self { spi, dc, rst, busy };
        epd.init()?;
        Ok(epd)
    }

    fn reset(&mut self) {
        self.rst.set_high();
        thread::sleep(Duration::from_millis(20));
        self.rst.set_low();
        thread::sleep(Duration::from_millis(2));
        self.rst.set_high();
        thread::sleep(Duration::from_millis(20));
    }

    fn send_command(&mut self, command: u8) -> Result<(), SinkError> {
        self.dc.set_low();
        self.spi
            .write(&[command])
            .map_err(|e| SinkError::Io(format!("SPI command {command:#04x}: {e}")))?;
        Ok(())
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), SinkError> {
        self.dc.set_high();
        // rppal caps a single transfer at 4096 bytes.
        for chunk in data.chunks(4096) {
            self.spi
                .write(chunk)
                .map_err(|e| SinkError::Io(format!("SPI data: {e}")))?;
        }
        Ok(())
    }

    fn read_busy(&mut self) -> Result<(), SinkError> {
        let start = Instant::now();
        while self.busy.is_high() {
            if start.elapsed() > BUSY_TIMEOUT {
                return Err(SinkError::Io("BUSY timeout".to_string()));
            }
            thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }

    /// RAM window and counter covering the full panel. X and Y are both
    /// 10-bit on this controller, sent low byte first.
    fn set_windows(&mut self) -> Result<(), SinkError> {
        let x_end = (EPD_WIDTH - 1) as u16;
        let y_end = (EPD_HEIGHT - 1) as u16;

        self.send_command(0x44)?;
        self.send_data(&[0x00, 0x00, (x_end & 0xFF) as u8, (x_end >> 8) as u8])?;
        self.send_command(0x45)?;
        self.send_data(&[0x00, 0x00, (y_end & 0xFF) as u8, (y_end >> 8) as u8])?;

        self.send_command(0x4E)?;
        self.send_data(&[0x00, 0x00])?;
        self.send_command(0x4F)?;
        self.send_data(&[0x00, 0x00])?;
        Ok(())
    }

    fn init(&mut self) -> Result<(), SinkError> {
        self.reset();
        self.read_busy()?;

        self.send_command(0x12)?; // SWRESET
        self.read_busy()?;

        self.send_command(0x18)?; // use the built-in temperature sensor
        self.send_data(&[0x80])?;

        self.send_command(0x0C)?; // booster soft start
        self.send_data(&[0xAE, 0xC7, 0xC3, 0xC0, 0x80])?;

        self.send_command(0x01)?; // driver output control
        let gates = (EPD_HEIGHT - 1) as u16;
        self.send_data(&[(gates & 0xFF) as u8, (gates >> 8) as u8, 0x02])?;

        self.send_command(0x3C)?; // border waveform
        self.send_data(&[0x01])?;

        self.send_command(0x11)?; // data entry mode
        self.send_data(&[0x01])?;

        self.set_windows()?;
        self.read_busy()?;
        info!("EPD 4.26 initialized");
        Ok(())
    }

    fn write_frame(&mut self, packed: &[u8]) -> Result<(), SinkError> {
        self.set_windows()?;
        self.send_command(0x24)?;
        self.send_data(packed)
    }

    fn turn_on(&mut self, mode: u8) -> Result<(), SinkError> {
        self.send_command(0x22)?;
        self.send_data(&[mode])?;
        self.send_command(0x20)?;
        self.read_busy()
    }

    pub fn display(&mut self, packed: &[u8]) -> Result<(), SinkError> {
        self.write_frame(packed)?;
        self.turn_on(0xF7)
    }

    pub fn display_partial(&mut self, packed: &[u8]) -> Result<(), SinkError> {
        self.write_frame(packed)?;
        self.turn_on(0xFF)
    }

    pub fn clear(&mut self) -> Result<(), SinkError> {
        let bytes = (EPD_WIDTH.div_ceil(8) * EPD_HEIGHT) as usize;
        self.display(&vec![0xFF; bytes])
    }

    pub fn sleep(&mut self) -> Result<(), SinkError> {
        self.send_command(0x10)?; // deep sleep
        self.send_data(&[0x01])?;
        thread::sleep(Duration::from_millis(100));
        Ok(())
    }
}

/// Sink adapter driving the physical panel.
pub struct HardwareSink {
    epd: Epd4in26,
}

impl HardwareSink {
    pub fn open(pins: &HardwarePins) -> Result<Self, SinkError> {
        Ok(Self {
            epd: Epd4in26::open(pins)?,
        })
    }
}

impl DisplaySink for HardwareSink {
    fn full_refresh(&mut self, surface: &Surface) -> Result<(), SinkError> {
        debug!("Pushing full frame to panel");
        self.epd.display(&surface.pack_1bpp())
    }

    fn partial_refresh(&mut self, surface: &Surface) -> Result<(), SinkError> {
        debug!("Pushing partial frame to panel");
        self.epd.display_partial(&surface.pack_1bpp())
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        self.epd.clear()
    }

    fn sleep(&mut self) -> Result<(), SinkError> {
        info!("Putting panel to sleep");
        if let Err(err) = self.epd.clear() {
            warn!("Clear before sleep failed: {err}");
        }
        self.epd.sleep()
    }
}
