//! Sampling of the sync, clock and data lines, and assembly of two bus bytes into a pixel word.

use crate::color::PixelWord;
use embedded_hal::digital::InputPin;

/// Levels of every capture line taken at one instant.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Sample {
    /// Frame sync (VSYNC) level.
    pub frame_sync: bool,
    /// Line sync (HREF) level.
    pub line_sync: bool,
    /// Pixel clock (PCLK) level.
    pub pixel_clock: bool,
    /// Parallel data bus, D0 in bit 0.
    pub data: u8,
}

/// Source of capture line snapshots.
///
/// Implementations must read all lines at essentially the same instant. On a Raspberry Pi a
/// single read of the GPIO level register satisfies this; `PinPort` is the portable fallback.
pub trait SignalPort {
    type Error;

    /// Take one snapshot of every capture line.
    fn sample(&mut self) -> Result<Sample, Self::Error>;
}

/// An 8-bit parallel input bus.
pub trait DataBus {
    type Error;

    /// Read all data lines as one byte, D0 in bit 0.
    fn read_byte(&mut self) -> Result<u8, Self::Error>;
}

/// Data bus made of eight individual input pins.
pub struct PinBus<P> {
    /// Data lines, index 0 is D0.
    lines: [P; 8],
}

impl<P: InputPin> PinBus<P> {
    pub fn new(lines: [P; 8]) -> Self {
        PinBus { lines }
    }

    pub fn release(self) -> [P; 8] {
        self.lines
    }
}

impl<P: InputPin> DataBus for PinBus<P> {
    type Error = P::Error;

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut byte = 0u8;
        for (bit, line) in self.lines.iter_mut().enumerate() {
            if line.is_high()? {
                byte |= 1 << bit;
            }
        }
        Ok(byte)
    }
}

/// Snapshot source built from individual sync/clock input pins and a data bus.
pub struct PinPort<VS, HS, PC, D> {
    frame_sync: VS,
    line_sync: HS,
    pixel_clock: PC,
    data: D,
}

impl<VS, HS, PC, D, E> PinPort<VS, HS, PC, D>
where
    VS: InputPin<Error = E>,
    HS: InputPin<Error = E>,
    PC: InputPin<Error = E>,
    D: DataBus<Error = E>,
{
    pub fn new(frame_sync: VS, line_sync: HS, pixel_clock: PC, data: D) -> Self {
        PinPort {
            frame_sync,
            line_sync,
            pixel_clock,
            data,
        }
    }

    /// Give the pins back.
    pub fn release(self) -> (VS, HS, PC, D) {
        (self.frame_sync, self.line_sync, self.pixel_clock, self.data)
    }
}

impl<VS, HS, PC, D, E> SignalPort for PinPort<VS, HS, PC, D>
where
    VS: InputPin<Error = E>,
    HS: InputPin<Error = E>,
    PC: InputPin<Error = E>,
    D: DataBus<Error = E>,
{
    type Error = E;

    fn sample(&mut self) -> Result<Sample, E> {
        // Clock first: the data bus holds its value for the whole clock phase
        let pixel_clock = self.pixel_clock.is_high()?;
        let data = self.data.read_byte()?;
        let line_sync = self.line_sync.is_high()?;
        let frame_sync = self.frame_sync.is_high()?;

        Ok(Sample {
            frame_sync,
            line_sync,
            pixel_clock,
            data,
        })
    }
}

/// Which half of the pixel word the next byte fills.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BytePhase {
    High,
    Low,
}

/// Combines two consecutive bus bytes, high byte first, into one pixel word.
#[derive(Clone, Copy, Debug)]
pub struct WordAssembler {
    high: Option<u8>,
}

impl Default for WordAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl WordAssembler {
    pub const fn new() -> Self {
        WordAssembler { high: None }
    }

    pub fn phase(&self) -> BytePhase {
        match self.high {
            None => BytePhase::High,
            Some(_) => BytePhase::Low,
        }
    }

    /// Feed one byte. Returns the word once both halves have been seen.
    pub fn push(&mut self, byte: u8) -> Option<PixelWord> {
        match self.high.take() {
            None => {
                self.high = Some(byte);
                None
            }
            Some(high) => Some((PixelWord::from(high) << 8) | PixelWord::from(byte)),
        }
    }

    /// Drop a pending high byte.
    pub fn reset(&mut self) {
        self.high = None;
    }
}
