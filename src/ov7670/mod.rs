//! OV7670 device driver.

pub mod sccb;

use crate::clock::{start_clock, ClockBand, ClockError, MasterClock, XclkConfig};
use core::fmt;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use log::info;
use sccb::{Register, RegisterTable, Sccb, SccbError, TableError, Verify, OV7670_ADDRESS};

/// Number of horizontal pixels for the default resolution.
#[cfg(feature = "qqvga")]
pub const FRAME_WIDTH: u16 = 160;
#[cfg(not(feature = "qqvga"))]
pub const FRAME_WIDTH: u16 = 320;

/// Number of vertical pixels for the default resolution.
#[cfg(feature = "qqvga")]
pub const FRAME_HEIGHT: u16 = 120;
#[cfg(not(feature = "qqvga"))]
pub const FRAME_HEIGHT: u16 = 240;

/// Number of RGB565 words in one frame of the default resolution.
pub const FRAME_WORDS: usize = (FRAME_WIDTH as usize) * (FRAME_HEIGHT as usize);

/// Time the sensor needs after configuration before frames are stable.
pub const DEFAULT_SETTLE_MS: u32 = 300;

/// Output frame size.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Resolution {
    pub width: u16,
    pub height: u16,
}

impl Resolution {
    pub const QVGA: Resolution = Resolution {
        width: 320,
        height: 240,
    };
    pub const QQVGA: Resolution = Resolution {
        width: 160,
        height: 120,
    };

    /// Number of pixel words in one frame.
    pub fn words(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    /// RGB565 register table producing this resolution.
    pub fn rgb565_preset(&self) -> Result<RegisterTable, TableError> {
        match *self {
            Self::QVGA => rgb565_qvga(),
            Self::QQVGA => rgb565_qqvga(),
            _ => Err(TableError::NoPreset),
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Sensor configuration run once before capturing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SensorSettings {
    /// Bus address of the sensor.
    pub address: u8,
    /// Register table to apply.
    pub table: RegisterTable,
    /// Read back every register after writing it.
    pub verify: Verify,
    /// Wait after the last register write.
    pub settle_ms: u32,
}

impl SensorSettings {
    /// RGB565 settings for a resolution with a preset.
    pub fn rgb565(resolution: Resolution) -> Result<Self, TableError> {
        let table = resolution.rgb565_preset()?;
        Ok(SensorSettings {
            address: OV7670_ADDRESS,
            table,
            verify: Verify::None,
            settle_ms: DEFAULT_SETTLE_MS,
        })
    }
}

/// Output format registers shared by both presets. Written first, the window registers
/// depend on them.
const RGB565_FORMAT: &[(u8, u8)] = &[
    // RGB output
    (Register::COM7, 0x04),
    // RGB444 off
    (Register::RGB444, 0x00),
    // RGB565 with full output range (0x00 --> 0xFF)
    (Register::COM15, 0xD0),
    // Internal clock prescaler, input clock divided by 2
    (Register::CLKRC, 0x01),
    // Normal UV order, auto output window off
    (Register::TSLB, 0x04),
    // PCLK does not toggle during horizontal blanking, sync polarity left positive
    (Register::COM10, 0x20),
    // Gamma and UV saturation auto adjust
    (Register::COM13, 0xC0),
    // Color matrix for RGB
    (Register::MTX1, 0xB3),
    (Register::MTX2, 0xB3),
    (Register::MTX3, 0x00),
    (Register::MTX4, 0x3D),
    (Register::MTX5, 0xA7),
    (Register::MTX6, 0xE4),
    (Register::MTXS, 0x9E),
];

/// Window timing shared by both presets.
const WINDOW: &[(u8, u8)] = &[
    (Register::HSTART, 0x16),
    (Register::HSTOP, 0x04),
    (Register::HREF, 0x24),
    (Register::VSTRT, 0x02),
    (Register::VSTOP, 0x7A),
    (Register::VREF, 0x0A),
];

/// Register table for QVGA (320x240) with RGB565.
pub fn rgb565_qvga() -> Result<RegisterTable, TableError> {
    build(&[
        // Downsampling and scaling enabled
        (Register::COM3, 0x04),
        // PCLK divided by 2 with manual scaling
        (Register::COM14, 0x19),
        (Register::SCALING_XSC, 0x3A),
        (Register::SCALING_YSC, 0x35),
        // Downsample by 2 both vertically and horizontally (640x480 --> 320x240)
        (Register::SCALING_DCWCTR, 0x11),
        (Register::SCALING_PCLK_DIV, 0xF1),
        (Register::SCALING_PCLK_DELAY, 0x02),
    ])
}

/// Register table for QQVGA (160x120) with RGB565.
pub fn rgb565_qqvga() -> Result<RegisterTable, TableError> {
    build(&[
        (Register::COM3, 0x04),
        // PCLK divided by 4 with manual scaling
        (Register::COM14, 0x1A),
        (Register::SCALING_XSC, 0x3A),
        (Register::SCALING_YSC, 0x35),
        // Downsample by 4 both vertically and horizontally (640x480 --> 160x120)
        (Register::SCALING_DCWCTR, 0x22),
        (Register::SCALING_PCLK_DIV, 0xF2),
        (Register::SCALING_PCLK_DELAY, 0x02),
    ])
}

/// Format registers, then the resolution specific scaling, then the window.
fn build(scaling: &[(u8, u8)]) -> Result<RegisterTable, TableError> {
    let mut table = RegisterTable::default();
    for &(register, value) in RGB565_FORMAT.iter().chain(scaling).chain(WINDOW) {
        table.push(register, value)?;
    }
    table.validate()?;
    Ok(table)
}

/// Power control pin errors.
#[derive(Debug, Eq, PartialEq)]
pub enum PowerError<R, P> {
    Reset(R),
    PowerDown(P),
}

impl<R: fmt::Debug, P: fmt::Debug> fmt::Display for PowerError<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset(e) => write!(f, "reset pin error: {e:?}"),
            Self::PowerDown(e) => write!(f, "power-down pin error: {e:?}"),
        }
    }
}

/// Hardware reset pulse followed by leaving power-down mode.
/// * RESET is active low: low for 100 ms, then high.
/// * PWDN is active high: high for 100 ms, then low.
pub fn power_up<R, P, D>(
    reset: &mut R,
    pwdn: &mut P,
    delay: &mut D,
) -> Result<(), PowerError<R::Error, P::Error>>
where
    R: OutputPin,
    P: OutputPin,
    D: DelayNs,
{
    reset.set_low().map_err(PowerError::Reset)?;
    delay.delay_ms(100);
    reset.set_high().map_err(PowerError::Reset)?;
    delay.delay_ms(100);

    pwdn.set_high().map_err(PowerError::PowerDown)?;
    delay.delay_ms(100);
    pwdn.set_low().map_err(PowerError::PowerDown)?;

    info!("OV7670 out of reset and power-down");
    Ok(())
}

/// Sensor bring-up errors.
#[derive(Debug, Eq, PartialEq)]
pub enum InitError<C, E> {
    Clock(ClockError<C>),
    Sccb(SccbError<E>),
}

impl<C: fmt::Debug, E: fmt::Debug> fmt::Display for InitError<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clock(e) => write!(f, "{e}"),
            Self::Sccb(e) => write!(f, "{e}"),
        }
    }
}

/// Initialize the OV7670.
/// * Starts the master clock, the sensor does not answer on the bus without it.
/// * Applies the register table over SCCB and waits for the sensor to settle.
/// * User must then run a `CaptureSession` to read frames.
pub fn init<C, I2C, D>(
    clock: &mut C,
    xclk: &XclkConfig,
    i2c: &mut I2C,
    delay: &mut D,
    settings: &SensorSettings,
) -> Result<(), InitError<C::Error, I2C::Error>>
where
    C: MasterClock,
    I2C: I2c,
    D: DelayNs,
{
    start_clock(clock, xclk, ClockBand::OV7670).map_err(InitError::Clock)?;

    let sccb = Sccb::new(i2c, settings.address);
    sccb.configure(
        i2c,
        delay,
        &settings.table,
        settings.verify,
        settings.settle_ms,
    )
    .map_err(InitError::Sccb)
}
