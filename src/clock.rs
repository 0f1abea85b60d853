//! Master clock (XCLK) supplied to the sensor.
//!
//! The generator itself lives outside this crate (hardware PWM, an MCO pin, a standalone
//! oscillator); the driver only needs it running at a frequency the sensor tolerates before
//! configuration starts.

use core::fmt;
use log::info;

/// Square wave settings for the sensor clock input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct XclkConfig {
    /// Frequency in Hz.
    pub frequency_hz: u32,
    /// High time in percent of the period.
    pub duty_percent: u8,
}

/// 8 MHz at 50 % duty, reachable with the Raspberry Pi hardware PWM.
impl Default for XclkConfig {
    fn default() -> Self {
        XclkConfig {
            frequency_hz: 8_000_000,
            duty_percent: 50,
        }
    }
}

/// Clock frequency range accepted by the sensor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClockBand {
    pub min_hz: u32,
    pub max_hz: u32,
}

impl ClockBand {
    /// Range the OV7670 runs within in practice. The datasheet asks for 10 MHz minimum but the
    /// sensor delivers frames down to about 1 MHz, which slows PCLK enough for software capture.
    pub const OV7670: ClockBand = ClockBand {
        min_hz: 1_000_000,
        max_hz: 48_000_000,
    };
}

/// Clock configuration errors.
#[derive(Debug, Eq, PartialEq)]
pub enum ClockError<E> {
    /// Frequency outside of the sensor's band.
    FrequencyOutOfBand { frequency_hz: u32, band: ClockBand },
    /// Duty cycle outside of 1..=99 %.
    InvalidDuty(u8),
    /// The generator failed to start or stop.
    Generator(E),
}

impl<E: fmt::Debug> fmt::Display for ClockError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrequencyOutOfBand { frequency_hz, band } => write!(
                f,
                "clock frequency {frequency_hz} Hz outside of {}..={} Hz",
                band.min_hz, band.max_hz
            ),
            Self::InvalidDuty(duty) => write!(f, "invalid clock duty cycle {duty}%"),
            Self::Generator(e) => write!(f, "clock generator error: {e:?}"),
        }
    }
}

impl XclkConfig {
    /// Check the settings against a sensor's accepted band.
    pub fn validate<E>(&self, band: ClockBand) -> Result<(), ClockError<E>> {
        if self.frequency_hz < band.min_hz || self.frequency_hz > band.max_hz {
            return Err(ClockError::FrequencyOutOfBand {
                frequency_hz: self.frequency_hz,
                band,
            });
        }
        if self.duty_percent == 0 || self.duty_percent >= 100 {
            return Err(ClockError::InvalidDuty(self.duty_percent));
        }
        Ok(())
    }
}

/// Anything able to drive a square wave on the sensor clock pin.
pub trait MasterClock {
    type Error;

    /// Start (or retune) the clock output.
    fn start(&mut self, config: &XclkConfig) -> Result<(), Self::Error>;

    /// Stop the clock output.
    fn stop(&mut self) -> Result<(), Self::Error>;
}

/// Validate `config` and start the clock.
pub fn start_clock<C: MasterClock>(
    clock: &mut C,
    config: &XclkConfig,
    band: ClockBand,
) -> Result<(), ClockError<C::Error>> {
    config.validate(band)?;
    clock.start(config).map_err(ClockError::Generator)?;
    info!(
        "XCLK running at {} Hz, {}% duty",
        config.frequency_hz,
        config.duty_percent
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::FakeClock;

    #[test]
    fn test_default_is_in_band() {
        let config = XclkConfig::default();
        assert_eq!(config.validate::<()>(ClockBand::OV7670), Ok(()));
    }

    #[test]
    fn test_out_of_band_frequency() {
        let config = XclkConfig {
            frequency_hz: 500_000,
            duty_percent: 50,
        };
        assert_eq!(
            config.validate::<()>(ClockBand::OV7670),
            Err(ClockError::FrequencyOutOfBand {
                frequency_hz: 500_000,
                band: ClockBand::OV7670,
            })
        );
    }

    #[test]
    fn test_invalid_duty() {
        let config = XclkConfig {
            frequency_hz: 2_000_000,
            duty_percent: 100,
        };
        assert_eq!(
            config.validate::<()>(ClockBand::OV7670),
            Err(ClockError::InvalidDuty(100))
        );
    }

    #[test]
    fn test_start_clock_validates_first() {
        let mut clock = FakeClock::default();
        let bad = XclkConfig {
            frequency_hz: 100_000_000,
            duty_percent: 50,
        };
        assert!(start_clock(&mut clock, &bad, ClockBand::OV7670).is_err());
        assert_eq!(clock.running, None);

        let good = XclkConfig {
            frequency_hz: 2_000_000,
            duty_percent: 50,
        };
        assert_eq!(start_clock(&mut clock, &good, ClockBand::OV7670), Ok(()));
        assert_eq!(clock.running, Some(good));
    }

    #[test]
    fn test_generator_failure_is_reported() {
        let mut clock = FakeClock {
            broken: true,
            ..FakeClock::default()
        };
        assert_eq!(
            start_clock(&mut clock, &XclkConfig::default(), ClockBand::OV7670),
            Err(ClockError::Generator(()))
        );
    }
}
