//! GPIO pin roles, wiring and signal polarity for the camera connector.

use core::fmt;

/// Function of a physical pin during a capture session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PinRole {
    /// Master clock output to the sensor (XCLK).
    ClockOutput,
    /// Frame sync input (VSYNC).
    FrameSync,
    /// Line sync input (HREF/HSYNC).
    LineSync,
    /// Pixel clock input (PCLK).
    PixelClock,
    /// Parallel data input, bit index 0..8.
    Data(u8),
    /// Active-low sensor reset output.
    Reset,
    /// Active-high sensor power-down output.
    PowerDown,
}

/// Physical pin numbers (BCM numbering on a Raspberry Pi) bound to each role.
///
/// Default wiring:
///
/// ```text
/// XCLK:   GPIO18 (pin 12) --> OV7670 XCLK (hardware PWM)
/// RESET:  GPIO17 (pin 11) --> OV7670 RESET
/// PWDN:   GPIO27 (pin 13) --> OV7670 PWDN
/// PCLK:   GPIO22 (pin 15) <-- OV7670 PCLK
/// HREF:   GPIO23 (pin 16) <-- OV7670 HREF
/// VSYNC:  GPIO24 (pin 18) <-- OV7670 VSYNC
/// D0-D7:  GPIO4, 5, 6, 12, 13, 16, 19, 26 <-- OV7670 D0-D7
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PinMap {
    pub clock_output: u8,
    pub frame_sync: u8,
    pub line_sync: u8,
    pub pixel_clock: u8,
    pub data: [u8; 8],
    pub reset: u8,
    pub power_down: u8,
}

impl Default for PinMap {
    fn default() -> Self {
        PinMap {
            clock_output: 18,
            frame_sync: 24,
            line_sync: 23,
            pixel_clock: 22,
            data: [4, 5, 6, 12, 13, 16, 19, 26],
            reset: 17,
            power_down: 27,
        }
    }
}

/// Pin map errors.
#[derive(Debug, Eq, PartialEq)]
pub enum PinMapError {
    /// A physical pin was given two roles.
    Duplicate { pin: u8, first: PinRole, second: PinRole },
}

impl fmt::Display for PinMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate { pin, first, second } => {
                write!(f, "pin {pin} bound to both {first:?} and {second:?}")
            }
        }
    }
}

impl PinMap {
    /// Every `(pin, role)` binding in the map.
    pub fn bindings(&self) -> impl Iterator<Item = (u8, PinRole)> + '_ {
        let fixed = [
            (self.clock_output, PinRole::ClockOutput),
            (self.frame_sync, PinRole::FrameSync),
            (self.line_sync, PinRole::LineSync),
            (self.pixel_clock, PinRole::PixelClock),
            (self.reset, PinRole::Reset),
            (self.power_down, PinRole::PowerDown),
        ];
        let data = self
            .data
            .iter()
            .zip(0u8..)
            .map(|(&pin, bit)| (pin, PinRole::Data(bit)));

        fixed.into_iter().chain(data)
    }

    /// Check that each physical pin is bound to exactly one role.
    pub fn validate(&self) -> Result<(), PinMapError> {
        for (i, (pin, first)) in self.bindings().enumerate() {
            if let Some((_, second)) = self.bindings().skip(i + 1).find(|(p, _)| *p == pin) {
                return Err(PinMapError::Duplicate { pin, first, second });
            }
        }
        Ok(())
    }

    /// Role bound to a physical pin, if any.
    pub fn role_of(&self, pin: u8) -> Option<PinRole> {
        self.bindings().find(|(p, _)| *p == pin).map(|(_, role)| role)
    }
}

/// Signal transition that marks an event. The level after the transition is the asserted level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Edge {
    /// Low to high; the signal is asserted while high.
    Rising,
    /// High to low; the signal is asserted while low.
    Falling,
}

impl Edge {
    /// Whether `level` is the asserted level for this polarity.
    pub fn is_asserted(self, level: bool) -> bool {
        match self {
            Edge::Rising => level,
            Edge::Falling => !level,
        }
    }

    /// Whether the move from `previous` to `current` is this edge.
    pub fn is_edge(self, previous: bool, current: bool) -> bool {
        !self.is_asserted(previous) && self.is_asserted(current)
    }
}

/// Triggering edge of each synchronization signal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyncPolarity {
    pub frame_sync: Edge,
    pub line_sync: Edge,
    pub pixel_clock: Edge,
}

/// OV7670 defaults with COM10 = 0x20: VSYNC pulses high at frame start, HREF is high during
/// valid data, data is valid on the PCLK rising edge.
impl Default for SyncPolarity {
    fn default() -> Self {
        SyncPolarity {
            frame_sync: Edge::Rising,
            line_sync: Edge::Rising,
            pixel_clock: Edge::Rising,
        }
    }
}
