//! Fake hardware for testing without a sensor.

use crate::clock::{MasterClock, XclkConfig};
use crate::parallel::sampler::{Sample, SignalPort};
use crate::pins::{Edge, SyncPolarity};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::i2c::{self, I2c, Operation};

/// Error returned by a failing fake pin.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PinFault;

impl digital::Error for PinFault {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// Input/output pin with a fixed input level that records every output level.
#[derive(Debug, Default)]
pub struct FakePin {
    level: bool,
    fail: bool,
    /// Levels driven through `OutputPin`, oldest first.
    pub history: Vec<bool>,
}

impl FakePin {
    pub fn new(level: bool) -> Self {
        FakePin {
            level,
            ..FakePin::default()
        }
    }

    /// A pin whose every access fails.
    pub fn failing() -> Self {
        FakePin {
            fail: true,
            ..FakePin::default()
        }
    }

    fn check(&self) -> Result<(), PinFault> {
        if self.fail {
            Err(PinFault)
        } else {
            Ok(())
        }
    }
}

impl digital::ErrorType for FakePin {
    type Error = PinFault;
}

impl InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, PinFault> {
        self.check()?;
        Ok(self.level)
    }

    fn is_low(&mut self) -> Result<bool, PinFault> {
        self.check()?;
        Ok(!self.level)
    }
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), PinFault> {
        self.check()?;
        self.level = false;
        self.history.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), PinFault> {
        self.check()?;
        self.level = true;
        self.history.push(true);
        Ok(())
    }
}

/// Delay that only adds up the requested time.
#[derive(Debug, Default)]
pub struct FakeDelay {
    pub total_ns: u64,
}

impl FakeDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// I2C bus that records every write and emulates an 8-bit register file behind any address.
#[derive(Debug)]
pub struct FakeI2c {
    /// Completed writes as `(address, bytes)`.
    pub writes: Vec<(u8, Vec<u8>)>,
    /// Number of write attempts, failed ones included.
    pub attempts: usize,
    registers: [u8; 256],
    pointer: u8,
    /// Fail the write attempt with this index.
    fail_at: Option<(usize, i2c::ErrorKind)>,
    /// Registers that ignore writes.
    read_only: Vec<u8>,
}

impl Default for FakeI2c {
    fn default() -> Self {
        FakeI2c {
            writes: Vec::new(),
            attempts: 0,
            registers: [0; 256],
            pointer: 0,
            fail_at: None,
            read_only: Vec::new(),
        }
    }
}

impl FakeI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail write attempt number `index` (0-based) with `kind`.
    pub fn fail_at(mut self, index: usize, kind: i2c::ErrorKind) -> Self {
        self.fail_at = Some((index, kind));
        self
    }

    /// Preset a register value.
    pub fn with_register(mut self, reg: u8, value: u8) -> Self {
        self.registers[usize::from(reg)] = value;
        self
    }

    /// Make a register ignore writes.
    pub fn read_only(mut self, reg: u8) -> Self {
        self.read_only.push(reg);
        self
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.registers[usize::from(reg)]
    }

    /// Register/value pairs of all two-byte writes, in order.
    pub fn register_writes(&self) -> Vec<(u8, u8)> {
        self.writes
            .iter()
            .filter(|(_, bytes)| bytes.len() == 2)
            .map(|(_, bytes)| (bytes[0], bytes[1]))
            .collect()
    }
}

impl i2c::ErrorType for FakeI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for FakeI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let index = self.attempts;
                    self.attempts += 1;
                    if let Some((fail_index, kind)) = self.fail_at {
                        if fail_index == index {
                            return Err(kind);
                        }
                    }

                    if let Some(&reg) = bytes.first() {
                        self.pointer = reg;
                    }
                    if let [reg, value] = bytes[..] {
                        if !self.read_only.contains(&reg) {
                            self.registers[usize::from(reg)] = value;
                        }
                    }
                    self.writes.push((address, bytes.to_vec()));
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.registers[usize::from(self.pointer)];
                    }
                }
            }
        }
        Ok(())
    }
}

/// Error returned by a scripted port at its failure position.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PortFault;

/// Builder for scripted capture line waveforms. Levels are given as asserted/released and
/// mapped through the polarity.
#[derive(Debug, Clone)]
pub struct Waveform {
    polarity: SyncPolarity,
    samples: Vec<Sample>,
}

impl Waveform {
    /// Waveform with default polarity, starting with every line released.
    pub fn new() -> Self {
        Self::with_polarity(SyncPolarity::default())
    }

    pub fn with_polarity(polarity: SyncPolarity) -> Self {
        let mut waveform = Waveform {
            polarity,
            samples: Vec::new(),
        };
        waveform.push(false, false, false, 0);
        waveform
    }

    fn level(edge: Edge, asserted: bool) -> bool {
        match edge {
            Edge::Rising => asserted,
            Edge::Falling => !asserted,
        }
    }

    fn push(&mut self, frame: bool, line: bool, clock: bool, data: u8) {
        self.samples.push(Sample {
            frame_sync: Self::level(self.polarity.frame_sync, frame),
            line_sync: Self::level(self.polarity.line_sync, line),
            pixel_clock: Self::level(self.polarity.pixel_clock, clock),
            data,
        });
    }

    /// `n` samples with every line released.
    pub fn idle(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.push(false, false, false, 0);
        }
        self
    }

    /// Frame sync pulse.
    pub fn frame_start(mut self) -> Self {
        self.push(true, false, false, 0);
        self.push(true, false, false, 0);
        self.push(false, false, false, 0);
        self
    }

    /// Assert line sync.
    pub fn line_start(mut self) -> Self {
        self.push(false, true, false, 0);
        self
    }

    /// One pixel clock period per byte with line sync asserted.
    pub fn clock_bytes(mut self, bytes: &[u8]) -> Self {
        for &byte in bytes {
            self.push(false, true, false, byte);
            self.push(false, true, true, byte);
        }
        self
    }

    /// Release line sync.
    pub fn line_end(mut self) -> Self {
        self.push(false, false, false, 0);
        self
    }

    /// A whole line of raw bus bytes.
    pub fn line(self, bytes: &[u8]) -> Self {
        self.line_start().clock_bytes(bytes).line_end()
    }

    /// A whole line of pixel words, high byte first.
    pub fn pixel_line(self, words: &[u16]) -> Self {
        let bytes: Vec<u8> = words
            .iter()
            .flat_map(|word| word.to_be_bytes())
            .collect();
        self.line(&bytes)
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    pub fn into_port(self) -> ScriptedPort {
        ScriptedPort {
            samples: self.samples,
            position: 0,
            fail_at: None,
        }
    }
}

/// Port replaying a waveform. Once the script is exhausted the last sample repeats forever,
/// like a sensor that stopped toggling its outputs.
#[derive(Debug)]
pub struct ScriptedPort {
    samples: Vec<Sample>,
    position: usize,
    fail_at: Option<usize>,
}

impl ScriptedPort {
    /// Fail the sample with this index.
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Number of samples taken so far.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl SignalPort for ScriptedPort {
    type Error = PortFault;

    fn sample(&mut self) -> Result<Sample, PortFault> {
        let index = self.position;
        self.position += 1;

        if self.fail_at == Some(index) {
            return Err(PortFault);
        }

        Ok(self
            .samples
            .get(index)
            .or_else(|| self.samples.last())
            .copied()
            .unwrap_or_default())
    }
}

/// Clock generator that remembers its settings.
#[derive(Debug, Default)]
pub struct FakeClock {
    pub running: Option<XclkConfig>,
    pub broken: bool,
}

impl MasterClock for FakeClock {
    type Error = ();

    fn start(&mut self, config: &XclkConfig) -> Result<(), ()> {
        if self.broken {
            return Err(());
        }
        self.running = Some(*config);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ()> {
        self.running = None;
        Ok(())
    }
}
