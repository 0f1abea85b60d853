//! A generic driver for the Serial Camera Control Bus on the OV7670 image sensor. Works with any
//! bus implementing the embedded-hal I2C interface, SCCB writes are plain I2C writes.

use core::fmt;
use core::marker::PhantomData;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, I2c};
use heapless::Vec;
use log::{debug, info, warn};

/// Maximum number of settings in a `RegisterTable`.
pub const MAX_SETTINGS: usize = 200;

/// One register write.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegisterSetting {
    pub register: u8,
    pub value: u8,
}

/// Ordered register writes describing a complete sensor mode. Order matters (output format
/// before window timing) and is preserved; repeated registers are kept and written each time.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegisterTable {
    settings: Vec<RegisterSetting, MAX_SETTINGS>,
}

/// Register table errors.
#[derive(Debug, Eq, PartialEq)]
pub enum TableError {
    /// The table has no settings.
    Empty,
    /// More than `MAX_SETTINGS` settings.
    TooLong,
    /// No register preset exists for the requested resolution.
    NoPreset,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "register table is empty"),
            Self::TooLong => write!(f, "register table exceeds {MAX_SETTINGS} settings"),
            Self::NoPreset => write!(f, "no register preset for this resolution"),
        }
    }
}

impl RegisterTable {
    /// Build a table from `(register, value)` pairs.
    pub fn new(pairs: &[(u8, u8)]) -> Result<Self, TableError> {
        let mut table = RegisterTable::default();
        for &(register, value) in pairs {
            table.push(register, value)?;
        }
        table.validate()?;
        Ok(table)
    }

    /// Append a setting.
    pub fn push(&mut self, register: u8, value: u8) -> Result<(), TableError> {
        self.settings
            .push(RegisterSetting { register, value })
            .map_err(|_| TableError::TooLong)
    }

    /// Check the table can be applied.
    pub fn validate(&self) -> Result<(), TableError> {
        if self.settings.is_empty() {
            return Err(TableError::Empty);
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisterSetting> {
        self.settings.iter()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

/// Whether to read each register back after writing it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verify {
    None,
    Readback,
}

/// SCCB driver.
pub struct Sccb<I2C> {
    /// Marker to ensure the same I2C type is used in all calls.
    i2c: PhantomData<I2C>,
    /// Device I2C address.
    address: u8,
}

/// SCCB errors.
#[derive(Debug, Eq, PartialEq)]
pub enum SccbError<E> {
    /// A register transfer of the table was not completed (e.g. not acknowledged).
    Configuration { register: u8, index: usize, source: E },
    /// The bus itself failed during a table transfer (bus error, arbitration loss, overrun).
    BusFault { register: u8, index: usize, source: E },
    /// The register table cannot be applied.
    Table(TableError),
    /// I2C write error outside of a table.
    I2cWrite(E),
    /// I2C read error.
    I2cRead(E),
    /// Manufacturer ID mismatch.
    ReadManfId,
    /// Product ID mismatch.
    ReadProdId,
    /// Register write-readback mismatch, `(register, value read)`.
    RegMismatch((u8, u8)),
}

impl<E> SccbError<E> {
    /// Whether the error came from the bus rather than from the sensor.
    pub fn is_bus_fault(&self) -> bool {
        matches!(self, Self::BusFault { .. })
    }
}

impl<E: fmt::Debug> fmt::Display for SccbError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration {
                register,
                index,
                source,
            } => write!(
                f,
                "transfer of register {register:#04x} (setting {index}) failed: {source:?}"
            ),
            Self::BusFault {
                register,
                index,
                source,
            } => write!(
                f,
                "bus fault on register {register:#04x} (setting {index}): {source:?}"
            ),
            Self::Table(e) => write!(f, "{e}"),
            Self::I2cWrite(e) => write!(f, "I2C write error: {e:?}"),
            Self::I2cRead(e) => write!(f, "I2C read error: {e:?}"),
            Self::ReadManfId => write!(f, "manufacturer ID mismatch"),
            Self::ReadProdId => write!(f, "product ID mismatch"),
            Self::RegMismatch((reg, val)) => {
                write!(f, "register {reg:#04x} read back as {val:#04x}")
            }
        }
    }
}

impl<I2C, E> Sccb<I2C>
where
    I2C: I2c<Error = E>,
    E: i2c::Error,
{
    /// Creates a new SCCB driver associated with an I2C peripheral.
    pub fn new(_i2c: &I2C, address: u8) -> Self {
        Sccb {
            i2c: PhantomData,
            address,
        }
    }

    /// Device address used on the bus.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Read a register, must be two seperate transactions and we can't use `write_read`.
    fn read_register(&self, i2c: &mut I2C, reg: u8) -> Result<u8, SccbError<E>> {
        // Write the address
        i2c.write(self.address, &[reg])
            .map_err(SccbError::I2cWrite)?;

        // Read the value
        let mut buf = [0x00];
        i2c.read(self.address, &mut buf)
            .map_err(SccbError::I2cRead)?;

        Ok(buf[0])
    }

    /// Read a register as part of a table, keeping the raw bus error.
    fn read_back(&self, i2c: &mut I2C, reg: u8) -> Result<u8, E> {
        let mut buf = [0x00];
        i2c.write(self.address, &[reg])?;
        i2c.read(self.address, &mut buf)?;
        Ok(buf[0])
    }

    /// Write a register.
    fn write_register(&self, i2c: &mut I2C, reg: u8, val: u8) -> Result<(), E> {
        // Write the address and value
        i2c.write(self.address, &[reg, val])
    }

    /// Reset all registers to their default values.
    pub fn reset(&self, i2c: &mut I2C) -> Result<(), SccbError<E>> {
        // Setting the upper bit of this register resets all the registers
        let reg = self.read_register(i2c, Register::COM7)?;
        self.write_register(i2c, Register::COM7, reg | 0x80)
            .map_err(SccbError::I2cWrite)
    }

    /// Check the device ID matches the expected value.
    pub fn check_id(&self, i2c: &mut I2C) -> Result<(), SccbError<E>> {
        // Manf ID
        let manf_id_msb: u16 = self.read_register(i2c, Register::MIDH)?.into();
        let manf_id_lsb: u16 = self.read_register(i2c, Register::MIDL)?.into();
        let manf_id: u16 = (manf_id_msb << 8) | manf_id_lsb;
        if manf_id != OV7670_MANF_ID {
            return Err(SccbError::ReadManfId);
        }

        // Product ID, the version byte differs between silicon revisions
        let product_id = self.read_register(i2c, Register::PID)?;
        if product_id != OV7670_PROD_ID {
            return Err(SccbError::ReadProdId);
        }

        let version = self.read_register(i2c, Register::VER)?;
        debug!("OV7670 found, version {:#04x}", version);

        Ok(())
    }

    /// Apply a register table, in order. Stops at the first failed write.
    pub fn apply_config(
        &self,
        i2c: &mut I2C,
        table: &RegisterTable,
        verify: Verify,
    ) -> Result<(), SccbError<E>> {
        table.validate().map_err(SccbError::Table)?;
        debug!(
            "applying {} register settings at {:#04x}",
            table.len(),
            self.address
        );

        for (index, setting) in table.iter().enumerate() {
            let RegisterSetting { register, value } = *setting;

            // Write the register
            if let Err(e) = self.write_register(i2c, register, value) {
                warn!(
                    "register {:#04x} (setting {}) not written: {:?}",
                    register,
                    index,
                    e.kind()
                );
                return Err(table_failure(register, index, e));
            }

            // Readback to check the write register worked
            if verify == Verify::Readback {
                let readback = self
                    .read_back(i2c, register)
                    .map_err(|e| table_failure(register, index, e))?;
                if readback != value {
                    return Err(SccbError::RegMismatch((register, readback)));
                }
            }
        }

        Ok(())
    }

    /// Apply a register table, then give the sensor `settle_ms` to adopt the new mode.
    pub fn configure<D: DelayNs>(
        &self,
        i2c: &mut I2C,
        delay: &mut D,
        table: &RegisterTable,
        verify: Verify,
        settle_ms: u32,
    ) -> Result<(), SccbError<E>> {
        self.apply_config(i2c, table, verify)?;
        delay.delay_ms(settle_ms);
        info!("sensor configured ({} settings)", table.len());
        Ok(())
    }
}

/// Sort a failed table transfer into a sensor-side or bus-side failure.
fn table_failure<E: i2c::Error>(register: u8, index: usize, source: E) -> SccbError<E> {
    match source.kind() {
        ErrorKind::Bus | ErrorKind::ArbitrationLoss | ErrorKind::Overrun => SccbError::BusFault {
            register,
            index,
            source,
        },
        _ => SccbError::Configuration {
            register,
            index,
            source,
        },
    }
}

/// Device address is 0x42 for writes, the I2C driver left-shifts the 7-bit address by 1.
pub const OV7670_ADDRESS: u8 = 0x21;

/// Expected manufacturer ID.
const OV7670_MANF_ID: u16 = 0x7FA2;

/// Expected product ID.
const OV7670_PROD_ID: u8 = 0x76;

/// Device register addresses.
pub struct Register;

impl Register {
    // Gain and clock
    pub const GAIN: u8 = 0x00;
    pub const CLKRC: u8 = 0x11;

    // Common control registers
    pub const COM3: u8 = 0x0C;
    pub const COM7: u8 = 0x12;
    pub const COM10: u8 = 0x15;
    pub const COM13: u8 = 0x3D;
    pub const COM14: u8 = 0x3E;
    pub const COM15: u8 = 0x40;
    pub const TSLB: u8 = 0x3A;
    pub const RGB444: u8 = 0x8C;

    // Product ID registers
    pub const PID: u8 = 0x0A;
    pub const VER: u8 = 0x0B;

    // Manufacturer ID registers
    pub const MIDH: u8 = 0x1C;
    pub const MIDL: u8 = 0x1D;

    // Window
    pub const HSTART: u8 = 0x17;
    pub const HSTOP: u8 = 0x18;
    pub const VSTRT: u8 = 0x19;
    pub const VSTOP: u8 = 0x1A;
    pub const HREF: u8 = 0x32;
    pub const VREF: u8 = 0x03;

    // Scaling
    pub const SCALING_XSC: u8 = 0x70;
    pub const SCALING_YSC: u8 = 0x71;
    pub const SCALING_DCWCTR: u8 = 0x72;
    pub const SCALING_PCLK_DIV: u8 = 0x73;
    pub const SCALING_PCLK_DELAY: u8 = 0xA2;

    // Color matrix
    pub const MTX1: u8 = 0x4F;
    pub const MTX2: u8 = 0x50;
    pub const MTX3: u8 = 0x51;
    pub const MTX4: u8 = 0x52;
    pub const MTX5: u8 = 0x53;
    pub const MTX6: u8 = 0x54;
    pub const MTXS: u8 = 0x58;
}
