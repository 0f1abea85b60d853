//! Abstraction layer for writing captured images to non-volatile memory.

use core::fmt;
use log::debug;

/// Any memory device that implements these traits will be compatible with the NVM driver.
pub trait Mem {
    type Error;

    /// Read `dest.len()` bytes at NVM device `src` address into `dest`.
    fn read(&mut self, dest: &mut [u8], src: u32) -> Result<(), Self::Error>;

    /// Write all bytes in `src` to NVM device `dest` address.
    fn write(&mut self, dest: u32, src: &[u8]) -> Result<(), Self::Error>;

    /// Erase the NVM device, such that any section of it can be written.
    fn erase(&mut self) -> Result<(), Self::Error>;
}

/// Handle for the NVM driver.
pub struct NonVolatileMemory<MEM> {
    /// Memory device handle.
    device: MEM,
    /// First address written.
    start_addr: u32,
    /// Write pointer.
    write_ptr: u32,
}

impl<MEM, E> NonVolatileMemory<MEM>
where
    MEM: Mem<Error = E>,
{
    /// Initialize the NVM driver, erasing the device.
    pub fn new(mut device: MEM, start_addr: u32) -> Result<Self, E> {
        device.erase()?;
        Ok(NonVolatileMemory {
            device,
            start_addr,
            write_ptr: start_addr,
        })
    }

    /// Append `src` after everything written so far.
    pub fn write(&mut self, src: &[u8]) -> Result<(), E> {
        self.device.write(self.write_ptr, src)?;
        self.write_ptr += src.len() as u32;
        Ok(())
    }

    /// Read back bytes at `offset` from the start address.
    pub fn read(&mut self, offset: u32, dest: &mut [u8]) -> Result<(), E> {
        self.device.read(dest, self.start_addr + offset)
    }

    /// Number of bytes written since initialization.
    pub fn written(&self) -> u32 {
        self.write_ptr - self.start_addr
    }

    /// Release the memory device.
    pub fn into_inner(self) -> MEM {
        debug!("NVM released after {} bytes", self.written());
        self.device
    }
}

/// RAM-backed memory device errors.
#[derive(Debug, Eq, PartialEq)]
pub enum RamError {
    /// Access beyond the end of the storage.
    OutOfBounds { addr: u32, len: usize, capacity: usize },
}

impl fmt::Display for RamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds {
                addr,
                len,
                capacity,
            } => write!(
                f,
                "access of {len} bytes at {addr:#x} exceeds {capacity} bytes"
            ),
        }
    }
}

/// Memory device over a byte slice, e.g. a buffer handed to another task for upload.
pub struct RamMem<'a> {
    storage: &'a mut [u8],
}

impl<'a> RamMem<'a> {
    pub fn new(storage: &'a mut [u8]) -> Self {
        RamMem { storage }
    }

    fn range(&self, addr: u32, len: usize) -> Result<core::ops::Range<usize>, RamError> {
        let start = addr as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.storage.len() => Ok(start..end),
            _ => Err(RamError::OutOfBounds {
                addr,
                len,
                capacity: self.storage.len(),
            }),
        }
    }
}

impl Mem for RamMem<'_> {
    type Error = RamError;

    fn read(&mut self, dest: &mut [u8], src: u32) -> Result<(), RamError> {
        let range = self.range(src, dest.len())?;
        dest.copy_from_slice(&self.storage[range]);
        Ok(())
    }

    fn write(&mut self, dest: u32, src: &[u8]) -> Result<(), RamError> {
        let range = self.range(dest, src.len())?;
        self.storage[range].copy_from_slice(src);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), RamError> {
        self.storage.fill(0);
        Ok(())
    }
}

/// Files as memory devices, erasing truncates the file.
#[cfg(feature = "std")]
impl Mem for std::fs::File {
    type Error = std::io::Error;

    fn read(&mut self, dest: &mut [u8], src: u32) -> Result<(), Self::Error> {
        use std::io::{Read, Seek, SeekFrom};
        self.seek(SeekFrom::Start(u64::from(src)))?;
        self.read_exact(dest)
    }

    fn write(&mut self, dest: u32, src: &[u8]) -> Result<(), Self::Error> {
        use std::io::{Seek, SeekFrom, Write};
        self.seek(SeekFrom::Start(u64::from(dest)))?;
        self.write_all(src)
    }

    fn erase(&mut self) -> Result<(), Self::Error> {
        use std::io::{Seek, SeekFrom};
        self.set_len(0)?;
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_erases() {
        let mut storage = [0xAAu8; 8];
        let nvm = NonVolatileMemory::new(RamMem::new(&mut storage), 0).expect("erase");
        assert_eq!(nvm.written(), 0);
        drop(nvm);
        assert_eq!(storage, [0; 8]);
    }

    #[test]
    fn test_writes_are_sequential() {
        let mut storage = [0u8; 8];
        let mut nvm = NonVolatileMemory::new(RamMem::new(&mut storage), 2).expect("erase");

        nvm.write(&[1, 2]).expect("first write");
        nvm.write(&[3]).expect("second write");
        assert_eq!(nvm.written(), 3);

        let mut back = [0u8; 3];
        nvm.read(0, &mut back).expect("read back");
        assert_eq!(back, [1, 2, 3]);

        drop(nvm);
        assert_eq!(storage, [0, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn test_write_past_end() {
        let mut storage = [0u8; 4];
        let mut nvm = NonVolatileMemory::new(RamMem::new(&mut storage), 0).expect("erase");

        nvm.write(&[1, 2, 3]).expect("fits");
        assert_eq!(
            nvm.write(&[4, 5]),
            Err(RamError::OutOfBounds {
                addr: 3,
                len: 2,
                capacity: 4,
            })
        );
        // The write pointer does not move on failure
        assert_eq!(nvm.written(), 3);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_file_device() {
        let path = std::env::temp_dir().join(format!("pincam-nvm-{}.bin", std::process::id()));
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .expect("open temp file");

        let mut nvm = NonVolatileMemory::new(file, 0).expect("truncate");
        nvm.write(b"P6\n").expect("write");
        nvm.write(b"1 1\n").expect("write");
        drop(nvm);

        let contents = std::fs::read(&path).expect("read temp file");
        std::fs::remove_file(&path).expect("remove temp file");
        assert_eq!(contents, b"P6\n1 1\n");
    }
}
