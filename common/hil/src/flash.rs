// Licensed under the Apache-2.0 license

//! Generic interface for flash storage access.

use core::fmt;
use core::result::Result;

/// Simple interface for reading, writing and erasing arbitrary lengths of data on NOR flash.
///
/// Writes can only clear bits, so a region must be erased (set to `0xFF`) before it is
/// written. Erase lengths are expected to be multiples of the device sector size.
pub trait FlashStorage {
    /// Read from the flash storage, filling the provided buffer with data
    fn read(&self, buffer: &mut [u8], address: usize) -> Result<(), FlashDrvError>;

    /// Write to the flash storage with the full contents of the buffer, starting at the specified address
    fn write(&self, buffer: &[u8], address: usize) -> Result<(), FlashDrvError>;

    /// Erase `length` bytes starting at address `address`. The address must be
    /// in the address space of the physical storage.
    fn erase(&self, address: usize, length: usize) -> Result<(), FlashDrvError>;

    /// Returns the size of the flash storage in bytes.
    fn capacity(&self) -> usize;
}

impl<T: FlashStorage + ?Sized> FlashStorage for &T {
    fn read(&self, buffer: &mut [u8], address: usize) -> Result<(), FlashDrvError> {
        (**self).read(buffer, address)
    }

    fn write(&self, buffer: &[u8], address: usize) -> Result<(), FlashDrvError> {
        (**self).write(buffer, address)
    }

    fn erase(&self, address: usize, length: usize) -> Result<(), FlashDrvError> {
        (**self).erase(address, length)
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum FlashDrvError {
    /// Generic failure condition
    FAIL = 1,
    /// An invalid parameter was passed
    INVAL = 6,
    /// Parameter passed was too large
    SIZE = 7,
}

impl From<FlashDrvError> for usize {
    fn from(err: FlashDrvError) -> usize {
        err as usize
    }
}

impl fmt::Display for FlashDrvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FlashDrvError::FAIL => "flash operation failed",
            FlashDrvError::INVAL => "invalid flash parameter",
            FlashDrvError::SIZE => "flash access out of range",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for FlashDrvError {}
