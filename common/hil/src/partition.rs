// Licensed under the Apache-2.0 license

use crate::flash::{FlashDrvError, FlashStorage};

/// Location of a flash region as recorded in the partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionPos {
    pub offset: u32,
    pub size: u32,
}

impl PartitionPos {
    pub const fn new(offset: u32, size: u32) -> Self {
        PartitionPos { offset, size }
    }

    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    pub fn len(&self) -> usize {
        self.size as usize
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Exclusive end address of the region.
    pub fn end(&self) -> usize {
        self.offset() + self.len()
    }

    pub fn contains(&self, address: usize) -> bool {
        address >= self.offset() && address < self.end()
    }
}

/// Represents a partition within the flash memory.
///
/// A `FlashPartition` provides a view into a contiguous region of the underlying
/// flash, allowing for read, write, and erase operations within the
/// specified bounds. All operations are checked to ensure they do not exceed
/// the partition's boundaries.
pub struct FlashPartition<'a> {
    driver: &'a dyn FlashStorage,
    name: &'static str,
    base_offset: usize,
    length: usize,
}

impl<'a> FlashPartition<'a> {
    /// Creates a new `FlashPartition` instance.
    ///
    /// Returns `Err(FlashDrvError::SIZE)` if the partition exceeds the flash size.
    pub fn new(
        driver: &'a dyn FlashStorage,
        name: &'static str,
        base_offset: usize,
        length: usize,
    ) -> Result<Self, FlashDrvError> {
        let end = base_offset
            .checked_add(length)
            .ok_or(FlashDrvError::SIZE)?;
        if end > driver.capacity() {
            return Err(FlashDrvError::SIZE);
        }
        Ok(FlashPartition {
            driver,
            name,
            base_offset,
            length,
        })
    }

    /// Creates a view over a region described by the partition table.
    pub fn from_pos(
        driver: &'a dyn FlashStorage,
        name: &'static str,
        pos: PartitionPos,
    ) -> Result<Self, FlashDrvError> {
        Self::new(driver, name, pos.offset(), pos.len())
    }

    fn check_range(&self, partition_offset: usize, len: usize) -> Result<(), FlashDrvError> {
        match partition_offset.checked_add(len) {
            Some(end) if end <= self.length => Ok(()),
            _ => Err(FlashDrvError::SIZE),
        }
    }

    /// Reads data from the flash partition into the provided buffer, starting at the
    /// specified offset within the partition.
    ///
    /// Returns `Err(FlashDrvError::SIZE)` if the requested range exceeds the partition
    /// size, or propagates errors from the underlying flash controller.
    pub fn read(&self, partition_offset: usize, buf: &mut [u8]) -> Result<(), FlashDrvError> {
        self.check_range(partition_offset, buf.len())?;
        self.driver.read(buf, self.base_offset + partition_offset)
    }

    /// Writes data to the flash partition, starting at the specified offset within the partition.
    pub fn write(&self, partition_offset: usize, buf: &[u8]) -> Result<(), FlashDrvError> {
        self.check_range(partition_offset, buf.len())?;
        self.driver.write(buf, self.base_offset + partition_offset)
    }

    /// Erases a region of the flash partition, starting at the specified offset within the partition.
    pub fn erase(&self, partition_offset: usize, len: usize) -> Result<(), FlashDrvError> {
        self.check_range(partition_offset, len)?;
        self.driver.erase(self.base_offset + partition_offset, len)
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Absolute flash address of the partition start.
    pub fn base_offset(&self) -> usize {
        self.base_offset
    }
}
