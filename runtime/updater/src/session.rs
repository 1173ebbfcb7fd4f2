// Licensed under the Apache-2.0 license

use boot_config::boot::{BootRecord, ImageSlot, ImageStatus};
use log::debug;
use platform_hil::{FlashPartition, FlashStorage, PartitionPos};

use crate::UpdateError;

/// Sectors erased by `UpdateSession::open` before the first write.
const EAGER_ERASE_SECTORS: usize = 2;

/// Picks the update slot the next transfer is written to.
///
/// Normally the slot that is not active. While a candidate is still waiting for
/// verification its own slot is targeted again, so an interrupted update never
/// occupies both slots.
pub fn next_update_slot(record: &BootRecord) -> ImageSlot {
    let pending = record.status == ImageStatus::Check;
    match (record.active_image, pending) {
        (ImageSlot::UpdateSlot2, true) | (ImageSlot::UpdateSlot1, false) => {
            ImageSlot::UpdateSlot2
        }
        _ => ImageSlot::UpdateSlot1,
    }
}

/// An image transfer into one update slot.
///
/// Sectors are erased lazily as the write cursor reaches them, so every sector
/// is erased once and before its first byte is programmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSession {
    slot: ImageSlot,
    target: PartitionPos,
    sector_size: usize,
    image_size: usize,
    erased_sectors: usize,
    finished: bool,
}

impl UpdateSession {
    /// Opens a session on `target` and erases its leading sectors.
    pub(crate) fn open(
        flash: &dyn FlashStorage,
        slot: ImageSlot,
        target: PartitionPos,
        sector_size: usize,
    ) -> Result<Self, UpdateError> {
        if sector_size == 0
            || target.offset() % sector_size != 0
            || target.len() % sector_size != 0
        {
            return Err(UpdateError::MisalignedPartition(target.offset()));
        }
        let mut session = UpdateSession {
            slot,
            target,
            sector_size,
            image_size: 0,
            erased_sectors: 0,
            finished: false,
        };
        let eager = EAGER_ERASE_SECTORS.min(target.len() / sector_size);
        session.erase_through(flash, eager)?;
        Ok(session)
    }

    /// Appends `buf` to the image.
    ///
    /// Fails with `ImageTooLarge` before touching flash when `buf` would run past
    /// the end of the target partition.
    pub(crate) fn write(
        &mut self,
        flash: &dyn FlashStorage,
        buf: &[u8],
    ) -> Result<(), UpdateError> {
        if self.finished {
            return Err(UpdateError::NoSession);
        }
        let end = self
            .image_size
            .checked_add(buf.len())
            .filter(|end| *end <= self.target.len())
            .ok_or(UpdateError::ImageTooLarge {
                written: self.image_size,
                len: buf.len(),
                capacity: self.target.len(),
            })?;
        if buf.is_empty() {
            return Ok(());
        }

        self.erase_through(flash, end.div_ceil(self.sector_size))?;
        self.partition(flash)?.write(self.image_size, buf)?;
        self.image_size = end;
        Ok(())
    }

    fn erase_through(
        &mut self,
        flash: &dyn FlashStorage,
        sectors: usize,
    ) -> Result<(), UpdateError> {
        let partition = self.partition(flash)?;
        while self.erased_sectors < sectors {
            let offset = self.erased_sectors * self.sector_size;
            debug!("Erasing sector at 0x{:08x}", partition.base_offset() + offset);
            partition.erase(offset, self.sector_size)?;
            self.erased_sectors += 1;
        }
        Ok(())
    }

    fn partition<'f>(
        &self,
        flash: &'f dyn FlashStorage,
    ) -> Result<FlashPartition<'f>, UpdateError> {
        Ok(FlashPartition::from_pos(flash, "update", self.target)?)
    }

    pub(crate) fn close(&mut self) {
        self.finished = true;
    }

    pub fn slot(&self) -> ImageSlot {
        self.slot
    }

    pub fn target(&self) -> PartitionPos {
        self.target
    }

    /// Bytes written so far, which is also the write cursor.
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
