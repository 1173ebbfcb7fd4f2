// Licensed under the Apache-2.0 license

use boot_config::boot::{BootRecord, ImageSlot, ImageStatus, SafeBootFlags};
use boot_config::FlashLayout;
use flash_image::{
    BootRecordStore, ImageVerifier, PartitionDirectory, PatchHeader, SegmentImageVerifier,
    PATCH_MAGIC,
};
use log::{info, warn};
use platform_hil::{FlashStorage, PartitionPos, SystemControl};

use crate::session::{next_update_slot, UpdateSession};
use crate::UpdateError;

/// What `Updater::finish` did with the staged image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// The image is the new candidate and is verified on the next boot.
    Activated(ImageSlot),
    /// A patch container was staged; `apply_patch` builds the image.
    PatchStaged(ImageSlot),
    /// A candidate is still unverified, so the boot record was left alone.
    CheckPending,
}

/// Application-side update context.
///
/// Owns the flash handle, the partition directory, a cached copy of the boot
/// record and at most one open `UpdateSession`.
pub struct Updater<'a> {
    pub(crate) flash: &'a dyn FlashStorage,
    pub(crate) layout: FlashLayout,
    pub(crate) directory: PartitionDirectory,
    pub(crate) record: BootRecord,
    pub(crate) session: Option<UpdateSession>,
}

impl<'a> Updater<'a> {
    /// Loads the partition directory and the current boot record.
    ///
    /// An invalid record is treated as the first-boot record in memory; the next
    /// persisted change replaces it.
    pub fn new(flash: &'a dyn FlashStorage, layout: FlashLayout) -> Result<Self, UpdateError> {
        let directory = PartitionDirectory::load(flash, &layout)?;
        let mut updater = Updater {
            flash,
            layout,
            directory,
            record: BootRecord::first_boot(),
            session: None,
        };
        match updater.store()?.read()? {
            Some(record) => updater.record = record,
            None => warn!("Boot record invalid, assuming first boot"),
        }
        Ok(updater)
    }

    fn store(&self) -> Result<BootRecordStore<'a>, UpdateError> {
        let region = self
            .directory
            .update_state()
            .ok_or(UpdateError::NoUpdateState)?;
        Ok(BootRecordStore::new(self.flash, region, &self.layout)?)
    }

    pub(crate) fn slot_partition(&self, slot: ImageSlot) -> Result<PartitionPos, UpdateError> {
        self.directory
            .image(slot)
            .ok_or(UpdateError::MissingSlot(slot))
    }

    /// Re-reads the boot record from flash.
    pub fn read_boot_record(&mut self) -> Result<BootRecord, UpdateError> {
        let record = self.store()?.read()?.ok_or(UpdateError::InvalidRecord)?;
        self.record = record;
        Ok(record)
    }

    pub fn write_boot_record(&mut self, record: &BootRecord) -> Result<(), UpdateError> {
        self.store()?.write(record)?;
        self.record = *record;
        Ok(())
    }

    /// The boot record as last read or written.
    pub fn boot_record(&self) -> &BootRecord {
        &self.record
    }

    pub fn directory(&self) -> &PartitionDirectory {
        &self.directory
    }

    /// The slot `start` targets.
    pub fn next_slot(&self) -> ImageSlot {
        next_update_slot(&self.record)
    }

    /// Flash address of the partition `start` targets.
    pub fn next_slot_address(&self) -> Result<usize, UpdateError> {
        Ok(self.slot_partition(self.next_slot())?.offset())
    }

    /// Opens an update session on the next slot, replacing any open session.
    pub fn start(&mut self) -> Result<(), UpdateError> {
        if let Some(record) = self.store()?.read()? {
            self.record = record;
        }
        let slot = self.next_slot();
        self.start_on(slot)
    }

    pub(crate) fn start_on(&mut self, slot: ImageSlot) -> Result<(), UpdateError> {
        self.session = None;
        let target = self.slot_partition(slot)?;
        info!(
            "Update started on {:?} at 0x{:08x}",
            slot,
            target.offset()
        );
        self.session = Some(UpdateSession::open(
            self.flash,
            slot,
            target,
            self.layout.sector_size(),
        )?);
        Ok(())
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<(), UpdateError> {
        let session = self.session.as_mut().ok_or(UpdateError::NoSession)?;
        session.write(self.flash, buf)
    }

    /// Closes the session and hands the staged image to the boot loader.
    pub fn finish(&mut self) -> Result<FinishOutcome, UpdateError> {
        let session = self
            .session
            .as_mut()
            .filter(|session| !session.is_finished())
            .ok_or(UpdateError::NoSession)?;
        session.close();
        let slot = session.slot();
        let target = session.target();
        let image_size = session.image_size() as u32;

        if self.record.status == ImageStatus::Check {
            warn!(
                "{:?} is still pending verification, keeping boot record",
                self.record.active_image
            );
            return Ok(FinishOutcome::CheckPending);
        }

        let mut magic = [0u8; PATCH_MAGIC.len()];
        if image_size as usize >= magic.len() {
            self.flash.read(&mut magic, target.offset())?;
        }
        let mut record = self.record;
        let outcome = if PatchHeader::is_patch(&magic) {
            record.status = ImageStatus::Patch;
            record.size = image_size;
            info!("Patch of {} bytes staged in {:?}", image_size, slot);
            FinishOutcome::PatchStaged(slot)
        } else {
            record.previous_image = record.active_image;
            record.active_image = slot;
            record.status = ImageStatus::Check;
            record.size = image_size;
            info!("Image of {} bytes activated in {:?}", image_size, slot);
            FinishOutcome::Activated(slot)
        };
        self.write_boot_record(&record)?;
        Ok(outcome)
    }

    /// Runs the default segment verifier over the staged image.
    pub fn verify(&self) -> Result<(), UpdateError> {
        self.verify_with(&SegmentImageVerifier)
    }

    pub fn verify_with(&self, verifier: &dyn ImageVerifier) -> Result<(), UpdateError> {
        let session = self.session.as_ref().ok_or(UpdateError::NoSession)?;
        if verifier.verify_image(self.flash, session.target(), session.image_size()) {
            Ok(())
        } else {
            warn!("Staged image in {:?} failed verification", session.slot());
            Err(UpdateError::VerificationFailed)
        }
    }

    pub fn session(&self) -> Option<&UpdateSession> {
        self.session.as_ref()
    }

    pub fn is_patch_pending(&self) -> bool {
        self.record.status == ImageStatus::Patch
    }

    /// Asks the boot loader for a safe boot and optionally resets right away.
    pub fn request_safe_boot(
        &mut self,
        control: &mut dyn SystemControl,
        reset: bool,
    ) -> Result<(), UpdateError> {
        let mut record = self.record;
        record.safeboot.insert(SafeBootFlags::SOFTWARE_REQUESTED);
        if record != self.record {
            self.write_boot_record(&record)?;
        }
        info!("Safe boot requested");
        if reset {
            control.reset();
        }
        Ok(())
    }

    pub fn clear_safe_boot(&mut self) -> Result<(), UpdateError> {
        let mut record = self.record;
        record.safeboot.remove(SafeBootFlags::SOFTWARE_REQUESTED);
        if record != self.record {
            self.write_boot_record(&record)?;
        }
        Ok(())
    }
}
