/*++

Licensed under the Apache-2.0 license.

File Name:

    boot_flow.rs

Abstract:

    OTA Boot Flow - Selects, verifies and starts a firmware image on every reset

--*/

use crate::image_verifier::{compute_signature, hex_digest, verify_image};
use crate::safe_boot::{SafeBootMenu, SafeBootSelection};
use crate::RomEnv;
use boot_config::boot::{BootRecord, ImageSlot, ImageStatus, SafeBootFlags};
use boot_config::color;
use boot_error::BootError;
use flash_image::{BootRecordStore, FirmwareImageHeader, PartitionDirectory};
use platform_hil::PartitionPos;

pub trait BootFlow {
    /// Execute the boot flow
    fn run(env: &mut RomEnv) -> !;
}

/// Outcome of the boot decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootDecision {
    pub slot: ImageSlot,
    pub partition: PartitionPos,
    /// The record as persisted, `None` when the table has no update-state partition.
    pub record: Option<BootRecord>,
    pub safe_boot: SafeBootSelection,
}

pub struct OtaBoot {}

impl OtaBoot {
    /// Runs the decision engine without handing off control.
    ///
    /// Every error returned here is fatal for the boot path.
    pub fn decide(env: &mut RomEnv) -> Result<BootDecision, BootError> {
        let header =
            FirmwareImageHeader::read_from_flash(env.flash, env.layout.loader_header_offset as usize)
                .map_err(|_| BootError::FLASH_READ_FAILED)?;
        if !header.verify() {
            log::error!("Invalid loader image header");
            return Err(BootError::IMAGE_HEADER_INVALID);
        }
        log::info!(
            "Loader image: {} segments, SPI mode {}, entry 0x{:08x}",
            header.segment_count,
            header.spi_mode,
            header.entry_addr.get()
        );

        let directory = PartitionDirectory::load(env.flash, &env.layout)?;

        let Some(state_region) = directory.update_state() else {
            let partition = directory
                .image(ImageSlot::Factory)
                .ok_or(BootError::NO_BOOTABLE_IMAGE)?;
            log::warn!("No OTA data partition, booting the factory image");
            return Ok(BootDecision {
                slot: ImageSlot::Factory,
                partition,
                record: None,
                safe_boot: SafeBootSelection::NotRequested,
            });
        };

        let store = BootRecordStore::new(env.flash, state_region, &env.layout)?;
        let mut record = store.read_or_init()?;

        if record.active_image != ImageSlot::Factory && record.status == ImageStatus::Check {
            Self::check_candidate(env, &directory, &mut record);
            store.write(&record)?;
        }

        log::info!("Checking safe boot pin");
        let selection = SafeBootMenu::new(env.timing).run(
            &mut *env.clock,
            &mut *env.safe_boot_pin,
            &mut *env.indicator,
        );
        // The image override only applies to this boot.
        let slot = match selection {
            SafeBootSelection::NotRequested | SafeBootSelection::ActiveImage => {
                record.active_image
            }
            SafeBootSelection::PreviousImage => record.previous_image,
            SafeBootSelection::FactoryImage => ImageSlot::Factory,
        };
        // A software request stays set until the application clears it.
        let mut safeboot = record.safeboot & SafeBootFlags::SOFTWARE_REQUESTED;
        if selection.is_requested() {
            safeboot |= SafeBootFlags::HARDWARE_REQUESTED;
        }
        if safeboot != record.safeboot {
            record.safeboot = safeboot;
            store.write(&record)?;
        }

        Self::bind_signature(env, &store, &mut record)?;

        let partition = directory.image(slot).ok_or_else(|| {
            log::error!("Selected image {slot:?} has no partition");
            BootError::NO_BOOTABLE_IMAGE
        })?;
        Ok(BootDecision {
            slot,
            partition,
            record: Some(record),
            safe_boot: selection,
        })
    }

    /// Verifies a candidate image, rolling back on failure. The result is not persisted.
    fn check_candidate(env: &mut RomEnv, directory: &PartitionDirectory, record: &mut BootRecord) {
        let verified = match directory.image(record.active_image) {
            Some(partition) => {
                verify_image(env.flash, &env.layout, partition, record.size, env.scratch)
            }
            None => false,
        };
        if verified {
            log::info!("Image {:?} verified", record.active_image);
        } else {
            log::warn!(
                "Image {:?} failed verification, rolling back to {:?}",
                record.active_image,
                record.previous_image
            );
            record.active_image = record.previous_image;
            record.previous_image = ImageSlot::Factory;
        }
        record.status = ImageStatus::Ready;
    }

    fn bind_signature(
        env: &mut RomEnv,
        store: &BootRecordStore,
        record: &mut BootRecord,
    ) -> Result<(), BootError> {
        let signature = compute_signature(env.flash, &env.layout, env.identity, env.scratch)?;
        let mut hex = [0u8; 32];
        if !record.has_signature() {
            log::info!("Writing the signature {}", hex_digest(&signature, &mut hex));
            record.signature = signature;
            store.write(record)?;
        } else if record.signature != signature {
            log::error!("Signature mismatch {}", hex_digest(&signature, &mut hex));
            return Err(BootError::SIGNATURE_MISMATCH);
        } else {
            log::info!("Signature OK");
        }
        Ok(())
    }
}

impl BootFlow for OtaBoot {
    fn run(env: &mut RomEnv) -> ! {
        match Self::decide(env) {
            Ok(decision) => {
                log::info!(
                    "Loading app partition at offset {:08x}",
                    decision.partition.offset
                );
                env.loader.load_and_start(decision.partition)
            }
            Err(err) => {
                log::error!("Boot halted: {err}");
                env.indicator.set_color(color::FATAL);
                env.fatal.fatal_error(err.into())
            }
        }
    }
}

/// Boot loader entry point. Never returns.
pub fn boot(env: &mut RomEnv) -> ! {
    OtaBoot::run(env)
}
