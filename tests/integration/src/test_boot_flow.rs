// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{boot_with, device_signature, reboot};
    use boot_config::boot::{BootRecord, ImageSlot, ImageStatus, SafeBootFlags};
    use boot_config::color;
    use boot_error::BootError;
    use boot_testing::{
        app_image, read_record, record_store, signed_image, standard_flash, write_record, Devices,
        Exit, FixedIdentity, FACTORY, OTA_0, OTA_1,
    };
    use emulator_flash::SimFlash;
    use flash_image::BOOT_RECORD_SIZE;

    /// An image whose trailer does not match its contents.
    fn unsigned_image(seed: u64, total_len: usize) -> Vec<u8> {
        let mut image = app_image(seed, total_len - 64);
        image.extend_from_slice(&[b'0'; 32]);
        assert_eq!(image.len(), total_len);
        image
    }

    fn bound(flash: &SimFlash, record: BootRecord) -> BootRecord {
        BootRecord {
            signature: device_signature(flash),
            ..record
        }
    }

    #[test]
    fn test_failed_candidate_rolls_back_to_factory() {
        let flash = standard_flash();
        flash.load(OTA_0.offset(), &unsigned_image(1, 200_000));
        write_record(
            &flash,
            &BootRecord {
                active_image: ImageSlot::UpdateSlot1,
                previous_image: ImageSlot::Factory,
                status: ImageStatus::Check,
                size: 200_000,
                ..BootRecord::first_boot()
            },
        );

        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        let record = read_record(&flash).unwrap();
        assert_eq!(record.active_image, ImageSlot::Factory);
        assert_eq!(record.previous_image, ImageSlot::Factory);
        assert_eq!(record.status, ImageStatus::Ready);
    }

    #[test]
    fn test_rollback_returns_to_previous_image() {
        let cases = [
            (ImageSlot::UpdateSlot1, ImageSlot::UpdateSlot2, OTA_1),
            (ImageSlot::UpdateSlot2, ImageSlot::UpdateSlot1, OTA_0),
            (ImageSlot::UpdateSlot2, ImageSlot::Factory, FACTORY),
        ];
        for (active, previous, expected) in cases {
            let flash = standard_flash();
            let target = if active == ImageSlot::UpdateSlot1 { OTA_0 } else { OTA_1 };
            let mut image = signed_image(&app_image(4, 0x3000));
            // Any change to the body invalidates the trailer.
            image[0x100] ^= 0x01;
            flash.load(target.offset(), &image);
            write_record(
                &flash,
                &BootRecord {
                    active_image: active,
                    previous_image: previous,
                    status: ImageStatus::Check,
                    size: image.len() as u32,
                    ..BootRecord::first_boot()
                },
            );

            assert_eq!(reboot(&flash), Exit::Started(expected));
            let record = read_record(&flash).unwrap();
            assert_eq!(record.active_image, previous);
            assert_eq!(record.previous_image, ImageSlot::Factory);
            assert_eq!(record.status, ImageStatus::Ready);
        }
    }

    #[test]
    fn test_oversized_claim_rolls_back() {
        let flash = standard_flash();
        let image = signed_image(&app_image(4, 0x3000));
        flash.load(OTA_0.offset(), &image);
        write_record(
            &flash,
            &BootRecord {
                active_image: ImageSlot::UpdateSlot1,
                status: ImageStatus::Check,
                size: OTA_0.len() as u32 + 1,
                ..BootRecord::first_boot()
            },
        );
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
    }

    #[test]
    fn test_first_boot_init_is_idempotent() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        let first = read_record(&flash).unwrap();
        assert_eq!(
            first,
            BootRecord {
                signature: device_signature(&flash),
                ..BootRecord::first_boot()
            }
        );

        for _ in 0..3 {
            flash.blank(record_store(&flash).address()..record_store(&flash).address() + 0x1000);
            assert_eq!(read_record(&flash), None);
            assert_eq!(reboot(&flash), Exit::Started(FACTORY));
            assert_eq!(read_record(&flash), Some(first));
        }
    }

    #[test]
    fn test_corrupt_record_is_reinitialized() {
        let flash = standard_flash();
        let stored = bound(
            &flash,
            BootRecord {
                active_image: ImageSlot::UpdateSlot2,
                previous_image: ImageSlot::UpdateSlot1,
                size: 0x4000,
                ..BootRecord::first_boot()
            },
        );
        let address = record_store(&flash).address();
        for offset in 0..BOOT_RECORD_SIZE {
            write_record(&flash, &stored);
            flash.corrupt(address + offset, 0x10);
            assert_eq!(read_record(&flash), None, "byte {offset}");
        }

        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        assert_eq!(read_record(&flash).unwrap().active_image, ImageSlot::Factory);
    }

    #[test]
    fn test_foreign_device_is_rejected() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));

        let mut devices = Devices::default();
        devices.identity = FixedIdentity([0x24, 0x0a, 0xc4, 0x00, 0x00, 0x01]);
        assert_eq!(
            boot_with(&flash, &mut devices),
            Exit::Fatal(BootError::SIGNATURE_MISMATCH.code())
        );
        assert_eq!(devices.indicator.last(), Some(color::FATAL));
    }

    #[test]
    fn test_modified_loader_is_rejected() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));

        // A byte inside the signature region but past the loader header.
        flash.corrupt(0x4000, 0x01);
        assert_eq!(
            reboot(&flash),
            Exit::Fatal(BootError::SIGNATURE_MISMATCH.code())
        );
    }

    #[test]
    fn test_safe_boot_tiers() {
        let flash = standard_flash();
        let stored = bound(
            &flash,
            BootRecord {
                active_image: ImageSlot::UpdateSlot2,
                previous_image: ImageSlot::UpdateSlot1,
                size: 0x4000,
                ..BootRecord::first_boot()
            },
        );
        write_record(&flash, &stored);

        let cases = [
            (0, OTA_1, SafeBootFlags::NONE),
            (50, OTA_1, SafeBootFlags::NONE),
            (1_000, OTA_1, SafeBootFlags::HARDWARE_REQUESTED),
            (4_000, OTA_0, SafeBootFlags::HARDWARE_REQUESTED),
            (6_200, FACTORY, SafeBootFlags::HARDWARE_REQUESTED),
            (60_000, FACTORY, SafeBootFlags::HARDWARE_REQUESTED),
        ];
        for (hold_ms, partition, flags) in cases {
            let mut devices = Devices::with_hold(hold_ms);
            assert_eq!(
                boot_with(&flash, &mut devices),
                Exit::Started(partition),
                "hold {hold_ms} ms"
            );
            assert_eq!(
                read_record(&flash),
                Some(BootRecord {
                    safeboot: flags,
                    ..stored
                }),
                "hold {hold_ms} ms"
            );
            if flags.is_empty() {
                assert!(devices.indicator.colors.is_empty());
            } else {
                assert_eq!(devices.indicator.last(), Some(color::OFF));
            }
        }
    }

    #[test]
    fn test_missing_update_slot_is_fatal() {
        use boot_testing::{flash_with_entries, standard_entries};
        use flash_image::PartitionUsage;

        let entries: Vec<_> = standard_entries()
            .into_iter()
            .filter(|entry| entry.usage() != PartitionUsage::OtaSlot(1))
            .collect();
        let flash = flash_with_entries(&entries);
        flash.load(FACTORY.offset(), &boot_testing::factory_image());
        write_record(
            &flash,
            &BootRecord {
                active_image: ImageSlot::UpdateSlot2,
                ..BootRecord::first_boot()
            },
        );
        assert_eq!(
            reboot(&flash),
            Exit::Fatal(BootError::NO_BOOTABLE_IMAGE.code())
        );
    }
}
