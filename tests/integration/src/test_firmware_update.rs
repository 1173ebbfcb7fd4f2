// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::reboot;
    use boot_config::boot::{BootRecord, ImageSlot, ImageStatus, SafeBootFlags};
    use boot_config::FlashLayout;
    use boot_testing::{
        app_image, catch_exit, pseudo_random, read_record, signed_image, standard_flash, Exit,
        ExitControl, FACTORY, OTA_0, OTA_1, SECTOR_SIZE,
    };
    use emulator_flash::{FlashOp, SimFlash};
    use ota_updater::{FinishOutcome, UpdateError, Updater};

    fn transfer(flash: &SimFlash, image: &[u8], chunk: usize) -> FinishOutcome {
        let mut updater = Updater::new(flash, FlashLayout::default()).unwrap();
        updater.start().unwrap();
        for part in image.chunks(chunk) {
            updater.write(part).unwrap();
        }
        updater.verify().unwrap();
        updater.finish().unwrap()
    }

    #[test]
    fn test_two_writes_erase_three_sectors() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        flash.clear_ops();

        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        updater.start().unwrap();
        updater.write(&[0xa5; 5000]).unwrap();
        updater.write(&[0x5a; 5000]).unwrap();

        let expected: Vec<(usize, usize)> = (0..3)
            .map(|i| (OTA_0.offset() + i * SECTOR_SIZE, SECTOR_SIZE))
            .collect();
        assert_eq!(flash.erases(), expected);
    }

    #[test]
    fn test_erase_happens_once_and_before_programming() {
        let flash = standard_flash();
        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        flash.clear_ops();
        updater.start().unwrap();

        let sectors = 9;
        let data = pseudo_random(77, sectors * SECTOR_SIZE);
        let mut cursor = 0;
        for len in [1usize, 4095, 1, 3000, 10_000, 7, 2 * SECTOR_SIZE, 333]
            .iter()
            .cycle()
        {
            if cursor == data.len() {
                break;
            }
            let end = (cursor + len).min(data.len());
            updater.write(&data[cursor..end]).unwrap();
            cursor = end;
        }

        let mut erased = vec![0usize; sectors];
        let mut programmed = vec![false; sectors];
        for op in flash.ops() {
            match op {
                FlashOp::Erase { address, len } => {
                    assert_eq!(len, SECTOR_SIZE);
                    let sector = (address - OTA_0.offset()) / SECTOR_SIZE;
                    assert!(!programmed[sector], "sector {sector} erased after write");
                    erased[sector] += 1;
                }
                FlashOp::Write { address, len } if OTA_0.contains(address) => {
                    let first = (address - OTA_0.offset()) / SECTOR_SIZE;
                    let last = (address + len - 1 - OTA_0.offset()) / SECTOR_SIZE;
                    for sector in first..=last {
                        assert_eq!(erased[sector], 1, "sector {sector} written before erase");
                        programmed[sector] = true;
                    }
                }
                _ => {}
            }
        }
        assert_eq!(erased, vec![1; sectors]);
        assert!(flash.program_violations().is_empty());
        assert_eq!(flash.bytes(OTA_0.offset()..OTA_0.offset() + data.len()), data);
    }

    #[test]
    fn test_update_reboot_and_second_update() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));

        let first = signed_image(&app_image(100, 40_000));
        assert_eq!(
            transfer(&flash, &first, 1460),
            FinishOutcome::Activated(ImageSlot::UpdateSlot1)
        );
        assert_eq!(read_record(&flash).unwrap().status, ImageStatus::Check);
        assert_eq!(reboot(&flash), Exit::Started(OTA_0));
        let record = read_record(&flash).unwrap();
        assert_eq!(record.active_image, ImageSlot::UpdateSlot1);
        assert_eq!(record.previous_image, ImageSlot::Factory);
        assert_eq!(record.status, ImageStatus::Ready);
        assert_eq!(record.size as usize, first.len());

        let second = signed_image(&app_image(200, 50_000));
        assert_eq!(
            transfer(&flash, &second, 4096),
            FinishOutcome::Activated(ImageSlot::UpdateSlot2)
        );
        assert_eq!(reboot(&flash), Exit::Started(OTA_1));
        let record = read_record(&flash).unwrap();
        assert_eq!(record.active_image, ImageSlot::UpdateSlot2);
        assert_eq!(record.previous_image, ImageSlot::UpdateSlot1);

        // A third image that is damaged in transit falls back to the second one.
        let mut third = signed_image(&app_image(300, 30_000));
        third[500] ^= 0xff;
        assert_eq!(
            transfer(&flash, &third, 1000),
            FinishOutcome::Activated(ImageSlot::UpdateSlot1)
        );
        assert_eq!(reboot(&flash), Exit::Started(OTA_1));
        let record = read_record(&flash).unwrap();
        assert_eq!(record.active_image, ImageSlot::UpdateSlot2);
        assert_eq!(record.previous_image, ImageSlot::Factory);
        assert_eq!(record.status, ImageStatus::Ready);
    }

    #[test]
    fn test_interrupted_transfer_keeps_running_image() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        let before = read_record(&flash);

        let image = signed_image(&app_image(5, 20_000));
        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        updater.start().unwrap();
        updater.write(&image[..9_000]).unwrap();
        drop(updater);

        assert_eq!(read_record(&flash), before);
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
    }

    #[test]
    fn test_new_transfer_while_candidate_pending() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        let first = signed_image(&app_image(1, 20_000));
        transfer(&flash, &first, 2048);
        let pending = read_record(&flash).unwrap();
        assert_eq!(pending.status, ImageStatus::Check);

        // Before rebooting, a second transfer lands on the unverified slot and
        // the boot record is left describing the first image.
        let second = signed_image(&app_image(2, 30_000));
        let updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        assert_eq!(updater.next_slot_address(), Ok(OTA_0.offset()));
        assert_eq!(transfer(&flash, &second, 2048), FinishOutcome::CheckPending);
        assert_eq!(read_record(&flash), Some(pending));

        // The stale size no longer matches the slot contents.
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        assert_eq!(
            read_record(&flash).unwrap().active_image,
            ImageSlot::Factory
        );
    }

    #[test]
    fn test_image_larger_than_slot() {
        let flash = standard_flash();
        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        updater.start().unwrap();
        updater.write(&vec![0; OTA_0.len() - 10]).unwrap();
        assert!(matches!(
            updater.write(&[0; 11]),
            Err(UpdateError::ImageTooLarge { .. })
        ));
        updater.write(&[0; 10]).unwrap();
    }

    #[test]
    fn test_boot_record_round_trip() {
        let flash = standard_flash();
        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        for active in ImageSlot::ALL {
            for previous in ImageSlot::ALL {
                for status in [ImageStatus::Check, ImageStatus::Ready, ImageStatus::Patch] {
                    for (size, safeboot) in [
                        (0, SafeBootFlags::NONE),
                        (u32::MAX, SafeBootFlags::all()),
                        (200_000, SafeBootFlags::SOFTWARE_REQUESTED),
                    ] {
                        let record = BootRecord {
                            active_image: active,
                            previous_image: previous,
                            status,
                            size,
                            safeboot,
                            signature: [size as u8; 16],
                        };
                        updater.write_boot_record(&record).unwrap();
                        assert_eq!(updater.read_boot_record(), Ok(record));
                    }
                }
            }
        }
    }

    #[test]
    fn test_software_safe_boot_request() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));

        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        assert_eq!(
            catch_exit(|| updater.request_safe_boot(&mut ExitControl, true)),
            Exit::Reset
        );
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        assert_eq!(
            read_record(&flash).unwrap().safeboot,
            SafeBootFlags::SOFTWARE_REQUESTED
        );

        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        updater.clear_safe_boot().unwrap();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        assert_eq!(read_record(&flash).unwrap().safeboot, SafeBootFlags::NONE);
    }
}
