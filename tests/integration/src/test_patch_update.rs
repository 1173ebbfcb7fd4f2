// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::reboot;
    use boot_config::boot::{ImageSlot, ImageStatus};
    use boot_config::FlashLayout;
    use boot_testing::{
        app_image, factory_image, read_record, signed_image, standard_flash, Exit, PatchBuilder,
        FACTORY, OTA_0, OTA_1,
    };
    use emulator_flash::SimFlash;
    use ota_updater::{FinishOutcome, PatchConfig, PatchError, Updater};

    /// The factory image with a patched region and a new tail, re-signed.
    fn next_release(old: &[u8]) -> Vec<u8> {
        let body_len = old.len() - 32;
        let mut body = old[..body_len].to_vec();
        body[0x800..0x900].iter_mut().for_each(|b| *b = b.wrapping_add(3));
        body.extend_from_slice(&app_image(55, 0x1800)[32..]);
        signed_image(&body)
    }

    fn stage_patch(flash: &SimFlash, patch: &[u8]) {
        let mut updater = Updater::new(flash, FlashLayout::default()).unwrap();
        updater.start().unwrap();
        for chunk in patch.chunks(1024) {
            updater.write(chunk).unwrap();
        }
        assert_eq!(
            updater.finish(),
            Ok(FinishOutcome::PatchStaged(ImageSlot::UpdateSlot1))
        );
    }

    #[test]
    fn test_patch_update_end_to_end() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));

        let old = factory_image();
        let new = next_release(&old);
        stage_patch(&flash, &PatchBuilder::simple(&old, &new));

        // The boot loader leaves a staged patch alone and keeps the running image.
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        assert_eq!(read_record(&flash).unwrap().status, ImageStatus::Patch);

        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        assert!(updater.is_patch_pending());
        assert_eq!(
            updater.apply_patch(&PatchConfig::default()),
            Ok(FinishOutcome::Activated(ImageSlot::UpdateSlot1))
        );

        assert_eq!(reboot(&flash), Exit::Started(OTA_0));
        let record = read_record(&flash).unwrap();
        assert_eq!(record.active_image, ImageSlot::UpdateSlot1);
        assert_eq!(record.previous_image, ImageSlot::Factory);
        assert_eq!(record.status, ImageStatus::Ready);
        assert_eq!(record.size as usize, new.len());
        assert_eq!(flash.bytes(OTA_0.offset()..OTA_0.offset() + new.len()), new);
    }

    #[test]
    fn test_patch_output_is_deterministic() {
        let old = factory_image();
        let new = next_release(&old);
        // Old bytes past the image are whatever the factory partition holds.
        let old_partition = standard_flash().bytes(FACTORY.offset()..FACTORY.end());
        let patch = PatchBuilder::new(&old_partition)
            .triple(&new[..0x1000], b"", 0x100)
            .triple(&new[0x1000..0x2000], &new[0x2000..0x2100], -0x200)
            .triple(&new[0x2100..], b"", 0)
            .build();

        let mut runs = Vec::new();
        for window in [0x1000, 0x100, 17] {
            let flash = standard_flash();
            assert_eq!(reboot(&flash), Exit::Started(FACTORY));
            stage_patch(&flash, &patch);
            let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
            updater.apply_patch(&PatchConfig { window }).unwrap();
            let size = read_record(&flash).unwrap().size as usize;
            assert_eq!(size, new.len());
            runs.push(flash.bytes(OTA_0.offset()..OTA_0.offset() + size));
        }
        assert!(runs.iter().all(|run| *run == new));
    }

    #[test]
    fn test_patch_between_update_slots() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));

        // Full update into slot 1, then a patch against it lands in slot 2.
        let first = signed_image(&app_image(8, 24_000));
        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        updater.start().unwrap();
        updater.write(&first).unwrap();
        updater.finish().unwrap();
        assert_eq!(reboot(&flash), Exit::Started(OTA_0));

        let second = next_release(&first);
        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        updater.start().unwrap();
        updater.write(&PatchBuilder::simple(&first, &second)).unwrap();
        assert_eq!(
            updater.finish(),
            Ok(FinishOutcome::PatchStaged(ImageSlot::UpdateSlot2))
        );
        assert_eq!(
            updater.apply_patch(&PatchConfig::default()),
            Ok(FinishOutcome::Activated(ImageSlot::UpdateSlot2))
        );

        assert_eq!(reboot(&flash), Exit::Started(OTA_1));
        let record = read_record(&flash).unwrap();
        assert_eq!(record.active_image, ImageSlot::UpdateSlot2);
        assert_eq!(record.previous_image, ImageSlot::UpdateSlot1);
    }

    #[test]
    fn test_damaged_patch_keeps_current_image() {
        let flash = standard_flash();
        assert_eq!(reboot(&flash), Exit::Started(FACTORY));

        let old = factory_image();
        let mut patch = PatchBuilder::simple(&old, &next_release(&old));
        // Break the control stream's bzip2 signature.
        patch[32..35].copy_from_slice(b"XYZ");
        stage_patch(&flash, &patch);

        let mut updater = Updater::new(&flash, FlashLayout::default()).unwrap();
        assert_eq!(
            updater.apply_patch(&PatchConfig::default()),
            Err(PatchError::Decompress)
        );
        let record = read_record(&flash).unwrap();
        assert_eq!(record.status, ImageStatus::Ready);
        assert_eq!(record.active_image, ImageSlot::Factory);

        assert_eq!(reboot(&flash), Exit::Started(FACTORY));
        assert_eq!(
            updater.apply_patch(&PatchConfig::default()),
            Err(PatchError::NotPending)
        );
    }
}
