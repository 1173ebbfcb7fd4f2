// Licensed under the Apache-2.0 license

mod test_boot_flow;
mod test_firmware_update;
mod test_patch_update;

#[cfg(test)]
mod test {
    use boot_config::{FlashLayout, SafeBootTiming};
    use boot_rom::{compute_signature, RomEnv};
    use boot_testing::{catch_exit, Devices, Exit, FixedIdentity};
    use emulator_flash::SimFlash;

    pub fn env<'a>(flash: &'a SimFlash, devices: &'a mut Devices) -> RomEnv<'a> {
        RomEnv {
            flash,
            safe_boot_pin: &mut devices.pin,
            indicator: &mut devices.indicator,
            clock: &mut devices.clock,
            identity: &devices.identity,
            loader: &mut devices.loader,
            fatal: &mut devices.fatal,
            scratch: &mut devices.scratch,
            layout: FlashLayout::default(),
            timing: SafeBootTiming::default(),
        }
    }

    /// Runs one boot with the given devices and reports how it ended.
    pub fn boot_with(flash: &SimFlash, devices: &mut Devices) -> Exit {
        boot_testing::init_logging();
        catch_exit(|| boot_rom::boot(&mut env(flash, devices)))
    }

    /// A power cycle with the safe boot input left alone.
    pub fn reboot(flash: &SimFlash) -> Exit {
        boot_with(flash, &mut Devices::default())
    }

    pub fn device_signature(flash: &SimFlash) -> [u8; 16] {
        let mut scratch = [0u8; 0x1000];
        compute_signature(
            flash,
            &FlashLayout::default(),
            &FixedIdentity::default(),
            &mut scratch,
        )
        .unwrap()
    }
}
