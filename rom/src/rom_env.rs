/*++

Licensed under the Apache-2.0 license.

File Name:

    rom_env.rs

Abstract:

    Boot Environment - Encapsulates all peripherals and buffers used by the boot loader

--*/

use boot_config::{FlashLayout, SafeBootTiming};
use platform_hil::{
    DeviceIdentity, FatalErrorHandler, FlashStorage, ImageLoader, Indicator, MonotonicClock,
    SafeBootPin,
};

/// Boot environment containing all peripherals the decision engine touches.
///
/// The boot path runs before any allocator exists, so `scratch` is the only
/// working memory for chunked flash reads. It should be at least one sector long;
/// shorter buffers work but need more reads.
pub struct RomEnv<'a> {
    pub flash: &'a dyn FlashStorage,
    pub safe_boot_pin: &'a mut dyn SafeBootPin,
    pub indicator: &'a mut dyn Indicator,
    pub clock: &'a mut dyn MonotonicClock,
    pub identity: &'a dyn DeviceIdentity,
    pub loader: &'a mut dyn ImageLoader,
    pub fatal: &'a mut dyn FatalErrorHandler,
    pub scratch: &'a mut [u8],
    pub layout: FlashLayout,
    pub timing: SafeBootTiming,
}
