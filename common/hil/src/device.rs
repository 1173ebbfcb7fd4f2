// Licensed under the Apache-2.0 license

//! Peripherals the boot loader and updater consume from the platform.

use crate::partition::PartitionPos;

/// The dedicated safe boot input.
pub trait SafeBootPin {
    /// Samples the input. `true` while the user holds the safe boot button.
    fn is_asserted(&mut self) -> bool;
}

/// A single RGB status indicator.
pub trait Indicator {
    fn set_color(&mut self, rgb: u32);
}

/// Millisecond time source. It never goes backwards.
pub trait MonotonicClock {
    fn now_ms(&self) -> u64;

    /// Busy-waits for at least `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Hardware identity mixed into the device signature.
pub trait DeviceIdentity {
    fn mac_address(&self) -> [u8; 6];
}

/// Maps the selected image and transfers control to it.
pub trait ImageLoader {
    fn load_and_start(&mut self, partition: PartitionPos) -> !;
}

pub trait FatalErrorHandler {
    fn fatal_error(&mut self, code: u32) -> !;
}

/// Device-level control path used by the application.
pub trait SystemControl {
    /// Performs a full system reset.
    fn reset(&mut self) -> !;

    /// Restarts into the mass-storage / serial flashing mode.
    fn enter_flash_mode(&mut self) -> !;
}
