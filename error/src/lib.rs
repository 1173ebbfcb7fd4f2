// Licensed under the Apache-2.0 license

//! Numeric error codes shared by the boot loader and the updater.
//!
//! Every code is non-zero so that `Result<(), BootError>` stays a single word and
//! a code can be handed directly to the fatal error handler.

#![cfg_attr(target_os = "none", no_std)]

use core::fmt;
use core::num::NonZeroU32;

#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct BootError(pub NonZeroU32);

macro_rules! boot_error_codes {
    ($($name:ident = $value:expr,)*) => {
        impl BootError {
            $(pub const $name: BootError = BootError::new_const($value);)*

            /// Returns the symbolic name of a known code.
            pub fn name(&self) -> Option<&'static str> {
                match self.0.get() {
                    $($value => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

boot_error_codes! {
    // Partition directory
    PARTITION_TABLE_INVALID = 0x0001_0001,
    PARTITION_TABLE_READ_FAILED = 0x0001_0002,
    NO_BOOTABLE_IMAGE = 0x0001_0003,
    IMAGE_HEADER_INVALID = 0x0001_0004,
    SCRATCH_BUFFER_TOO_SMALL = 0x0001_0005,

    // Boot record
    BOOT_RECORD_READ_FAILED = 0x0002_0001,
    BOOT_RECORD_ERASE_FAILED = 0x0002_0002,
    BOOT_RECORD_WRITE_FAILED = 0x0002_0003,
    BOOT_RECORD_REGION_TOO_SMALL = 0x0002_0004,

    // Device binding
    SIGNATURE_READ_FAILED = 0x0003_0001,
    SIGNATURE_MISMATCH = 0x0003_0002,

    // Raw flash access
    FLASH_READ_FAILED = 0x0004_0001,
    FLASH_WRITE_FAILED = 0x0004_0002,
    FLASH_ERASE_FAILED = 0x0004_0003,
    FLASH_OUT_OF_BOUNDS = 0x0004_0004,
}

impl BootError {
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("BootError cannot be 0"),
        }
    }

    pub fn code(&self) -> u32 {
        self.0.get()
    }
}

impl From<BootError> for u32 {
    fn from(err: BootError) -> u32 {
        err.0.get()
    }
}

impl From<BootError> for NonZeroU32 {
    fn from(err: BootError) -> NonZeroU32 {
        err.0
    }
}

impl fmt::Debug for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "BootError({name})"),
            None => write!(f, "BootError(0x{:08x})", self.0.get()),
        }
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:08x})", self.0.get()),
            None => write!(f, "unknown boot error 0x{:08x}", self.0.get()),
        }
    }
}

impl core::error::Error for BootError {}
