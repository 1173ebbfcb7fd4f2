// Licensed under the Apache-2.0 license

//! Platform abstraction shared by the boot loader and the application updater.

#![cfg_attr(target_os = "none", no_std)]

pub mod device;
pub mod flash;
pub mod partition;

pub use device::{
    DeviceIdentity, FatalErrorHandler, ImageLoader, Indicator, MonotonicClock, SafeBootPin,
    SystemControl,
};
pub use flash::{FlashDrvError, FlashStorage};
pub use partition::{FlashPartition, PartitionPos};
