/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Application side of the update flow: stages full images and patch
    containers into the spare update slot and hands the result to the boot
    loader through the boot record.

--*/

#![cfg_attr(all(not(test), not(feature = "patch")), no_std)]

mod error;
#[cfg(feature = "patch")]
mod patch;
mod session;
mod updater;

pub use error::{PatchError, UpdateError};
#[cfg(feature = "patch")]
pub use patch::PatchConfig;
pub use session::{next_update_slot, UpdateSession};
pub use updater::{FinishOutcome, Updater};
