/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Second-stage boot loader: image selection, rollback and device binding.

--*/

#![cfg_attr(target_os = "none", no_std)]

mod boot_flow;
pub use boot_flow::{boot, BootDecision, BootFlow, OtaBoot};
pub mod image_verifier;
pub use image_verifier::{compute_signature, verify_image, Signature, HASH_TRAILER_LEN};
mod rom_env;
pub use rom_env::*;
mod safe_boot;
pub use safe_boot::{MenuPoll, SafeBootMenu, SafeBootSelection};
