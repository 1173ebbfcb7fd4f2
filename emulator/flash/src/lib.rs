/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    In-memory NOR flash model used by the boot loader and updater tests.

--*/

mod sim_flash;

pub use sim_flash::{FaultKind, FlashOp, SimFlash};
