// Licensed under the Apache-2.0 license

//! Fake platform devices and flash fixtures shared by the boot loader, updater
//! and integration tests.

pub mod devices;
pub mod fixtures;
pub mod patch;

pub use devices::*;
pub use fixtures::*;
pub use patch::PatchBuilder;

use log::LevelFilter;
use simple_logger::SimpleLogger;

pub fn init_logging() {
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
}
