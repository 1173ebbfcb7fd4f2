// Licensed under the Apache-2.0 license

#![cfg_attr(target_os = "none", no_std)]

pub mod boot;

/// Configures where the boot loader finds its fixed-location structures in flash.
/// These are the defaults that can be overridden by a board definition.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLayout {
    /// Erase granularity of the flash device.
    pub sector_size: u32,
    /// Offset of the second-stage loader's own image header.
    pub loader_header_offset: u32,
    /// Start of the boot-critical region hashed into the device signature.
    pub signature_region_offset: u32,
    pub signature_region_size: u32,
    pub partition_table_offset: u32,
    pub partition_table_size: u32,
    /// Offset of the boot record inside the update-state partition.
    pub record_offset_in_partition: u32,
}

impl Default for FlashLayout {
    fn default() -> Self {
        FlashLayout {
            sector_size: 0x1000,
            loader_header_offset: 0x1000,
            signature_region_offset: 0x3000,
            signature_region_size: 0x3000,
            partition_table_offset: 0x8000,
            partition_table_size: 0x1000,
            record_offset_in_partition: 0,
        }
    }
}

impl FlashLayout {
    pub fn sector_size(&self) -> usize {
        self.sector_size as usize
    }

    /// Returns the start address of the sector containing `address`.
    pub fn sector_base(&self, address: usize) -> usize {
        address - (address % self.sector_size())
    }
}

/// Timing of the three-tier safe boot menu, in milliseconds.
///
/// A tier blinks the indicator every `*_blink_ms` for at most `*_ms` while the
/// safe boot input is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeBootTiming {
    pub debounce_ms: u32,
    pub tier1_ms: u32,
    pub tier1_blink_ms: u32,
    pub tier2_ms: u32,
    pub tier2_blink_ms: u32,
    pub tier3_ms: u32,
    pub tier3_blink_ms: u32,
}

impl Default for SafeBootTiming {
    fn default() -> Self {
        SafeBootTiming {
            debounce_ms: 100,
            tier1_ms: 3000,
            tier1_blink_ms: 500,
            tier2_ms: 3000,
            tier2_blink_ms: 250,
            tier3_ms: 1500,
            tier3_blink_ms: 100,
        }
    }
}

/// RGB colors shown on the status indicator.
pub mod color {
    pub const OFF: u32 = 0x00_0000;
    pub const SAFE_BOOT: u32 = 0x2C_1200;
    pub const FATAL: u32 = 0x50_0000;
}
