// Licensed under the Apache-2.0 license

//! Flash images laid out the way a production device ships.

use boot_config::boot::BootRecord;
use boot_config::FlashLayout;
use emulator_flash::SimFlash;
use flash_image::{
    BootRecordStore, FirmwareImageHeader, PartitionEntry, SegmentHeader, SUBTYPE_DATA_OTA,
    SUBTYPE_DATA_WIFI, SUBTYPE_FACTORY, SUBTYPE_OTA_FLAG, TYPE_APP, TYPE_DATA,
};
use platform_hil::PartitionPos;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use zerocopy::byteorder::U32;
use zerocopy::IntoBytes;

pub const FLASH_SIZE: usize = 0x20_0000;
pub const SECTOR_SIZE: usize = 0x1000;

pub const NVS: PartitionPos = PartitionPos::new(0x9000, 0x4000);
pub const OTA_DATA: PartitionPos = PartitionPos::new(0xd000, 0x2000);
pub const FACTORY: PartitionPos = PartitionPos::new(0x1_0000, 0x8_0000);
pub const OTA_0: PartitionPos = PartitionPos::new(0x9_0000, 0x8_0000);
pub const OTA_1: PartitionPos = PartitionPos::new(0x11_0000, 0x8_0000);

const LOADER_SEED: u64 = 0x6c6f_6164;
const FACTORY_SEED: u64 = 0xfac7;

pub fn pseudo_random(seed: u64, len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut bytes);
    bytes
}

pub fn standard_entries() -> Vec<PartitionEntry> {
    vec![
        PartitionEntry::new(TYPE_DATA, SUBTYPE_DATA_WIFI, NVS, "nvs"),
        PartitionEntry::new(TYPE_DATA, SUBTYPE_DATA_OTA, OTA_DATA, "otadata"),
        PartitionEntry::new(TYPE_APP, SUBTYPE_FACTORY, FACTORY, "factory"),
        PartitionEntry::new(TYPE_APP, SUBTYPE_OTA_FLAG, OTA_0, "ota_0"),
        PartitionEntry::new(TYPE_APP, SUBTYPE_OTA_FLAG | 1, OTA_1, "ota_1"),
    ]
}

/// Serializes `entries` followed by the MD5 checksum entry.
pub fn partition_table(entries: &[PartitionEntry]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut hasher = md5::Context::new();
    for entry in entries {
        hasher.consume(entry.as_bytes());
        bytes.extend_from_slice(entry.as_bytes());
    }
    bytes.extend_from_slice(&PartitionEntry::checksum_entry(hasher.compute().0));
    bytes
}

/// A single-segment firmware image with `payload_len` bytes of seeded data.
pub fn app_image(seed: u64, payload_len: usize) -> Vec<u8> {
    let mut bytes = FirmwareImageHeader::new(1, 0x400d_0018).as_bytes().to_vec();
    let segment = SegmentHeader {
        load_addr: U32::new(0x400d_0000),
        data_len: U32::new(payload_len as u32),
    };
    bytes.extend_from_slice(segment.as_bytes());
    bytes.extend_from_slice(&pseudo_random(seed, payload_len));
    bytes
}

/// Appends the lowercase hex MD5 trailer the boot loader checks.
pub fn signed_image(body: &[u8]) -> Vec<u8> {
    let mut trailer = [0u8; 32];
    hex::encode_to_slice(md5::compute(body).0, &mut trailer).expect("trailer size");
    let mut image = body.to_vec();
    image.extend_from_slice(&trailer);
    image
}

/// The second-stage loader image, which also covers the signature region.
pub fn loader_image() -> Vec<u8> {
    app_image(LOADER_SEED, 0x6000 - 32)
}

pub fn factory_image() -> Vec<u8> {
    signed_image(&app_image(FACTORY_SEED, 0x2_0000))
}

/// Flash with a loader and the given partition table, and nothing else.
pub fn flash_with_entries(entries: &[PartitionEntry]) -> SimFlash {
    let layout = FlashLayout::default();
    let flash = SimFlash::new(FLASH_SIZE);
    flash.load(layout.loader_header_offset as usize, &loader_image());
    flash.load(
        layout.partition_table_offset as usize,
        &partition_table(entries),
    );
    flash
}

/// Loader, standard partition table and factory image. The update-state partition is erased.
pub fn standard_flash() -> SimFlash {
    let flash = flash_with_entries(&standard_entries());
    flash.load(FACTORY.offset(), &factory_image());
    flash
}

pub fn record_store(flash: &SimFlash) -> BootRecordStore<'_> {
    BootRecordStore::new(flash, OTA_DATA, &FlashLayout::default()).expect("update-state region")
}

pub fn write_record(flash: &SimFlash, record: &BootRecord) {
    record_store(flash).write(record).expect("write record");
}

pub fn read_record(flash: &SimFlash) -> Option<BootRecord> {
    record_store(flash).read().expect("read record")
}
