// Licensed under the Apache-2.0 license

//! Binary formats kept in flash: the partition table, the boot record, the
//! platform image header and the differential patch header.

#![cfg_attr(target_os = "none", no_std)]

mod boot_record;
mod image_header;
mod partition_table;
mod patch_header;

pub use boot_record::{BootRecordStore, RawBootRecord, BOOT_RECORD_SIZE};
pub use image_header::{
    FirmwareImageHeader, ImageVerifier, SegmentHeader, SegmentImageVerifier,
    IMAGE_HEADER_MAGIC, MAX_SEGMENTS,
};
pub use partition_table::{
    PartitionDirectory, PartitionEntry, PartitionUsage, PARTITION_END_MAGIC, PARTITION_ENTRY_SIZE,
    PARTITION_MAGIC, PARTITION_MD5_MAGIC, SUBTYPE_DATA_OTA, SUBTYPE_DATA_RF, SUBTYPE_DATA_WIFI,
    SUBTYPE_FACTORY, SUBTYPE_OTA_FLAG, SUBTYPE_OTA_MASK, SUBTYPE_TEST, TYPE_APP, TYPE_DATA,
};
pub use patch_header::{offtin, offtout, PatchHeader, PatchHeaderError, PatchLayout, PATCH_MAGIC};
