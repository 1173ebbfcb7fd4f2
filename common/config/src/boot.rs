// Licensed under the Apache-2.0 license

use bitflags::bitflags;

/// Length of the device-binding signature stored in the boot record.
pub const SIGNATURE_LEN: usize = 16;

/// Signature value of a record whose signature was never written.
pub const ERASED_SIGNATURE: [u8; SIGNATURE_LEN] = [0xFF; SIGNATURE_LEN];

/// Firmware image slots, indexed the same way as the partition directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    Factory = 0x0000_0000,
    UpdateSlot1 = 0x0000_0001,
    UpdateSlot2 = 0x0000_0002,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 3] = [
        ImageSlot::Factory,
        ImageSlot::UpdateSlot1,
        ImageSlot::UpdateSlot2,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_update_slot(self) -> bool {
        self != ImageSlot::Factory
    }
}

impl core::convert::TryFrom<u32> for ImageSlot {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x0000_0000 => Ok(ImageSlot::Factory),
            0x0000_0001 => Ok(ImageSlot::UpdateSlot1),
            0x0000_0002 => Ok(ImageSlot::UpdateSlot2),
            _ => Err(()),
        }
    }
}

/// Life cycle of the image referenced by `BootRecord::active_image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageStatus {
    /// Candidate image, verified on the next boot.
    Check = 0x0000_0000,
    Ready = 0x0000_0001,
    /// A patch container is staged and waits for the patch applier.
    Patch = 0x0000_0002,
}

impl ImageStatus {
    /// Raw status value of an erased record.
    pub const ERASED: u32 = u32::MAX;
}

impl core::convert::TryFrom<u32> for ImageStatus {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x0000_0000 => Ok(ImageStatus::Check),
            0x0000_0001 => Ok(ImageStatus::Ready),
            0x0000_0002 => Ok(ImageStatus::Patch),
            _ => Err(()),
        }
    }
}

bitflags! {
    /// Safe boot requests recorded in the boot record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SafeBootFlags: u32 {
        const HARDWARE_REQUESTED = 0x01;
        const SOFTWARE_REQUESTED = 0x02;
    }
}

impl SafeBootFlags {
    pub const NONE: SafeBootFlags = SafeBootFlags::empty();
}

/// The persistent boot record, decoded.
///
/// The on-flash encoding and its CRC live in `flash-image`; this type only
/// carries values that decoded successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootRecord {
    pub active_image: ImageSlot,
    pub previous_image: ImageSlot,
    pub status: ImageStatus,
    /// Byte length of the image occupying the active update slot.
    pub size: u32,
    pub safeboot: SafeBootFlags,
    pub signature: [u8; SIGNATURE_LEN],
}

impl BootRecord {
    /// The record written when no valid record exists.
    pub const fn first_boot() -> Self {
        BootRecord {
            active_image: ImageSlot::Factory,
            previous_image: ImageSlot::Factory,
            status: ImageStatus::Ready,
            size: 0,
            safeboot: SafeBootFlags::NONE,
            signature: ERASED_SIGNATURE,
        }
    }

    pub fn has_signature(&self) -> bool {
        self.signature != ERASED_SIGNATURE
    }

    /// True while a candidate image waits for its first-boot verification.
    pub fn is_pending_check(&self) -> bool {
        self.status == ImageStatus::Check
    }
}

impl Default for BootRecord {
    fn default() -> Self {
        Self::first_boot()
    }
}
