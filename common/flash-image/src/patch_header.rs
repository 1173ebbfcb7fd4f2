// Licensed under the Apache-2.0 license

use core::fmt;
use core::ops::Range;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const PATCH_MAGIC: [u8; 8] = *b"BSDIFF40";

/// Fixed header of a BSDIFF40 patch container.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PatchHeader {
    pub magic: [u8; 8],
    pub ctrl_len: [u8; 8],
    pub diff_len: [u8; 8],
    pub new_size: [u8; 8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchHeaderError {
    Truncated,
    BadMagic,
    /// A length is negative or the blocks do not fit in the container.
    BadLength,
}

impl fmt::Display for PatchHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchHeaderError::Truncated => f.write_str("patch shorter than its header"),
            PatchHeaderError::BadMagic => f.write_str("missing BSDIFF40 magic"),
            PatchHeaderError::BadLength => f.write_str("patch block lengths out of range"),
        }
    }
}

impl core::error::Error for PatchHeaderError {}

/// Byte ranges of the three compressed blocks within a patch container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchLayout {
    pub ctrl: Range<usize>,
    pub diff: Range<usize>,
    pub extra: Range<usize>,
    pub new_size: usize,
}

/// Decodes a bsdiff sign-magnitude 64-bit integer.
pub fn offtin(buf: [u8; 8]) -> i64 {
    let raw = u64::from_le_bytes(buf);
    let magnitude = (raw & !(1 << 63)) as i64;
    if raw & (1 << 63) != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encodes `value` in bsdiff sign-magnitude form.
pub fn offtout(value: i64) -> [u8; 8] {
    let magnitude = value.unsigned_abs() & !(1 << 63);
    let sign = if value < 0 { 1 << 63 } else { 0 };
    (magnitude | sign).to_le_bytes()
}

impl PatchHeader {
    pub const SIZE: usize = core::mem::size_of::<PatchHeader>();

    pub fn new(ctrl_len: usize, diff_len: usize, new_size: usize) -> Self {
        PatchHeader {
            magic: PATCH_MAGIC,
            ctrl_len: offtout(ctrl_len as i64),
            diff_len: offtout(diff_len as i64),
            new_size: offtout(new_size as i64),
        }
    }

    /// True when `bytes` starts with the patch container magic.
    pub fn is_patch(bytes: &[u8]) -> bool {
        bytes.starts_with(&PATCH_MAGIC)
    }

    /// Validates the header of `patch` and locates its three blocks.
    pub fn parse(patch: &[u8]) -> Result<PatchLayout, PatchHeaderError> {
        let (header, _) =
            PatchHeader::read_from_prefix(patch).map_err(|_| PatchHeaderError::Truncated)?;
        if header.magic != PATCH_MAGIC {
            return Err(PatchHeaderError::BadMagic);
        }
        let ctrl_len = Self::length(header.ctrl_len)?;
        let diff_len = Self::length(header.diff_len)?;
        let new_size = Self::length(header.new_size)?;

        let ctrl_end = Self::SIZE
            .checked_add(ctrl_len)
            .ok_or(PatchHeaderError::BadLength)?;
        let diff_end = ctrl_end
            .checked_add(diff_len)
            .ok_or(PatchHeaderError::BadLength)?;
        if diff_end > patch.len() {
            return Err(PatchHeaderError::BadLength);
        }
        Ok(PatchLayout {
            ctrl: Self::SIZE..ctrl_end,
            diff: ctrl_end..diff_end,
            extra: diff_end..patch.len(),
            new_size,
        })
    }

    fn length(raw: [u8; 8]) -> Result<usize, PatchHeaderError> {
        usize::try_from(offtin(raw)).map_err(|_| PatchHeaderError::BadLength)
    }
}
