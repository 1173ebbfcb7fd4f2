// Licensed under the Apache-2.0 license

use boot_config::boot::ImageSlot;
use boot_error::BootError;
use flash_image::PatchHeaderError;
use platform_hil::FlashDrvError;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    #[error("no update session is open")]
    NoSession,

    #[error("partition table has no update-state partition")]
    NoUpdateState,

    #[error("partition table has no partition for {0:?}")]
    MissingSlot(ImageSlot),

    #[error("partition at 0x{0:08x} is not sector aligned")]
    MisalignedPartition(usize),

    #[error("image does not fit the target partition ({written} + {len} > {capacity})")]
    ImageTooLarge {
        written: usize,
        len: usize,
        capacity: usize,
    },

    #[error("stored boot record is invalid")]
    InvalidRecord,

    #[error("staged image failed verification")]
    VerificationFailed,

    #[error("flash access failed: {0}")]
    Flash(#[from] FlashDrvError),

    #[error("boot record access failed: {0}")]
    Record(#[from] BootError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchError {
    #[error("no patch is staged")]
    NotPending,

    #[error("invalid patch header: {0}")]
    Header(#[from] PatchHeaderError),

    #[error("patch is corrupt: {0}")]
    Corrupt(&'static str),

    #[error("patch stream failed to decompress")]
    Decompress,

    #[error(transparent)]
    Update(#[from] UpdateError),
}

impl From<FlashDrvError> for PatchError {
    fn from(err: FlashDrvError) -> Self {
        PatchError::Update(err.into())
    }
}

impl From<BootError> for PatchError {
    fn from(err: BootError) -> Self {
        PatchError::Update(err.into())
    }
}
