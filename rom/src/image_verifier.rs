// Licensed under the Apache-2.0 license

use boot_config::FlashLayout;
use boot_error::BootError;
use platform_hil::{DeviceIdentity, FlashStorage, PartitionPos};

/// Length of the lowercase hex MD5 appended to every update image.
pub const HASH_TRAILER_LEN: usize = 32;

pub type Signature = [u8; 16];

/// Formats `digest` as lowercase hex into `buf`.
pub(crate) fn hex_digest<'b>(digest: &[u8; 16], buf: &'b mut [u8; 32]) -> &'b str {
    if hex::encode_to_slice(digest, buf).is_err() {
        return "";
    }
    core::str::from_utf8(buf).unwrap_or("")
}

fn chunk_len(scratch: &[u8], layout: &FlashLayout) -> Result<usize, BootError> {
    match scratch.len().min(layout.sector_size()) {
        0 => Err(BootError::SCRATCH_BUFFER_TOO_SMALL),
        len => Ok(len),
    }
}

/// Computes the signature binding the flashed loader to this device.
///
/// MD5 over `signature_region_size` bytes at `signature_region_offset`, read a
/// sector at a time, followed by the MAC address. MD5 gives no protection against a
/// deliberate forgery; the construction is kept byte-for-byte so that records
/// written by earlier loaders still match.
pub fn compute_signature(
    flash: &dyn FlashStorage,
    layout: &FlashLayout,
    identity: &dyn DeviceIdentity,
    scratch: &mut [u8],
) -> Result<Signature, BootError> {
    let chunk = chunk_len(scratch, layout)?;
    let start = layout.signature_region_offset as usize;
    let len = layout.signature_region_size as usize;

    let mut hasher = md5::Context::new();
    let mut done = 0;
    while done < len {
        let n = (len - done).min(chunk);
        flash
            .read(&mut scratch[..n], start + done)
            .map_err(|_| BootError::SIGNATURE_READ_FAILED)?;
        hasher.consume(&scratch[..n]);
        done += n;
    }
    hasher.consume(identity.mac_address());
    Ok(hasher.compute().0)
}

/// Checks the MD5 trailer of the image at `partition`.
///
/// The last [`HASH_TRAILER_LEN`] bytes of the `claimed_size` bytes written must be
/// the lowercase hex MD5 of everything before them.
pub fn verify_image(
    flash: &dyn FlashStorage,
    layout: &FlashLayout,
    partition: PartitionPos,
    claimed_size: u32,
    scratch: &mut [u8],
) -> bool {
    let size = claimed_size as usize;
    log::info!(
        "Starting image verification at 0x{:08x}, {} bytes",
        partition.offset,
        size
    );
    if size < HASH_TRAILER_LEN || size > partition.len() {
        log::warn!("Image size {size} does not fit its partition");
        return false;
    }
    let Ok(chunk) = chunk_len(scratch, layout) else {
        return false;
    };

    let body = size - HASH_TRAILER_LEN;
    let mut hasher = md5::Context::new();
    let mut done = 0;
    while done < body {
        let n = (body - done).min(chunk);
        if flash
            .read(&mut scratch[..n], partition.offset() + done)
            .is_err()
        {
            log::error!("Flash read failed during image verification");
            return false;
        }
        hasher.consume(&scratch[..n]);
        done += n;
    }

    let mut trailer = [0u8; HASH_TRAILER_LEN];
    if flash.read(&mut trailer, partition.offset() + body).is_err() {
        log::error!("Flash read failed during image verification");
        return false;
    }

    let mut computed = [0u8; HASH_TRAILER_LEN];
    let computed = hex_digest(&hasher.compute().0, &mut computed);
    if computed.as_bytes() == trailer {
        log::info!("MD5 hash OK");
        true
    } else {
        log::warn!(
            "MD5 hash failed {} : {}",
            computed,
            core::str::from_utf8(&trailer).unwrap_or("<binary>")
        );
        false
    }
}
