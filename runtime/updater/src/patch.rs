// Licensed under the Apache-2.0 license

//! Rebuilds a full image from a staged BSDIFF40 container.
//!
//! The container is read back from the staging slot into RAM. The slot is then
//! rewritten with the reconstructed image through a regular update session, and
//! the result is activated exactly like a transferred image.

use std::io::Read;
use std::ops::Range;

use boot_config::boot::{BootRecord, ImageSlot, ImageStatus};
use bzip2::read::BzDecoder;
use flash_image::{offtin, PatchHeader};
use log::{debug, info, warn};
use platform_hil::PartitionPos;

use crate::{FinishOutcome, PatchError, UpdateError, Updater};

const CONTROL_TRIPLE_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchConfig {
    /// Bytes of diff, old and extra data handled per step.
    pub window: usize,
}

impl Default for PatchConfig {
    fn default() -> Self {
        PatchConfig { window: 0x1000 }
    }
}

struct PatchStreams<'p> {
    ctrl: BzDecoder<&'p [u8]>,
    diff: BzDecoder<&'p [u8]>,
    extra: BzDecoder<&'p [u8]>,
}

impl<'p> PatchStreams<'p> {
    fn open(patch: &'p [u8], ctrl: Range<usize>, diff: Range<usize>, extra: Range<usize>) -> Self {
        PatchStreams {
            ctrl: BzDecoder::new(&patch[ctrl]),
            diff: BzDecoder::new(&patch[diff]),
            extra: BzDecoder::new(&patch[extra]),
        }
    }

    fn next_triple(&mut self) -> Result<(i64, i64, i64), PatchError> {
        let mut buf = [0u8; CONTROL_TRIPLE_LEN];
        read_exact(&mut self.ctrl, &mut buf)?;
        let field = |i: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buf[i * 8..(i + 1) * 8]);
            offtin(bytes)
        };
        Ok((field(0), field(1), field(2)))
    }
}

fn read_exact(stream: &mut impl Read, buf: &mut [u8]) -> Result<(), PatchError> {
    stream.read_exact(buf).map_err(|err| {
        warn!("Patch stream error: {err}");
        PatchError::Decompress
    })
}

impl Updater<'_> {
    /// Applies the patch staged by `finish`.
    ///
    /// On failure the boot record is returned to `READY` without changing the
    /// active image, so the device keeps booting the image it runs now.
    pub fn apply_patch(&mut self, config: &PatchConfig) -> Result<FinishOutcome, PatchError> {
        let record = self.read_boot_record()?;
        if record.status != ImageStatus::Patch {
            return Err(PatchError::NotPending);
        }

        match self.rebuild(&record, config) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!("Patch failed: {err}, keeping {:?}", record.active_image);
                self.session = None;
                self.write_boot_record(&BootRecord {
                    status: ImageStatus::Ready,
                    ..record
                })?;
                Err(err)
            }
        }
    }

    fn rebuild(
        &mut self,
        record: &BootRecord,
        config: &PatchConfig,
    ) -> Result<FinishOutcome, PatchError> {
        let slot = self.next_slot();
        let staging = self.slot_partition(slot)?;
        let old = self.slot_partition(record.active_image)?;

        let patch_len = record.size as usize;
        if patch_len > staging.len() {
            return Err(PatchError::Corrupt("patch larger than its slot"));
        }
        let mut patch = vec![0u8; patch_len];
        self.flash.read(&mut patch, staging.offset())?;

        let layout = PatchHeader::parse(&patch)?;
        let new_size = layout.new_size;
        if new_size == 0 {
            return Err(PatchError::Corrupt("empty target image"));
        }
        if new_size > staging.len() {
            return Err(UpdateError::ImageTooLarge {
                written: 0,
                len: new_size,
                capacity: staging.len(),
            }
            .into());
        }
        info!(
            "Applying patch from {:?} into {:?}, {} -> {} bytes",
            record.active_image,
            slot,
            patch_len,
            new_size
        );

        let mut streams = PatchStreams::open(&patch, layout.ctrl, layout.diff, layout.extra);
        self.start_on(slot)?;

        let window = config.window.max(1);
        let mut data = vec![0u8; window];
        let mut old_data = vec![0u8; window];
        let mut new_pos = 0usize;
        let mut old_pos = 0i64;

        while new_pos < new_size {
            let (diff_len, extra_len, seek) = streams.next_triple()?;
            debug!("Patch triple ({diff_len}, {extra_len}, {seek}) at {new_pos}");
            let (Ok(diff_len), Ok(extra_len)) =
                (usize::try_from(diff_len), usize::try_from(extra_len))
            else {
                return Err(PatchError::Corrupt("negative block length"));
            };
            match new_pos
                .checked_add(diff_len)
                .and_then(|end| end.checked_add(extra_len))
            {
                Some(end) if end <= new_size => {}
                _ => return Err(PatchError::Corrupt("control triple overruns new size")),
            }

            let mut remaining = diff_len;
            while remaining > 0 {
                let n = remaining.min(window);
                let next_old = i64::try_from(n)
                    .ok()
                    .and_then(|n| old_pos.checked_add(n))
                    .ok_or(PatchError::Corrupt("old position overflow"))?;
                read_exact(&mut streams.diff, &mut data[..n])?;
                self.read_old(old, old_pos, &mut old_data[..n])?;
                for (byte, old_byte) in data[..n].iter_mut().zip(&old_data[..n]) {
                    *byte = byte.wrapping_add(*old_byte);
                }
                self.write(&data[..n])?;
                old_pos = next_old;
                new_pos += n;
                remaining -= n;
            }

            let mut remaining = extra_len;
            while remaining > 0 {
                let n = remaining.min(window);
                read_exact(&mut streams.extra, &mut data[..n])?;
                self.write(&data[..n])?;
                new_pos += n;
                remaining -= n;
            }

            old_pos = old_pos
                .checked_add(seek)
                .ok_or(PatchError::Corrupt("old position overflow"))?;
        }

        Ok(self.finish()?)
    }

    /// Reads old-image bytes at `pos`. Bytes outside the old partition read as zero.
    fn read_old(&self, old: PartitionPos, pos: i64, buf: &mut [u8]) -> Result<(), PatchError> {
        buf.fill(0);
        let start = pos;
        let end = pos.saturating_add(buf.len() as i64);
        let lo = start.max(0);
        let hi = end.min(old.len() as i64);
        if lo < hi {
            let dst = (lo - start) as usize..(hi - start) as usize;
            self.flash.read(&mut buf[dst], old.offset() + lo as usize)?;
        }
        Ok(())
    }

    /// The slot a staged patch is read from and rebuilt into.
    pub fn patch_slot(&self) -> Option<ImageSlot> {
        self.is_patch_pending().then(|| self.next_slot())
    }
}
