// Licensed under the Apache-2.0 license

use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::Compression;
use flash_image::{offtout, PatchHeader};
use zerocopy::IntoBytes;

/// Builds BSDIFF40 containers from explicit control triples.
///
/// Each triple reconstructs `target` against the old image at the current old
/// position, appends `extra` verbatim, then moves the old position by `seek`.
/// Old bytes outside the old image count as zero.
pub struct PatchBuilder<'a> {
    old: &'a [u8],
    old_pos: i64,
    ctrl: Vec<u8>,
    diff: Vec<u8>,
    extra: Vec<u8>,
    new: Vec<u8>,
}

fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).expect("bzip2 write");
    encoder.finish().expect("bzip2 finish")
}

impl<'a> PatchBuilder<'a> {
    pub fn new(old: &'a [u8]) -> Self {
        PatchBuilder {
            old,
            old_pos: 0,
            ctrl: Vec::new(),
            diff: Vec::new(),
            extra: Vec::new(),
            new: Vec::new(),
        }
    }

    pub fn triple(mut self, target: &[u8], extra: &[u8], seek: i64) -> Self {
        for (i, &byte) in target.iter().enumerate() {
            let pos = self.old_pos.saturating_add(i as i64);
            let old = usize::try_from(pos)
                .ok()
                .and_then(|pos| self.old.get(pos).copied())
                .unwrap_or(0);
            self.diff.push(byte.wrapping_sub(old));
        }
        self.ctrl.extend_from_slice(&offtout(target.len() as i64));
        self.ctrl.extend_from_slice(&offtout(extra.len() as i64));
        self.ctrl.extend_from_slice(&offtout(seek));
        self.extra.extend_from_slice(extra);
        self.new.extend_from_slice(target);
        self.new.extend_from_slice(extra);
        self.old_pos = self
            .old_pos
            .saturating_add(target.len() as i64)
            .saturating_add(seek);
        self
    }

    /// The image the patch reconstructs.
    pub fn expected(&self) -> &[u8] {
        &self.new
    }

    pub fn build(&self) -> Vec<u8> {
        let ctrl = compress(&self.ctrl);
        let diff = compress(&self.diff);
        let extra = compress(&self.extra);
        let mut patch = PatchHeader::new(ctrl.len(), diff.len(), self.new.len())
            .as_bytes()
            .to_vec();
        patch.extend_from_slice(&ctrl);
        patch.extend_from_slice(&diff);
        patch.extend_from_slice(&extra);
        patch
    }

    /// One triple: `new` is diffed against `old` over their common length and
    /// the remainder is carried as extra bytes.
    pub fn simple(old: &[u8], new: &[u8]) -> Vec<u8> {
        let common = old.len().min(new.len());
        PatchBuilder::new(old)
            .triple(&new[..common], &new[common..], 0)
            .build()
    }
}
