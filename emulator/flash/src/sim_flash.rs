// Licensed under the Apache-2.0 license

use platform_hil::{FlashDrvError, FlashStorage};
use std::cell::{Ref, RefCell};
use std::ops::Range;

/// A flash operation as observed by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    Read { address: usize, len: usize },
    Write { address: usize, len: usize },
    Erase { address: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Read,
    Write,
    Erase,
}

struct Fault {
    kind: FaultKind,
    range: Range<usize>,
}

struct Inner {
    mem: Vec<u8>,
    ops: Vec<FlashOp>,
    faults: Vec<Fault>,
    /// Bytes whose write needed a 0 -> 1 transition.
    program_violations: Vec<usize>,
}

/// NOR flash backed by RAM.
///
/// Memory starts erased (`0xFF`). A write can only clear bits, erase works on whole
/// sectors, and every access is appended to an operation log. Faults can be
/// injected per address range to exercise failure paths.
pub struct SimFlash {
    sector_size: usize,
    inner: RefCell<Inner>,
}

impl SimFlash {
    pub const DEFAULT_SECTOR_SIZE: usize = 0x1000;

    pub fn new(capacity: usize) -> Self {
        Self::with_sector_size(capacity, Self::DEFAULT_SECTOR_SIZE)
    }

    pub fn with_sector_size(capacity: usize, sector_size: usize) -> Self {
        SimFlash {
            sector_size,
            inner: RefCell::new(Inner {
                mem: vec![0xff; capacity],
                ops: Vec::new(),
                faults: Vec::new(),
                program_violations: Vec::new(),
            }),
        }
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Copies `data` straight into memory, bypassing NOR rules and the operation log.
    pub fn load(&self, address: usize, data: &[u8]) {
        let mut inner = self.inner.borrow_mut();
        inner.mem[address..address + data.len()].copy_from_slice(data);
    }

    /// Fills a range with erased bytes without logging an erase.
    pub fn blank(&self, range: Range<usize>) {
        self.inner.borrow_mut().mem[range].fill(0xff);
    }

    pub fn contents(&self) -> Ref<'_, [u8]> {
        Ref::map(self.inner.borrow(), |inner| inner.mem.as_slice())
    }

    pub fn bytes(&self, range: Range<usize>) -> Vec<u8> {
        self.inner.borrow().mem[range].to_vec()
    }

    /// Flips bits at `address` without going through the device interface.
    pub fn corrupt(&self, address: usize, mask: u8) {
        self.inner.borrow_mut().mem[address] ^= mask;
    }

    pub fn ops(&self) -> Vec<FlashOp> {
        self.inner.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.inner.borrow_mut().ops.clear();
    }

    /// Erase operations in issue order, as `(address, len)`.
    pub fn erases(&self) -> Vec<(usize, usize)> {
        self.inner
            .borrow()
            .ops
            .iter()
            .filter_map(|op| match *op {
                FlashOp::Erase { address, len } => Some((address, len)),
                _ => None,
            })
            .collect()
    }

    /// Write operations in issue order, as `(address, len)`.
    pub fn writes(&self) -> Vec<(usize, usize)> {
        self.inner
            .borrow()
            .ops
            .iter()
            .filter_map(|op| match *op {
                FlashOp::Write { address, len } => Some((address, len)),
                _ => None,
            })
            .collect()
    }

    pub fn program_violations(&self) -> Vec<usize> {
        self.inner.borrow().program_violations.clone()
    }

    /// Makes every operation of `kind` touching `range` fail with `FlashDrvError::FAIL`.
    pub fn inject_fault(&self, kind: FaultKind, range: Range<usize>) {
        self.inner.borrow_mut().faults.push(Fault { kind, range });
    }

    pub fn clear_faults(&self) {
        self.inner.borrow_mut().faults.clear();
    }

    fn check(
        inner: &Inner,
        kind: FaultKind,
        address: usize,
        len: usize,
    ) -> Result<Range<usize>, FlashDrvError> {
        let end = address.checked_add(len).ok_or(FlashDrvError::SIZE)?;
        if end > inner.mem.len() {
            return Err(FlashDrvError::SIZE);
        }
        let hit = inner.faults.iter().any(|fault| {
            fault.kind == kind
                && fault.range.start < end.max(address + 1)
                && address < fault.range.end
        });
        if hit {
            log::debug!("sim flash: injected {kind:?} fault at 0x{address:x}");
            return Err(FlashDrvError::FAIL);
        }
        Ok(address..end)
    }
}

impl FlashStorage for SimFlash {
    fn read(&self, buffer: &mut [u8], address: usize) -> Result<(), FlashDrvError> {
        let mut inner = self.inner.borrow_mut();
        let range = Self::check(&inner, FaultKind::Read, address, buffer.len())?;
        inner.ops.push(FlashOp::Read {
            address,
            len: buffer.len(),
        });
        buffer.copy_from_slice(&inner.mem[range]);
        Ok(())
    }

    fn write(&self, buffer: &[u8], address: usize) -> Result<(), FlashDrvError> {
        let mut inner = self.inner.borrow_mut();
        let range = Self::check(&inner, FaultKind::Write, address, buffer.len())?;
        inner.ops.push(FlashOp::Write {
            address,
            len: buffer.len(),
        });
        let Inner {
            mem,
            program_violations,
            ..
        } = &mut *inner;
        for (offset, (cell, &byte)) in mem[range].iter_mut().zip(buffer).enumerate() {
            if byte & !*cell != 0 {
                program_violations.push(address + offset);
            }
            *cell &= byte;
        }
        Ok(())
    }

    fn erase(&self, address: usize, length: usize) -> Result<(), FlashDrvError> {
        if address % self.sector_size != 0 || length % self.sector_size != 0 {
            return Err(FlashDrvError::INVAL);
        }
        let mut inner = self.inner.borrow_mut();
        let range = Self::check(&inner, FaultKind::Erase, address, length)?;
        inner.ops.push(FlashOp::Erase {
            address,
            len: length,
        });
        inner.mem[range].fill(0xff);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.inner.borrow().mem.len()
    }
}
