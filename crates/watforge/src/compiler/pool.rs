//! Deduplicating constant pool.
//!
//! Byte strings get offsets in first-seen order starting at a fixed base.
//! Each entry reserves one byte past its payload for a terminator.

use crate::error::{CompileError, CompileResult};
use log::trace;
use std::collections::BTreeMap;

/// Size of one linear-memory page.
pub const PAGE_SIZE: u32 = 65536;

/// One interned byte string and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub bytes: Vec<u8>,
    pub offset: u32,
}

impl PoolEntry {
    /// First byte past the reserved range (payload plus terminator).
    pub fn end(&self) -> u32 {
        reserved_len(&self.bytes)
            .and_then(|len| self.offset.checked_add(len))
            .unwrap_or(u32::MAX)
    }
}

fn reserved_len(bytes: &[u8]) -> Option<u32> {
    u32::try_from(bytes.len()).ok()?.checked_add(1)
}

/// The live pool, owned by a compilation session.
#[derive(Debug)]
pub struct ConstantPool {
    base: u32,
    next: u32,
    entries: Vec<PoolEntry>,
    index: BTreeMap<Vec<u8>, u32>,
}

impl ConstantPool {
    pub fn new(base: u32) -> Self {
        Self {
            base,
            next: base,
            entries: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Offset of `bytes`, allocating at the high-water mark on first sight.
    ///
    /// Fails when the reserved range would pass the end of the 32-bit
    /// address space; the pool is left unchanged in that case.
    pub fn intern(&mut self, bytes: &[u8]) -> CompileResult<u32> {
        if let Some(&offset) = self.index.get(bytes) {
            return Ok(offset);
        }
        let offset = self.next;
        self.next = reserved_len(bytes)
            .and_then(|len| offset.checked_add(len))
            .ok_or(CompileError::PoolOverflow {
                len: bytes.len(),
                offset,
            })?;
        trace!("pool: {} bytes at {offset}", bytes.len());
        self.index.insert(bytes.to_vec(), offset);
        self.entries.push(PoolEntry {
            bytes: bytes.to_vec(),
            offset,
        });
        Ok(offset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn freeze(self) -> FrozenPool {
        FrozenPool {
            base: self.base,
            end: self.next,
            entries: self.entries,
        }
    }
}

/// Read-only pool produced when a session closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenPool {
    base: u32,
    end: u32,
    entries: Vec<PoolEntry>,
}

impl FrozenPool {
    /// A pool that never had anything interned.
    pub fn empty(base: u32) -> Self {
        ConstantPool::new(base).freeze()
    }

    pub fn base_offset(&self) -> u32 {
        self.base
    }

    /// First free byte after the last entry.
    pub fn end_offset(&self) -> u32 {
        self.end
    }

    /// Bytes occupied from the base offset to the end, terminators included.
    pub fn byte_span(&self) -> u32 {
        self.end - self.base
    }

    /// Deduplicated payloads in first-seen order.
    pub fn items(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|e| e.bytes.as_slice())
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    /// `(bytes, offset)` pairs by ascending offset.
    pub fn lookup_table(&self) -> Vec<(&[u8], u32)> {
        let mut table: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.bytes.as_slice(), e.offset))
            .collect();
        table.sort_by_key(|&(_, offset)| offset);
        table
    }

    pub fn offset_of(&self, bytes: &[u8]) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.bytes == bytes)
            .map(|e| e.offset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pages of linear memory needed to hold every entry.
    pub fn pages_needed(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.end.div_ceil(PAGE_SIZE)
        }
    }

    /// Whether `[start, start + len)` intersects the occupied span.
    pub fn overlaps(&self, start: u32, len: u32) -> bool {
        if self.is_empty() || len == 0 {
            return false;
        }
        let end = start.saturating_add(len);
        start < self.end && self.base < end
    }
}
