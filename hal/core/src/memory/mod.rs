//! Word-addressed memory seen by a processor.
//!
//! Virtual index layout (16 bits):
//!
//! ```text
//!  15  13 12  10 9          0
//! +------+------+------------+
//! | dir  | table|   offset   |
//! +------+------+------------+
//! ```

use crate::config::{MemoryMode, ProcessorConfig};
use crate::error::AddressError;
use crate::observe::LineSink;
use serde::{Deserialize, Serialize};

pub mod flat;
pub mod mmu;
pub mod page_table;
pub mod tlb;

pub use flat::FlatMemory;
pub use mmu::Mmu;
pub use page_table::{PageDirectory, PageDirectoryEntry, PageTableEntry, Victim};
pub use tlb::{Tlb, TlbEntry};

pub const PAGE_BITS: u32 = 10;
pub const PAGE_SIZE: usize = 1 << PAGE_BITS;
pub const OFFSET_MASK: usize = PAGE_SIZE - 1;
pub const DIRECTORY_ENTRIES: usize = 8;
pub const TABLE_ENTRIES: usize = 8;
pub const PAGE_COUNT: usize = DIRECTORY_ENTRIES * TABLE_ENTRIES;
pub const VIRTUAL_WORDS: usize = PAGE_COUNT * PAGE_SIZE;
pub const FRAME_COUNT: usize = 4;
pub const PHYSICAL_WORDS: usize = FRAME_COUNT * PAGE_SIZE;
pub const TLB_ENTRIES: usize = 32;

/// Counters kept by a memory engine. Flat memory reports all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MmuStats {
    pub tlb_hits: u64,
    pub tlb_misses: u64,
    pub page_faults: u64,
    pub swap_outs: u64,
    pub swap_ins: u64,
}

/// Load/store seam between a processor and its memory.
pub trait WordMemory: Send {
    fn read(&mut self, index: i64) -> Result<f64, AddressError>;
    fn write(&mut self, index: i64, value: f64) -> Result<(), AddressError>;
    /// Backing store words in physical index order.
    fn physical_words(&self) -> &[f64];
    fn stats(&self) -> MmuStats {
        MmuStats::default()
    }
}

pub fn checked_index(index: i64) -> Result<usize, AddressError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < VIRTUAL_WORDS)
        .ok_or(AddressError::OutOfRange { index })
}

/// Converts a stored word into a virtual index (LOADIND / STOREIND).
pub fn address_from_value(value: f64) -> Result<i64, AddressError> {
    if !value.is_finite() {
        return Err(AddressError::NotAnAddress { value });
    }
    Ok(value.trunc() as i64)
}

#[inline]
pub fn page_start(index: usize) -> usize {
    index & !OFFSET_MASK
}

#[inline]
pub fn page_offset(index: usize) -> usize {
    index & OFFSET_MASK
}

#[inline]
pub fn page_number(index: usize) -> usize {
    index >> PAGE_BITS
}

/// Builds the memory a processor owns for its whole lifetime.
pub fn build_memory(
    config: &ProcessorConfig,
    fault_log: Box<dyn LineSink>,
) -> Box<dyn WordMemory> {
    match config.memory {
        MemoryMode::Paged => Box::new(Mmu::with_fault_log(config.mmu, fault_log)),
        MemoryMode::Flat => Box::new(FlatMemory::new()),
    }
}
