use super::{
    checked_index, page_number, page_offset, page_start, MmuStats, PageDirectory, PageTableEntry,
    Tlb, WordMemory, PAGE_COUNT, PAGE_SIZE, PHYSICAL_WORDS, VIRTUAL_WORDS,
};
use crate::config::MmuConfig;
use crate::error::AddressError;
use crate::observe::{LineSink, NullSink};
use tracing::{debug, trace, warn};

/// Paged memory engine: TLB, two-level page table, four frames, swap.
pub struct Mmu {
    config: MmuConfig,
    directory: PageDirectory,
    tlb: Tlb,
    physical: Box<[f64]>,
    swap: Box<[f64]>,
    fault_log: Box<dyn LineSink>,
    stats: MmuStats,
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new(MmuConfig::default())
    }
}

impl Mmu {
    pub fn new(config: MmuConfig) -> Self {
        Self::with_fault_log(config, Box::new(NullSink))
    }

    pub fn with_fault_log(config: MmuConfig, fault_log: Box<dyn LineSink>) -> Self {
        Self {
            config,
            directory: PageDirectory::new(),
            tlb: Tlb::new(),
            physical: vec![0.0; PHYSICAL_WORDS].into_boxed_slice(),
            swap: vec![0.0; VIRTUAL_WORDS].into_boxed_slice(),
            fault_log,
            stats: MmuStats::default(),
        }
    }

    pub fn config(&self) -> MmuConfig {
        self.config
    }

    pub fn directory(&self) -> &PageDirectory {
        &self.directory
    }

    pub fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    pub fn page_entry(&self, page: usize) -> PageTableEntry {
        *self.directory.entry(page)
    }

    pub fn swap_words(&self) -> &[f64] {
        &self.swap
    }

    /// `(page, entry)` for all 64 pages in page order, resident or not.
    pub fn page_table_rows(&self) -> Vec<(usize, PageTableEntry)> {
        (0..PAGE_COUNT)
            .map(|page| (page, *self.directory.entry(page)))
            .collect()
    }

    /// Resolves a checked virtual index to a physical index, faulting the
    /// page in when it is not resident.
    fn translate(&mut self, index: usize) -> usize {
        let start = page_start(index);
        let offset = page_offset(index);
        let page = page_number(index);

        if self.config.tlb_enabled {
            if let Some(frame) = self.tlb.lookup(start) {
                self.stats.tlb_hits += 1;
                self.directory.mark_accessed(page);
                return frame * PAGE_SIZE + offset;
            }
            self.stats.tlb_misses += 1;
            if self.config.trace {
                trace!(page_start = start, "tlb miss");
            }
        }

        if let Some(frame) = self.directory.resident_frame(page) {
            self.directory.mark_accessed(page);
            if self.config.tlb_enabled {
                self.tlb.update(start, frame);
            }
            return frame * PAGE_SIZE + offset;
        }

        self.page_fault(page);
        self.translate(index)
    }

    fn page_fault(&mut self, page: usize) {
        self.stats.page_faults += 1;
        let start = page * PAGE_SIZE;
        debug!(page_start = start, "page fault");
        let line = format!("page fault requesting VM aligned page({start})");
        if let Err(err) = self.fault_log.emit_line(&line) {
            warn!(%err, "could not record page fault");
        }

        let victim = self.directory.select_victim();
        let evicted = *self.directory.entry(victim.page);
        let frame_base = evicted.frame * PAGE_SIZE;
        if evicted.dirty {
            self.swap[evicted.swap_offset..evicted.swap_offset + PAGE_SIZE]
                .copy_from_slice(&self.physical[frame_base..frame_base + PAGE_SIZE]);
            self.directory.clear_dirty(victim.page);
            self.stats.swap_outs += 1;
            if self.config.trace {
                trace!(
                    frame = evicted.frame,
                    swap_offset = evicted.swap_offset,
                    "page written to swap"
                );
            }
        }

        let incoming = self.directory.entry(page).swap_offset;
        self.physical[frame_base..frame_base + PAGE_SIZE]
            .copy_from_slice(&self.swap[incoming..incoming + PAGE_SIZE]);
        self.stats.swap_ins += 1;

        let frame = self.directory.remap(victim.page, page);
        if self.config.tlb_enabled {
            self.tlb.update(start, frame);
        }
        if self.config.trace {
            trace!(
                victim = victim.page,
                page,
                frame,
                sweep_steps = victim.steps,
                "page swapped in"
            );
        }
    }
}

impl WordMemory for Mmu {
    fn read(&mut self, index: i64) -> Result<f64, AddressError> {
        let virt = checked_index(index)?;
        let phys = self.translate(virt);
        let value = self.physical[phys];
        if self.config.trace {
            trace!(index, value, "load");
        }
        Ok(value)
    }

    fn write(&mut self, index: i64, value: f64) -> Result<(), AddressError> {
        let virt = checked_index(index)?;
        if self.config.trace {
            trace!(index, value, "store");
        }
        let phys = self.translate(virt);
        self.physical[phys] = value;
        self.directory.mark_dirty(page_number(virt));
        Ok(())
    }

    fn physical_words(&self) -> &[f64] {
        &self.physical
    }

    fn stats(&self) -> MmuStats {
        self.stats
    }
}
