use super::{DIRECTORY_ENTRIES, FRAME_COUNT, PAGE_BITS, PAGE_COUNT, PAGE_SIZE, TABLE_ENTRIES};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageTableEntry {
    pub present: bool,
    pub dirty: bool,
    pub accessed: bool,
    /// Physical frame index, meaningful only while `present`.
    pub frame: usize,
    /// Word offset of this page's slot in the swap store.
    pub swap_offset: usize,
}

/// Eight page table entries plus flags aggregated over them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageDirectoryEntry {
    pub present: bool,
    pub dirty: bool,
    pub accessed: bool,
    pub table: [PageTableEntry; TABLE_ENTRIES],
}

impl PageDirectoryEntry {
    fn refresh_flags(&mut self) {
        self.present = self.table.iter().any(|e| e.present);
        self.dirty = self.table.iter().any(|e| e.dirty);
        self.accessed = self.table.iter().any(|e| e.accessed);
    }
}

/// Result of a second-chance sweep. `steps` counts resident entries examined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Victim {
    pub page: usize,
    pub steps: usize,
}

#[derive(Debug, Clone)]
pub struct PageDirectory {
    entries: [PageDirectoryEntry; DIRECTORY_ENTRIES],
    cursor: usize,
}

impl Default for PageDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PageDirectory {
    /// Pages `0..FRAME_COUNT` start resident on frames `0..FRAME_COUNT`.
    pub fn new() -> Self {
        let mut entries = [PageDirectoryEntry::default(); DIRECTORY_ENTRIES];
        for (dir, pde) in entries.iter_mut().enumerate() {
            for (table, pte) in pde.table.iter_mut().enumerate() {
                let page = dir * TABLE_ENTRIES + table;
                pte.swap_offset = page * PAGE_SIZE;
                if page < FRAME_COUNT {
                    pte.present = true;
                    pte.frame = page;
                }
            }
            pde.refresh_flags();
        }
        Self { entries, cursor: 0 }
    }

    /// Splits a page number into (directory index, table index).
    #[inline]
    pub fn locate(page: usize) -> (usize, usize) {
        let index = page << PAGE_BITS;
        ((index >> 13) & 0x7, (index >> 10) & 0x7)
    }

    pub fn entry(&self, page: usize) -> &PageTableEntry {
        let (dir, table) = Self::locate(page);
        &self.entries[dir].table[table]
    }

    pub fn directory_entry(&self, dir: usize) -> &PageDirectoryEntry {
        &self.entries[dir]
    }

    fn update<R>(&mut self, page: usize, f: impl FnOnce(&mut PageTableEntry) -> R) -> R {
        let (dir, table) = Self::locate(page);
        let pde = &mut self.entries[dir];
        let out = f(&mut pde.table[table]);
        pde.refresh_flags();
        out
    }

    /// Walks directory then table; returns the frame if the page is resident.
    pub fn resident_frame(&self, page: usize) -> Option<usize> {
        let pte = self.entry(page);
        pte.present.then_some(pte.frame)
    }

    pub fn mark_accessed(&mut self, page: usize) {
        self.update(page, |pte| pte.accessed = true);
    }

    pub fn mark_dirty(&mut self, page: usize) {
        self.update(page, |pte| pte.dirty = true);
    }

    pub fn clear_dirty(&mut self, page: usize) {
        self.update(page, |pte| pte.dirty = false);
    }

    pub fn resident_pages(&self) -> Vec<usize> {
        (0..PAGE_COUNT).filter(|&p| self.entry(p).present).collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Second-chance sweep from the persistent cursor.
    ///
    /// Resident pages with `accessed` set lose the bit and are skipped; the
    /// first resident page found without it is the victim. The cursor is left
    /// just past the victim.
    pub fn select_victim(&mut self) -> Victim {
        debug_assert!(
            !self.resident_pages().is_empty(),
            "second-chance sweep needs a resident page"
        );
        let mut steps = 0;
        for _ in 0..=2 * PAGE_COUNT {
            let page = self.cursor;
            self.cursor = (self.cursor + 1) % PAGE_COUNT;
            let (dir, table) = Self::locate(page);
            let pte = &mut self.entries[dir].table[table];
            if !pte.present {
                continue;
            }
            steps += 1;
            if !pte.accessed {
                return Victim { page, steps };
            }
            pte.accessed = false;
            self.entries[dir].refresh_flags();
        }
        Victim {
            page: self.cursor,
            steps,
        }
    }

    /// Hands `victim`'s frame to `page`. Returns the frame.
    pub fn remap(&mut self, victim: usize, page: usize) -> usize {
        let frame = self.update(victim, |pte| {
            pte.present = false;
            pte.dirty = false;
            pte.accessed = false;
            pte.frame
        });
        self.update(page, |pte| {
            pte.present = true;
            pte.dirty = false;
            pte.accessed = false;
            pte.frame = frame;
        });
        frame
    }
}
