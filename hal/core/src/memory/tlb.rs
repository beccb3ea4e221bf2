use super::TLB_ENTRIES;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TlbEntry {
    pub page_start: usize,
    pub frame: usize,
    pub valid: bool,
}

/// Fully associative translation cache with FIFO replacement.
#[derive(Debug, Clone)]
pub struct Tlb {
    entries: [TlbEntry; TLB_ENTRIES],
    head: usize,
}

impl Default for Tlb {
    fn default() -> Self {
        Self::new()
    }
}

impl Tlb {
    pub fn new() -> Self {
        Self {
            entries: [TlbEntry::default(); TLB_ENTRIES],
            head: 0,
        }
    }

    pub fn lookup(&self, page_start: usize) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.valid && e.page_start == page_start)
            .map(|e| e.frame)
    }

    /// Records `page_start -> frame`.
    ///
    /// Any other entry that still points at `frame` is invalidated, so a
    /// reused frame is never reachable through the page that used to own it.
    /// An existing entry for the same page is refreshed in place; otherwise
    /// the slot under the FIFO head is overwritten.
    pub fn update(&mut self, page_start: usize, frame: usize) {
        let mut refreshed = false;
        for entry in self.entries.iter_mut().filter(|e| e.valid) {
            if entry.page_start == page_start && !refreshed {
                entry.frame = frame;
                refreshed = true;
            } else if entry.page_start == page_start || entry.frame == frame {
                entry.valid = false;
            }
        }
        if !refreshed {
            self.entries[self.head] = TlbEntry {
                page_start,
                frame,
                valid: true,
            };
            self.head = (self.head + 1) % TLB_ENTRIES;
        }
    }

    pub fn entries(&self) -> &[TlbEntry] {
        &self.entries
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| e.valid).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tlb_misses_even_for_page_zero() {
        let tlb = Tlb::new();
        assert_eq!(tlb.lookup(0), None);
    }

    #[test]
    fn insert_then_hit() {
        let mut tlb = Tlb::new();
        tlb.update(4096, 2);
        assert_eq!(tlb.lookup(4096), Some(2));
        assert_eq!(tlb.lookup(5120), None);
        assert_eq!(tlb.head(), 1);
    }

    #[test]
    fn reusing_a_frame_invalidates_the_old_page() {
        let mut tlb = Tlb::new();
        tlb.update(0, 0);
        tlb.update(1024, 1);
        tlb.update(40 * 1024, 0);
        assert_eq!(tlb.lookup(0), None);
        assert_eq!(tlb.lookup(1024), Some(1));
        assert_eq!(tlb.lookup(40 * 1024), Some(0));
        assert_eq!(tlb.valid_count(), 2);
    }

    #[test]
    fn refresh_keeps_head_in_place() {
        let mut tlb = Tlb::new();
        tlb.update(2048, 2);
        tlb.update(2048, 3);
        assert_eq!(tlb.lookup(2048), Some(3));
        assert_eq!(tlb.head(), 1);
        assert_eq!(tlb.valid_count(), 1);
    }

    #[test]
    fn head_wraps_after_capacity() {
        let mut tlb = Tlb::new();
        for i in 0..TLB_ENTRIES + 1 {
            tlb.update(i * 1024, i);
        }
        assert_eq!(tlb.head(), 1);
        assert_eq!(tlb.lookup(0), None);
        assert_eq!(tlb.lookup(TLB_ENTRIES * 1024), Some(TLB_ENTRIES));
    }
}
