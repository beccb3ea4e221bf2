use super::{checked_index, WordMemory, VIRTUAL_WORDS};
use crate::error::AddressError;

/// Untranslated memory: one word per virtual index.
pub struct FlatMemory {
    words: Box<[f64]>,
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatMemory {
    pub fn new() -> Self {
        Self {
            words: vec![0.0; VIRTUAL_WORDS].into_boxed_slice(),
        }
    }
}

impl WordMemory for FlatMemory {
    fn read(&mut self, index: i64) -> Result<f64, AddressError> {
        Ok(self.words[checked_index(index)?])
    }

    fn write(&mut self, index: i64, value: f64) -> Result<(), AddressError> {
        self.words[checked_index(index)?] = value;
        Ok(())
    }

    fn physical_words(&self) -> &[f64] {
        &self.words
    }
}
