use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Memory engine knobs. `trace` enables per-access trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MmuConfig {
    pub tlb_enabled: bool,
    pub trace: bool,
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self {
            tlb_enabled: true,
            trace: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    /// TLB + page table + swap.
    #[default]
    Paged,
    /// Direct word array, no translation.
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub memory: MemoryMode,
    pub mmu: MmuConfig,
    /// Port that DUMPREG / DUMPPROG stream onto.
    pub dump_port: usize,
    pub trace: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            memory: MemoryMode::default(),
            mmu: MmuConfig::default(),
            dump_port: 1,
            trace: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub processor: ProcessorConfig,
    /// Append page-fault lines here; `None` discards them.
    pub fault_log: Option<PathBuf>,
}
