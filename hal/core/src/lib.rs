//! Accumulator-machine processors ("HAL" units) with private paged memory.
//!
//! Each [`Processor`] runs its own program against a [`WordMemory`]. The
//! default backing is the [`Mmu`]: a 32-entry TLB in front of a two-level
//! page table, four physical frames and a swap store for the full 64-page
//! virtual space. Processors talk to each other only through numbered
//! rendezvous [`Port`]s, which the [`Network`] wires together from a
//! topology description and runs one thread per processor.

pub mod config;
pub mod error;
pub mod memory;
pub mod network;
pub mod observe;
pub mod port;
pub mod processor;
pub mod program;
pub mod topology;

pub use config::{MemoryMode, MmuConfig, NetworkConfig, ProcessorConfig};
pub use error::{AddressError, ConfigError, HalError, Result};
pub use memory::{
    FlatMemory, Mmu, MmuStats, WordMemory, FRAME_COUNT, PAGE_COUNT, PAGE_SIZE,
    PHYSICAL_WORDS, TLB_ENTRIES, VIRTUAL_WORDS,
};
pub use network::{Console, Network, NetworkBuilder, RunOutcome};
pub use observe::{FileSink, LineSink, NullSink, SharedLines, WriterSink};
pub use port::{decode_value, encode_value, Port, PORT_COUNT};
pub use processor::{Processor, ProcessorReport, ProcessorState};
pub use program::{Instruction, Opcode, Operand, Program, PROGRAM_CAPACITY};
pub use topology::{PortRef, Topology};
