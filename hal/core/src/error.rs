use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HalError>;

#[derive(Debug, Error)]
pub enum HalError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("address error: {0}")]
    Address(#[from] AddressError),
    #[error("port {port} does not exist")]
    PortOutOfRange { port: i64 },
    #[error("port {port} has no counterpart left")]
    PortClosed { port: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Virtual index outside the 64-page address space.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddressError {
    #[error("virtual index {index} is outside [0, 65536)")]
    OutOfRange { index: i64 },
    #[error("value {value} cannot be used as an address")]
    NotAnAddress { value: f64 },
}

/// Malformed topology or program source. Raised before any processor runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: malformed entry `{text}`")]
    MalformedLine { line: usize, text: String },
    #[error("line {line}: entry appears before any section label")]
    EntryOutsideSection { line: usize },
    #[error("processor {id} declared twice")]
    DuplicateProcessor { id: usize },
    #[error("processor {id} is not declared")]
    UnknownProcessor { id: usize },
    #[error("port {port} is out of range")]
    PortOutOfRange { port: usize },
    #[error("program has {len} instructions, capacity is {capacity}")]
    ProgramTooLong { len: usize, capacity: usize },
    #[error("no program supplied for processor {id}")]
    MissingProgram { id: usize },
}
