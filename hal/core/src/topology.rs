//! Sectioned topology description.
//!
//! ```text
//! HAL-Prozessoren:
//! 0 producer.hal
//! 1 consumer.hal
//! HAL-Verbindungen:
//! 0:0>1:0
//! HAL-Stdin:
//! stdin>0:2
//! HAL-Stdout:
//! 1:3>stdout
//! ```

use crate::error::ConfigError;
use crate::port::PORT_COUNT;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// `<processor>:<port>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    pub processor: usize,
    pub port: usize,
}

impl PortRef {
    pub fn new(processor: usize, port: usize) -> Self {
        Self { processor, port }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.processor, self.port)
    }
}

impl FromStr for PortRef {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (processor, port) = s.trim().split_once(':').ok_or(())?;
        Ok(Self {
            processor: processor.trim().parse().map_err(|_| ())?,
            port: port.trim().parse().map_err(|_| ())?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Processors,
    Connections,
    Stdin,
    Stdout,
}

impl Section {
    fn from_label(line: &str) -> Option<Self> {
        let label = line.strip_suffix(':')?.trim();
        match label.to_ascii_lowercase().as_str() {
            "hal-prozessoren" | "processors" => Some(Self::Processors),
            "hal-verbindungen" | "connections" => Some(Self::Connections),
            "hal-stdin" | "stdin" => Some(Self::Stdin),
            "hal-stdout" | "stdout" => Some(Self::Stdout),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    /// Declaration order is preserved.
    pub processors: Vec<(usize, PathBuf)>,
    /// `(source, destination)`: the destination port is re-pointed at the
    /// source port's channel. Applied in file order.
    pub links: Vec<(PortRef, PortRef)>,
    pub stdin: Vec<PortRef>,
    pub stdout: Vec<PortRef>,
}

impl Topology {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut topology = Self::default();
        let mut section = None;
        let mut ids = BTreeSet::new();

        for (n, raw) in text.lines().enumerate() {
            let line_no = n + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(next) = Section::from_label(line) {
                section = Some(next);
                continue;
            }
            let malformed = || ConfigError::MalformedLine {
                line: line_no,
                text: line.to_string(),
            };
            match section {
                None => return Err(ConfigError::EntryOutsideSection { line: line_no }),
                Some(Section::Processors) => {
                    let mut parts = line.split_whitespace();
                    let id: usize = parts
                        .next()
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(malformed)?;
                    let path = parts.next().ok_or(ConfigError::MissingProgram { id })?;
                    if parts.next().is_some() {
                        return Err(malformed());
                    }
                    if !ids.insert(id) {
                        return Err(ConfigError::DuplicateProcessor { id });
                    }
                    topology.processors.push((id, PathBuf::from(path)));
                }
                Some(Section::Connections) => {
                    let (from, to) = line.split_once('>').ok_or_else(malformed)?;
                    let from: PortRef = from.parse().map_err(|_| malformed())?;
                    let to: PortRef = to.parse().map_err(|_| malformed())?;
                    topology.links.push((from, to));
                }
                Some(kind @ (Section::Stdin | Section::Stdout)) => {
                    let target = parse_stdio(line).ok_or_else(malformed)?;
                    if kind == Section::Stdin {
                        topology.stdin.push(target);
                    } else {
                        topology.stdout.push(target);
                    }
                }
            }
        }

        topology.validate()?;
        Ok(topology)
    }

    /// Reads `path` and resolves relative program paths against its directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut topology = Self::parse(&text)?;
        if let Some(base) = path.parent() {
            for (_, program) in &mut topology.processors {
                if program.is_relative() {
                    *program = base.join(&*program);
                }
            }
        }
        Ok(topology)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let declared: BTreeSet<usize> = self.processors.iter().map(|(id, _)| *id).collect();
        let refs = self
            .links
            .iter()
            .flat_map(|(a, b)| [a, b])
            .chain(&self.stdin)
            .chain(&self.stdout);
        for r in refs {
            if !declared.contains(&r.processor) {
                return Err(ConfigError::UnknownProcessor { id: r.processor });
            }
            if r.port >= PORT_COUNT {
                return Err(ConfigError::PortOutOfRange { port: r.port });
            }
        }
        Ok(())
    }
}

/// `stdin>0:2`, `0:3>stdout` or a bare `0:2`.
fn parse_stdio(line: &str) -> Option<PortRef> {
    match line.split_once('>') {
        Some((left, right)) => left.parse().or_else(|_| right.parse()).ok(),
        None => line.parse().ok(),
    }
}
