//! Interconnect: builds processors from a topology, wires their ports and
//! runs one thread per processor until every one has halted.
//!
//! There is no timeout anywhere. A port left without a counterpart stalls
//! both its processor and [`Network::run`].

use crate::config::{NetworkConfig, ProcessorConfig};
use crate::error::{ConfigError, Result};
use crate::memory::build_memory;
use crate::observe::{FileSink, LineSink, NullSink, WriterSink};
use crate::port::{Port, PORT_COUNT};
use crate::processor::{Processor, ProcessorReport};
use crate::program::Program;
use crate::topology::{PortRef, Topology};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

type SinkFactory = Box<dyn Fn(usize) -> Box<dyn LineSink>>;

/// External line feeds for stdin/stdout bindings.
#[derive(Clone)]
pub struct Console {
    input: Arc<Mutex<Box<dyn BufRead + Send>>>,
    output: Arc<Mutex<Box<dyn LineSink>>>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(io::empty(), NullSink)
    }
}

impl Console {
    pub fn new(input: impl BufRead + Send + 'static, output: impl LineSink + 'static) -> Self {
        Self {
            input: Arc::new(Mutex::new(Box::new(input))),
            output: Arc::new(Mutex::new(Box::new(output))),
        }
    }

    /// The process stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), WriterSink::new(io::stdout()))
    }

    /// Next input line without its terminator, `None` at end of input.
    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        match self.input.lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(|c| c == '\n' || c == '\r').to_string()),
            Err(err) => {
                warn!(%err, "console input failed");
                None
            }
        }
    }

    fn write_line(&self, line: &str) {
        if let Err(err) = self.output.lock().emit_line(line) {
            warn!(%err, "console output failed");
        }
    }
}

pub struct NetworkBuilder {
    config: ProcessorConfig,
    programs: Vec<(usize, Program)>,
    links: Vec<(PortRef, PortRef)>,
    stdin: Vec<PortRef>,
    stdout: Vec<PortRef>,
    fault_log: Option<SinkFactory>,
}

impl NetworkBuilder {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            programs: Vec::new(),
            links: Vec::new(),
            stdin: Vec::new(),
            stdout: Vec::new(),
            fault_log: None,
        }
    }

    /// Loads every program named by `topology` and opens the fault log.
    pub fn from_topology(topology: &Topology, config: &NetworkConfig) -> Result<Self> {
        let mut builder = Self::new(config.processor);
        for (id, path) in &topology.processors {
            debug!(id, path = %path.display(), "loading program");
            builder = builder.processor(*id, Program::load(path)?);
        }
        for &(from, to) in &topology.links {
            builder = builder.connect(from, to);
        }
        for &target in &topology.stdin {
            builder = builder.stdin(target);
        }
        for &target in &topology.stdout {
            builder = builder.stdout(target);
        }
        if let Some(path) = &config.fault_log {
            let sink = FileSink::append(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            builder = builder.fault_log(move |_| -> Box<dyn LineSink> { Box::new(sink.clone()) });
        }
        Ok(builder)
    }

    pub fn processor(mut self, id: usize, program: Program) -> Self {
        self.programs.push((id, program));
        self
    }

    /// Points `to` at the channel currently behind `from`.
    pub fn connect(mut self, from: PortRef, to: PortRef) -> Self {
        self.links.push((from, to));
        self
    }

    pub fn stdin(mut self, target: PortRef) -> Self {
        self.stdin.push(target);
        self
    }

    pub fn stdout(mut self, target: PortRef) -> Self {
        self.stdout.push(target);
        self
    }

    /// Per-processor page-fault sink, called once with each processor id.
    pub fn fault_log<F>(mut self, factory: F) -> Self
    where
        F: Fn(usize) -> Box<dyn LineSink> + 'static,
    {
        self.fault_log = Some(Box::new(factory));
        self
    }

    pub fn build(self, console: Console) -> Result<Network> {
        let mut tables: BTreeMap<usize, [Port; PORT_COUNT]> = BTreeMap::new();
        for (id, _) in &self.programs {
            if tables.insert(*id, Default::default()).is_some() {
                return Err(ConfigError::DuplicateProcessor { id: *id }.into());
            }
        }

        let lookup = |tables: &BTreeMap<usize, [Port; PORT_COUNT]>, r: PortRef| -> Result<Port> {
            let ports = tables
                .get(&r.processor)
                .ok_or(ConfigError::UnknownProcessor { id: r.processor })?;
            let port = ports
                .get(r.port)
                .ok_or(ConfigError::PortOutOfRange { port: r.port })?;
            Ok(port.clone())
        };

        for &(from, to) in &self.links {
            let channel = lookup(&tables, from)?;
            lookup(&tables, to)?;
            if let Some(slot) = tables.get_mut(&to.processor).and_then(|t| t.get_mut(to.port)) {
                *slot = channel;
            }
            debug!(%from, %to, "ports connected");
        }

        let stdin = self
            .stdin
            .iter()
            .map(|&r| lookup(&tables, r).map(|p| (r, p.writer())))
            .collect::<Result<Vec<_>>>()?;
        let stdout = self
            .stdout
            .iter()
            .map(|&r| lookup(&tables, r).map(|p| (r, p.reader())))
            .collect::<Result<Vec<_>>>()?;

        let mut processors = Vec::with_capacity(self.programs.len());
        for (id, program) in self.programs {
            let ports = tables.remove(&id).unwrap_or_default();
            let fault_log: Box<dyn LineSink> = match &self.fault_log {
                Some(factory) => factory(id),
                None => Box::new(NullSink),
            };
            let memory = build_memory(&self.config, fault_log);
            processors.push(Processor::with_parts(id, program, self.config, memory, ports));
        }

        Ok(Network {
            processors,
            stdin,
            stdout,
            console,
        })
    }
}

/// Every processor after the join, plus their reports. Both sorted by id.
pub struct RunOutcome {
    pub processors: Vec<Processor>,
    pub reports: Vec<ProcessorReport>,
}

impl RunOutcome {
    pub fn processor(&self, id: usize) -> Option<&Processor> {
        self.processors.iter().find(|p| p.id() == id)
    }
}

pub struct Network {
    processors: Vec<Processor>,
    stdin: Vec<(PortRef, Sender<String>)>,
    stdout: Vec<(PortRef, Receiver<String>)>,
    console: Console,
}

impl Network {
    pub fn builder(config: ProcessorConfig) -> NetworkBuilder {
        NetworkBuilder::new(config)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Runs every processor on its own thread and blocks until all halt.
    ///
    /// Stdin feeders are detached; stdout feeders are joined once every
    /// processor has released its ports, so console output is complete on
    /// return.
    pub fn run(self) -> Result<RunOutcome> {
        let Network {
            processors,
            stdin,
            stdout,
            console,
        } = self;
        info!(processors = processors.len(), "network starting");
        let started = Instant::now();

        for (target, writer) in stdin {
            let console = console.clone();
            thread::Builder::new()
                .name(format!("hal-stdin-{target}"))
                .spawn(move || {
                    while let Some(line) = console.read_line() {
                        if writer.send(line).is_err() {
                            break;
                        }
                    }
                    debug!(%target, "stdin feeder done");
                })?;
        }

        let mut printers: Vec<JoinHandle<()>> = Vec::new();
        for (target, reader) in stdout {
            let console = console.clone();
            let handle = thread::Builder::new()
                .name(format!("hal-stdout-{target}"))
                .spawn(move || {
                    while let Ok(line) = reader.recv() {
                        console.write_line(&line);
                    }
                    debug!(%target, "stdout feeder done");
                })?;
            printers.push(handle);
        }

        let mut workers = Vec::with_capacity(processors.len());
        for mut cpu in processors {
            let handle = thread::Builder::new()
                .name(format!("hal-{}", cpu.id()))
                .spawn(move || {
                    let started = Instant::now();
                    if let Err(err) = cpu.run() {
                        warn!(id = cpu.id(), %err, "processor stopped on error");
                    }
                    let report = cpu.report(started.elapsed());
                    cpu.disconnect_ports();
                    (cpu, report)
                })?;
            workers.push(handle);
        }

        let mut finished = Vec::with_capacity(workers.len());
        for handle in workers {
            match handle.join() {
                Ok(done) => finished.push(done),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        for handle in printers {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }

        finished.sort_by_key(|(cpu, _)| cpu.id());
        let (processors, reports): (Vec<_>, Vec<_>) = finished.into_iter().unzip();
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "network halted");
        Ok(RunOutcome {
            processors,
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HalError;
    use crate::observe::SharedLines;

    fn program(lines: &[&str]) -> Program {
        Program::from_lines(lines.iter().copied()).unwrap()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = Network::builder(ProcessorConfig::default())
            .processor(1, program(&["STOP"]))
            .processor(1, program(&["STOP"]))
            .build(Console::default());
        assert!(matches!(
            result,
            Err(HalError::Config(ConfigError::DuplicateProcessor { id: 1 }))
        ));
    }

    #[test]
    fn links_to_unknown_processors_are_rejected() {
        let result = Network::builder(ProcessorConfig::default())
            .processor(0, program(&["STOP"]))
            .connect(PortRef::new(0, 0), PortRef::new(9, 0))
            .build(Console::default());
        assert!(matches!(
            result,
            Err(HalError::Config(ConfigError::UnknownProcessor { id: 9 }))
        ));
    }

    #[test]
    fn connect_aliases_destination_to_source_channel() {
        let network = Network::builder(ProcessorConfig::default())
            .processor(0, program(&["STOP"]))
            .processor(1, program(&["STOP"]))
            .connect(PortRef::new(0, 2), PortRef::new(1, 4))
            .build(Console::default())
            .unwrap();
        let a = network.processors[0].port(2).unwrap();
        let b = network.processors[1].port(4).unwrap();
        assert!(a.same_channel(b));
        assert!(!a.same_channel(network.processors[1].port(2).unwrap()));
    }

    #[test]
    fn stdout_lines_reach_the_console() {
        let out = SharedLines::new();
        let console = Console::new(io::empty(), out.clone());
        let outcome = Network::builder(ProcessorConfig::default())
            .processor(0, program(&["LOADNUM 2", "OUT 3", "MULNUM 4", "OUT 3", "STOP"]))
            .stdout(PortRef::new(0, 3))
            .build(console)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(out.snapshot(), vec!["2".to_string(), "8".to_string()]);
        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].steps, 5);
    }
}
