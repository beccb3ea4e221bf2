use crate::config::ProcessorConfig;
use crate::error::{HalError, Result};
use crate::memory::{address_from_value, build_memory, MmuStats, WordMemory};
use crate::observe::NullSink;
use crate::port::{decode_value, encode_value, Port, PORT_COUNT};
use crate::program::{Opcode, Program, PROGRAM_CAPACITY};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorState {
    Running,
    Halted,
}

/// End-of-run snapshot of one processor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorReport {
    pub id: usize,
    pub state: ProcessorState,
    pub pc: i64,
    pub accumulator: f64,
    pub steps: u64,
    pub elapsed_ms: u64,
    pub error: Option<String>,
    pub memory: MmuStats,
}

/// One accumulator machine: program, private memory, five ports.
pub struct Processor {
    id: usize,
    accumulator: f64,
    pc: i64,
    state: ProcessorState,
    program: Program,
    memory: Box<dyn WordMemory>,
    ports: [Port; PORT_COUNT],
    config: ProcessorConfig,
    steps: u64,
    error: Option<String>,
}

impl Processor {
    /// Fresh processor with unconnected ports and no fault log.
    pub fn new(id: usize, program: Program, config: ProcessorConfig) -> Self {
        let memory = build_memory(&config, Box::new(NullSink));
        Self::with_parts(id, program, config, memory, Default::default())
    }

    pub fn with_parts(
        id: usize,
        program: Program,
        config: ProcessorConfig,
        memory: Box<dyn WordMemory>,
        ports: [Port; PORT_COUNT],
    ) -> Self {
        Self {
            id,
            accumulator: 0.0,
            pc: 0,
            state: ProcessorState::Running,
            program,
            memory,
            ports,
            config,
            steps: 0,
            error: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn pc(&self) -> i64 {
        self.pc
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn memory(&self) -> &dyn WordMemory {
        self.memory.as_ref()
    }

    pub fn memory_mut(&mut self) -> &mut dyn WordMemory {
        self.memory.as_mut()
    }

    pub fn port(&self, port: usize) -> Option<&Port> {
        self.ports.get(port)
    }

    /// Replaces the channel behind `port`. Used when wiring a network.
    pub fn bind_port(&mut self, port: usize, channel: Port) -> Result<()> {
        let slot = self
            .ports
            .get_mut(port)
            .ok_or(HalError::PortOutOfRange { port: port as i64 })?;
        *slot = channel;
        Ok(())
    }

    /// Drops every wired channel. Later IN/OUT fail with `PortClosed`.
    pub fn disconnect_ports(&mut self) {
        self.ports = std::array::from_fn(|_| Port::closed());
    }

    fn halt(&mut self) {
        self.state = ProcessorState::Halted;
    }

    fn in_bounds(&self) -> bool {
        (0..PROGRAM_CAPACITY as i64).contains(&self.pc)
    }

    /// Executes one instruction.
    ///
    /// A failing instruction halts the processor; the error is returned and
    /// kept for the report.
    pub fn step(&mut self) -> Result<ProcessorState> {
        if self.state == ProcessorState::Halted {
            return Ok(self.state);
        }
        if !self.in_bounds() {
            self.halt();
            return Ok(self.state);
        }

        let (opcode, int, float) = match self.program.fetch(self.pc as usize) {
            Some(ins) => (ins.opcode, ins.operand.int, ins.operand.float),
            None => (Opcode::Unknown, 0, 0.0),
        };
        if self.config.trace {
            trace!(id = self.id, pc = self.pc, ?opcode, acc = self.accumulator, "exec");
        }
        self.steps += 1;

        if let Err(err) = self.execute(opcode, int, float) {
            self.halt();
            self.error = Some(err.to_string());
            return Err(err);
        }

        self.pc = self.pc.saturating_add(1);
        if !self.in_bounds() {
            self.halt();
        }
        Ok(self.state)
    }

    fn execute(&mut self, opcode: Opcode, int: i64, float: f64) -> Result<()> {
        match opcode {
            Opcode::Start => self.state = ProcessorState::Running,
            Opcode::Stop => self.halt(),
            Opcode::In => {
                let text = self.port_for(int)?.recv().map_err(|_| HalError::PortClosed {
                    port: int as usize,
                })?;
                self.accumulator = decode_value(&text).unwrap_or_else(|| {
                    warn!(id = self.id, port = int, %text, "undecodable value, using 0");
                    0.0
                });
            }
            Opcode::Out => {
                let text = encode_value(self.accumulator);
                self.port_for(int)?
                    .send(text)
                    .map_err(|_| HalError::PortClosed { port: int as usize })?;
            }
            Opcode::Load => self.accumulator = self.memory.read(int)?,
            Opcode::Store => self.memory.write(int, self.accumulator)?,
            Opcode::LoadNum => self.accumulator = float,
            Opcode::Add => self.accumulator += self.memory.read(int)?,
            Opcode::Sub => self.accumulator -= self.memory.read(int)?,
            Opcode::Mul => self.accumulator *= self.memory.read(int)?,
            Opcode::Div => self.accumulator /= self.memory.read(int)?,
            Opcode::AddNum => self.accumulator += float,
            Opcode::SubNum => self.accumulator -= float,
            Opcode::MulNum => self.accumulator *= float,
            Opcode::DivNum => self.accumulator /= float,
            Opcode::Jump => self.jump(int),
            Opcode::JumpNeg => {
                if self.accumulator < 0.0 {
                    self.jump(int);
                }
            }
            Opcode::JumpPos => {
                if self.accumulator > 0.0 {
                    self.jump(int);
                }
            }
            Opcode::JumpNull => {
                if self.accumulator == 0.0 {
                    self.jump(int);
                }
            }
            Opcode::LoadInd => {
                let addr = address_from_value(self.memory.read(int)?)?;
                self.accumulator = self.memory.read(addr)?;
            }
            Opcode::StoreInd => {
                let addr = address_from_value(self.memory.read(int)?)?;
                self.memory.write(addr, self.accumulator)?;
            }
            Opcode::DumpReg => {
                let lines: Vec<String> = self
                    .memory
                    .physical_words()
                    .iter()
                    .enumerate()
                    .map(|(i, v)| format!("{i} : {v}"))
                    .collect();
                self.dump(lines)?;
            }
            Opcode::DumpProg => {
                let lines: Vec<String> = self.program.iter().map(ToString::to_string).collect();
                self.dump(lines)?;
            }
            Opcode::Unknown => {}
        }
        Ok(())
    }

    /// The generic `pc += 1` after dispatch lands on `target`.
    fn jump(&mut self, target: i64) {
        self.pc = target.saturating_sub(1);
    }

    fn port_for(&self, port: i64) -> Result<&Port> {
        usize::try_from(port)
            .ok()
            .and_then(|p| self.ports.get(p))
            .ok_or(HalError::PortOutOfRange { port })
    }

    fn dump(&self, lines: Vec<String>) -> Result<()> {
        let port_no = self.config.dump_port;
        let port = self.port_for(port_no as i64)?;
        for line in lines {
            port.send(line).map_err(|_| HalError::PortClosed { port: port_no })?;
        }
        Ok(())
    }

    /// Steps until halted. Errors are recorded before being returned.
    pub fn run(&mut self) -> Result<()> {
        info!(id = self.id, instructions = self.program.len(), "processor started");
        let started = Instant::now();
        let outcome = loop {
            match self.step() {
                Ok(ProcessorState::Halted) => break Ok(()),
                Ok(ProcessorState::Running) => {}
                Err(err) => break Err(err),
            }
        };
        info!(
            id = self.id,
            steps = self.steps,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "processor halted"
        );
        outcome
    }

    pub fn report(&self, elapsed: Duration) -> ProcessorReport {
        ProcessorReport {
            id: self.id,
            state: self.state,
            pc: self.pc,
            accumulator: self.accumulator,
            steps: self.steps,
            elapsed_ms: elapsed.as_millis() as u64,
            error: self.error.clone(),
            memory: self.memory.stats(),
        }
    }
}
