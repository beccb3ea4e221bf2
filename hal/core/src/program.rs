use crate::error::ConfigError;
use std::fmt;
use std::path::Path;

pub const PROGRAM_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Start,
    Stop,
    In,
    Out,
    Load,
    Store,
    LoadNum,
    Add,
    Sub,
    Mul,
    Div,
    AddNum,
    SubNum,
    MulNum,
    DivNum,
    Jump,
    JumpNeg,
    JumpPos,
    JumpNull,
    LoadInd,
    StoreInd,
    DumpReg,
    DumpProg,
    /// Anything else, including blank lines. Executes as a no-op.
    Unknown,
}

impl Opcode {
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "START" => Self::Start,
            "STOP" => Self::Stop,
            "IN" => Self::In,
            "OUT" => Self::Out,
            "LOAD" => Self::Load,
            "STORE" => Self::Store,
            "LOADNUM" => Self::LoadNum,
            "ADD" => Self::Add,
            "SUB" => Self::Sub,
            "MUL" => Self::Mul,
            "DIV" => Self::Div,
            "ADDNUM" => Self::AddNum,
            "SUBNUM" => Self::SubNum,
            "MULNUM" => Self::MulNum,
            "DIVNUM" => Self::DivNum,
            "JUMP" => Self::Jump,
            "JUMPNEG" => Self::JumpNeg,
            "JUMPPOS" => Self::JumpPos,
            "JUMPNULL" => Self::JumpNull,
            "LOADIND" => Self::LoadInd,
            "STOREIND" => Self::StoreInd,
            "DUMPREG" => Self::DumpReg,
            "DUMPPROG" => Self::DumpProg,
            _ => Self::Unknown,
        }
    }
}

/// Operand text pre-parsed into every interpretation an opcode may consume.
/// Unparseable text reads as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operand {
    pub int: i64,
    pub float: f64,
    pub raw: String,
}

impl Operand {
    pub fn parse(raw: &str) -> Self {
        Self {
            int: raw.parse().unwrap_or(0),
            float: raw.parse().unwrap_or(0.0),
            raw: raw.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Opcode as written in the source, kept for listings.
    pub mnemonic: String,
    pub operand: Operand,
}

impl Instruction {
    /// Parses `OPCODE [operand]`. Tokens past the operand are ignored.
    pub fn parse(line: &str) -> Self {
        let mut tokens = line.split_whitespace();
        let mnemonic = tokens.next().unwrap_or_default();
        let operand = tokens.next().map(Operand::parse).unwrap_or_default();
        Self {
            opcode: Opcode::parse(mnemonic),
            mnemonic: mnemonic.to_string(),
            operand,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operand.raw.is_empty() {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(f, "{} {}", self.mnemonic, self.operand.raw)
        }
    }
}

/// One instruction per source line; line `n` is instruction `n`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        Self::from_lines(source.lines())
    }

    pub fn from_lines<I, S>(lines: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let instructions: Vec<Instruction> = lines
            .into_iter()
            .map(|line| Instruction::parse(line.as_ref()))
            .collect();
        if instructions.len() > PROGRAM_CAPACITY {
            return Err(ConfigError::ProgramTooLong {
                len: instructions.len(),
                capacity: PROGRAM_CAPACITY,
            });
        }
        Ok(Self { instructions })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    pub fn fetch(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }
}
