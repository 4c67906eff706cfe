use std::fmt;

/// Instruction set of the target accumulator machine. `Jump`, `Jpos`,
/// `Jneg` and `Jzero` take a PC-relative displacement; everything else
/// addresses a memory cell, except `Set` (immediate) and the bare
/// `Half`/`Halt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Get,
    Put,
    Load,
    Store,
    Loadi,
    Storei,
    Add,
    Sub,
    Subi,
    Set,
    Half,
    Jump,
    Jpos,
    Jneg,
    Jzero,
    Rtrn,
    Halt,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Get => "GET",
            Opcode::Put => "PUT",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Loadi => "LOADI",
            Opcode::Storei => "STOREI",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Subi => "SUBI",
            Opcode::Set => "SET",
            Opcode::Half => "HALF",
            Opcode::Jump => "JUMP",
            Opcode::Jpos => "JPOS",
            Opcode::Jneg => "JNEG",
            Opcode::Jzero => "JZERO",
            Opcode::Rtrn => "RTRN",
            Opcode::Halt => "HALT",
        }
    }

    /// `HALT` and `HALF` print without an operand.
    pub fn bare(self) -> bool {
        matches!(self, Opcode::Halt | Opcode::Half)
    }

    pub fn is_branch(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Jpos | Opcode::Jneg | Opcode::Jzero)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    pub op: Opcode,
    pub arg: i64,
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op.bare() {
            write!(f, "{}", self.op.mnemonic())
        } else {
            write!(f, "{} {}", self.op.mnemonic(), self.arg)
        }
    }
}

/// Ordered sequence of emitted instructions with line-relative
/// backpatching. Lines are instruction indices; jump displacements are
/// relative to the jump's own line.
#[derive(Debug, Default)]
pub struct CodeGen {
    code: Vec<Instr>,
}

impl CodeGen {
    pub fn new() -> Self {
        CodeGen { code: Vec::new() }
    }

    /// Appends an instruction and returns its line.
    pub fn emit(&mut self, op: Opcode, arg: i64) -> usize {
        let line = self.code.len();
        self.code.push(Instr { op, arg });
        line
    }

    pub fn current_line(&self) -> usize {
        self.code.len()
    }

    /// Overwrites a previously emitted instruction.
    pub fn patch(&mut self, line: usize, op: Opcode, arg: i64) {
        if let Some(instr) = self.code.get_mut(line) {
            *instr = Instr { op, arg };
        }
    }

    /// Rewrites the displacement of the branch at `line` to target
    /// `target`.
    pub fn patch_branch(&mut self, line: usize, target: usize) {
        if let Some(instr) = self.code.get_mut(line) {
            instr.arg = target as i64 - line as i64;
        }
    }

    pub fn instr(&self, line: usize) -> Option<Instr> {
        self.code.get(line).copied()
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.code
    }

    /// One instruction per line, `\n`-terminated.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for instr in &self.code {
            out.push_str(&instr.to_string());
            out.push('\n');
        }
        out
    }
}
