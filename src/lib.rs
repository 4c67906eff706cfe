#![warn(clippy::all)]

//! Back end of a compiler for a small imperative teaching language.
//!
//! The upstream parser hands over a [`ast::Program`]; [`analyze`] runs the
//! semantic pass and builds the symbol table, [`emit`] lowers the program
//! to text instructions for an accumulator register machine.

pub mod analyze;
pub mod ast;
pub mod codegen;
pub mod diagnostic;
pub mod emit;
pub mod symbols;

use analyze::AnalyzeError;
use emit::EmitError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl From<&CompileError> for diagnostic::Diagnostic {
    fn from(e: &CompileError) -> Self {
        match e {
            CompileError::Analyze(e) => diagnostic::Diagnostic::from(e),
            CompileError::Emit(e) => diagnostic::Diagnostic::from(e),
        }
    }
}

/// Runs both passes: semantic analysis, then emission against the
/// populated symbol table.
pub fn compile(program: &ast::Program) -> Result<codegen::CodeGen, CompileError> {
    let mut symbols = analyze::analyze(program)?;
    let code = emit::emit(program, &mut symbols)?;
    Ok(code)
}
