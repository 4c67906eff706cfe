mod expr;

use crate::ast::*;
use crate::codegen::{CodeGen, Opcode};
use crate::symbols::{SymbolTable, MAIN};

/// Scratch cell for staged left operands, condition right-hand addresses
/// and indirect READ targets.
const STAGE_LEFT: i64 = 6;
/// Scratch cell for staged right operands.
const STAGE_RIGHT: i64 = 7;
/// Scratch cell holding a precomputed store address across an expression.
const ADDR: i64 = 8;
/// Holds the constant 1, materialized by the program prologue.
const ONE: i64 = 10;

/// Emission never fails on a program that passed the semantic pass; these
/// surface table inconsistencies instead of panicking.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmitError {
    #[error("unresolved symbol '{name}' in scope {scope}")]
    MissingSymbol { name: String, scope: String },

    #[error("procedure '{name}' has no entry label at its call site")]
    UnresolvedCall { name: String },
}

impl EmitError {
    pub fn code(&self) -> &'static str {
        match self {
            EmitError::MissingSymbol { .. } => "ACC-E001",
            EmitError::UnresolvedCall { .. } => "ACC-E002",
        }
    }
}

/// An arithmetic operand after resolution: a compile-time constant or a
/// memory cell holding the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Lit(i64),
    Cell(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    /// Branch argument 1: taken when the condition holds, skipping one
    /// following instruction.
    WhenTrue,
    /// Branch argument 2: taken when the condition fails, skipping a
    /// two-instruction prolog.
    WhenFalse,
}

/// The single conditional branch a condition leaves behind, for the
/// enclosing statement to lay out around and patch.
#[derive(Debug, Clone, Copy)]
struct CondBranch {
    line: usize,
    polarity: Polarity,
}

/// Runs the emission pass over an analyzed program. The symbol table is
/// written only through `jump_label` and argument-array bounds.
pub fn emit(program: &Program, symbols: &mut SymbolTable) -> Result<CodeGen, EmitError> {
    let mut emitter = Emitter { code: CodeGen::new(), symbols };
    emitter.program(program)?;
    Ok(emitter.code)
}

struct Emitter<'a> {
    code: CodeGen,
    symbols: &'a mut SymbolTable,
}

impl Emitter<'_> {
    /// Program skeleton: a patched jump over the procedure bodies, the
    /// constant-one prologue, the main block, `HALT`. Execution always
    /// enters through the prologue, so cell 10 is live before any
    /// procedure body runs.
    fn program(&mut self, program: &Program) -> Result<(), EmitError> {
        let jump_over = if program.procs.is_empty() {
            None
        } else {
            Some(self.code.emit(Opcode::Jump, 0))
        };
        for proc in &program.procs {
            self.proc(proc)?;
        }
        let main_label = self.code.current_line();
        self.code.emit(Opcode::Set, 1);
        self.code.emit(Opcode::Store, ONE);
        self.stmts(&program.main.body, MAIN)?;
        self.code.emit(Opcode::Halt, 0);
        if let Some(line) = jump_over {
            self.code.patch_branch(line, main_label);
        }
        Ok(())
    }

    fn proc(&mut self, proc: &Proc) -> Result<(), EmitError> {
        let entry = self.code.current_line() as i64;
        let return_cell = {
            let entry_mut =
                self.symbols
                    .procedure_mut(&proc.name)
                    .ok_or_else(|| EmitError::MissingSymbol {
                        name: proc.name.clone(),
                        scope: crate::symbols::GLOBAL.to_string(),
                    })?;
            entry_mut.jump_label = Some(entry);
            entry_mut.return_cell
        };
        self.stmts(&proc.body, &proc.name)?;
        self.code.emit(Opcode::Rtrn, return_cell);
        Ok(())
    }

    fn stmts(&mut self, stmts: &[Stmt], scope: &str) -> Result<(), EmitError> {
        for stmt in stmts {
            self.stmt(stmt, scope)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt, scope: &str) -> Result<(), EmitError> {
        match stmt {
            Stmt::Assign { target, expr } => self.assign(target, expr, scope),
            Stmt::If { cond, then_cmds, else_cmds: Some(else_cmds) } => {
                self.if_else(cond, then_cmds, else_cmds, scope)
            }
            Stmt::If { cond, then_cmds, else_cmds: None } => {
                self.if_then(cond, then_cmds, scope)
            }
            Stmt::While { cond, body } => self.while_loop(cond, body, scope),
            Stmt::Repeat { body, cond } => self.repeat_loop(body, cond, scope),
            Stmt::For { iterator, from, to, downto, body } => {
                self.for_loop(iterator, from, to, *downto, body, scope)
            }
            Stmt::Call { name, args } => self.call(name, args, scope),
            Stmt::Read { target } => self.read(target, scope),
            Stmt::Write { value } => self.write(value, scope),
        }
    }

    fn assign(&mut self, target: &Ident, expr: &Expr, scope: &str) -> Result<(), EmitError> {
        match self.static_cell(target, scope)? {
            Some(cell) => {
                self.expr(expr, scope)?;
                self.code.emit(Opcode::Store, cell);
            }
            None => {
                // Effective address first; the expression may clobber every
                // scratch cell below 8.
                self.compute_addr(target, scope)?;
                self.code.emit(Opcode::Store, ADDR);
                self.expr(expr, scope)?;
                self.code.emit(Opcode::Storei, ADDR);
            }
        }
        Ok(())
    }

    fn if_else(
        &mut self,
        cond: &Cond,
        then_cmds: &[Stmt],
        else_cmds: &[Stmt],
        scope: &str,
    ) -> Result<(), EmitError> {
        let branch = self.cond(cond, scope)?;
        let (first, second) = match branch.polarity {
            // Branch fires on a true condition: lay the else arm first and
            // land the branch on the then arm.
            Polarity::WhenTrue => (else_cmds, then_cmds),
            Polarity::WhenFalse => (then_cmds, else_cmds),
        };
        self.stmts(first, scope)?;
        let jump_end = self.code.emit(Opcode::Jump, 0);
        self.code.patch_branch(branch.line, jump_end + 1);
        self.stmts(second, scope)?;
        self.code.patch_branch(jump_end, self.code.current_line());
        Ok(())
    }

    fn if_then(&mut self, cond: &Cond, then_cmds: &[Stmt], scope: &str) -> Result<(), EmitError> {
        let branch = self.cond(cond, scope)?;
        match branch.polarity {
            Polarity::WhenTrue => {
                let jump_end = self.code.emit(Opcode::Jump, 0);
                self.code.patch_branch(branch.line, jump_end + 1);
                self.stmts(then_cmds, scope)?;
                self.code.patch_branch(jump_end, self.code.current_line());
            }
            Polarity::WhenFalse => {
                self.stmts(then_cmds, scope)?;
                self.code.patch_branch(branch.line, self.code.current_line());
            }
        }
        Ok(())
    }

    fn while_loop(&mut self, cond: &Cond, body: &[Stmt], scope: &str) -> Result<(), EmitError> {
        let head = self.code.current_line();
        let branch = self.cond(cond, scope)?;
        match branch.polarity {
            Polarity::WhenTrue => {
                self.code.patch_branch(branch.line, branch.line + 2);
                let exit = self.code.emit(Opcode::Jump, 0);
                self.stmts(body, scope)?;
                let back = self.code.emit(Opcode::Jump, 0);
                self.code.patch_branch(back, head);
                self.code.patch_branch(exit, back + 1);
            }
            Polarity::WhenFalse => {
                self.stmts(body, scope)?;
                let back = self.code.emit(Opcode::Jump, 0);
                self.code.patch_branch(back, head);
                self.code.patch_branch(branch.line, back + 1);
            }
        }
        Ok(())
    }

    fn repeat_loop(&mut self, body: &[Stmt], cond: &Cond, scope: &str) -> Result<(), EmitError> {
        let head = self.code.current_line();
        self.stmts(body, scope)?;
        let branch = self.cond(cond, scope)?;
        match branch.polarity {
            Polarity::WhenTrue => {
                // A true condition exits over the backward jump.
                self.code.patch_branch(branch.line, branch.line + 2);
                let back = self.code.emit(Opcode::Jump, 0);
                self.code.patch_branch(back, head);
            }
            Polarity::WhenFalse => {
                self.code.patch_branch(branch.line, head);
            }
        }
        Ok(())
    }

    /// Counted loop: the bound adjusted by one into the loop's hidden
    /// limit cell, start into the iterator cell, header tests
    /// `iterator - limit` with `JZERO`.
    fn for_loop(
        &mut self,
        iterator: &str,
        from: &Value,
        to: &Value,
        downto: bool,
        body: &[Stmt],
        scope: &str,
    ) -> Result<(), EmitError> {
        let iter_cell = self.variable_cell(iterator, scope)?;
        let limit_cell = self.variable_cell(&crate::symbols::for_limit_name(iterator), scope)?;
        let step = if downto { Opcode::Sub } else { Opcode::Add };
        self.load_value(to, scope)?;
        self.code.emit(step, ONE);
        self.code.emit(Opcode::Store, limit_cell);
        self.load_value(from, scope)?;
        self.code.emit(Opcode::Store, iter_cell);
        let head = self.code.current_line();
        self.code.emit(Opcode::Sub, limit_cell);
        let exit = self.code.emit(Opcode::Jzero, 0);
        self.stmts(body, scope)?;
        self.code.emit(Opcode::Load, iter_cell);
        self.code.emit(step, ONE);
        self.code.emit(Opcode::Store, iter_cell);
        let back = self.code.emit(Opcode::Jump, 0);
        self.code.patch_branch(back, head);
        self.code.patch_branch(exit, back + 1);
        Ok(())
    }

    /// Call protocol: copy-in / address marshalling, return address,
    /// jump, scalar copy-out. Argument-array actuals forward their stored
    /// offset; bounds travel through the symbol table.
    fn call(&mut self, name: &str, args: &[String], scope: &str) -> Result<(), EmitError> {
        let (params, return_cell, entry) = {
            let proc = self
                .symbols
                .procedure(name)
                .ok_or_else(|| EmitError::MissingSymbol {
                    name: name.to_string(),
                    scope: scope.to_string(),
                })?;
            let entry = proc
                .jump_label
                .ok_or_else(|| EmitError::UnresolvedCall { name: name.to_string() })?;
            (proc.params.clone(), proc.return_cell, entry)
        };

        for (formal, actual) in params.iter().zip(args) {
            match formal.kind {
                ParamKind::Scalar => {
                    let actual_cell = self.variable_cell(actual, scope)?;
                    let formal_cell = self.variable_cell(&formal.name, name)?;
                    self.code.emit(Opcode::Load, actual_cell);
                    self.code.emit(Opcode::Store, formal_cell);
                }
                ParamKind::Array => {
                    let (base, start, end, is_argument) = {
                        let arr = self.array_entry(actual, scope)?;
                        (arr.base_cell, arr.start, arr.end, arr.is_argument)
                    };
                    if is_argument {
                        self.code.emit(Opcode::Load, base);
                    } else {
                        self.code.emit(Opcode::Set, base - start);
                    }
                    let formal_cell = {
                        let formal_arr = self.symbols.array_mut(&formal.name, name).ok_or_else(
                            || EmitError::MissingSymbol {
                                name: formal.name.clone(),
                                scope: name.to_string(),
                            },
                        )?;
                        formal_arr.start = start;
                        formal_arr.end = end;
                        formal_arr.base_cell
                    };
                    self.code.emit(Opcode::Store, formal_cell);
                }
            }
        }

        let line = self.code.current_line() as i64;
        self.code.emit(Opcode::Set, line + 3);
        self.code.emit(Opcode::Store, return_cell);
        let jump = self.code.emit(Opcode::Jump, 0);
        self.code.patch_branch(jump, entry as usize);

        for (formal, actual) in params.iter().zip(args) {
            if formal.kind == ParamKind::Scalar {
                let actual_cell = self.variable_cell(actual, scope)?;
                let formal_cell = self.variable_cell(&formal.name, name)?;
                self.code.emit(Opcode::Load, formal_cell);
                self.code.emit(Opcode::Store, actual_cell);
            }
        }
        Ok(())
    }

    fn read(&mut self, target: &Ident, scope: &str) -> Result<(), EmitError> {
        match self.static_cell(target, scope)? {
            Some(cell) => {
                self.code.emit(Opcode::Get, cell);
            }
            None => {
                self.compute_addr(target, scope)?;
                self.code.emit(Opcode::Store, STAGE_LEFT);
                self.code.emit(Opcode::Get, 0);
                self.code.emit(Opcode::Storei, STAGE_LEFT);
            }
        }
        Ok(())
    }

    fn write(&mut self, value: &Value, scope: &str) -> Result<(), EmitError> {
        match value {
            Value::Num(n) => {
                self.code.emit(Opcode::Set, *n);
                self.code.emit(Opcode::Put, 0);
            }
            Value::Id(ident) => match self.static_cell(ident, scope)? {
                Some(cell) => {
                    self.code.emit(Opcode::Put, cell);
                }
                None => {
                    self.load_ident(ident, scope)?;
                    self.code.emit(Opcode::Put, 0);
                }
            },
        }
        Ok(())
    }

    /// Computes `left - right` in the accumulator and emits the single
    /// polarity-encoding branch for the enclosing statement to patch.
    fn cond(&mut self, cond: &Cond, scope: &str) -> Result<CondBranch, EmitError> {
        match &cond.right {
            Value::Num(0) => {
                self.load_value(&cond.left, scope)?;
            }
            Value::Num(k) => {
                if let Value::Num(a) = &cond.left {
                    self.code.emit(Opcode::Set, a - k);
                } else {
                    self.code.emit(Opcode::Set, *k);
                    self.code.emit(Opcode::Store, 1);
                    self.load_value(&cond.left, scope)?;
                    self.code.emit(Opcode::Sub, 1);
                }
            }
            Value::Id(rid) => match self.static_cell(rid, scope)? {
                Some(cell) => {
                    self.load_value(&cond.left, scope)?;
                    self.code.emit(Opcode::Sub, cell);
                }
                None => {
                    // Right operand's effective address into cell 6, then
                    // one indirect subtraction.
                    self.compute_addr(rid, scope)?;
                    self.code.emit(Opcode::Store, STAGE_LEFT);
                    self.load_value(&cond.left, scope)?;
                    self.code.emit(Opcode::Subi, STAGE_LEFT);
                }
            },
        }
        let (op, arg, polarity) = match cond.op {
            RelOp::Eq => (Opcode::Jzero, 1, Polarity::WhenTrue),
            RelOp::Neq => (Opcode::Jzero, 2, Polarity::WhenFalse),
            RelOp::Lt => (Opcode::Jneg, 1, Polarity::WhenTrue),
            RelOp::Gt => (Opcode::Jpos, 1, Polarity::WhenTrue),
            RelOp::Leq => (Opcode::Jpos, 2, Polarity::WhenFalse),
            RelOp::Geq => (Opcode::Jneg, 2, Polarity::WhenFalse),
        };
        let line = self.code.emit(op, arg);
        Ok(CondBranch { line, polarity })
    }

    // ── identifier access ───────────────────────────────────────────────

    fn variable_cell(&self, name: &str, scope: &str) -> Result<i64, EmitError> {
        self.symbols
            .variable(name, scope)
            .map(|v| v.cell)
            .ok_or_else(|| EmitError::MissingSymbol {
                name: name.to_string(),
                scope: scope.to_string(),
            })
    }

    fn array_entry(&self, name: &str, scope: &str) -> Result<&crate::symbols::Array, EmitError> {
        self.symbols
            .array(name, scope)
            .ok_or_else(|| EmitError::MissingSymbol {
                name: name.to_string(),
                scope: scope.to_string(),
            })
    }

    /// The cell an identifier denotes when its address is known at compile
    /// time: a simple variable, or a literal index into a non-argument
    /// array. Everything else needs an address computation at run time.
    fn static_cell(&self, ident: &Ident, scope: &str) -> Result<Option<i64>, EmitError> {
        match ident {
            Ident::Simple { name } => self.variable_cell(name, scope).map(Some),
            Ident::IndexedByNum { name, index } => {
                let arr = self.array_entry(name, scope)?;
                if arr.is_argument {
                    Ok(None)
                } else {
                    Ok(Some(arr.base_cell + (index - arr.start)))
                }
            }
            Ident::IndexedByVar { .. } => Ok(None),
        }
    }

    /// Leaves the identifier's effective address in the accumulator.
    fn compute_addr(&mut self, ident: &Ident, scope: &str) -> Result<(), EmitError> {
        match ident {
            Ident::Simple { name } => {
                let cell = self.variable_cell(name, scope)?;
                self.code.emit(Opcode::Set, cell);
            }
            Ident::IndexedByNum { name, index } => {
                let (base, start, is_argument) = {
                    let arr = self.array_entry(name, scope)?;
                    (arr.base_cell, arr.start, arr.is_argument)
                };
                if is_argument {
                    self.code.emit(Opcode::Set, *index);
                    self.code.emit(Opcode::Add, base);
                } else {
                    self.code.emit(Opcode::Set, base + (index - start));
                }
            }
            Ident::IndexedByVar { name, index } => {
                let (base, start, is_argument) = {
                    let arr = self.array_entry(name, scope)?;
                    (arr.base_cell, arr.start, arr.is_argument)
                };
                let index_cell = self.variable_cell(index, scope)?;
                if is_argument {
                    self.code.emit(Opcode::Load, index_cell);
                    self.code.emit(Opcode::Add, base);
                } else {
                    self.code.emit(Opcode::Set, base - start);
                    self.code.emit(Opcode::Add, index_cell);
                }
            }
        }
        Ok(())
    }

    /// Loads the identifier's value into the accumulator.
    fn load_ident(&mut self, ident: &Ident, scope: &str) -> Result<(), EmitError> {
        match self.static_cell(ident, scope)? {
            Some(cell) => {
                self.code.emit(Opcode::Load, cell);
            }
            None => {
                self.compute_addr(ident, scope)?;
                self.code.emit(Opcode::Loadi, 0);
            }
        }
        Ok(())
    }

    fn load_value(&mut self, value: &Value, scope: &str) -> Result<(), EmitError> {
        match value {
            Value::Num(n) => {
                self.code.emit(Opcode::Set, *n);
            }
            Value::Id(ident) => self.load_ident(ident, scope)?,
        }
        Ok(())
    }

    /// Resolves an arithmetic operand: literals stay literal, statically
    /// addressable identifiers become their cell, anything else is
    /// computed into the accumulator and parked in `stage_cell`.
    fn resolve_operand(
        &mut self,
        value: &Value,
        scope: &str,
        stage_cell: i64,
    ) -> Result<Operand, EmitError> {
        match value {
            Value::Num(n) => Ok(Operand::Lit(*n)),
            Value::Id(ident) => match self.static_cell(ident, scope)? {
                Some(cell) => Ok(Operand::Cell(cell)),
                None => {
                    self.load_ident(ident, scope)?;
                    self.code.emit(Opcode::Store, stage_cell);
                    Ok(Operand::Cell(stage_cell))
                }
            },
        }
    }

    fn expr(&mut self, expr: &Expr, scope: &str) -> Result<(), EmitError> {
        match expr {
            Expr::Value(value) => self.load_value(value, scope),
            Expr::Bin { left, op, right } => {
                let l = self.resolve_operand(left, scope, STAGE_LEFT)?;
                let r = self.resolve_operand(right, scope, STAGE_RIGHT)?;
                match op {
                    BinOp::Add => self.add(l, r),
                    BinOp::Sub => self.sub(l, r),
                    BinOp::Mul => self.mul(l, r),
                    BinOp::Div => self.div(l, r),
                    BinOp::Mod => self.modulo(l, r),
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze;
    use crate::codegen::Instr;

    fn compile(program: &Program) -> CodeGen {
        let mut symbols = analyze(program).expect("semantic pass");
        emit(program, &mut symbols).expect("emission pass")
    }

    fn main_only(decls: Vec<Decl>, body: Vec<Stmt>) -> Program {
        Program { procs: vec![], main: Main { decls, body } }
    }

    #[test]
    fn echo_program_shape() {
        let program = main_only(
            vec![Decl::Var { name: "a".to_string() }],
            vec![
                Stmt::Read { target: Ident::Simple { name: "a".to_string() } },
                Stmt::Write { value: Value::Id(Ident::Simple { name: "a".to_string() }) },
            ],
        );
        let code = compile(&program);
        let instrs = code.instructions();
        // prologue, GET, PUT, HALT
        assert_eq!(instrs[0], Instr { op: Opcode::Set, arg: 1 });
        assert_eq!(instrs[1], Instr { op: Opcode::Store, arg: 10 });
        assert_eq!(instrs[2], Instr { op: Opcode::Get, arg: 11 });
        assert_eq!(instrs[3], Instr { op: Opcode::Put, arg: 11 });
        assert_eq!(instrs[4], Instr { op: Opcode::Halt, arg: 0 });
    }

    #[test]
    fn procedures_jumped_over_and_patched() {
        let program = Program {
            procs: vec![Proc {
                name: "p".to_string(),
                params: vec![Param { name: "x".to_string(), kind: ParamKind::Scalar }],
                decls: vec![],
                body: vec![Stmt::Write {
                    value: Value::Id(Ident::Simple { name: "x".to_string() }),
                }],
            }],
            main: Main { decls: vec![], body: vec![] },
        };
        let code = compile(&program);
        let instrs = code.instructions();
        assert_eq!(instrs[0].op, Opcode::Jump);
        let target = instrs[0].arg as usize;
        // the initial jump lands on the prologue, past the procedure body
        assert_eq!(instrs[target], Instr { op: Opcode::Set, arg: 1 });
        assert!(instrs[..target].iter().any(|i| i.op == Opcode::Rtrn));
        assert_eq!(instrs.last().unwrap().op, Opcode::Halt);
    }

    #[test]
    fn condition_polarity_arguments() {
        for (op, expected_op, expected_arg) in [
            (RelOp::Eq, Opcode::Jzero, 1),
            (RelOp::Neq, Opcode::Jzero, 2),
            (RelOp::Lt, Opcode::Jneg, 1),
            (RelOp::Gt, Opcode::Jpos, 1),
            (RelOp::Leq, Opcode::Jpos, 2),
            (RelOp::Geq, Opcode::Jneg, 2),
        ] {
            let mut symbols = SymbolTable::new();
            let mut emitter = Emitter { code: CodeGen::new(), symbols: &mut symbols };
            let cond = Cond { left: Value::Num(1), op, right: Value::Num(2) };
            let branch = emitter.cond(&cond, MAIN).unwrap();
            let instr = emitter.code.instr(branch.line).unwrap();
            assert_eq!(instr.op, expected_op);
            assert_eq!(instr.arg, expected_arg);
        }
    }

    #[test]
    fn all_branches_stay_in_range() {
        // a program exercising every control construct
        let var = |n: &str| Value::Id(Ident::Simple { name: n.to_string() });
        let program = main_only(
            vec![Decl::Var { name: "a".to_string() }, Decl::Var { name: "b".to_string() }],
            vec![
                Stmt::Read { target: Ident::Simple { name: "a".to_string() } },
                Stmt::If {
                    cond: Cond { left: var("a"), op: RelOp::Gt, right: Value::Num(0) },
                    then_cmds: vec![Stmt::Write { value: Value::Num(1) }],
                    else_cmds: Some(vec![Stmt::Write { value: Value::Num(0) }]),
                },
                Stmt::While {
                    cond: Cond { left: var("a"), op: RelOp::Gt, right: Value::Num(0) },
                    body: vec![Stmt::Assign {
                        target: Ident::Simple { name: "a".to_string() },
                        expr: Expr::Bin { left: var("a"), op: BinOp::Sub, right: Value::Num(1) },
                    }],
                },
                Stmt::Repeat {
                    body: vec![Stmt::Assign {
                        target: Ident::Simple { name: "a".to_string() },
                        expr: Expr::Bin { left: var("a"), op: BinOp::Add, right: Value::Num(1) },
                    }],
                    cond: Cond { left: var("a"), op: RelOp::Eq, right: Value::Num(3) },
                },
                Stmt::For {
                    iterator: "i".to_string(),
                    from: Value::Num(1),
                    to: Value::Num(4),
                    downto: false,
                    body: vec![Stmt::Assign {
                        target: Ident::Simple { name: "b".to_string() },
                        expr: Expr::Bin { left: var("a"), op: BinOp::Mul, right: var("i") },
                    }],
                },
            ],
        );
        let code = compile(&program);
        let len = code.instructions().len() as i64;
        for (line, instr) in code.instructions().iter().enumerate() {
            if instr.op.is_branch() {
                let target = line as i64 + instr.arg;
                assert!(
                    (0..len).contains(&target),
                    "branch at {line} targets {target} outside [0, {len})"
                );
            }
        }
    }
}
