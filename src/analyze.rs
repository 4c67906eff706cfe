use crate::ast::*;
use crate::symbols::{SignatureIssue, SymbolError, SymbolTable, MAIN};

/// A semantic diagnostic. Any one of these aborts compilation; there is no
/// recovery pass.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalyzeError {
    #[error("undeclared identifier '{name}' in scope {scope}")]
    Undeclared { name: String, scope: String },

    #[error("'{name}' redeclared in scope {scope}")]
    Redeclared { name: String, scope: String },

    #[error("index {index} out of bounds for array '{name}' in scope {scope}")]
    IndexOutOfBounds { name: String, scope: String, index: i64 },

    #[error("use of uninitialized '{name}' in scope {scope}")]
    Uninitialized { name: String, scope: String },

    #[error("cannot write to loop iterator '{name}' in scope {scope}")]
    IteratorWrite { name: String, scope: String },

    #[error("call to '{name}' does not match its signature in scope {scope}")]
    SignatureMismatch { name: String, scope: String },

    #[error("recursive call to '{name}'")]
    RecursiveCall { name: String },
}

impl AnalyzeError {
    pub fn code(&self) -> &'static str {
        match self {
            AnalyzeError::Undeclared { .. } => "ACC-S001",
            AnalyzeError::Redeclared { .. } => "ACC-S002",
            AnalyzeError::IndexOutOfBounds { .. } => "ACC-S003",
            AnalyzeError::Uninitialized { .. } => "ACC-S004",
            AnalyzeError::IteratorWrite { .. } => "ACC-S005",
            AnalyzeError::SignatureMismatch { .. } => "ACC-S006",
            AnalyzeError::RecursiveCall { .. } => "ACC-S007",
        }
    }
}

/// Runs the semantic pass: populates a fresh symbol table from the
/// program's declarations, checks every identifier reference, propagates
/// initialization and enforces the iterator and call rules. Returns the
/// populated table for the emission pass.
pub fn analyze(program: &Program) -> Result<SymbolTable, AnalyzeError> {
    let mut analyzer = Analyzer { symbols: SymbolTable::new(), iterator: None };
    for proc in &program.procs {
        analyzer.proc(proc)?;
    }
    analyzer.decls(&program.main.decls, MAIN)?;
    analyzer.stmts(&program.main.body, MAIN)?;
    Ok(analyzer.symbols)
}

struct Analyzer {
    symbols: SymbolTable,
    /// Name of the innermost for-loop iterator, if any. Saved and restored
    /// around loop bodies, so an inner loop masks but does not erase an
    /// outer one.
    iterator: Option<String>,
}

impl Analyzer {
    fn duplicate(err: SymbolError) -> AnalyzeError {
        let SymbolError::Duplicate { name, scope } = err;
        AnalyzeError::Redeclared { name, scope }
    }

    fn proc(&mut self, proc: &Proc) -> Result<(), AnalyzeError> {
        self.symbols
            .declare_procedure(&proc.name, &proc.params)
            .map_err(Self::duplicate)?;
        self.decls(&proc.decls, &proc.name)?;
        self.stmts(&proc.body, &proc.name)
    }

    fn decls(&mut self, decls: &[Decl], scope: &str) -> Result<(), AnalyzeError> {
        for decl in decls {
            match decl {
                Decl::Var { name } => self
                    .symbols
                    .declare_variable(name, scope)
                    .map_err(Self::duplicate)?,
                Decl::Array { name, from, to } => self
                    .symbols
                    .declare_array(name, scope, *from, *to)
                    .map_err(Self::duplicate)?,
            }
        }
        Ok(())
    }

    fn stmts(&mut self, stmts: &[Stmt], scope: &str) -> Result<(), AnalyzeError> {
        for stmt in stmts {
            self.stmt(stmt, scope)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt, scope: &str) -> Result<(), AnalyzeError> {
        match stmt {
            Stmt::Assign { target, expr } => {
                self.check_iterator_target(target, scope)?;
                self.check_ident(target, scope)?;
                self.check_expr(expr, scope)?;
                self.check_expr_initialized(expr, scope)?;
                self.mark_initialized(target, scope);
                Ok(())
            }
            Stmt::If { cond, then_cmds, else_cmds } => {
                self.check_cond(cond, scope)?;
                self.stmts(then_cmds, scope)?;
                if let Some(else_cmds) = else_cmds {
                    self.stmts(else_cmds, scope)?;
                }
                Ok(())
            }
            Stmt::While { cond, body } => {
                self.check_cond(cond, scope)?;
                self.stmts(body, scope)
            }
            Stmt::Repeat { body, cond } => {
                self.stmts(body, scope)?;
                self.check_cond(cond, scope)
            }
            Stmt::For { iterator, from, to, body, .. } => {
                if !self.symbols.has_variable(iterator, scope) {
                    self.symbols
                        .declare_variable(iterator, scope)
                        .map_err(Self::duplicate)?;
                }
                if let Some(var) = self.symbols.variable_mut(iterator, scope) {
                    var.initialized = true;
                }
                // the loop's adjusted bound lives in a hidden cell of its
                // own, or nested loops would trample a shared one
                let limit = crate::symbols::for_limit_name(iterator);
                if !self.symbols.has_variable(&limit, scope) {
                    self.symbols
                        .declare_variable(&limit, scope)
                        .map_err(Self::duplicate)?;
                }
                let saved = self.iterator.replace(iterator.clone());
                let result = self
                    .check_value(from, scope)
                    .and_then(|()| self.check_value(to, scope))
                    .and_then(|()| self.stmts(body, scope));
                self.iterator = saved;
                result
            }
            Stmt::Call { name, args } => self.call(name, args, scope),
            Stmt::Read { target } => {
                self.check_iterator_target(target, scope)?;
                self.check_ident(target, scope)?;
                self.mark_initialized(target, scope);
                Ok(())
            }
            Stmt::Write { value } => self.check_value(value, scope),
        }
    }

    fn call(&mut self, name: &str, args: &[String], scope: &str) -> Result<(), AnalyzeError> {
        if !self.symbols.has_procedure(name) {
            return Err(AnalyzeError::Undeclared {
                name: name.to_string(),
                scope: scope.to_string(),
            });
        }
        if scope == name {
            return Err(AnalyzeError::RecursiveCall { name: name.to_string() });
        }
        if let Err(issue) = self.symbols.check_signature(name, scope, args) {
            return Err(match issue {
                SignatureIssue::UnknownActual { name } => AnalyzeError::Undeclared {
                    name,
                    scope: scope.to_string(),
                },
                SignatureIssue::Arity | SignatureIssue::Kind { .. } => {
                    AnalyzeError::SignatureMismatch {
                        name: name.to_string(),
                        scope: scope.to_string(),
                    }
                }
            });
        }
        // Scalar actuals are written back on return, so the active
        // iterator may not be among them; they also count as initialized
        // from here on.
        let params = self
            .symbols
            .procedure(name)
            .map(|p| p.params.clone())
            .unwrap_or_default();
        for (formal, actual) in params.iter().zip(args) {
            if formal.kind == ParamKind::Scalar {
                if self.iterator.as_deref() == Some(actual.as_str()) {
                    return Err(AnalyzeError::IteratorWrite {
                        name: actual.clone(),
                        scope: scope.to_string(),
                    });
                }
                if let Some(var) = self.symbols.variable_mut(actual, scope) {
                    var.initialized = true;
                }
            }
        }
        Ok(())
    }

    fn check_iterator_target(&self, target: &Ident, scope: &str) -> Result<(), AnalyzeError> {
        if let Ident::Simple { name } = target {
            if self.iterator.as_deref() == Some(name.as_str()) {
                return Err(AnalyzeError::IteratorWrite {
                    name: name.clone(),
                    scope: scope.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Declaration and (for literal indices into non-argument arrays)
    /// bounds checking for one identifier reference.
    fn check_ident(&self, ident: &Ident, scope: &str) -> Result<(), AnalyzeError> {
        match ident {
            Ident::Simple { name } => {
                if !self.symbols.has_variable(name, scope) {
                    return Err(AnalyzeError::Undeclared {
                        name: name.clone(),
                        scope: scope.to_string(),
                    });
                }
            }
            Ident::IndexedByNum { name, index } => {
                let Some(arr) = self.symbols.array(name, scope) else {
                    return Err(AnalyzeError::Undeclared {
                        name: name.clone(),
                        scope: scope.to_string(),
                    });
                };
                if !arr.is_argument && (*index < arr.start || *index > arr.end) {
                    return Err(AnalyzeError::IndexOutOfBounds {
                        name: name.clone(),
                        scope: scope.to_string(),
                        index: *index,
                    });
                }
            }
            Ident::IndexedByVar { name, index } => {
                if !self.symbols.has_array(name, scope) {
                    return Err(AnalyzeError::Undeclared {
                        name: name.clone(),
                        scope: scope.to_string(),
                    });
                }
                if !self.symbols.has_variable(index, scope) {
                    return Err(AnalyzeError::Undeclared {
                        name: index.clone(),
                        scope: scope.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_value(&self, value: &Value, scope: &str) -> Result<(), AnalyzeError> {
        match value {
            Value::Num(_) => Ok(()),
            Value::Id(ident) => self.check_ident(ident, scope),
        }
    }

    fn check_cond(&self, cond: &Cond, scope: &str) -> Result<(), AnalyzeError> {
        self.check_value(&cond.left, scope)?;
        self.check_value(&cond.right, scope)
    }

    fn check_expr(&self, expr: &Expr, scope: &str) -> Result<(), AnalyzeError> {
        match expr {
            Expr::Value(value) => self.check_value(value, scope),
            Expr::Bin { left, right, .. } => {
                self.check_value(left, scope)?;
                self.check_value(right, scope)
            }
        }
    }

    /// Every identifier operand of an arithmetic right-hand side must have
    /// been written before it is read. Argument variables/arrays and
    /// variable-indexed cells are assumed initialized.
    fn check_expr_initialized(&self, expr: &Expr, scope: &str) -> Result<(), AnalyzeError> {
        let values: [Option<&Value>; 2] = match expr {
            Expr::Value(value) => [Some(value), None],
            Expr::Bin { left, right, .. } => [Some(left), Some(right)],
        };
        for value in values.into_iter().flatten() {
            if let Value::Id(ident) = value {
                if !self.ident_initialized(ident, scope) {
                    return Err(AnalyzeError::Uninitialized {
                        name: ident.name().to_string(),
                        scope: scope.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn ident_initialized(&self, ident: &Ident, scope: &str) -> bool {
        match ident {
            Ident::Simple { name } => self
                .symbols
                .variable(name, scope)
                .map(|v| v.is_argument || v.initialized)
                .unwrap_or(false),
            Ident::IndexedByNum { name, index } => self
                .symbols
                .array(name, scope)
                .map(|a| a.is_argument || a.initialized.get(index).copied().unwrap_or(false))
                .unwrap_or(false),
            // Cells addressed through a variable are assumed safe.
            Ident::IndexedByVar { .. } => true,
        }
    }

    fn mark_initialized(&mut self, target: &Ident, scope: &str) {
        match target {
            Ident::Simple { name } => {
                if let Some(var) = self.symbols.variable_mut(name, scope) {
                    var.initialized = true;
                }
            }
            Ident::IndexedByNum { name, index } => {
                if let Some(arr) = self.symbols.array_mut(name, scope) {
                    if !arr.is_argument {
                        arr.initialized.insert(*index, true);
                    }
                }
            }
            Ident::IndexedByVar { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(name: &str) -> Ident {
        Ident::Simple { name: name.to_string() }
    }

    fn var(name: &str) -> Value {
        Value::Id(simple(name))
    }

    fn assign(target: Ident, expr: Expr) -> Stmt {
        Stmt::Assign { target, expr }
    }

    fn main_program(decls: Vec<Decl>, body: Vec<Stmt>) -> Program {
        Program { procs: vec![], main: Main { decls, body } }
    }

    fn decl_var(name: &str) -> Decl {
        Decl::Var { name: name.to_string() }
    }

    #[test]
    fn undeclared_variable_rejected() {
        let program = main_program(
            vec![],
            vec![assign(simple("a"), Expr::Value(Value::Num(1)))],
        );
        assert!(matches!(
            analyze(&program),
            Err(AnalyzeError::Undeclared { name, .. }) if name == "a"
        ));
    }

    #[test]
    fn duplicate_declaration_rejected() {
        let program = main_program(vec![decl_var("a"), decl_var("a")], vec![]);
        assert!(matches!(analyze(&program), Err(AnalyzeError::Redeclared { .. })));
    }

    #[test]
    fn literal_index_bounds_checked() {
        let program = main_program(
            vec![Decl::Array { name: "t".to_string(), from: 1, to: 5 }],
            vec![assign(
                Ident::IndexedByNum { name: "t".to_string(), index: 6 },
                Expr::Value(Value::Num(0)),
            )],
        );
        assert!(matches!(
            analyze(&program),
            Err(AnalyzeError::IndexOutOfBounds { index: 6, .. })
        ));
    }

    #[test]
    fn uninitialized_read_rejected() {
        let program = main_program(
            vec![decl_var("a"), decl_var("b")],
            vec![assign(
                simple("a"),
                Expr::Bin { left: var("b"), op: BinOp::Add, right: Value::Num(1) },
            )],
        );
        assert!(matches!(
            analyze(&program),
            Err(AnalyzeError::Uninitialized { name, .. }) if name == "b"
        ));
    }

    #[test]
    fn read_initializes_target() {
        let program = main_program(
            vec![decl_var("a"), decl_var("b")],
            vec![
                Stmt::Read { target: simple("b") },
                assign(
                    simple("a"),
                    Expr::Bin { left: var("b"), op: BinOp::Add, right: Value::Num(1) },
                ),
            ],
        );
        let symbols = analyze(&program).unwrap();
        assert!(symbols.variable("a", MAIN).unwrap().initialized);
        assert!(symbols.variable("b", MAIN).unwrap().initialized);
    }

    #[test]
    fn array_initialization_is_per_cell() {
        let program = main_program(
            vec![
                Decl::Array { name: "t".to_string(), from: 0, to: 2 },
                decl_var("a"),
            ],
            vec![
                assign(
                    Ident::IndexedByNum { name: "t".to_string(), index: 1 },
                    Expr::Value(Value::Num(4)),
                ),
                assign(
                    simple("a"),
                    Expr::Value(Value::Id(Ident::IndexedByNum {
                        name: "t".to_string(),
                        index: 0,
                    })),
                ),
            ],
        );
        assert!(matches!(
            analyze(&program),
            Err(AnalyzeError::Uninitialized { name, .. }) if name == "t"
        ));
    }

    #[test]
    fn iterator_assignment_rejected() {
        let program = main_program(
            vec![decl_var("n")],
            vec![
                Stmt::Read { target: simple("n") },
                Stmt::For {
                    iterator: "i".to_string(),
                    from: Value::Num(1),
                    to: var("n"),
                    downto: false,
                    body: vec![assign(simple("i"), Expr::Value(Value::Num(0)))],
                },
            ],
        );
        assert!(matches!(
            analyze(&program),
            Err(AnalyzeError::IteratorWrite { name, .. }) if name == "i"
        ));
    }

    #[test]
    fn outer_iterator_still_protected_after_inner_loop() {
        let body = vec![
            Stmt::For {
                iterator: "j".to_string(),
                from: Value::Num(1),
                to: Value::Num(2),
                downto: false,
                body: vec![],
            },
            // after the inner loop ends, `i` must still be locked
            assign(simple("i"), Expr::Value(Value::Num(0))),
        ];
        let program = main_program(
            vec![],
            vec![Stmt::For {
                iterator: "i".to_string(),
                from: Value::Num(1),
                to: Value::Num(3),
                downto: false,
                body,
            }],
        );
        assert!(matches!(
            analyze(&program),
            Err(AnalyzeError::IteratorWrite { name, .. }) if name == "i"
        ));
    }

    #[test]
    fn iterator_readable_in_expressions() {
        let program = main_program(
            vec![decl_var("s")],
            vec![
                assign(simple("s"), Expr::Value(Value::Num(0))),
                Stmt::For {
                    iterator: "i".to_string(),
                    from: Value::Num(1),
                    to: Value::Num(10),
                    downto: false,
                    body: vec![assign(
                        simple("s"),
                        Expr::Bin { left: var("s"), op: BinOp::Add, right: var("i") },
                    )],
                },
            ],
        );
        assert!(analyze(&program).is_ok());
    }

    fn squaring_proc() -> Proc {
        // p(x, t): t[0] := x * x
        Proc {
            name: "p".to_string(),
            params: vec![
                Param { name: "x".to_string(), kind: ParamKind::Scalar },
                Param { name: "t".to_string(), kind: ParamKind::Array },
            ],
            decls: vec![],
            body: vec![assign(
                Ident::IndexedByNum { name: "t".to_string(), index: 0 },
                Expr::Bin { left: var("x"), op: BinOp::Mul, right: var("x") },
            )],
        }
    }

    #[test]
    fn call_kind_mismatch_rejected() {
        let program = Program {
            procs: vec![squaring_proc()],
            main: Main {
                decls: vec![decl_var("a"), Decl::Array { name: "t".to_string(), from: 0, to: 0 }],
                body: vec![
                    Stmt::Read { target: simple("a") },
                    Stmt::Call { name: "p".to_string(), args: vec!["t".to_string(), "a".to_string()] },
                ],
            },
        };
        assert!(matches!(
            analyze(&program),
            Err(AnalyzeError::SignatureMismatch { name, .. }) if name == "p"
        ));
    }

    #[test]
    fn call_arity_mismatch_rejected() {
        let program = Program {
            procs: vec![squaring_proc()],
            main: Main {
                decls: vec![decl_var("a")],
                body: vec![Stmt::Call { name: "p".to_string(), args: vec!["a".to_string()] }],
            },
        };
        assert!(matches!(analyze(&program), Err(AnalyzeError::SignatureMismatch { .. })));
    }

    #[test]
    fn self_call_rejected() {
        let mut proc = squaring_proc();
        proc.body.push(Stmt::Call {
            name: "p".to_string(),
            args: vec!["x".to_string(), "t".to_string()],
        });
        let program = Program {
            procs: vec![proc],
            main: Main { decls: vec![], body: vec![] },
        };
        assert!(matches!(
            analyze(&program),
            Err(AnalyzeError::RecursiveCall { name }) if name == "p"
        ));
    }

    #[test]
    fn forward_call_rejected_as_undeclared() {
        let mut first = squaring_proc();
        first.name = "q".to_string();
        first.body = vec![Stmt::Call {
            name: "p".to_string(),
            args: vec!["x".to_string(), "t".to_string()],
        }];
        let program = Program {
            procs: vec![first, squaring_proc()],
            main: Main { decls: vec![], body: vec![] },
        };
        assert!(matches!(
            analyze(&program),
            Err(AnalyzeError::Undeclared { name, .. }) if name == "p"
        ));
    }

    #[test]
    fn scalar_actual_marked_initialized_by_call() {
        let program = Program {
            procs: vec![squaring_proc()],
            main: Main {
                decls: vec![decl_var("a"), Decl::Array { name: "t".to_string(), from: 0, to: 0 }],
                body: vec![Stmt::Call {
                    name: "p".to_string(),
                    args: vec!["a".to_string(), "t".to_string()],
                }],
            },
        };
        let symbols = analyze(&program).unwrap();
        assert!(symbols.variable("a", MAIN).unwrap().initialized);
    }

    #[test]
    fn iterator_as_scalar_actual_rejected() {
        let program = Program {
            procs: vec![squaring_proc()],
            main: Main {
                decls: vec![Decl::Array { name: "t".to_string(), from: 0, to: 0 }],
                body: vec![Stmt::For {
                    iterator: "i".to_string(),
                    from: Value::Num(1),
                    to: Value::Num(3),
                    downto: false,
                    body: vec![Stmt::Call {
                        name: "p".to_string(),
                        args: vec!["i".to_string(), "t".to_string()],
                    }],
                }],
            },
        };
        assert!(matches!(
            analyze(&program),
            Err(AnalyzeError::IteratorWrite { name, .. }) if name == "i"
        ));
    }

    #[test]
    fn formal_parameters_count_as_initialized() {
        // reading a formal inside the body is fine without any write
        let program = Program {
            procs: vec![squaring_proc()],
            main: Main { decls: vec![], body: vec![] },
        };
        let symbols = analyze(&program).unwrap();
        assert!(symbols.variable("x", "p").unwrap().is_argument);
        assert!(symbols.array("t", "p").unwrap().is_argument);
    }
}
