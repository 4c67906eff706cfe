use std::collections::HashMap;

use crate::ast::{Param, ParamKind};

/// Scope name for the procedure namespace.
pub const GLOBAL: &str = "GLOBAL";
/// Scope name for the program's main block.
pub const MAIN: &str = "MAIN";

/// Cells 0-10 are reserved: 0 is the accumulator alias, 1-8 scratch,
/// 9 the for-loop sentinel slot, 10 the constant one. User data starts
/// here.
pub const FIRST_USER_CELL: i64 = 11;

/// Hidden variable holding a for-loop's adjusted bound. Keyed by the
/// iterator so that nested loops with distinct iterators get distinct
/// cells; `#` cannot occur in a source identifier.
pub fn for_limit_name(iterator: &str) -> String {
    format!("{iterator}#limit")
}

#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("'{name}' already declared in scope {scope}")]
    Duplicate { name: String, scope: String },
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub scope: String,
    pub cell: i64,
    pub initialized: bool,
    pub is_argument: bool,
}

/// A declared array. Non-argument arrays own `end - start + 1` contiguous
/// cells from `base_cell`; index `i` lives at `base_cell + (i - start)`.
/// An argument array owns a single cell holding an offset such that
/// `offset + i` is the address of element `i` of the actual; its bounds are
/// rewritten at every call site that binds it.
#[derive(Debug, Clone)]
pub struct Array {
    pub name: String,
    pub scope: String,
    pub start: i64,
    pub end: i64,
    pub base_cell: i64,
    pub initialized: HashMap<i64, bool>,
    pub is_argument: bool,
}

#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub params: Vec<Param>,
    /// Cell holding the caller's return address; one per procedure, which
    /// is what makes recursion unsound.
    pub return_cell: i64,
    /// Address of the first instruction of the body, set when emission of
    /// the body begins.
    pub jump_label: Option<i64>,
}

/// What a call site's actual/formal comparison can get wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureIssue {
    Arity,
    Kind { position: usize },
    UnknownActual { name: String },
}

/// Scoped registry of variables, arrays and procedures, and the allocator
/// for VM memory cells. Built once by the semantic pass; the emission pass
/// only writes `jump_label` and argument-array bounds.
#[derive(Debug)]
pub struct SymbolTable {
    variables: HashMap<(String, String), Variable>,
    arrays: HashMap<(String, String), Array>,
    procedures: HashMap<String, Procedure>,
    next_cell: i64,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            variables: HashMap::new(),
            arrays: HashMap::new(),
            procedures: HashMap::new(),
            next_cell: FIRST_USER_CELL,
        }
    }

    fn alloc_cell(&mut self) -> i64 {
        let cell = self.next_cell;
        self.next_cell += 1;
        cell
    }

    fn alloc_cells(&mut self, n: i64) -> i64 {
        let base = self.next_cell;
        self.next_cell += n;
        base
    }

    /// First cell past all allocated user data.
    pub fn next_free_cell(&self) -> i64 {
        self.next_cell
    }

    fn key(name: &str, scope: &str) -> (String, String) {
        (name.to_string(), scope.to_string())
    }

    fn occupied(&self, name: &str, scope: &str) -> bool {
        let key = Self::key(name, scope);
        self.variables.contains_key(&key) || self.arrays.contains_key(&key)
    }

    pub fn declare_variable(&mut self, name: &str, scope: &str) -> Result<(), SymbolError> {
        if self.occupied(name, scope) {
            return Err(SymbolError::Duplicate { name: name.to_string(), scope: scope.to_string() });
        }
        let cell = self.alloc_cell();
        self.variables.insert(
            Self::key(name, scope),
            Variable {
                name: name.to_string(),
                scope: scope.to_string(),
                cell,
                initialized: false,
                is_argument: false,
            },
        );
        Ok(())
    }

    pub fn declare_array(
        &mut self,
        name: &str,
        scope: &str,
        start: i64,
        end: i64,
    ) -> Result<(), SymbolError> {
        if self.occupied(name, scope) {
            return Err(SymbolError::Duplicate { name: name.to_string(), scope: scope.to_string() });
        }
        let len = (end - start + 1).max(0);
        let base_cell = self.alloc_cells(len);
        let initialized = (start..=end).map(|i| (i, false)).collect();
        self.arrays.insert(
            Self::key(name, scope),
            Array {
                name: name.to_string(),
                scope: scope.to_string(),
                start,
                end,
                base_cell,
                initialized,
                is_argument: false,
            },
        );
        Ok(())
    }

    /// Declares a procedure in `GLOBAL`, allocates its return cell and
    /// materializes its formals as entries of the procedure's own scope:
    /// initialized, marked as arguments, array formals as one-cell `[0,0]`
    /// descriptors whose bounds are rewritten at call sites.
    pub fn declare_procedure(&mut self, name: &str, params: &[Param]) -> Result<(), SymbolError> {
        if self.procedures.contains_key(name) {
            return Err(SymbolError::Duplicate { name: name.to_string(), scope: GLOBAL.to_string() });
        }
        let return_cell = self.alloc_cell();
        self.procedures.insert(
            name.to_string(),
            Procedure {
                name: name.to_string(),
                params: params.to_vec(),
                return_cell,
                jump_label: None,
            },
        );
        for param in params {
            match param.kind {
                ParamKind::Scalar => {
                    self.declare_variable(&param.name, name)?;
                    if let Some(var) = self.variable_mut(&param.name, name) {
                        var.initialized = true;
                        var.is_argument = true;
                    }
                }
                ParamKind::Array => {
                    self.declare_array(&param.name, name, 0, 0)?;
                    if let Some(arr) = self.array_mut(&param.name, name) {
                        arr.initialized.insert(0, true);
                        arr.is_argument = true;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn variable(&self, name: &str, scope: &str) -> Option<&Variable> {
        self.variables.get(&Self::key(name, scope))
    }

    pub fn variable_mut(&mut self, name: &str, scope: &str) -> Option<&mut Variable> {
        self.variables.get_mut(&Self::key(name, scope))
    }

    pub fn array(&self, name: &str, scope: &str) -> Option<&Array> {
        self.arrays.get(&Self::key(name, scope))
    }

    pub fn array_mut(&mut self, name: &str, scope: &str) -> Option<&mut Array> {
        self.arrays.get_mut(&Self::key(name, scope))
    }

    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.get(name)
    }

    pub fn procedure_mut(&mut self, name: &str) -> Option<&mut Procedure> {
        self.procedures.get_mut(name)
    }

    pub fn has_variable(&self, name: &str, scope: &str) -> bool {
        self.variables.contains_key(&Self::key(name, scope))
    }

    pub fn has_array(&self, name: &str, scope: &str) -> bool {
        self.arrays.contains_key(&Self::key(name, scope))
    }

    pub fn has_procedure(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// Checks a call site against the callee's formals: arity, and per
    /// position a variable actual for a scalar formal, an array actual for
    /// an array formal. Actuals are resolved in `scope`.
    pub fn check_signature(
        &self,
        proc_name: &str,
        scope: &str,
        actuals: &[String],
    ) -> Result<(), SignatureIssue> {
        let Some(proc) = self.procedure(proc_name) else {
            return Err(SignatureIssue::UnknownActual { name: proc_name.to_string() });
        };
        if proc.params.len() != actuals.len() {
            return Err(SignatureIssue::Arity);
        }
        for (position, (formal, actual)) in proc.params.iter().zip(actuals).enumerate() {
            let is_var = self.has_variable(actual, scope);
            let is_arr = self.has_array(actual, scope);
            if !is_var && !is_arr {
                return Err(SignatureIssue::UnknownActual { name: actual.clone() });
            }
            let matches = match formal.kind {
                ParamKind::Scalar => is_var,
                ParamKind::Array => is_arr,
            };
            if !matches {
                return Err(SignatureIssue::Kind { position });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, kind: ParamKind) -> Param {
        Param { name: name.to_string(), kind }
    }

    #[test]
    fn cells_allocated_from_eleven() {
        let mut table = SymbolTable::new();
        table.declare_variable("a", MAIN).unwrap();
        table.declare_variable("b", MAIN).unwrap();
        assert_eq!(table.variable("a", MAIN).unwrap().cell, 11);
        assert_eq!(table.variable("b", MAIN).unwrap().cell, 12);
    }

    #[test]
    fn array_occupies_contiguous_cells() {
        let mut table = SymbolTable::new();
        table.declare_array("t", MAIN, -2, 3).unwrap();
        table.declare_variable("x", MAIN).unwrap();
        let arr = table.array("t", MAIN).unwrap();
        assert_eq!(arr.base_cell, 11);
        assert_eq!(arr.initialized.len(), 6);
        assert!(arr.initialized.contains_key(&-2));
        assert!(arr.initialized.contains_key(&3));
        // six cells for the array, then the scalar
        assert_eq!(table.variable("x", MAIN).unwrap().cell, 17);
        assert_eq!(table.next_free_cell(), 18);
    }

    #[test]
    fn duplicate_variable_rejected() {
        let mut table = SymbolTable::new();
        table.declare_variable("a", MAIN).unwrap();
        assert!(table.declare_variable("a", MAIN).is_err());
        // same name under another scope is a different entity
        assert!(table.declare_variable("a", "p").is_ok());
    }

    #[test]
    fn variable_and_array_share_namespace() {
        let mut table = SymbolTable::new();
        table.declare_variable("a", MAIN).unwrap();
        assert!(table.declare_array("a", MAIN, 0, 4).is_err());
    }

    #[test]
    fn procedure_gets_return_cell_and_formals() {
        let mut table = SymbolTable::new();
        table
            .declare_procedure("p", &[param("x", ParamKind::Scalar), param("t", ParamKind::Array)])
            .unwrap();
        let proc = table.procedure("p").unwrap();
        assert_eq!(proc.return_cell, 11);
        assert_eq!(proc.jump_label, None);

        let x = table.variable("x", "p").unwrap();
        assert_eq!(x.cell, 12);
        assert!(x.initialized);
        assert!(x.is_argument);

        let t = table.array("t", "p").unwrap();
        assert_eq!(t.base_cell, 13);
        assert_eq!((t.start, t.end), (0, 0));
        assert!(t.is_argument);
        assert_eq!(t.initialized.get(&0), Some(&true));
    }

    #[test]
    fn signature_check_arity_and_kind() {
        let mut table = SymbolTable::new();
        table
            .declare_procedure("p", &[param("x", ParamKind::Scalar), param("t", ParamKind::Array)])
            .unwrap();
        table.declare_variable("a", MAIN).unwrap();
        table.declare_array("arr", MAIN, 0, 1).unwrap();

        assert_eq!(
            table.check_signature("p", MAIN, &["a".to_string()]),
            Err(SignatureIssue::Arity)
        );
        assert_eq!(
            table.check_signature("p", MAIN, &["arr".to_string(), "a".to_string()]),
            Err(SignatureIssue::Kind { position: 0 })
        );
        assert_eq!(
            table.check_signature("p", MAIN, &["a".to_string(), "ghost".to_string()]),
            Err(SignatureIssue::UnknownActual { name: "ghost".to_string() })
        );
        assert!(table
            .check_signature("p", MAIN, &["a".to_string(), "arr".to_string()])
            .is_ok());
    }
}
