use serde::{Deserialize, Serialize};

/// How an identifier refers to storage: a plain variable, an array cell
/// addressed by a numeric literal, or an array cell addressed by another
/// variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ident {
    Simple { name: String },
    IndexedByNum { name: String, index: i64 },
    IndexedByVar { name: String, index: String },
}

impl Ident {
    pub fn name(&self) -> &str {
        match self {
            Ident::Simple { name }
            | Ident::IndexedByNum { name, .. }
            | Ident::IndexedByVar { name, .. } => name,
        }
    }
}

/// An operand: a signed integer literal or an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Num(i64),
    Id(Ident),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Right-hand side of an assignment: either a bare value copy or exactly
/// one binary operation. The grammar has no nested expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Value(Value),
    Bin { left: Value, op: BinOp, right: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cond {
    pub left: Value,
    pub op: RelOp,
    pub right: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stmt {
    Assign {
        target: Ident,
        expr: Expr,
    },

    If {
        cond: Cond,
        then_cmds: Vec<Stmt>,
        else_cmds: Option<Vec<Stmt>>,
    },

    While {
        cond: Cond,
        body: Vec<Stmt>,
    },

    /// Post-tested loop: the body runs at least once, exits when `cond`
    /// holds.
    Repeat {
        body: Vec<Stmt>,
        cond: Cond,
    },

    /// Counted loop. `downto: false` steps the iterator up from `from` to
    /// `to`, `downto: true` steps it down.
    For {
        iterator: String,
        from: Value,
        to: Value,
        downto: bool,
        body: Vec<Stmt>,
    },

    /// Procedure call; arguments are bare identifiers resolved in the
    /// calling scope.
    Call {
        name: String,
        args: Vec<String>,
    },

    Read {
        target: Ident,
    },

    Write {
        value: Value,
    },
}

/// Local declaration: a scalar, or an array with inclusive bounds
/// (possibly negative).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decl {
    Var { name: String },
    Array { name: String, from: i64, to: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Scalar,
    Array,
}

/// A formal parameter. Scalars are copy-in/copy-out; arrays are passed by
/// address with their bounds adopted from the actual at each call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proc {
    pub name: String,
    pub params: Vec<Param>,
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Main {
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
}

/// A complete program: the procedures in declaration order, then the main
/// block. Produced by the upstream parser and consumed as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub procs: Vec<Proc>,
    pub main: Main,
}
