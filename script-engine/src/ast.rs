use serde::{Deserialize, Serialize};

/// Root of a parsed script. Built once per parse and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Stmt>,
}

/// Top-level statement forms. Each carries its 1-based source line so the
/// runtime can report a best-effort failing line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `indicator("Name", key=value, ...)`
    Indicator {
        name: String,
        args: Vec<NamedArg>,
        line: usize,
    },
    /// `name = expr`
    Assign {
        name: String,
        value: Expr,
        line: usize,
    },
    /// `plot(value, ...)` — the first argument is always the plotted value.
    Plot { args: Vec<CallArg>, line: usize },
    /// A bare expression on its own line.
    Expr { expr: Expr, line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

/// The two spellings of logical negation; both lower to symbolic `!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Bang,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call {
        callee: Callee,
        args: Vec<CallArg>,
    },
    /// Dotted-path access that is not a call, e.g. `bar.state`.
    Member {
        object: String,
        properties: Vec<String>,
    },
    Ident(String),
    Number(f64),
    Bool(bool),
    Str(String),
    /// Sugar for `color.<name>`.
    Color(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    Ident(String),
    Member {
        object: String,
        properties: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallArg {
    Positional(Expr),
    Named(NamedArg),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArg {
    pub name: String,
    pub value: Expr,
}

impl Expr {
    /// True when any function call appears anywhere in the subtree. Drives
    /// the assignment-elision rule: pure arithmetic/comparison bindings are
    /// assumed to be unused intermediates and emit nothing.
    pub fn contains_call(&self) -> bool {
        match self {
            Expr::Call { .. } => true,
            Expr::Binary { left, right, .. } => left.contains_call() || right.contains_call(),
            Expr::Unary { expr, .. } => expr.contains_call(),
            Expr::Member { .. }
            | Expr::Ident(_)
            | Expr::Number(_)
            | Expr::Bool(_)
            | Expr::Str(_)
            | Expr::Color(_) => false,
        }
    }
}

impl CallArg {
    /// The underlying expression, named or positional.
    pub fn value(&self) -> &Expr {
        match self {
            CallArg::Positional(expr) => expr,
            CallArg::Named(named) => &named.value,
        }
    }
}
