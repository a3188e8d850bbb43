use crate::ast::{BinaryOp, CallArg, Callee, Expr, Program, Stmt};
use crate::target::{render, Namespace, TargetExpr, TargetOp, TargetProgram, TargetStmt};

/// Bare function names that resolve into the `ta` namespace.
const TA_FUNCTIONS: &[&str] = &[
    "ema", "sma", "rma", "wma", "vwma", "hma", "rsi", "macd", "stoch", "cci", "mfi", "atr", "tr",
    "obv", "sar", "bb", "bbw", "stdev", "variance", "correlation", "covariance", "highest",
    "lowest", "change", "mom", "roc", "crossover", "crossunder", "cross",
];

/// A lowered script: the runnable statement list plus its rendered text.
/// The text is a faithful print of the same statements the runtime walks.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedScript {
    pub text: String,
    pub program: TargetProgram,
}

/// Lower a parsed program. Total: every statement and expression variant is
/// matched, and statements that produce no output are elided explicitly.
pub fn generate(program: &Program) -> GeneratedScript {
    let body: Vec<TargetStmt> = program.body.iter().filter_map(lower_stmt).collect();
    let program = TargetProgram { body };
    let text = render(&program);
    GeneratedScript { text, program }
}

fn lower_stmt(stmt: &Stmt) -> Option<TargetStmt> {
    match stmt {
        Stmt::Indicator { name, args, line } => Some(TargetStmt::Indicator {
            name: name.clone(),
            options: args
                .iter()
                .map(|arg| (option_key(&arg.name), lower_expr(&arg.value)))
                .collect(),
            line: *line,
        }),
        Stmt::Assign { name, value, line } => {
            // Pure unary expressions and call-free arithmetic/comparison
            // chains are treated as unused intermediates and emit nothing.
            let elide = match value {
                Expr::Unary { .. } => true,
                Expr::Binary { .. } => !value.contains_call(),
                _ => false,
            };
            if elide {
                return None;
            }
            Some(TargetStmt::Binding {
                name: name.clone(),
                value: lower_expr(value),
                line: *line,
            })
        }
        Stmt::Plot { args, line } => Some(lower_plot(args, *line)),
        // Bare expression statements have no effect and emit nothing.
        Stmt::Expr { .. } => None,
    }
}

fn lower_plot(args: &[CallArg], line: usize) -> TargetStmt {
    let mut value = TargetExpr::Number(f64::NAN);
    let mut options = Vec::new();
    for (index, arg) in args.iter().enumerate() {
        if index == 0 {
            value = lower_expr(arg.value());
            continue;
        }
        match arg {
            CallArg::Named(named) => {
                options.push((option_key(&named.name), lower_expr(&named.value)));
            }
            // A bare string right after the value is shorthand for the title.
            CallArg::Positional(Expr::Str(title)) if index == 1 => {
                options.push(("title".to_string(), TargetExpr::Str(title.clone())));
            }
            // Any other bare positional has no meaning here and is dropped.
            CallArg::Positional(_) => {}
        }
    }
    TargetStmt::Plot {
        value,
        options,
        line,
    }
}

fn lower_expr(expr: &Expr) -> TargetExpr {
    match expr {
        Expr::Number(v) => TargetExpr::Number(*v),
        Expr::Bool(b) => TargetExpr::Bool(*b),
        Expr::Str(s) => TargetExpr::Str(s.clone()),
        Expr::Ident(name) => TargetExpr::Ident(name.clone()),
        // Color sugar lowers to a plain color-name string.
        Expr::Color(name) => TargetExpr::Str(name.clone()),
        Expr::Member { object, properties } => TargetExpr::Ident(dotted(object, properties)),
        Expr::Unary { expr, .. } => TargetExpr::Not(Box::new(lower_expr(expr))),
        Expr::Binary { op, left, right } => TargetExpr::Binary {
            op: lower_op(*op),
            left: Box::new(lower_expr(left)),
            right: Box::new(lower_expr(right)),
        },
        Expr::Call { callee, args } => lower_call(callee, args),
    }
}

fn lower_call(callee: &Callee, args: &[CallArg]) -> TargetExpr {
    let (namespace, name) = match callee {
        Callee::Member { object, properties } if object == "input" && properties.len() == 1 => {
            (Some(Namespace::Input), properties[0].clone())
        }
        Callee::Member { object, properties } if object == "ta" && properties.len() == 1 => {
            (Some(Namespace::Ta), properties[0].clone())
        }
        Callee::Member { object, properties } => (None, dotted(object, properties)),
        Callee::Ident(name) => {
            let lowered = name.to_ascii_lowercase();
            if TA_FUNCTIONS.contains(&lowered.as_str()) {
                (Some(Namespace::Ta), lowered)
            } else {
                (None, name.clone())
            }
        }
    };
    // Positional arguments keep their order; named arguments merge into a
    // single trailing object literal.
    let mut positional = Vec::new();
    let mut options = Vec::new();
    for arg in args {
        match arg {
            CallArg::Positional(expr) => positional.push(lower_expr(expr)),
            CallArg::Named(named) => {
                options.push((option_key(&named.name), lower_expr(&named.value)));
            }
        }
    }
    TargetExpr::Call {
        namespace,
        name,
        args: positional,
        options,
    }
}

/// Join a member path back into a single dotted identifier string.
fn dotted(object: &str, properties: &[String]) -> String {
    let mut name = object.to_string();
    for property in properties {
        name.push('.');
        name.push_str(property);
    }
    name
}

fn lower_op(op: BinaryOp) -> TargetOp {
    match op {
        BinaryOp::Add => TargetOp::Add,
        BinaryOp::Sub => TargetOp::Sub,
        BinaryOp::Mul => TargetOp::Mul,
        BinaryOp::Div => TargetOp::Div,
        BinaryOp::Rem => TargetOp::Rem,
        BinaryOp::Gt => TargetOp::Gt,
        BinaryOp::Ge => TargetOp::Ge,
        BinaryOp::Lt => TargetOp::Lt,
        BinaryOp::Le => TargetOp::Le,
        BinaryOp::Eq => TargetOp::Eq,
        BinaryOp::Ne => TargetOp::Ne,
        BinaryOp::And => TargetOp::And,
        BinaryOp::Or => TargetOp::Or,
    }
}

/// Plot/indicator option keys. The known keys map to themselves and anything
/// else passes through unchanged, so scripts may use options this engine
/// does not interpret.
fn option_key(key: &str) -> String {
    match key {
        "overlay" | "color" | "title" | "linewidth" | "style" => key.to_string(),
        other => other.to_string(),
    }
}
