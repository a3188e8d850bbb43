use serde::{Deserialize, Serialize};

/// The lowered form of a script: a flat list of runnable statements. This is
/// what the runtime walks and what `render` prints as readable target text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProgram {
    pub body: Vec<TargetStmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetStmt {
    /// `context.indicator("Name", { ... });`
    Indicator {
        name: String,
        options: Vec<(String, TargetExpr)>,
        line: usize,
    },
    /// `const name = <expr>;`
    Binding {
        name: String,
        value: TargetExpr,
        line: usize,
    },
    /// `context.plot(<value>, { ... });`
    Plot {
        value: TargetExpr,
        options: Vec<(String, TargetExpr)>,
        line: usize,
    },
}

/// Builtin namespaces recognised by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Namespace {
    Ta,
    Input,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Ta => "ta",
            Namespace::Input => "Input",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetOp {
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

impl TargetOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            TargetOp::Add => "+",
            TargetOp::Sub => "-",
            TargetOp::Mul => "*",
            TargetOp::Div => "/",
            TargetOp::Rem => "%",
            TargetOp::Gt => ">",
            TargetOp::Ge => ">=",
            TargetOp::Lt => "<",
            TargetOp::Le => "<=",
            TargetOp::Eq => "==",
            TargetOp::Ne => "!=",
            TargetOp::And => "&&",
            TargetOp::Or => "||",
        }
    }

    /// Binding strength for the printer. Higher binds tighter.
    fn precedence(&self) -> u8 {
        match self {
            TargetOp::Or => 1,
            TargetOp::And => 2,
            TargetOp::Gt
            | TargetOp::Ge
            | TargetOp::Lt
            | TargetOp::Le
            | TargetOp::Eq
            | TargetOp::Ne => 3,
            TargetOp::Add | TargetOp::Sub => 4,
            TargetOp::Mul | TargetOp::Div | TargetOp::Rem => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetExpr {
    Number(f64),
    Bool(bool),
    Str(String),
    Ident(String),
    Binary {
        op: TargetOp,
        left: Box<TargetExpr>,
        right: Box<TargetExpr>,
    },
    Not(Box<TargetExpr>),
    Call {
        namespace: Option<Namespace>,
        name: String,
        args: Vec<TargetExpr>,
        options: Vec<(String, TargetExpr)>,
    },
}

const PREC_UNARY: u8 = 6;
const PREC_PRIMARY: u8 = 7;

impl TargetExpr {
    fn precedence(&self) -> u8 {
        match self {
            TargetExpr::Binary { op, .. } => op.precedence(),
            TargetExpr::Not(_) => PREC_UNARY,
            _ => PREC_PRIMARY,
        }
    }
}

/// Print a program as target text, one statement per line.
pub fn render(program: &TargetProgram) -> String {
    let mut out = String::new();
    for stmt in &program.body {
        match stmt {
            TargetStmt::Indicator { name, options, .. } => {
                out.push_str("context.indicator(");
                out.push_str(&string_literal(name));
                if !options.is_empty() {
                    out.push_str(", ");
                    render_options(&mut out, options);
                }
                out.push_str(");\n");
            }
            TargetStmt::Binding { name, value, .. } => {
                out.push_str("const ");
                out.push_str(name);
                out.push_str(" = ");
                render_expr(&mut out, value);
                out.push_str(";\n");
            }
            TargetStmt::Plot { value, options, .. } => {
                out.push_str("context.plot(");
                render_expr(&mut out, value);
                if !options.is_empty() {
                    out.push_str(", ");
                    render_options(&mut out, options);
                }
                out.push_str(");\n");
            }
        }
    }
    out
}

fn render_options(out: &mut String, options: &[(String, TargetExpr)]) {
    out.push_str("{ ");
    for (i, (key, value)) in options.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(key);
        out.push_str(": ");
        render_expr(out, value);
    }
    out.push_str(" }");
}

fn render_expr(out: &mut String, expr: &TargetExpr) {
    match expr {
        TargetExpr::Number(v) => out.push_str(&format!("{v}")),
        TargetExpr::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        TargetExpr::Str(s) => out.push_str(&string_literal(s)),
        TargetExpr::Ident(name) => out.push_str(name),
        TargetExpr::Binary { op, left, right } => {
            let prec = op.precedence();
            // Left child needs parens only when strictly looser; right child
            // also at equal precedence, which preserves left associativity.
            render_child(out, left, prec, false);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            render_child(out, right, prec, true);
        }
        TargetExpr::Not(inner) => {
            out.push('!');
            render_child(out, inner, PREC_UNARY, true);
        }
        TargetExpr::Call {
            namespace,
            name,
            args,
            options,
        } => {
            if let Some(ns) = namespace {
                out.push_str(ns.as_str());
                out.push('.');
            }
            out.push_str(name);
            out.push('(');
            let mut first = true;
            for arg in args {
                if !first {
                    out.push_str(", ");
                }
                render_expr(out, arg);
                first = false;
            }
            if !options.is_empty() {
                if !first {
                    out.push_str(", ");
                }
                render_options(out, options);
            }
            out.push(')');
        }
    }
}

fn render_child(out: &mut String, child: &TargetExpr, parent_prec: u8, is_right: bool) {
    let child_prec = child.precedence();
    let needs_parens = child_prec < parent_prec || (is_right && child_prec == parent_prec);
    if needs_parens {
        out.push('(');
        render_expr(out, child);
        out.push(')');
    } else {
        render_expr(out, child);
    }
}

fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: TargetOp, left: TargetExpr, right: TargetExpr) -> TargetExpr {
        TargetExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn ident(name: &str) -> TargetExpr {
        TargetExpr::Ident(name.to_string())
    }

    #[test]
    fn renders_one_statement_per_line() {
        let program = TargetProgram {
            body: vec![
                TargetStmt::Indicator {
                    name: "Test".into(),
                    options: vec![("overlay".into(), TargetExpr::Bool(true))],
                    line: 1,
                },
                TargetStmt::Binding {
                    name: "fast".into(),
                    value: TargetExpr::Call {
                        namespace: Some(Namespace::Ta),
                        name: "ema".into(),
                        args: vec![ident("close"), TargetExpr::Number(9.0)],
                        options: vec![],
                    },
                    line: 2,
                },
                TargetStmt::Plot {
                    value: ident("fast"),
                    options: vec![("title".into(), TargetExpr::Str("Fast".into()))],
                    line: 3,
                },
            ],
        };
        assert_eq!(
            render(&program),
            "context.indicator(\"Test\", { overlay: true });\n\
             const fast = ta.ema(close, 9);\n\
             context.plot(fast, { title: \"Fast\" });\n"
        );
    }

    #[test]
    fn indicator_without_options_omits_the_object() {
        let program = TargetProgram {
            body: vec![TargetStmt::Indicator {
                name: "Bare".into(),
                options: vec![],
                line: 1,
            }],
        };
        assert_eq!(render(&program), "context.indicator(\"Bare\");\n");
    }

    #[test]
    fn parens_track_precedence_and_associativity() {
        // (a + b) * c needs parens; a + b * c does not.
        let mut out = String::new();
        render_expr(
            &mut out,
            &bin(
                TargetOp::Mul,
                bin(TargetOp::Add, ident("a"), ident("b")),
                ident("c"),
            ),
        );
        assert_eq!(out, "(a + b) * c");

        let mut out = String::new();
        render_expr(
            &mut out,
            &bin(
                TargetOp::Add,
                ident("a"),
                bin(TargetOp::Mul, ident("b"), ident("c")),
            ),
        );
        assert_eq!(out, "a + b * c");

        // a - (b - c): right operand at equal precedence keeps its parens.
        let mut out = String::new();
        render_expr(
            &mut out,
            &bin(
                TargetOp::Sub,
                ident("a"),
                bin(TargetOp::Sub, ident("b"), ident("c")),
            ),
        );
        assert_eq!(out, "a - (b - c)");
    }

    #[test]
    fn negation_parenthesises_compound_operands() {
        let mut out = String::new();
        render_expr(
            &mut out,
            &TargetExpr::Not(Box::new(bin(TargetOp::Gt, ident("a"), ident("b")))),
        );
        assert_eq!(out, "!(a > b)");

        let mut out = String::new();
        render_expr(&mut out, &TargetExpr::Not(Box::new(ident("flag"))));
        assert_eq!(out, "!flag");
    }

    #[test]
    fn string_literals_escape_quotes_and_backslashes() {
        assert_eq!(string_literal("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn numbers_print_without_trailing_zeros() {
        let mut out = String::new();
        render_expr(&mut out, &TargetExpr::Number(9.0));
        assert_eq!(out, "9");
        let mut out = String::new();
        render_expr(&mut out, &TargetExpr::Number(1.5));
        assert_eq!(out, "1.5");
    }
}
