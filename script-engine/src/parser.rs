use crate::ast::{BinaryOp, CallArg, Callee, Expr, NamedArg, Program, Stmt, UnaryOp};
use crate::error::SyntaxError;
use crate::lexer::lex;
use crate::token::{Keyword, Tok, Token};

/// Parse source text into an AST or a positioned syntax error.
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    let tokens = lex(source)?;
    Parser { tokens, pos: 0 }.program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, tok: &Tok) -> bool {
        &self.peek().tok == tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, context: &str) -> Result<Token, SyntaxError> {
        if self.check(&tok) {
            Ok(self.advance())
        } else {
            let found = self.peek();
            Err(SyntaxError::new(
                format!("expected {} {context}, found {}", tok.describe(), found.tok.describe()),
                found.line,
                found.column,
            ))
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&Tok::Newline) {
            self.advance();
        }
    }

    fn program(mut self) -> Result<Program, SyntaxError> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&Tok::Eof) {
                break;
            }
            body.push(self.statement()?);
            if !self.check(&Tok::Eof) {
                self.expect(Tok::Newline, "after statement")?;
            }
        }
        Ok(Program { body })
    }

    // Statement forms are tried in fixed order: indicator declaration,
    // assignment, plot statement, bare expression statement.
    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        let line = self.peek().line;
        match &self.peek().tok {
            Tok::Keyword(Keyword::Indicator) => self.indicator_statement(line),
            Tok::Ident(_) if self.peek_at(1).tok == Tok::Assign => {
                let name = match self.advance().tok {
                    Tok::Ident(name) => name,
                    _ => unreachable!("checked above"),
                };
                self.advance(); // `=`
                let value = self.expression()?;
                Ok(Stmt::Assign { name, value, line })
            }
            Tok::Keyword(Keyword::Plot) => self.plot_statement(line),
            _ => {
                let expr = self.expression()?;
                Ok(Stmt::Expr { expr, line })
            }
        }
    }

    fn indicator_statement(&mut self, line: usize) -> Result<Stmt, SyntaxError> {
        self.advance(); // `indicator`
        self.expect(Tok::LParen, "after `indicator`")?;
        let name_token = self.advance();
        let name = match name_token.tok {
            Tok::Str(value) => value,
            other => {
                return Err(SyntaxError::new(
                    format!(
                        "indicator declaration requires a string name, found {}",
                        other.describe()
                    ),
                    name_token.line,
                    name_token.column,
                ));
            }
        };
        let mut args = Vec::new();
        while self.eat(&Tok::Comma) {
            args.push(self.named_argument()?);
        }
        self.expect(Tok::RParen, "to close the indicator declaration")?;
        Ok(Stmt::Indicator { name, args, line })
    }

    fn plot_statement(&mut self, line: usize) -> Result<Stmt, SyntaxError> {
        self.advance(); // `plot`
        self.expect(Tok::LParen, "after `plot`")?;
        if self.check(&Tok::RParen) {
            let found = self.peek();
            return Err(SyntaxError::new(
                "plot requires at least one argument",
                found.line,
                found.column,
            ));
        }
        let args = self.call_arguments()?;
        self.expect(Tok::RParen, "to close the plot statement")?;
        Ok(Stmt::Plot { args, line })
    }

    fn named_argument(&mut self) -> Result<NamedArg, SyntaxError> {
        let token = self.advance();
        let name = match token.tok {
            Tok::Ident(name) => name,
            other => {
                return Err(SyntaxError::new(
                    format!("expected a named argument, found {}", other.describe()),
                    token.line,
                    token.column,
                ));
            }
        };
        self.expect(Tok::Assign, "in named argument")?;
        let value = self.expression()?;
        Ok(NamedArg { name, value })
    }

    fn call_arguments(&mut self) -> Result<Vec<CallArg>, SyntaxError> {
        let mut args = Vec::new();
        loop {
            if matches!(self.peek().tok, Tok::Ident(_)) && self.peek_at(1).tok == Tok::Assign {
                args.push(CallArg::Named(self.named_argument()?));
            } else {
                args.push(CallArg::Positional(self.expression()?));
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        Ok(args)
    }

    // Precedence climbing, lowest first: or < and < comparison < additive
    // < multiplicative < unary prefix < primary.
    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.or_expression()
    }

    fn or_expression(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.and_expression()?;
        while self.eat(&Tok::Keyword(Keyword::Or)) {
            let right = self.and_expression()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expression(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.comparison()?;
        while self.eat(&Tok::Keyword(Keyword::And)) {
            let right = self.comparison()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek().tok {
                Tok::Gt => BinaryOp::Gt,
                Tok::Ge => BinaryOp::Ge,
                Tok::Lt => BinaryOp::Lt,
                Tok::Le => BinaryOp::Le,
                Tok::EqEq => BinaryOp::Eq,
                Tok::NotEq => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().tok {
                Tok::Plus => BinaryOp::Add,
                Tok::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().tok {
                Tok::Star => BinaryOp::Mul,
                Tok::Slash => BinaryOp::Div,
                Tok::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek().tok {
            Tok::Keyword(Keyword::Not) => Some(UnaryOp::Not),
            Tok::Bang => Some(UnaryOp::Bang),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.advance();
        match token.tok {
            Tok::Number(value) => Ok(Expr::Number(value)),
            Tok::Str(value) => Ok(Expr::Str(value)),
            Tok::Keyword(Keyword::True) => Ok(Expr::Bool(true)),
            Tok::Keyword(Keyword::False) => Ok(Expr::Bool(false)),
            Tok::LParen => {
                let expr = self.expression()?;
                self.expect(Tok::RParen, "to close the parenthesised expression")?;
                Ok(expr)
            }
            Tok::Ident(name) => self.path_or_call(name),
            // `input` is reserved but legal as the head of a member call.
            Tok::Keyword(Keyword::Input) => {
                if self.check(&Tok::Dot) {
                    self.path_or_call("input".to_string())
                } else {
                    Err(SyntaxError::new(
                        "reserved word `input` cannot be used as an identifier",
                        token.line,
                        token.column,
                    ))
                }
            }
            other => {
                let found = other.describe();
                Err(SyntaxError::new(
                    format!("expected an expression, found {found}"),
                    token.line,
                    token.column,
                ))
            }
        }
    }

    fn path_or_call(&mut self, object: String) -> Result<Expr, SyntaxError> {
        let mut properties = Vec::new();
        while self.eat(&Tok::Dot) {
            let token = self.advance();
            match token.tok {
                Tok::Ident(name) => properties.push(name),
                other => {
                    return Err(SyntaxError::new(
                        format!("expected a property name after `.`, found {}", other.describe()),
                        token.line,
                        token.column,
                    ));
                }
            }
        }
        if self.eat(&Tok::LParen) {
            let args = if self.check(&Tok::RParen) {
                Vec::new()
            } else {
                self.call_arguments()?
            };
            self.expect(Tok::RParen, "to close the argument list")?;
            let callee = if properties.is_empty() {
                Callee::Ident(object)
            } else {
                Callee::Member { object, properties }
            };
            return Ok(Expr::Call { callee, args });
        }
        if properties.is_empty() {
            return Ok(Expr::Ident(object));
        }
        // `color.<name>` is sugar for a color literal.
        if object == "color" && properties.len() == 1 {
            return Ok(Expr::Color(properties.remove(0)));
        }
        Ok(Expr::Member { object, properties })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_forms_parse_in_order() {
        let src = "indicator(\"Demo\", overlay=true)\nlen = input.int(9, \"Len\")\nplot(close)\nclose > open";
        let program = parse(src).unwrap();
        assert_eq!(program.body.len(), 4);
        assert!(matches!(program.body[0], Stmt::Indicator { .. }));
        assert!(matches!(program.body[1], Stmt::Assign { .. }));
        assert!(matches!(program.body[2], Stmt::Plot { .. }));
        assert!(matches!(program.body[3], Stmt::Expr { .. }));
    }

    #[test]
    fn precedence_binds_or_loosest_and_unary_tightest() {
        let program = parse("x = a or b and not c > d + e * f").unwrap();
        let Stmt::Assign { value, .. } = &program.body[0] else {
            panic!("expected assignment");
        };
        // Outermost operator must be `or`.
        let Expr::Binary { op: BinaryOp::Or, right, .. } = value else {
            panic!("expected `or` at the root, got {value:?}");
        };
        // Right side is `b and (not (c > (d + (e * f))))`.
        let Expr::Binary { op: BinaryOp::And, right, .. } = right.as_ref() else {
            panic!("expected `and` under `or`");
        };
        assert!(matches!(right.as_ref(), Expr::Unary { op: UnaryOp::Not, .. }));
    }

    #[test]
    fn comparison_is_left_associative() {
        let program = parse("x = a - b - c").unwrap();
        let Stmt::Assign { value, .. } = &program.body[0] else {
            panic!("expected assignment");
        };
        let Expr::Binary { op: BinaryOp::Sub, left, .. } = value else {
            panic!("expected subtraction");
        };
        assert!(matches!(
            left.as_ref(),
            Expr::Binary { op: BinaryOp::Sub, .. }
        ));
    }

    #[test]
    fn indicator_requires_string_name_then_named_args() {
        let err = parse("indicator(42)").unwrap_err();
        assert!(err.message.contains("string name"));
        let err = parse("indicator(\"x\", true)").unwrap_err();
        assert!(err.message.contains("named argument"));
    }

    #[test]
    fn plot_requires_an_argument() {
        let err = parse("plot()").unwrap_err();
        assert!(err.message.contains("at least one argument"));
    }

    #[test]
    fn member_calls_and_color_sugar() {
        let program = parse("x = ta.ema(close, 9)\ny = color.green").unwrap();
        let Stmt::Assign { value, .. } = &program.body[0] else {
            panic!("expected assignment");
        };
        assert!(matches!(
            value,
            Expr::Call {
                callee: Callee::Member { .. },
                ..
            }
        ));
        let Stmt::Assign { value, .. } = &program.body[1] else {
            panic!("expected assignment");
        };
        assert_eq!(value, &Expr::Color("green".to_string()));
    }

    #[test]
    fn reserved_input_only_heads_member_calls() {
        assert!(parse("x = input.int(1)").is_ok());
        let err = parse("x = input").unwrap_err();
        assert!(err.message.contains("reserved word"));
    }

    #[test]
    fn error_positions_are_one_based() {
        let err = parse("x = (1 + ").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.column >= 9);
    }

    #[test]
    fn mixed_named_and_positional_call_args() {
        let program = parse("plot(close, \"t\", color=color.red, 5)").unwrap();
        let Stmt::Plot { args, .. } = &program.body[0] else {
            panic!("expected plot");
        };
        assert_eq!(args.len(), 4);
        assert!(matches!(args[2], CallArg::Named(_)));
    }
}
