use serde::{Deserialize, Serialize};

/// Reserved words of the dialect. Looked up after a longest-match identifier
/// scan, so an identifier like `plotting` never matches `plot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyword {
    Indicator,
    Plot,
    Input,
    True,
    False,
    And,
    Or,
    Not,
}

impl Keyword {
    pub fn lookup(ident: &str) -> Option<Keyword> {
        match ident {
            "indicator" => Some(Keyword::Indicator),
            "plot" => Some(Keyword::Plot),
            "input" => Some(Keyword::Input),
            "true" => Some(Keyword::True),
            "false" => Some(Keyword::False),
            "and" => Some(Keyword::And),
            "or" => Some(Keyword::Or),
            "not" => Some(Keyword::Not),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Indicator => "indicator",
            Keyword::Plot => "plot",
            Keyword::Input => "input",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    Keyword(Keyword),
    LParen,
    RParen,
    Comma,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Gt,
    Ge,
    Lt,
    Le,
    EqEq,
    NotEq,
    Bang,
    Newline,
    Eof,
}

impl Tok {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Tok::Ident(name) => format!("identifier `{name}`"),
            Tok::Number(v) => format!("number `{v}`"),
            Tok::Str(_) => "string literal".to_string(),
            Tok::Keyword(kw) => format!("keyword `{}`", kw.as_str()),
            Tok::LParen => "`(`".to_string(),
            Tok::RParen => "`)`".to_string(),
            Tok::Comma => "`,`".to_string(),
            Tok::Dot => "`.`".to_string(),
            Tok::Assign => "`=`".to_string(),
            Tok::Plus => "`+`".to_string(),
            Tok::Minus => "`-`".to_string(),
            Tok::Star => "`*`".to_string(),
            Tok::Slash => "`/`".to_string(),
            Tok::Percent => "`%`".to_string(),
            Tok::Gt => "`>`".to_string(),
            Tok::Ge => "`>=`".to_string(),
            Tok::Lt => "`<`".to_string(),
            Tok::Le => "`<=`".to_string(),
            Tok::EqEq => "`==`".to_string(),
            Tok::NotEq => "`!=`".to_string(),
            Tok::Bang => "`!`".to_string(),
            Tok::Newline => "end of line".to_string(),
            Tok::Eof => "end of input".to_string(),
        }
    }
}

/// A token plus its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub column: usize,
}
