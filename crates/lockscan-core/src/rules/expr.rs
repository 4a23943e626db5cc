//! Expression parsing for validation rules.
//!
//! Rules are small boolean expressions over the report's named sections,
//! e.g. `count(summary.advisories) == 0` or
//! `"GPL-3.0" not in details.licenses`. The grammar, precedence low to high:
//!
//! ```text
//! or        := and ( ("||" | "or") and )*
//! and       := cmp ( ("&&" | "and") cmp )*
//! cmp       := sum ( ("==" | "!=" | "<" | "<=" | ">" | ">=" | "in" | "not in") sum )*
//! sum       := product ( ("+" | "-") product )*
//! product   := unary ( ("*" | "/" | "%") unary )*
//! unary     := ("!" | "not" | "-") unary | postfix
//! postfix   := primary ( "." ident | "[" or "]" )*
//! primary   := number | string | "true" | "false" | "null"
//!            | "[" ( or ("," or)* )? "]" | "(" or ")" | ident "(" args ")" | ident
//! ```

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("{message} at offset {offset}")]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Expr>),
    Var(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// Variable names referenced anywhere in the expression.
pub fn variables(expr: &Expr) -> BTreeSet<&str> {
    let mut names = BTreeSet::new();
    collect_variables(expr, &mut names);
    names
}

fn collect_variables<'a>(expr: &'a Expr, names: &mut BTreeSet<&'a str>) {
    match expr {
        Expr::Var(name) => {
            names.insert(name.as_str());
        }
        Expr::Member(base, _) => collect_variables(base, names),
        Expr::Index(base, index) => {
            collect_variables(base, names);
            collect_variables(index, names);
        }
        Expr::Array(items) | Expr::Call(_, items) => {
            for item in items {
                collect_variables(item, names);
            }
        }
        Expr::Unary(_, inner) => collect_variables(inner, names),
        Expr::Binary(_, left, right) => {
            collect_variables(left, names);
            collect_variables(right, names);
        }
        Expr::Null | Expr::Bool(_) | Expr::Number(_) | Expr::Str(_) => {}
    }
}

/// Function names invoked anywhere in the expression.
pub fn functions(expr: &Expr) -> BTreeSet<&str> {
    let mut names = BTreeSet::new();
    collect_functions(expr, &mut names);
    names
}

fn collect_functions<'a>(expr: &'a Expr, names: &mut BTreeSet<&'a str>) {
    match expr {
        Expr::Call(name, args) => {
            names.insert(name.as_str());
            for arg in args {
                collect_functions(arg, names);
            }
        }
        Expr::Member(base, _) => collect_functions(base, names),
        Expr::Index(base, index) => {
            collect_functions(base, names);
            collect_functions(index, names);
        }
        Expr::Array(items) => {
            for item in items {
                collect_functions(item, names);
            }
        }
        Expr::Unary(_, inner) => collect_functions(inner, names),
        Expr::Binary(_, left, right) => {
            collect_functions(left, names);
            collect_functions(right, names);
        }
        Expr::Null | Expr::Bool(_) | Expr::Number(_) | Expr::Str(_) | Expr::Var(_) => {}
    }
}

pub fn parse(input: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        input_len: input.len(),
    };
    let expr = parser.parse_or()?;
    if let Some(spanned) = parser.peek() {
        return Err(SyntaxError::new(
            format!("unexpected {}", spanned.token.describe()),
            spanned.offset,
        ));
    }
    Ok(expr)
}

// ---- lexer ----

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    OrOr,
    AndAnd,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Str(_) => "string".to_string(),
            Token::Ident(name) => format!("\"{name}\""),
            Token::LParen => "\"(\"".to_string(),
            Token::RParen => "\")\"".to_string(),
            Token::LBracket => "\"[\"".to_string(),
            Token::RBracket => "\"]\"".to_string(),
            Token::Comma => "\",\"".to_string(),
            Token::Dot => "\".\"".to_string(),
            Token::OrOr => "\"||\"".to_string(),
            Token::AndAnd => "\"&&\"".to_string(),
            Token::Bang => "\"!\"".to_string(),
            Token::EqEq => "\"==\"".to_string(),
            Token::NotEq => "\"!=\"".to_string(),
            Token::Lt => "\"<\"".to_string(),
            Token::Le => "\"<=\"".to_string(),
            Token::Gt => "\">\"".to_string(),
            Token::Ge => "\">=\"".to_string(),
            Token::Plus => "\"+\"".to_string(),
            Token::Minus => "\"-\"".to_string(),
            Token::Star => "\"*\"".to_string(),
            Token::Slash => "\"/\"".to_string(),
            Token::Percent => "\"%\"".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Spanned>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '(' => push_simple(&mut tokens, &mut chars, Token::LParen, offset),
            ')' => push_simple(&mut tokens, &mut chars, Token::RParen, offset),
            '[' => push_simple(&mut tokens, &mut chars, Token::LBracket, offset),
            ']' => push_simple(&mut tokens, &mut chars, Token::RBracket, offset),
            ',' => push_simple(&mut tokens, &mut chars, Token::Comma, offset),
            '.' => push_simple(&mut tokens, &mut chars, Token::Dot, offset),
            '+' => push_simple(&mut tokens, &mut chars, Token::Plus, offset),
            '-' => push_simple(&mut tokens, &mut chars, Token::Minus, offset),
            '*' => push_simple(&mut tokens, &mut chars, Token::Star, offset),
            '/' => push_simple(&mut tokens, &mut chars, Token::Slash, offset),
            '%' => push_simple(&mut tokens, &mut chars, Token::Percent, offset),
            '|' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '|')) => {
                        chars.next();
                        tokens.push(Spanned {
                            token: Token::OrOr,
                            offset,
                        });
                    }
                    _ => return Err(SyntaxError::new("expected \"||\"", offset)),
                }
            }
            '&' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '&')) => {
                        chars.next();
                        tokens.push(Spanned {
                            token: Token::AndAnd,
                            offset,
                        });
                    }
                    _ => return Err(SyntaxError::new("expected \"&&\"", offset)),
                }
            }
            '!' => {
                chars.next();
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    tokens.push(Spanned {
                        token: Token::NotEq,
                        offset,
                    });
                } else {
                    tokens.push(Spanned {
                        token: Token::Bang,
                        offset,
                    });
                }
            }
            '=' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '=')) => {
                        chars.next();
                        tokens.push(Spanned {
                            token: Token::EqEq,
                            offset,
                        });
                    }
                    _ => return Err(SyntaxError::new("expected \"==\"", offset)),
                }
            }
            '<' => {
                chars.next();
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    tokens.push(Spanned {
                        token: Token::Le,
                        offset,
                    });
                } else {
                    tokens.push(Spanned {
                        token: Token::Lt,
                        offset,
                    });
                }
            }
            '>' => {
                chars.next();
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    tokens.push(Spanned {
                        token: Token::Ge,
                        offset,
                    });
                } else {
                    tokens.push(Spanned {
                        token: Token::Gt,
                        offset,
                    });
                }
            }
            '"' | '\'' => {
                let token = lex_string(&mut chars, offset)?;
                tokens.push(Spanned { token, offset });
            }
            c if c.is_ascii_digit() => {
                let token = lex_number(input, &mut chars, offset)?;
                tokens.push(Spanned { token, offset });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = offset;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    token: Token::Ident(input[offset..end].to_string()),
                    offset,
                });
            }
            other => {
                return Err(SyntaxError::new(
                    format!("unexpected character {other:?}"),
                    offset,
                ));
            }
        }
    }

    Ok(tokens)
}

fn push_simple(
    tokens: &mut Vec<Spanned>,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    token: Token,
    offset: usize,
) {
    chars.next();
    tokens.push(Spanned { token, offset });
}

fn lex_string(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    offset: usize,
) -> Result<Token, SyntaxError> {
    let (_, quote) = chars.next().expect("caller peeked the quote");
    let mut value = String::new();
    loop {
        match chars.next() {
            Some((_, c)) if c == quote => return Ok(Token::Str(value)),
            Some((escape_offset, '\\')) => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, c)) if c == quote => value.push(c),
                Some((_, other)) => {
                    return Err(SyntaxError::new(
                        format!("unsupported escape \\{other}"),
                        escape_offset,
                    ));
                }
                None => return Err(SyntaxError::new("unterminated string", offset)),
            },
            Some((_, c)) => value.push(c),
            None => return Err(SyntaxError::new("unterminated string", offset)),
        }
    }
}

fn lex_number(
    input: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    offset: usize,
) -> Result<Token, SyntaxError> {
    let mut end = offset;
    let mut seen_dot = false;
    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_digit() {
            end = i + 1;
            chars.next();
        } else if c == '.' && !seen_dot {
            // Lookahead: `1.foo` is member access on a number, not a float.
            let mut ahead = chars.clone();
            ahead.next();
            match ahead.peek() {
                Some(&(_, next)) if next.is_ascii_digit() => {
                    seen_dot = true;
                    end = i + 1;
                    chars.next();
                }
                _ => break,
            }
        } else {
            break;
        }
    }
    let text = &input[offset..end];
    text.parse::<f64>()
        .map(Token::Number)
        .map_err(|_| SyntaxError::new(format!("invalid number \"{text}\""), offset))
}

// ---- parser ----

struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.position).cloned();
        if spanned.is_some() {
            self.position += 1;
        }
        spanned
    }

    fn eof_error(&self, expected: &str) -> SyntaxError {
        SyntaxError::new(format!("expected {expected}, found end of input"), self.input_len)
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), SyntaxError> {
        match self.next() {
            Some(spanned) if spanned.token == token => Ok(()),
            Some(spanned) => Err(SyntaxError::new(
                format!("expected {expected}, found {}", spanned.token.describe()),
                spanned.offset,
            )),
            None => Err(self.eof_error(expected)),
        }
    }

    /// True when the next token is the identifier `name`, consuming it.
    fn eat_keyword(&mut self, name: &str) -> bool {
        if matches!(self.peek(), Some(Spanned { token: Token::Ident(ident), .. }) if ident == name) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;
        loop {
            if matches!(self.peek(), Some(Spanned { token: Token::OrOr, .. })) {
                self.position += 1;
            } else if !self.eat_keyword("or") {
                return Ok(left);
            }
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_cmp()?;
        loop {
            if matches!(self.peek(), Some(Spanned { token: Token::AndAnd, .. })) {
                self.position += 1;
            } else if !self.eat_keyword("and") {
                return Ok(left);
            }
            let right = self.parse_cmp()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
    }

    fn parse_cmp(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_sum()?;
        loop {
            let op = match self.peek() {
                Some(Spanned { token: Token::EqEq, .. }) => BinaryOp::Eq,
                Some(Spanned { token: Token::NotEq, .. }) => BinaryOp::Ne,
                Some(Spanned { token: Token::Lt, .. }) => BinaryOp::Lt,
                Some(Spanned { token: Token::Le, .. }) => BinaryOp::Le,
                Some(Spanned { token: Token::Gt, .. }) => BinaryOp::Gt,
                Some(Spanned { token: Token::Ge, .. }) => BinaryOp::Ge,
                Some(Spanned { token: Token::Ident(ident), .. }) if ident == "in" => BinaryOp::In,
                Some(Spanned { token: Token::Ident(ident), offset }) if ident == "not" => {
                    let offset = *offset;
                    self.position += 1;
                    if !self.eat_keyword("in") {
                        return Err(SyntaxError::new("expected \"in\" after \"not\"", offset));
                    }
                    let right = self.parse_sum()?;
                    left = Expr::Binary(BinaryOp::NotIn, Box::new(left), Box::new(right));
                    continue;
                }
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_sum()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Spanned { token: Token::Plus, .. }) => BinaryOp::Add,
                Some(Spanned { token: Token::Minus, .. }) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_product()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_product(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Spanned { token: Token::Star, .. }) => BinaryOp::Mul,
                Some(Spanned { token: Token::Slash, .. }) => BinaryOp::Div,
                Some(Spanned { token: Token::Percent, .. }) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek() {
            Some(Spanned { token: Token::Bang, .. }) => {
                self.position += 1;
                let inner = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)))
            }
            Some(Spanned { token: Token::Minus, .. }) => {
                self.position += 1;
                let inner = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)))
            }
            Some(Spanned { token: Token::Ident(ident), .. }) if ident == "not" => {
                self.position += 1;
                let inner = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Spanned { token: Token::Dot, .. }) => {
                    self.position += 1;
                    match self.next() {
                        Some(Spanned { token: Token::Ident(name), .. }) => {
                            expr = Expr::Member(Box::new(expr), name);
                        }
                        Some(spanned) => {
                            return Err(SyntaxError::new(
                                format!(
                                    "expected member name, found {}",
                                    spanned.token.describe()
                                ),
                                spanned.offset,
                            ));
                        }
                        None => return Err(self.eof_error("member name")),
                    }
                }
                Some(Spanned { token: Token::LBracket, .. }) => {
                    self.position += 1;
                    let index = self.parse_or()?;
                    self.expect(Token::RBracket, "\"]\"")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.next() {
            Some(Spanned { token: Token::Number(value), .. }) => Ok(Expr::Number(value)),
            Some(Spanned { token: Token::Str(value), .. }) => Ok(Expr::Str(value)),
            Some(Spanned { token: Token::LParen, .. }) => {
                let expr = self.parse_or()?;
                self.expect(Token::RParen, "\")\"")?;
                Ok(expr)
            }
            Some(Spanned { token: Token::LBracket, .. }) => {
                let mut items = Vec::new();
                if matches!(self.peek(), Some(Spanned { token: Token::RBracket, .. })) {
                    self.position += 1;
                    return Ok(Expr::Array(items));
                }
                loop {
                    items.push(self.parse_or()?);
                    match self.next() {
                        Some(Spanned { token: Token::Comma, .. }) => continue,
                        Some(Spanned { token: Token::RBracket, .. }) => {
                            return Ok(Expr::Array(items));
                        }
                        Some(spanned) => {
                            return Err(SyntaxError::new(
                                format!(
                                    "expected \",\" or \"]\", found {}",
                                    spanned.token.describe()
                                ),
                                spanned.offset,
                            ));
                        }
                        None => return Err(self.eof_error("\"]\"")),
                    }
                }
            }
            Some(Spanned { token: Token::Ident(name), offset }) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "in" | "not" | "and" | "or" => Err(SyntaxError::new(
                    format!("unexpected keyword \"{name}\""),
                    offset,
                )),
                _ => {
                    if matches!(self.peek(), Some(Spanned { token: Token::LParen, .. })) {
                        self.position += 1;
                        let mut args = Vec::new();
                        if matches!(self.peek(), Some(Spanned { token: Token::RParen, .. })) {
                            self.position += 1;
                            return Ok(Expr::Call(name, args));
                        }
                        loop {
                            args.push(self.parse_or()?);
                            match self.next() {
                                Some(Spanned { token: Token::Comma, .. }) => continue,
                                Some(Spanned { token: Token::RParen, .. }) => {
                                    return Ok(Expr::Call(name, args));
                                }
                                Some(spanned) => {
                                    return Err(SyntaxError::new(
                                        format!(
                                            "expected \",\" or \")\", found {}",
                                            spanned.token.describe()
                                        ),
                                        spanned.offset,
                                    ));
                                }
                                None => return Err(self.eof_error("\")\"")),
                            }
                        }
                    }
                    Ok(Expr::Var(name))
                }
            },
            Some(spanned) => Err(SyntaxError::new(
                format!("unexpected {}", spanned.token.describe()),
                spanned.offset,
            )),
            None => Err(self.eof_error("an expression")),
        }
    }
}
