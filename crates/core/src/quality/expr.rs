//! Sandboxed `custom_expression` evaluation.
//!
//! The grammar is deliberately small: field references, string / number /
//! boolean / null literals, the comparison operators `= != < <= > >=`,
//! `and` / `or` / `not`, and parentheses. Evaluation sees only the row
//! map — there is no function call syntax and no access to the host
//! process, which is what makes the sandbox mandate hold.
//!
//! ```text
//! expr       := or_expr
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := unary ("and" unary)*
//! unary      := "not" unary | primary
//! primary    := "(" expr ")" | comparison
//! comparison := operand cmp_op operand
//! operand    := number | string | "true" | "false" | "null" | field
//! ```

use serde_json::Value;

use crate::types::Row;

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// A parsed expression, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("Unexpected token at offset {0}")]
    UnexpectedToken(usize),
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Unterminated string literal")]
    UnterminatedString,
}

impl Expr {
    /// Parse an expression string.
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(ExprError::UnexpectedToken(parser.offset()));
        }
        Ok(expr)
    }

    /// Evaluate against a row. Missing fields read as null.
    pub fn eval(&self, row: &Row) -> bool {
        match self {
            Self::And(a, b) => a.eval(row) && b.eval(row),
            Self::Or(a, b) => a.eval(row) || b.eval(row),
            Self::Not(inner) => !inner.eval(row),
            Self::Compare { left, op, right } => {
                compare(&left.resolve(row), *op, &right.resolve(row))
            }
        }
    }
}

impl Operand {
    fn resolve<'a>(&'a self, row: &'a Row) -> &'a Value {
        match self {
            Self::Literal(v) => v,
            Self::Field(name) => row.get(name).unwrap_or(&Value::Null),
        }
    }
}

fn compare(a: &Value, op: CmpOp, b: &Value) -> bool {
    use std::cmp::Ordering;

    // Null participates only in equality.
    if a.is_null() || b.is_null() {
        return match op {
            CmpOp::Eq => a.is_null() && b.is_null(),
            CmpOp::Ne => a.is_null() != b.is_null(),
            _ => false,
        };
    }

    let ordering = match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) => fx.partial_cmp(&fy),
            _ => None,
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        // Numeric string vs number: coerce.
        (Value::Number(x), Value::String(y)) => x
            .as_f64()
            .zip(y.parse::<f64>().ok())
            .and_then(|(fx, fy)| fx.partial_cmp(&fy)),
        (Value::String(x), Value::Number(y)) => x
            .parse::<f64>()
            .ok()
            .zip(y.as_f64())
            .and_then(|(fx, fy)| fx.partial_cmp(&fy)),
        _ => None,
    };

    match (ordering, op) {
        (Some(Ordering::Equal), CmpOp::Eq | CmpOp::Le | CmpOp::Ge) => true,
        (Some(Ordering::Less), CmpOp::Lt | CmpOp::Le | CmpOp::Ne) => true,
        (Some(Ordering::Greater), CmpOp::Gt | CmpOp::Ge | CmpOp::Ne) => true,
        (None, CmpOp::Ne) => true,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Op(CmpOp),
    LParen,
    RParen,
    And,
    Or,
    Not,
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let token = match c {
            b'(' => {
                i += 1;
                Token::LParen
            }
            b')' => {
                i += 1;
                Token::RParen
            }
            b'=' => {
                i += 1;
                Token::Op(CmpOp::Eq)
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::Op(CmpOp::Ne)
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    Token::Op(CmpOp::Le)
                } else {
                    i += 1;
                    Token::Op(CmpOp::Lt)
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    Token::Op(CmpOp::Ge)
                } else {
                    i += 1;
                    Token::Op(CmpOp::Gt)
                }
            }
            b'\'' | b'"' => {
                let quote = c;
                i += 1;
                let str_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(ExprError::UnterminatedString);
                }
                let s = input[str_start..i].to_string();
                i += 1;
                Token::Str(s)
            }
            b'-' | b'0'..=b'9' => {
                i += 1;
                while i < bytes.len()
                    && (bytes[i].is_ascii_digit() || bytes[i] == b'.' || bytes[i] == b'e')
                {
                    i += 1;
                }
                let n: f64 = input[start..i]
                    .parse()
                    .map_err(|_| ExprError::UnexpectedToken(start))?;
                Token::Number(n)
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    i += 1;
                }
                match &input[start..i] {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::Ident("true".to_string()),
                    "false" => Token::Ident("false".to_string()),
                    "null" => Token::Ident("null".to_string()),
                    ident => Token::Ident(ident.to_string()),
                }
            }
            _ => return Err(ExprError::UnexpectedToken(start)),
        };
        tokens.push((start, token));
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(0)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Result<Token, ExprError> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|(_, t)| t.clone())
            .ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let expr = self.parse_or()?;
            match self.next()? {
                Token::RParen => return Ok(expr),
                _ => return Err(ExprError::UnexpectedToken(self.offset())),
            }
        }
        let left = self.parse_operand()?;
        let op = match self.next()? {
            Token::Op(op) => op,
            _ => return Err(ExprError::UnexpectedToken(self.offset())),
        };
        let right = self.parse_operand()?;
        Ok(Expr::Compare { left, op, right })
    }

    fn parse_operand(&mut self) -> Result<Operand, ExprError> {
        let offset = self.offset();
        match self.next()? {
            Token::Number(n) => Ok(Operand::Literal(
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            Token::Str(s) => Ok(Operand::Literal(Value::String(s))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Operand::Literal(Value::Bool(true))),
                "false" => Ok(Operand::Literal(Value::Bool(false))),
                "null" => Ok(Operand::Literal(Value::Null)),
                _ => Ok(Operand::Field(name)),
            },
            _ => Err(ExprError::UnexpectedToken(offset)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn eval(expr: &str, r: &Row) -> bool {
        Expr::parse(expr).unwrap().eval(r)
    }

    #[test]
    fn numeric_comparison() {
        let r = row(&[("land_value", json!(50_000))]);
        assert!(eval("land_value > 0", &r));
        assert!(!eval("land_value >= 100000", &r));
    }

    #[test]
    fn cross_field_comparison() {
        let r = row(&[("land_value", json!(50_000)), ("total_value", json!(80_000))]);
        assert!(eval("total_value >= land_value", &r));
        assert!(!eval("land_value > total_value", &r));
    }

    #[test]
    fn string_equality() {
        let r = row(&[("state", json!("MA"))]);
        assert!(eval("state = 'MA'", &r));
        assert!(eval("state != 'NH'", &r));
    }

    #[test]
    fn boolean_connectives() {
        let r = row(&[("a", json!(1)), ("b", json!(2))]);
        assert!(eval("a = 1 and b = 2", &r));
        assert!(eval("a = 9 or b = 2", &r));
        assert!(eval("not (a = 9)", &r));
        assert!(!eval("a = 1 and not b = 2", &r));
    }

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        let r = row(&[("a", json!(1)), ("b", json!(0)), ("c", json!(1))]);
        // a=1 or (b=1 and c=0) -> true
        assert!(eval("a = 1 or b = 1 and c = 0", &r));
    }

    #[test]
    fn missing_field_reads_as_null() {
        let r = row(&[]);
        assert!(eval("owner = null", &r));
        assert!(!eval("owner != null", &r));
        assert!(!eval("owner > 0", &r));
    }

    #[test]
    fn numeric_string_coercion() {
        let r = row(&[("acres", json!("2.5"))]);
        assert!(eval("acres > 2", &r));
    }

    #[test]
    fn parse_errors() {
        assert!(Expr::parse("and and").is_err());
        assert!(Expr::parse("a >").is_err());
        assert!(Expr::parse("(a = 1").is_err());
        assert!(Expr::parse("a = 'unterminated").is_err());
        assert!(Expr::parse("a = 1 extra").is_err());
    }

    #[test]
    fn no_function_call_syntax() {
        // An identifier followed by parens is not callable in this grammar.
        assert!(Expr::parse("system('rm')").is_err());
    }
}
