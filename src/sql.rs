//! SQL literal rendering.
//!
//! Text is wrapped in single quotes with embedded quotes doubled. No other
//! escaping is performed: backslashes and control characters pass through
//! untouched, so the output assumes a destination that follows standard SQL
//! quoting rules.

use itertools::Itertools;
use thiserror::Error;

use crate::data::Value;

pub const NULL_KEYWORD: &str = "NULL";

pub fn escape_str(value: &str) -> String {
    value.replace('\'', "''")
}

pub fn quote(value: &str) -> String {
    format!("'{}'", escape_str(value))
}

pub fn render_literal(value: Option<&Value>) -> String {
    match value {
        None => NULL_KEYWORD.to_string(),
        Some(value) if value.is_quoted() => quote(&value.as_display()),
        Some(value) => value.as_display(),
    }
}

pub fn render_tuple(literals: &[String]) -> String {
    format!("({})", literals.iter().join(", "))
}

/// A literal read back from a rendered tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Quoted(String),
    Bare(String),
    Null,
}

impl Literal {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Literal::Quoted(text) | Literal::Bare(text) => Some(text),
            Literal::Null => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TupleError {
    #[error("tuple must start with '('")]
    MissingOpen,
    #[error("unterminated quoted literal")]
    UnterminatedQuote,
    #[error("tuple is not closed with ')'")]
    MissingClose,
    #[error("unexpected character '{0}' after quoted literal")]
    TrailingCharacter(char),
}

/// Parses one `(...)` tuple line as produced by [`render_tuple`], ignoring a
/// trailing `,` or `;`.
pub fn parse_tuple(line: &str) -> Result<Vec<Literal>, TupleError> {
    let body = line.trim();
    let body = body.strip_prefix('(').ok_or(TupleError::MissingOpen)?;
    let mut chars = body.chars().peekable();
    let mut literals = Vec::new();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let literal = if chars.next_if_eq(&'\'').is_some() {
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some('\'') if chars.next_if_eq(&'\'').is_some() => text.push('\''),
                    Some('\'') => break,
                    Some(ch) => text.push(ch),
                    None => return Err(TupleError::UnterminatedQuote),
                }
            }
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            match chars.peek() {
                Some(',') | Some(')') | None => {}
                Some(&ch) => return Err(TupleError::TrailingCharacter(ch)),
            }
            Literal::Quoted(text)
        } else {
            let mut token = String::new();
            while let Some(ch) = chars.next_if(|c| *c != ',' && *c != ')') {
                token.push(ch);
            }
            let token = token.trim();
            if token.eq_ignore_ascii_case(NULL_KEYWORD) {
                Literal::Null
            } else {
                Literal::Bare(token.to_string())
            }
        };
        literals.push(literal);

        match chars.next() {
            Some(',') => continue,
            Some(')') => break,
            _ => return Err(TupleError::MissingClose),
        }
    }

    Ok(literals)
}
