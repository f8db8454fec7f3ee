//! Textual form of inspection results.
//!
//! Output uses the scripting language's literal syntax so a front-end can
//! show it verbatim:
//!
//! ```text
//! ["a", "b"]                                            bare name list
//! {"name"=>"a", "value"=>"1", "type"=>"Integer"}        one descriptor
//! [{"name"=>"a", "value"=>"1", "type"=>"Integer"}]      descriptor list
//! ```
//!
//! Empty list queries render `[]`, empty single queries render `{}`.
//! [`parse_descriptors`], [`parse_record`] and [`parse_names`] read the same
//! text back.

use crate::value::inspect_str;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

/// Rendering of an empty list query
pub const EMPTY_LIST: &str = "[]";

/// Rendering of an empty single-item query
pub const EMPTY_RECORD: &str = "{}";

/// One inspected variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    pub name: String,
    /// Display text of the value
    pub value: String,
    /// Class name of the value
    pub type_name: String,
}

impl Descriptor {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            type_name: type_name.into(),
        }
    }
}

/// Quote and escape a string literal
pub fn escape(s: &str) -> String {
    inspect_str(s)
}

pub fn render_names<S: AsRef<str>>(names: &[S]) -> String {
    let parts: Vec<String> = names.iter().map(|n| escape(n.as_ref())).collect();
    format!("[{}]", parts.join(", "))
}

pub fn render_record(d: &Descriptor) -> String {
    format!(
        "{{\"name\"=>{}, \"value\"=>{}, \"type\"=>{}}}",
        escape(&d.name),
        escape(&d.value),
        escape(&d.type_name)
    )
}

pub fn render_list(descriptors: &[Descriptor]) -> String {
    let parts: Vec<String> = descriptors.iter().map(render_record).collect();
    format!("[{}]", parts.join(", "))
}

// ── Parsing ──────────────────────────────────────────────────────────────────

/// Malformed inspection text
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("expected {expected} at offset {offset}, found '{found}'")]
    Unexpected {
        expected: &'static str,
        found: char,
        offset: usize,
    },
    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },
    #[error("unknown key \"{0}\"")]
    UnknownKey(String),
    #[error("missing key \"{0}\"")]
    MissingKey(&'static str),
    #[error("trailing input at offset {offset}")]
    TrailingInput { offset: usize },
}

/// Parse a descriptor list produced by [`render_list`]
pub fn parse_descriptors(text: &str) -> Result<Vec<Descriptor>, ParseError> {
    let mut p = Parser::new(text);
    let items = p.list(|p| p.record())?;
    p.finish()?;
    Ok(items)
}

/// Parse a single descriptor produced by [`render_record`]; `{}` is `None`
pub fn parse_record(text: &str) -> Result<Option<Descriptor>, ParseError> {
    let mut p = Parser::new(text);
    p.skip_ws();
    if p.peek_char() == Some('{') {
        let mut probe = p.clone();
        probe.bump();
        probe.skip_ws();
        if probe.peek_char() == Some('}') {
            probe.bump();
            probe.finish()?;
            return Ok(None);
        }
    }
    let record = p.record()?;
    p.finish()?;
    Ok(Some(record))
}

/// Parse a name list produced by [`render_names`]
pub fn parse_names(text: &str) -> Result<Vec<String>, ParseError> {
    let mut p = Parser::new(text);
    let names = p.list(|p| p.string())?;
    p.finish()?;
    Ok(names)
}

#[derive(Clone)]
struct Parser<'a> {
    chars: Peekable<CharIndices<'a>>,
    len: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.char_indices().peekable(),
            len: text.len(),
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.len, |&(i, _)| i)
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn skip_ws(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char, expected: &'static str) -> Result<(), ParseError> {
        self.skip_ws();
        let offset = self.offset();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(found) => Err(ParseError::Unexpected {
                expected,
                found,
                offset,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn finish(&mut self) -> Result<(), ParseError> {
        self.skip_ws();
        match self.peek_char() {
            None => Ok(()),
            Some(_) => Err(ParseError::TrailingInput {
                offset: self.offset(),
            }),
        }
    }

    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        self.expect('[', "'['")?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek_char() == Some(']') {
            self.bump();
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            self.skip_ws();
            let offset = self.offset();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(items),
                Some(found) => {
                    return Err(ParseError::Unexpected {
                        expected: "',' or ']'",
                        found,
                        offset,
                    })
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
    }

    fn record(&mut self) -> Result<Descriptor, ParseError> {
        self.expect('{', "'{'")?;
        let (mut name, mut value, mut type_name) = (None, None, None);
        loop {
            let key = self.string()?;
            self.expect('=', "'=>'")?;
            self.expect('>', "'=>'")?;
            let val = self.string()?;
            match key.as_str() {
                "name" => name = Some(val),
                "value" => value = Some(val),
                "type" => type_name = Some(val),
                _ => return Err(ParseError::UnknownKey(key)),
            }
            self.skip_ws();
            let offset = self.offset();
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                Some(found) => {
                    return Err(ParseError::Unexpected {
                        expected: "',' or '}'",
                        found,
                        offset,
                    })
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
        Ok(Descriptor {
            name: name.ok_or(ParseError::MissingKey("name"))?,
            value: value.ok_or(ParseError::MissingKey("value"))?,
            type_name: type_name.ok_or(ParseError::MissingKey("type"))?,
        })
    }

    fn string(&mut self) -> Result<String, ParseError> {
        self.expect('"', "string")?;
        let mut out = String::new();
        loop {
            let offset = self.offset();
            match self.bump().ok_or(ParseError::UnexpectedEnd)? {
                '"' => return Ok(out),
                '\\' => out.push(self.escape_seq(offset)?),
                c => out.push(c),
            }
        }
    }

    fn escape_seq(&mut self, offset: usize) -> Result<char, ParseError> {
        let c = self.bump().ok_or(ParseError::UnexpectedEnd)?;
        Ok(match c {
            '"' => '"',
            '\\' => '\\',
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'e' => '\u{1b}',
            '0' => '\0',
            'x' => {
                let hi = self.bump().ok_or(ParseError::UnexpectedEnd)?;
                let lo = self.bump().ok_or(ParseError::UnexpectedEnd)?;
                let code = hi
                    .to_digit(16)
                    .zip(lo.to_digit(16))
                    .map(|(h, l)| h * 16 + l)
                    .ok_or(ParseError::InvalidEscape { offset })?;
                char::from_u32(code).ok_or(ParseError::InvalidEscape { offset })?
            }
            _ => return Err(ParseError::InvalidEscape { offset }),
        })
    }
}
