//! Incremental JSON tokenizer.
//!
//! [`Tokenizer`] accepts the body one chunk at a time and emits [`Token`]s as
//! soon as they are complete. A chunk may end anywhere: inside a string, in
//! the middle of an escape sequence or a multi-byte character, or between the
//! digits of a number. The only state carried between chunks is the
//! unfinished lexeme and the container stack, so memory stays proportional to
//! nesting depth plus the longest single string or number.
//!
//! The tokenizer also validates structure: a body that is not exactly one
//! well-formed JSON value (optionally surrounded by whitespace) is rejected
//! with [`PipelineError::Syntax`]. Containers may nest at most
//! [`MAX_DEPTH`] levels deep, the same limit `serde_json` applies to
//! whole-document parses.

use std::str::FromStr;

use serde_json::Number;

use crate::error::PipelineError;

/// Deepest container nesting accepted.
pub const MAX_DEPTH: usize = 128;

/// A lexical JSON token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `{`
    StartObject,
    /// `}`
    EndObject,
    /// `[`
    StartArray,
    /// `]`
    EndArray,
    /// An object member name.
    Key(String),
    /// A string value.
    String(String),
    /// A number value.
    Number(Number),
    /// `true` or `false`.
    Bool(bool),
    /// `null`
    Null,
}

impl Token {
    /// Whether the token begins a value (a scalar or an opening bracket).
    pub fn starts_value(&self) -> bool {
        !matches!(self, Token::EndObject | Token::EndArray | Token::Key(_))
    }

    /// Whether the token is a complete value on its own.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Token::String(_) | Token::Number(_) | Token::Bool(_) | Token::Null
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    /// Right after `[`.
    ValueOrEnd,
    /// Right after `{`.
    KeyOrEnd,
    Key,
    Colon,
    CommaOrEnd,
    Done,
}

#[derive(Debug, Clone, Copy)]
enum Escape {
    None,
    Backslash,
    Unicode { remaining: u8, code: u32 },
}

#[derive(Debug)]
struct StringLexeme {
    buf: Vec<u8>,
    is_key: bool,
    escape: Escape,
    high_surrogate: Option<u32>,
}

impl StringLexeme {
    fn new(is_key: bool) -> Self {
        Self {
            buf: Vec::new(),
            is_key,
            escape: Escape::None,
            high_surrogate: None,
        }
    }

    /// Feeds one byte; returns `true` on the closing quote.
    fn push(&mut self, b: u8) -> Result<bool, &'static str> {
        match self.escape {
            Escape::None => match b {
                b'"' => {
                    if self.high_surrogate.is_some() {
                        return Err("unpaired surrogate");
                    }
                    return Ok(true);
                }
                b'\\' => self.escape = Escape::Backslash,
                0x00..=0x1f => return Err("control character in string"),
                _ => {
                    if self.high_surrogate.is_some() {
                        return Err("unpaired surrogate");
                    }
                    self.buf.push(b);
                }
            },
            Escape::Backslash => {
                let c = match b {
                    b'"' => '"',
                    b'\\' => '\\',
                    b'/' => '/',
                    b'b' => '\u{8}',
                    b'f' => '\u{c}',
                    b'n' => '\n',
                    b'r' => '\r',
                    b't' => '\t',
                    b'u' => {
                        self.escape = Escape::Unicode {
                            remaining: 4,
                            code: 0,
                        };
                        return Ok(false);
                    }
                    _ => return Err("invalid escape sequence"),
                };
                if self.high_surrogate.is_some() {
                    return Err("unpaired surrogate");
                }
                self.push_char(c);
                self.escape = Escape::None;
            }
            Escape::Unicode { remaining, code } => {
                let digit = char::from(b)
                    .to_digit(16)
                    .ok_or("invalid unicode escape")?;
                let code = code * 16 + digit;
                if remaining > 1 {
                    self.escape = Escape::Unicode {
                        remaining: remaining - 1,
                        code,
                    };
                } else {
                    self.escape = Escape::None;
                    self.push_code_unit(code)?;
                }
            }
        }
        Ok(false)
    }

    fn push_code_unit(&mut self, code: u32) -> Result<(), &'static str> {
        match (self.high_surrogate.take(), code) {
            (None, 0xD800..=0xDBFF) => self.high_surrogate = Some(code),
            (None, 0xDC00..=0xDFFF) => return Err("unpaired surrogate"),
            (None, code) => self.push_char(char::from_u32(code).ok_or("invalid unicode escape")?),
            (Some(high), 0xDC00..=0xDFFF) => {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00);
                self.push_char(char::from_u32(combined).ok_or("invalid unicode escape")?);
            }
            (Some(_), _) => return Err("unpaired surrogate"),
        }
        Ok(())
    }

    fn push_char(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.buf
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }
}

#[derive(Debug)]
struct LiteralLexeme {
    expected: &'static [u8],
    matched: usize,
    token: Token,
}

#[derive(Debug, Default)]
enum Lexeme {
    #[default]
    None,
    String(StringLexeme),
    Number(String),
    Literal(LiteralLexeme),
}

/// Push-based JSON tokenizer.
///
/// ```
/// use ravel_pipeline::{Token, Tokenizer};
///
/// let mut tokenizer = Tokenizer::new();
/// let mut tokens = Vec::new();
/// tokenizer.feed(br#"{"Na"#, &mut tokens).unwrap();
/// tokenizer.feed(br#"me":tr"#, &mut tokens).unwrap();
/// tokenizer.feed(br#"ue}"#, &mut tokens).unwrap();
/// tokenizer.finish(&mut tokens).unwrap();
///
/// assert_eq!(
///     tokens,
///     vec![
///         Token::StartObject,
///         Token::Key("Name".into()),
///         Token::Bool(true),
///         Token::EndObject,
///     ]
/// );
/// ```
#[derive(Debug)]
pub struct Tokenizer {
    stack: Vec<Container>,
    expect: Expect,
    lexeme: Lexeme,
    offset: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// A tokenizer expecting one JSON value.
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            expect: Expect::Value,
            lexeme: Lexeme::None,
            offset: 0,
        }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Tokenizes `chunk`, appending completed tokens to `out`.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<Token>) -> Result<(), PipelineError> {
        let mut i = 0;
        while i < chunk.len() {
            if self.step(chunk[i], out)? {
                i += 1;
                self.offset += 1;
            }
        }
        Ok(())
    }

    /// Signals end of input.
    ///
    /// Flushes a trailing top-level number and fails if the document is
    /// incomplete. An input without any value fails with
    /// [`PipelineError::Empty`].
    pub fn finish(&mut self, out: &mut Vec<Token>) -> Result<(), PipelineError> {
        match std::mem::take(&mut self.lexeme) {
            Lexeme::None => {}
            Lexeme::Number(text) => self.finish_number(text, out)?,
            Lexeme::String(_) | Lexeme::Literal(_) => {
                return Err(PipelineError::syntax(self.offset, "unexpected end of input"));
            }
        }
        match self.expect {
            Expect::Done => Ok(()),
            Expect::Value if self.stack.is_empty() => Err(PipelineError::Empty),
            _ => Err(PipelineError::syntax(self.offset, "unexpected end of input")),
        }
    }

    /// Processes one byte. Returns `false` when the byte must be fed again,
    /// which happens when it terminates a number.
    fn step(&mut self, b: u8, out: &mut Vec<Token>) -> Result<bool, PipelineError> {
        match std::mem::take(&mut self.lexeme) {
            Lexeme::None => {}
            Lexeme::String(mut lexeme) => {
                let closed = lexeme
                    .push(b)
                    .map_err(|reason| PipelineError::syntax(self.offset, reason))?;
                if closed {
                    let text = String::from_utf8(lexeme.buf)?;
                    if lexeme.is_key {
                        out.push(Token::Key(text));
                        self.expect = Expect::Colon;
                    } else {
                        out.push(Token::String(text));
                        self.value_done();
                    }
                } else {
                    self.lexeme = Lexeme::String(lexeme);
                }
                return Ok(true);
            }
            Lexeme::Number(mut text) => {
                if is_number_byte(b) {
                    text.push(char::from(b));
                    self.lexeme = Lexeme::Number(text);
                    return Ok(true);
                }
                self.finish_number(text, out)?;
                return Ok(false);
            }
            Lexeme::Literal(mut literal) => {
                if literal.expected[literal.matched] != b {
                    return Err(PipelineError::syntax(self.offset, "invalid literal"));
                }
                literal.matched += 1;
                if literal.matched == literal.expected.len() {
                    out.push(literal.token);
                    self.value_done();
                } else {
                    self.lexeme = Lexeme::Literal(literal);
                }
                return Ok(true);
            }
        }

        if b.is_ascii_whitespace() {
            return Ok(true);
        }

        match self.expect {
            Expect::Done => return Err(PipelineError::syntax(self.offset, "trailing characters")),
            Expect::Value | Expect::ValueOrEnd => match b {
                b']' if self.expect == Expect::ValueOrEnd => self.close(Container::Array, out),
                b'{' => {
                    self.open(Container::Object)?;
                    out.push(Token::StartObject);
                    self.expect = Expect::KeyOrEnd;
                }
                b'[' => {
                    self.open(Container::Array)?;
                    out.push(Token::StartArray);
                    self.expect = Expect::ValueOrEnd;
                }
                b'"' => self.lexeme = Lexeme::String(StringLexeme::new(false)),
                b'-' | b'0'..=b'9' => self.lexeme = Lexeme::Number(char::from(b).to_string()),
                b't' => self.start_literal(b"true", Token::Bool(true)),
                b'f' => self.start_literal(b"false", Token::Bool(false)),
                b'n' => self.start_literal(b"null", Token::Null),
                _ => return Err(PipelineError::syntax(self.offset, "expected a value")),
            },
            Expect::Key | Expect::KeyOrEnd => match b {
                b'}' if self.expect == Expect::KeyOrEnd => self.close(Container::Object, out),
                b'"' => self.lexeme = Lexeme::String(StringLexeme::new(true)),
                _ => return Err(PipelineError::syntax(self.offset, "expected an object key")),
            },
            Expect::Colon => {
                if b != b':' {
                    return Err(PipelineError::syntax(self.offset, "expected `:`"));
                }
                self.expect = Expect::Value;
            }
            Expect::CommaOrEnd => match (b, self.stack.last()) {
                (b',', Some(Container::Object)) => self.expect = Expect::Key,
                (b',', Some(Container::Array)) => self.expect = Expect::Value,
                (b'}', Some(Container::Object)) => self.close(Container::Object, out),
                (b']', Some(Container::Array)) => self.close(Container::Array, out),
                _ => return Err(PipelineError::syntax(self.offset, "expected `,` or closing bracket")),
            },
        }
        Ok(true)
    }

    fn start_literal(&mut self, expected: &'static [u8], token: Token) {
        self.lexeme = Lexeme::Literal(LiteralLexeme {
            expected,
            matched: 1,
            token,
        });
    }

    fn finish_number(&mut self, text: String, out: &mut Vec<Token>) -> Result<(), PipelineError> {
        let number = Number::from_str(&text)
            .map_err(|_| PipelineError::syntax(self.offset, "invalid number"))?;
        out.push(Token::Number(number));
        self.value_done();
        Ok(())
    }

    fn open(&mut self, container: Container) -> Result<(), PipelineError> {
        if self.stack.len() >= MAX_DEPTH {
            return Err(PipelineError::syntax(self.offset, "nesting too deep"));
        }
        self.stack.push(container);
        Ok(())
    }

    fn close(&mut self, container: Container, out: &mut Vec<Token>) {
        self.stack.pop();
        out.push(match container {
            Container::Object => Token::EndObject,
            Container::Array => Token::EndArray,
        });
        self.value_done();
    }

    fn value_done(&mut self) {
        self.expect = if self.stack.is_empty() {
            Expect::Done
        } else {
            Expect::CommaOrEnd
        };
    }
}

fn is_number_byte(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}
