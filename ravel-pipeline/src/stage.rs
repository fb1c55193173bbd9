//! Pipeline stages.
//!
//! A pipeline run is an ordered chain of [`Stage`]s. Each stage consumes one
//! input at a time, appends zero or more outputs, and gets a final
//! [`finish`](Stage::finish) call once the body ended:
//!
//! ```text
//! Bytes ─▶ BodyCapture ─▶ parse stage ─▶ item stages ─▶ reducer
//!                         (whole | incremental)  (key case, transform)
//! ```
//!
//! Stages are created fresh for every run, so a pipeline can be reused.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use serde_json::Value;

use crate::error::PipelineError;
use crate::filter::FilterSet;
use crate::key_case::KeyCaseTransform;
use crate::path::{JsonPath, PathTracker};
use crate::tokenizer::{Token, Tokenizer};

/// A value produced by the parse stage, with its location in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Where the value sits in the document. The root for whole-document parses.
    pub path: JsonPath,
    /// The value.
    pub value: Value,
}

impl Item {
    /// An item at the document root.
    pub fn root(value: Value) -> Self {
        Self {
            path: JsonPath::root(),
            value,
        }
    }
}

/// One step of a pipeline.
pub trait Stage: Send {
    /// What the stage consumes.
    type Input;
    /// What the stage produces.
    type Output;

    /// Consumes one input, appending outputs to `out`.
    fn consume(&mut self, input: Self::Input, out: &mut Vec<Self::Output>)
    -> Result<(), PipelineError>;

    /// Called once after the last input.
    fn finish(&mut self, _out: &mut Vec<Self::Output>) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// A stage turning body chunks into items.
pub type ParseStage = Box<dyn Stage<Input = Bytes, Output = Item>>;

/// A stage rewriting items.
pub type ItemStage = Box<dyn Stage<Input = Item, Output = Item>>;

/// Item transform closure. Returning `None` drops the item.
pub type TransformFn = Arc<dyn Fn(Item) -> Option<Item> + Send + Sync>;

/// Keeps a copy of every chunk it forwards.
#[derive(Debug, Default)]
pub struct BodyCapture {
    buffer: BytesMut,
}

impl BodyCapture {
    /// Creates an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured body as text.
    pub fn into_body(self) -> Result<String, PipelineError> {
        Ok(String::from_utf8(self.buffer.to_vec())?)
    }
}

impl Stage for BodyCapture {
    type Input = Bytes;
    type Output = Bytes;

    fn consume(&mut self, chunk: Bytes, out: &mut Vec<Bytes>) -> Result<(), PipelineError> {
        self.buffer.extend_from_slice(&chunk);
        out.push(chunk);
        Ok(())
    }
}

/// Buffers the whole body and parses it once.
#[derive(Debug, Default)]
pub struct WholeDocumentParser {
    buffer: BytesMut,
}

impl WholeDocumentParser {
    /// Creates a parser with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for WholeDocumentParser {
    type Input = Bytes;
    type Output = Item;

    fn consume(&mut self, chunk: Bytes, _out: &mut Vec<Item>) -> Result<(), PipelineError> {
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Item>) -> Result<(), PipelineError> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            return Err(PipelineError::Empty);
        }
        let value = serde_json::from_slice(&self.buffer)?;
        out.push(Item::root(value));
        Ok(())
    }
}

/// Builds one [`Value`] from a token sequence.
#[derive(Debug)]
struct Assembler {
    path: JsonPath,
    stack: Vec<Partial>,
}

#[derive(Debug)]
enum Partial {
    Object(serde_json::Map<String, Value>, Option<String>),
    Array(Vec<Value>),
}

impl Assembler {
    fn new(path: JsonPath) -> Self {
        Self {
            path,
            stack: Vec::new(),
        }
    }

    /// Adds a token; returns the value once it is complete.
    fn push(&mut self, token: Token) -> Result<Option<Value>, PipelineError> {
        let value = match token {
            Token::StartObject => {
                self.stack.push(Partial::Object(serde_json::Map::new(), None));
                return Ok(None);
            }
            Token::StartArray => {
                self.stack.push(Partial::Array(Vec::new()));
                return Ok(None);
            }
            Token::Key(key) => {
                return match self.stack.last_mut() {
                    Some(Partial::Object(_, pending)) => {
                        *pending = Some(key);
                        Ok(None)
                    }
                    _ => Err(PipelineError::Stage(format!("key `{key}` outside an object"))),
                };
            }
            Token::EndObject | Token::EndArray => match self.stack.pop() {
                Some(Partial::Object(map, _)) => Value::Object(map),
                Some(Partial::Array(items)) => Value::Array(items),
                None => return Err(PipelineError::Stage("unbalanced container".to_owned())),
            },
            Token::String(s) => Value::String(s),
            Token::Number(n) => Value::Number(n),
            Token::Bool(b) => Value::Bool(b),
            Token::Null => Value::Null,
        };

        match self.stack.last_mut() {
            None => Ok(Some(value)),
            Some(Partial::Array(items)) => {
                items.push(value);
                Ok(None)
            }
            Some(Partial::Object(map, pending)) => {
                let key = pending
                    .take()
                    .ok_or_else(|| PipelineError::Stage("object member without key".to_owned()))?;
                map.insert(key, value);
                Ok(None)
            }
        }
    }
}

/// Tokenizes the body and emits only the values selected by path filters.
///
/// Memory is bounded by the largest picked value rather than by the whole
/// document: tokens outside picked values are dropped as soon as the path
/// tracker has seen them.
pub struct IncrementalParser {
    tokenizer: Tokenizer,
    tracker: PathTracker,
    filters: Arc<FilterSet>,
    key_case: Option<Arc<KeyCaseTransform>>,
    assembler: Option<Assembler>,
    tokens: Vec<Token>,
    skip_depth: usize,
    skip_next: bool,
}

impl IncrementalParser {
    pub(crate) fn new(filters: Arc<FilterSet>, key_case: Option<Arc<KeyCaseTransform>>) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            tracker: PathTracker::new(),
            filters,
            key_case,
            assembler: None,
            tokens: Vec::new(),
            skip_depth: 0,
            skip_next: false,
        }
    }

    fn drain_tokens(&mut self, out: &mut Vec<Item>) -> Result<(), PipelineError> {
        let tokens = std::mem::take(&mut self.tokens);
        for token in tokens {
            self.tracker.before(&token);
            self.route(&token, out)?;
            self.tracker.after(&token);
        }
        Ok(())
    }

    fn route(&mut self, token: &Token, out: &mut Vec<Item>) -> Result<(), PipelineError> {
        if self.skip_depth > 0 {
            match token {
                Token::StartObject | Token::StartArray => self.skip_depth += 1,
                Token::EndObject | Token::EndArray => self.skip_depth -= 1,
                _ => {}
            }
            return Ok(());
        }

        let path = self.tracker.path();

        if let Token::Key(key) = token {
            if self.filters.is_ignored(path) {
                self.skip_next = true;
            } else if let Some(assembler) = self.assembler.as_mut() {
                let name = self
                    .key_case
                    .as_ref()
                    .and_then(|transform| transform.rename(path))
                    .unwrap_or_else(|| key.clone());
                assembler.push(Token::Key(name))?;
            }
            return Ok(());
        }

        if token.starts_value() {
            if std::mem::take(&mut self.skip_next) || self.filters.is_ignored(path) {
                if matches!(token, Token::StartObject | Token::StartArray) {
                    self.skip_depth = 1;
                }
                return Ok(());
            }
            if self.assembler.is_none() && self.filters.is_picked(path) {
                self.assembler = Some(Assembler::new(path.clone()));
            }
        }

        if let Some(assembler) = self.assembler.as_mut() {
            if let Some(value) = assembler.push(token.clone())? {
                let path = std::mem::take(&mut assembler.path);
                self.assembler = None;
                out.push(Item { path, value });
            }
        }
        Ok(())
    }
}

impl Stage for IncrementalParser {
    type Input = Bytes;
    type Output = Item;

    fn consume(&mut self, chunk: Bytes, out: &mut Vec<Item>) -> Result<(), PipelineError> {
        self.tokenizer.feed(&chunk, &mut self.tokens)?;
        self.drain_tokens(out)
    }

    fn finish(&mut self, out: &mut Vec<Item>) -> Result<(), PipelineError> {
        self.tokenizer.finish(&mut self.tokens)?;
        self.drain_tokens(out)
    }
}

/// Applies a [`KeyCaseTransform`] to whole items.
pub struct KeyCaseStage {
    transform: Arc<KeyCaseTransform>,
}

impl KeyCaseStage {
    pub(crate) fn new(transform: Arc<KeyCaseTransform>) -> Self {
        Self { transform }
    }
}

impl Stage for KeyCaseStage {
    type Input = Item;
    type Output = Item;

    fn consume(&mut self, mut item: Item, out: &mut Vec<Item>) -> Result<(), PipelineError> {
        self.transform.apply(&mut item.value, &item.path);
        out.push(item);
        Ok(())
    }
}

/// Runs a user closure on every item.
pub struct TransformStage {
    transform: TransformFn,
}

impl TransformStage {
    pub(crate) fn new(transform: TransformFn) -> Self {
        Self { transform }
    }
}

impl Stage for TransformStage {
    type Input = Item;
    type Output = Item;

    fn consume(&mut self, item: Item, out: &mut Vec<Item>) -> Result<(), PipelineError> {
        out.extend((self.transform)(item));
        Ok(())
    }
}
