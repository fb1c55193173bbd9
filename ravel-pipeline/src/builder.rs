//! Typestate builder for [`ResponsePipeline`].
//!
//! The builder encodes stage ordering in its type:
//!
//! ```text
//! PipelineBuilder<NoParse>
//!   ├── parse_json()              ─▶ PipelineBuilder<WholeDocument>
//!   └── parse_json_incremental(…) ─▶ PipelineBuilder<Incremental>
//!
//! PipelineBuilder<WholeDocument | Incremental>
//!   ├── key_case(…)  (requires a parse stage)
//!   ├── transform(…)
//!   ├── collect_body()
//!   ├── collect(reducer) ─▶ ResponsePipeline<R>
//!   └── build()          ─▶ ResponsePipeline<SingleValue | Accumulate>
//! ```
//!
//! Attaching a key-case transform before choosing a parse mode, or choosing
//! both parse modes, does not compile.
//!
//! ```compile_fail
//! use ravel_pipeline::{KeyCaseProfile, PipelineBuilder};
//!
//! let pipeline = PipelineBuilder::new().key_case(KeyCaseProfile::Default);
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use crate::filter::{FilterSet, PathFilter};
use crate::key_case::KeyCaseTransform;
use crate::pipeline::{ItemStageSpec, ParseMode, ResponsePipeline};
use crate::reducer::{Accumulate, Reducer, SingleValue};
use crate::stage::Item;

/// Marker: no parse stage selected yet.
#[derive(Debug, Clone, Copy)]
pub struct NoParse;

/// Marker: the body is buffered and parsed once.
#[derive(Debug, Clone, Copy)]
pub struct WholeDocument;

/// Marker: the body is tokenized and filtered incrementally.
#[derive(Debug, Clone, Copy)]
pub struct Incremental;

mod sealed {
    pub trait Parsed {}
    impl Parsed for super::WholeDocument {}
    impl Parsed for super::Incremental {}
}

/// Builder for a [`ResponsePipeline`].
///
/// # Examples
///
/// ```
/// use ravel_pipeline::{KeyCaseProfile, PathFilter, PipelineBuilder};
///
/// let query = PipelineBuilder::new()
///     .parse_json_incremental([PathFilter::pick("Results.[]")])
///     .key_case(KeyCaseProfile::DocumentLoad)
///     .collect_body()
///     .build();
/// assert!(query.collects_body());
/// ```
pub struct PipelineBuilder<S> {
    parse: Option<ParseMode>,
    item_stages: Vec<ItemStageSpec>,
    collect_body: bool,
    _state: PhantomData<S>,
}

impl PipelineBuilder<NoParse> {
    /// An empty builder.
    pub fn new() -> Self {
        Self {
            parse: None,
            item_stages: Vec::new(),
            collect_body: false,
            _state: PhantomData,
        }
    }

    /// Buffers the whole body and parses it as one document.
    pub fn parse_json(self) -> PipelineBuilder<WholeDocument> {
        self.into_state(Some(ParseMode::Whole))
    }

    /// Tokenizes the body and emits the values selected by `filters`.
    pub fn parse_json_incremental(
        self,
        filters: impl IntoIterator<Item = PathFilter>,
    ) -> PipelineBuilder<Incremental> {
        self.into_state(Some(ParseMode::Incremental {
            filters: Arc::new(FilterSet::new(filters)),
            key_case: None,
        }))
    }
}

impl Default for PipelineBuilder<NoParse> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> PipelineBuilder<S> {
    fn into_state<T>(self, parse: Option<ParseMode>) -> PipelineBuilder<T> {
        PipelineBuilder {
            parse,
            item_stages: self.item_stages,
            collect_body: self.collect_body,
            _state: PhantomData,
        }
    }

    /// Captures the raw body text alongside the result.
    pub fn collect_body(mut self) -> Self {
        self.collect_body = true;
        self
    }
}

impl PipelineBuilder<WholeDocument> {
    /// Renames object keys of the parsed document.
    pub fn key_case(mut self, transform: impl Into<KeyCaseTransform>) -> Self {
        self.item_stages
            .push(ItemStageSpec::KeyCase(Arc::new(transform.into())));
        self
    }

    /// Finishes with the [`SingleValue`] reducer.
    pub fn build(self) -> ResponsePipeline<SingleValue> {
        self.collect(SingleValue::default())
    }
}

impl PipelineBuilder<Incremental> {
    /// Renames object keys inside picked values.
    ///
    /// Stages run in the order they were added. A key-case transform added
    /// before any other stage is applied by the parser as tokens stream by;
    /// one added later runs on each picked item after the earlier stages.
    pub fn key_case(mut self, transform: impl Into<KeyCaseTransform>) -> Self {
        let transform = Arc::new(transform.into());
        match self.parse.as_mut() {
            Some(ParseMode::Incremental { key_case: slot @ None, .. })
                if self.item_stages.is_empty() =>
            {
                *slot = Some(transform);
            }
            _ => self.item_stages.push(ItemStageSpec::KeyCase(transform)),
        }
        self
    }

    /// Finishes with the [`Accumulate`] reducer.
    pub fn build(self) -> ResponsePipeline<Accumulate> {
        self.collect(Accumulate::default())
    }
}

impl<S: sealed::Parsed> PipelineBuilder<S> {
    /// Rewrites every item; returning `None` drops it.
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Item) -> Option<Item> + Send + Sync + 'static,
    {
        self.item_stages
            .push(ItemStageSpec::Transform(Arc::new(transform)));
        self
    }

    /// Finishes with `reducer`.
    pub fn collect<R: Reducer>(self, reducer: R) -> ResponsePipeline<R> {
        ResponsePipeline::new(
            self.parse.unwrap_or(ParseMode::Whole),
            self.item_stages,
            self.collect_body,
            reducer,
        )
    }
}
