#![warn(missing_docs)]
//! # ravel-pipeline
//!
//! Turns an HTTP body stream into a typed in-memory result.
//!
//! A [`ResponsePipeline`] is an ordered chain of stages assembled by a
//! [`PipelineBuilder`]:
//!
//! 1. **Parse**: either buffer the whole document ([`PipelineBuilder::parse_json`])
//!    or tokenize incrementally and keep only the values selected by
//!    [`PathFilter`]s ([`PipelineBuilder::parse_json_incremental`]).
//! 2. **Key case** (optional): rename object keys per a [`KeyCaseProfile`].
//! 3. **Body capture** (optional): keep the raw text, e.g. to cache it.
//! 4. **Transform** (optional): a user closure over every [`Item`].
//! 5. **Reduce**: fold items into the result with a [`Reducer`].
//!
//! The outcome is published once through a [`CollectedResult`] future.
//!
//! ## Example
//!
//! ```
//! use bytes::Bytes;
//! use ravel_core::body;
//! use ravel_pipeline::{KeyCaseProfile, PathFilter, PipelineBuilder};
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let pipeline = PipelineBuilder::new()
//!     .parse_json_incremental([PathFilter::pick("Results.[]")])
//!     .key_case(KeyCaseProfile::DocumentLoad)
//!     .build();
//!
//! let body = body::from_chunks(vec![
//!     Bytes::from_static(br#"{"Results":[{"Name":"Ar"#),
//!     Bytes::from_static(br#"ava","@metadata":{"@id":"users/1"}}]}"#),
//! ]);
//! let collected = pipeline.process(body).await.unwrap();
//! assert_eq!(
//!     collected.result,
//!     vec![json!({"name": "Arava", "@metadata": {"@id": "users/1"}})]
//! );
//! # });
//! ```

mod builder;
mod collector;
mod error;
mod filter;
mod key_case;
mod path;
mod pipeline;
mod reducer;
mod stage;
mod tokenizer;

pub use builder::{Incremental, NoParse, PipelineBuilder, WholeDocument};
pub use collector::{Collected, CollectedResult, ResultCollector};
pub use error::PipelineError;
pub use filter::PathFilter;
pub use key_case::{KeyCaseProfile, KeyCaseTransform, KeyConvention};
pub use path::{JsonPath, PathPattern, PathTracker, Segment};
pub use pipeline::ResponsePipeline;
pub use reducer::{Accumulate, Entries, Fold, Reducer, SingleValue, Typed};
pub use stage::{
    BodyCapture, IncrementalParser, Item, ItemStage, KeyCaseStage, ParseStage, Stage,
    TransformFn, TransformStage, WholeDocumentParser,
};
pub use tokenizer::{MAX_DEPTH, Token, Tokenizer};
