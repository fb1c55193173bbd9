//! Result reducers.
//!
//! The last stage of every pipeline folds emitted [`Item`]s into one result.
//! A pipeline clones its reducer for every run, so reducers hold only their
//! initial state.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::stage::Item;

/// Folds pipeline items into a result.
pub trait Reducer: Clone + Send + 'static {
    /// The folded result.
    type Output: Send + 'static;

    /// Folds one item.
    fn reduce(&mut self, item: Item) -> Result<(), PipelineError>;

    /// Produces the result after the last item.
    fn finish(self) -> Result<Self::Output, PipelineError>;
}

/// Keeps the last emitted value. Default for whole-document pipelines.
#[derive(Debug, Clone, Default)]
pub struct SingleValue {
    value: Option<Value>,
}

impl Reducer for SingleValue {
    type Output = Option<Value>;

    fn reduce(&mut self, item: Item) -> Result<(), PipelineError> {
        self.value = Some(item.value);
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, PipelineError> {
        Ok(self.value)
    }
}

/// Collects every emitted value in order. Default for incremental pipelines.
#[derive(Debug, Clone, Default)]
pub struct Accumulate {
    values: Vec<Value>,
}

impl Reducer for Accumulate {
    type Output = Vec<Value>;

    fn reduce(&mut self, item: Item) -> Result<(), PipelineError> {
        self.values.push(item.value);
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, PipelineError> {
        Ok(self.values)
    }
}

/// Collects object members, keyed by the member name each item was found under.
///
/// Suited to picks such as `Includes.*`. An item not located at an object
/// member is rejected.
#[derive(Debug, Clone, Default)]
pub struct Entries {
    entries: Map<String, Value>,
}

impl Reducer for Entries {
    type Output = Map<String, Value>;

    fn reduce(&mut self, item: Item) -> Result<(), PipelineError> {
        let key = item
            .path
            .last_key()
            .ok_or_else(|| PipelineError::Stage(format!("`{}` is not an object member", item.path)))?
            .to_owned();
        self.entries.insert(key, item.value);
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, PipelineError> {
        Ok(self.entries)
    }
}

/// Deserializes every emitted value into `T`.
pub struct Typed<T> {
    values: Vec<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    /// An empty reducer.
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Typed<T> {
    fn clone(&self) -> Self {
        // Reducers are cloned before a run, while still empty.
        Self::new()
    }
}

impl<T> Reducer for Typed<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = Vec<T>;

    fn reduce(&mut self, item: Item) -> Result<(), PipelineError> {
        self.values.push(serde_json::from_value(item.value)?);
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, PipelineError> {
        Ok(self.values)
    }
}

/// Folds values with a closure, starting from an initial accumulator.
///
/// ```
/// use ravel_pipeline::{Fold, Item, Reducer};
/// use serde_json::json;
///
/// let mut total = Fold::new(0u64, |sum, item: Item| sum + item.value.as_u64().unwrap_or(0));
/// total.reduce(Item::root(json!(2))).unwrap();
/// total.reduce(Item::root(json!(3))).unwrap();
/// assert_eq!(total.finish().unwrap(), 5);
/// ```
pub struct Fold<A> {
    acc: Option<A>,
    fold: Arc<dyn Fn(A, Item) -> A + Send + Sync>,
}

impl<A> Fold<A> {
    /// A fold starting from `initial`.
    pub fn new<F>(initial: A, fold: F) -> Self
    where
        F: Fn(A, Item) -> A + Send + Sync + 'static,
    {
        Self {
            acc: Some(initial),
            fold: Arc::new(fold),
        }
    }
}

impl<A: Clone> Clone for Fold<A> {
    fn clone(&self) -> Self {
        Self {
            acc: self.acc.clone(),
            fold: self.fold.clone(),
        }
    }
}

impl<A> Reducer for Fold<A>
where
    A: Clone + Send + 'static,
{
    type Output = A;

    fn reduce(&mut self, item: Item) -> Result<(), PipelineError> {
        let acc = self.acc.take().ok_or(PipelineError::Closed)?;
        self.acc = Some((self.fold)(acc, item));
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, PipelineError> {
        self.acc.ok_or(PipelineError::Closed)
    }
}
