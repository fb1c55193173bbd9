//! Pipeline configuration and execution.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use ravel_core::BodyStream;
use tracing::debug;

use crate::collector::{Collected, CollectedResult, ResultCollector};
use crate::error::PipelineError;
use crate::filter::FilterSet;
use crate::key_case::KeyCaseTransform;
use crate::reducer::Reducer;
use crate::stage::{
    BodyCapture, IncrementalParser, Item, ItemStage, KeyCaseStage, ParseStage, Stage,
    TransformFn, TransformStage, WholeDocumentParser,
};

#[derive(Clone)]
pub(crate) enum ParseMode {
    Whole,
    Incremental {
        filters: Arc<FilterSet>,
        key_case: Option<Arc<KeyCaseTransform>>,
    },
}

#[derive(Clone)]
pub(crate) enum ItemStageSpec {
    KeyCase(Arc<KeyCaseTransform>),
    Transform(TransformFn),
}

/// An immutable, reusable response pipeline.
///
/// Built with [`PipelineBuilder`](crate::PipelineBuilder). Every call to
/// [`process`](Self::process) runs fresh stages against a new body, so the
/// same pipeline can serve any number of responses, concurrently or not.
///
/// # Errors
///
/// The first stage error or stream error aborts the run and the items folded
/// so far are discarded. After a stage error the rest of the body is still
/// read and discarded, so the connection is released; a stream error ends the
/// body on its own.
pub struct ResponsePipeline<R: Reducer> {
    parse: ParseMode,
    item_stages: Vec<ItemStageSpec>,
    collect_body: bool,
    reducer: R,
}

impl<R: Reducer> Clone for ResponsePipeline<R> {
    fn clone(&self) -> Self {
        Self {
            parse: self.parse.clone(),
            item_stages: self.item_stages.clone(),
            collect_body: self.collect_body,
            reducer: self.reducer.clone(),
        }
    }
}

impl<R: Reducer> std::fmt::Debug for ResponsePipeline<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.parse {
            ParseMode::Whole => "whole",
            ParseMode::Incremental { .. } => "incremental",
        };
        f.debug_struct("ResponsePipeline")
            .field("mode", &mode)
            .field("item_stages", &self.item_stages.len())
            .field("collect_body", &self.collect_body)
            .finish()
    }
}

impl<R: Reducer> ResponsePipeline<R> {
    pub(crate) fn new(
        parse: ParseMode,
        item_stages: Vec<ItemStageSpec>,
        collect_body: bool,
        reducer: R,
    ) -> Self {
        Self {
            parse,
            item_stages,
            collect_body,
            reducer,
        }
    }

    /// Whether runs capture the raw body.
    pub fn collects_body(&self) -> bool {
        self.collect_body
    }

    /// Runs the pipeline over `body` and waits for the collected result.
    ///
    /// The returned future owns everything it needs and does not borrow the
    /// pipeline.
    pub fn process(
        &self,
        body: BodyStream,
    ) -> impl Future<Output = Result<Collected<R::Output>, PipelineError>> + Send + use<R> {
        let (collector, result) = self.start();
        let run = self.run(body, collector);
        async move {
            run.await;
            result.await
        }
    }

    /// Creates the collector for a run and the future observing it.
    ///
    /// Pair with [`run`](Self::run) to drive the body on one task while
    /// another awaits the result.
    pub fn start(&self) -> (ResultCollector<R>, CollectedResult<R::Output>) {
        ResultCollector::channel(self.reducer.clone())
    }

    /// Drives `body` through fresh stages into `collector`, publishing the
    /// outcome when the stream ends or fails.
    pub fn run(
        &self,
        mut body: BodyStream,
        mut collector: ResultCollector<R>,
    ) -> impl Future<Output = ()> + Send + use<R> {
        let capture = self.collect_body.then(BodyCapture::new);
        let parser = self.parse_stage();
        let stages = self.item_stages();
        async move {
            match drive(&mut body, &mut collector, capture, parser, stages).await {
                Ok(captured) => collector.complete(captured),
                Err(error) => {
                    if !matches!(error, PipelineError::Stream(_)) {
                        let mut discarded = 0usize;
                        while let Some(Ok(chunk)) = body.next().await {
                            discarded += chunk.len();
                        }
                        debug!(%error, discarded, "response pipeline failed");
                    } else {
                        debug!(%error, "response pipeline failed");
                    }
                    collector.fail(error);
                }
            }
        }
    }

    fn parse_stage(&self) -> ParseStage {
        match &self.parse {
            ParseMode::Whole => Box::new(WholeDocumentParser::new()),
            ParseMode::Incremental { filters, key_case } => {
                Box::new(IncrementalParser::new(filters.clone(), key_case.clone()))
            }
        }
    }

    fn item_stages(&self) -> Vec<ItemStage> {
        self.item_stages
            .iter()
            .map(|spec| -> ItemStage {
                match spec {
                    ItemStageSpec::KeyCase(transform) => Box::new(KeyCaseStage::new(transform.clone())),
                    ItemStageSpec::Transform(transform) => {
                        Box::new(TransformStage::new(transform.clone()))
                    }
                }
            })
            .collect()
    }
}

async fn drive<R: Reducer>(
    body: &mut BodyStream,
    collector: &mut ResultCollector<R>,
    mut capture: Option<BodyCapture>,
    mut parser: ParseStage,
    mut stages: Vec<ItemStage>,
) -> Result<Option<String>, PipelineError> {
    let mut received = 0usize;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        received += chunk.len();

        let mut chunks = Vec::with_capacity(1);
        match capture.as_mut() {
            Some(capture) => capture.consume(chunk, &mut chunks)?,
            None => chunks.push(chunk),
        }

        let mut items = Vec::new();
        for chunk in chunks {
            parser.consume(chunk, &mut items)?;
        }
        for item in run_item_stages(&mut stages, items, false)? {
            collector.push(item)?;
        }
    }

    let mut items = Vec::new();
    parser.finish(&mut items)?;
    for item in run_item_stages(&mut stages, items, true)? {
        collector.push(item)?;
    }

    debug!(bytes = received, items = collector.items(), "response pipeline finished");
    capture.map(BodyCapture::into_body).transpose()
}

/// Passes `items` through every stage in order, finishing each stage when
/// `finishing` is set so its trailing output still flows downstream.
fn run_item_stages(
    stages: &mut [ItemStage],
    mut items: Vec<Item>,
    finishing: bool,
) -> Result<Vec<Item>, PipelineError> {
    for stage in stages.iter_mut() {
        let mut next = Vec::with_capacity(items.len());
        for item in items {
            stage.consume(item, &mut next)?;
        }
        if finishing {
            stage.finish(&mut next)?;
        }
        items = next;
    }
    Ok(items)
}
