//! Response body streams.
//!
//! Bodies travel as a [`BodyStream`] of [`Bytes`] chunks. A chunk boundary can
//! fall anywhere, including inside a multi-byte UTF-8 sequence or a JSON
//! token, so consumers must never assume a chunk is meaningful on its own.
//!
//! ## Ownership
//!
//! Dropping a stream releases the underlying connection. The executor drains
//! or drops every body it owns before an invocation resolves; a `Raw`-shaped
//! command receives ownership of the stream and becomes responsible for it.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::{self, BoxStream};

use crate::error::TransportError;

/// A stream of body chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// A body consisting of one chunk.
///
/// Used to replay a cached payload through the same code path as a fresh
/// network body.
pub fn from_bytes(bytes: impl Into<Bytes>) -> BodyStream {
    stream::once(std::future::ready(Ok(bytes.into()))).boxed()
}

/// A body made of the given chunks, in order.
pub fn from_chunks<I>(chunks: I) -> BodyStream
where
    I: IntoIterator<Item = Bytes>,
    I::IntoIter: Send + 'static,
{
    stream::iter(chunks.into_iter().map(Ok)).boxed()
}

/// A body without content.
pub fn empty() -> BodyStream {
    stream::empty().boxed()
}

/// Consumes the rest of the stream, returning the number of bytes discarded.
pub async fn drain(mut body: BodyStream) -> Result<u64, TransportError> {
    let mut drained = 0u64;
    while let Some(chunk) = body.next().await {
        drained += chunk?.len() as u64;
    }
    Ok(drained)
}

/// Reads at most `limit` bytes of the body as (lossy) UTF-8 text.
///
/// The remainder is drained and discarded so the connection can be reused.
pub async fn read_text(mut body: BodyStream, limit: usize) -> Result<String, TransportError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let room = limit.saturating_sub(buffer.len());
        buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
