#![warn(missing_docs)]
//! # ravel-core
//!
//! Core traits and types shared by every ravel crate.
//!
//! ravel is the execution layer of a document-database client: a command
//! describes an HTTP request and the shape of its response, and the executor
//! (in the `ravel` crate) runs it against a server node while keeping a
//! change-vector keyed response cache.
//!
//! This crate holds the vocabulary the other crates agree on:
//!
//! - **Identify** cacheable resources ([`CacheKey`])
//! - **Address** a server ([`ServerNode`])
//! - **Describe** requests and responses ([`HttpRequest`], [`HttpResponse`], [`BodyStream`])
//! - **Declare** commands ([`Command`], [`ResponseShape`], [`NotFoundPolicy`])
//! - **Send** requests ([`HttpTransport`])
//! - **Report** failures ([`CommandError`], [`InvalidResponse`], [`TransportError`])

pub mod body;
pub mod command;
pub mod error;
pub mod key;
pub mod node;
pub mod policy;
pub mod request;
pub mod response;
pub mod transport;

pub use body::BodyStream;
pub use command::{BodyDisposal, Command, ResponseShape, ResultSlot};
pub use error::{CommandError, InvalidResponse, TransportError};
pub use key::CacheKey;
pub use node::ServerNode;
pub use policy::{AggressiveCacheMode, AggressiveCacheOptions, NotFoundPolicy};
pub use request::HttpRequest;
pub use response::{HttpResponse, parse_change_vector};
pub use transport::HttpTransport;
#[doc(hidden)]
pub use smol_str::SmolStr;
