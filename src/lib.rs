//! Vitagraph turns streamed health answers into a growing knowledge graph.
//!
//! An assistant answers questions with inline entity and relation markup;
//! this crate decodes the token stream, extracts annotated triples, merges
//! them into a deduplicated graph with per-turn step tags, lays the graph
//! out into layered coordinates, and projects step-scrubbed visibility over
//! the result.
//!
//! The pipeline is driven through [`session::Session`], which owns the
//! conversation transcript and graph state and applies every streamed delta
//! through one explicit reducer chain:
//!
//! ```text
//! bytes -> stream::SseDecoder -> session::Session::apply_delta
//!       -> annotate::extract -> graph::merge -> graph::layout
//! ```
//!
//! [`client::ChatClient`] feeds that chain over HTTP; everything below it is
//! pure and synchronous, so the core is testable without a network.

pub mod annotate;
pub mod category;
pub mod client;
pub mod error;
pub mod graph;
pub mod prompt;
pub mod session;
pub mod step;
pub mod stream;

pub use error::{VitaError, VitaResult};
pub use session::Session;
