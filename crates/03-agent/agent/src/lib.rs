//! Constrained side of the shuttle transport.
//!
//! The constrained agent cannot service callbacks; it runs exactly one
//! cooperative blocking loop that polls the shared region's flag word,
//! decodes resident batches, feeds an application sink, and acknowledges
//! each batch over the reverse channel.

mod reader;
mod sink;

pub use reader::{InboundReader, ReaderConfig, ReaderRun};
pub use sink::{MessageSink, VecSink};
