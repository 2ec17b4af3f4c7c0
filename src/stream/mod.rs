//! Incremental decoding of line-oriented provider streams.

pub mod decoder;

pub use decoder::{LineDecoder, LinePrefix};
