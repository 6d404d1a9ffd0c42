//! Audio chunk handling and payload packaging

pub mod chunk;
pub mod format;

pub use chunk::{AudioChunk, ChunkAssembler};
