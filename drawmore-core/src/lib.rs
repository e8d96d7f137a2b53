//! Encoding and decoding of drawmore drawing sessions, plus the bits of brush and layer geometry
//! that recorded commands refer to.

pub mod brush;
pub mod document;
pub mod io;
pub mod tiles;

pub use document::{Document, DrawCommand, Snapshot, SnapshotState, Texture};
