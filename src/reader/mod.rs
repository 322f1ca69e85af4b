//! XML Reader Module
//!
//! - SliceReader: event adapter over one decoded source
//! - Events: the uniform event sequence fed to the tree builder
//! - Position: byte offset to line/column mapping

pub mod events;
pub mod position;
pub mod slice;
