//! DOM Module - Arena-based XML Document
//!
//! Implements the document tree using:
//! - Arena allocation for nodes
//! - NodeId (u32) indices for cache-friendly traversal
//! - String interning for names, values and text
//! - A tree builder that applies reader events through an external cursor

pub mod builder;
pub mod document;
pub mod node;
pub mod strings;

pub use builder::TreeBuilder;
pub use document::{Document, DOCUMENT_NODE};
pub use node::{NodeId, NodeKind, SourceId, SourceLocation, XmlAttribute, XmlNode};
pub use strings::StringPool;
