//! Parser Context
//!
//! One document build: the growing tree, the insertion cursor and the
//! lifecycle state. `Building` accepts sources; `finish` hands the tree out
//! and leaves the context `Finalized` for good.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::ParserOptions;
use crate::core::encoding::decode_source;
use crate::dom::{Document, NodeId, TreeBuilder};
use crate::error::{DomError, HandleProblem, Location, Result};
use crate::reader::slice::SliceReader;
use crate::registry::HandleId;

/// Lifecycle state of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Building,
    Finalized,
}

/// A document under construction
#[derive(Debug)]
pub struct ParserContext {
    id: HandleId,
    state: ContextState,
    /// None once finalized
    document: Option<Document>,
    /// Open elements, innermost last
    cursor: Vec<NodeId>,
    options: ParserOptions,
}

impl ParserContext {
    pub fn new(id: HandleId, options: ParserOptions) -> Self {
        ParserContext {
            id,
            state: ContextState::Building,
            document: Some(Document::new()),
            cursor: Vec::new(),
            options,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Names of the elements left open, outermost first
    pub fn open_elements(&self) -> Vec<String> {
        match &self.document {
            Some(doc) => self
                .cursor
                .iter()
                .map(|&id| doc.node_name(id).unwrap_or_default().to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Read a file and add its root element to the document
    pub fn read_file(&mut self, path: &Path) -> Result<()> {
        let source_name = path.display().to_string();
        let bytes = self.ensure_accepts_input().and_then(|()| {
            std::fs::read(path).map_err(|source| DomError::FileAccess {
                path: path.to_path_buf(),
                source,
            })
        });
        match bytes {
            Ok(bytes) => self.read_bytes(&source_name, bytes),
            Err(err) => Err(self.read_failed(&source_name, err)),
        }
    }

    /// Parse in-memory input under the given source name
    pub fn read_bytes(&mut self, source_name: &str, bytes: Vec<u8>) -> Result<()> {
        self.parse_source(source_name, bytes)
            .map_err(|err| self.read_failed(source_name, err))
    }

    /// A source is listed in the document only once it has contributed a node
    fn parse_source(&mut self, source_name: &str, bytes: Vec<u8>) -> Result<()> {
        self.ensure_accepts_input()?;
        let id = self.id;
        let doc = self.document.as_mut().ok_or(DomError::InvalidHandle {
            handle: id,
            problem: HandleProblem::Finalized,
        })?;

        let input = decode_source(bytes).map_err(|err| DomError::Syntax {
            message: err.message,
            location: Location::new(source_name, err.line, err.column),
            offset: err.offset,
        })?;

        let nodes_before = doc.node_count();
        let source = doc.add_source(source_name)?;
        let mut reader = SliceReader::new(&input, source_name);
        let built = TreeBuilder::new(doc, &mut self.cursor, &self.options, source, source_name).build(&mut reader);
        if let Err(err) = built {
            if doc.node_count() == nodes_before {
                doc.retract_source(source);
            }
            return Err(err);
        }

        debug!(
            handle = id,
            source = source_name,
            nodes = doc.node_count(),
            "source read"
        );
        Ok(())
    }

    fn read_failed(&self, source_name: &str, err: DomError) -> DomError {
        warn!(
            handle = self.id,
            source = source_name,
            structural = err.is_structural(),
            error = %err,
            "read failed"
        );
        err
    }

    /// Seal the document and hand it to the caller
    pub fn finish(&mut self) -> Result<Document> {
        self.ensure_building()?;
        if !self.cursor.is_empty() {
            return Err(DomError::IncompleteDocument {
                open: self.open_elements(),
            });
        }

        let doc = self.document.take().ok_or(DomError::InvalidHandle {
            handle: self.id,
            problem: HandleProblem::Finalized,
        })?;
        self.state = ContextState::Finalized;

        info!(
            handle = self.id,
            nodes = doc.node_count(),
            sources = doc.sources().len(),
            "document finished"
        );
        Ok(doc)
    }

    fn ensure_building(&self) -> Result<()> {
        match self.state {
            ContextState::Building => Ok(()),
            ContextState::Finalized => Err(DomError::InvalidHandle {
                handle: self.id,
                problem: HandleProblem::Finalized,
            }),
        }
    }

    /// A read that failed mid-element leaves the cursor non-empty; no
    /// further source can be attached to that tree.
    fn ensure_accepts_input(&self) -> Result<()> {
        self.ensure_building()?;
        if !self.cursor.is_empty() {
            return Err(DomError::IncompleteDocument {
                open: self.open_elements(),
            });
        }
        Ok(())
    }
}
