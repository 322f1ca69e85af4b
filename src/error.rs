//! Error types for document building.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::registry::HandleId;

/// Result type alias for xmldom operations.
pub type Result<T> = std::result::Result<T, DomError>;

/// A position inside a named source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Source name (file path or caller-supplied label)
    pub source: String,
    /// 1-based line
    pub line: u32,
    /// 1-based byte column
    pub column: u32,
}

impl Location {
    pub fn new(source: impl Into<String>, line: u32, column: u32) -> Self {
        Location {
            source: source.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}

/// Why a handle was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleProblem {
    /// Never issued, or already released
    Unknown,
    /// `finish` already handed the tree out
    Finalized,
}

impl fmt::Display for HandleProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleProblem::Unknown => f.write_str("unknown handle"),
            HandleProblem::Finalized => f.write_str("document already finalized"),
        }
    }
}

/// Errors that can occur while creating, filling or finishing a document.
#[derive(Debug, Error)]
pub enum DomError {
    /// Handle is unknown or its context was already finalized.
    #[error("invalid handle {handle}: {problem}")]
    InvalidHandle { handle: HandleId, problem: HandleProblem },

    /// Source file could not be opened or read.
    #[error("cannot read {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed XML reported by the tokenizer or the encoding check.
    #[error("{location}: syntax error: {message} (byte offset {offset})")]
    Syntax {
        message: String,
        location: Location,
        offset: usize,
    },

    /// Same attribute name twice on one start tag.
    #[error("{location}: duplicate attribute '{name}' on <{element}>")]
    DuplicateAttribute {
        name: String,
        element: String,
        location: Location,
    },

    /// End tag does not match the innermost open element.
    #[error("{location}: {}", unbalanced_message(.expected.as_deref(), .found))]
    UnbalancedTag {
        expected: Option<String>,
        found: String,
        location: Location,
    },

    /// Input ended while an element was still open. The location is the start tag.
    #[error("{location}: element <{name}> is not closed at end of input")]
    UnterminatedElement { name: String, location: Location },

    /// A second top-level element inside one source.
    #[error("{location}: multiple root elements, <{second}> follows <{first}>")]
    MultipleRoots {
        first: String,
        second: String,
        location: Location,
    },

    /// Source contained no element at all.
    #[error("{source_name}: no root element found")]
    NoRootElement { source_name: String },

    /// Elements are still open, so the tree cannot be completed.
    #[error("document is incomplete, open elements: {}", .open.join(" > "))]
    IncompleteDocument { open: Vec<String> },

    /// Arena, depth or registry limits reached.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A panic while holding the context registry lock.
    #[error("context registry lock poisoned")]
    RegistryPoisoned,

    /// A panic while building into one context; only that handle is lost.
    #[error("context {handle} lock poisoned")]
    ContextPoisoned { handle: HandleId },
}

fn unbalanced_message(expected: Option<&str>, found: &str) -> String {
    match expected {
        Some(expected) => format!("mismatched end tag: expected </{}>, found </{}>", expected, found),
        None => format!("unexpected end tag </{}> with no open element", found),
    }
}

impl DomError {
    /// Short machine-readable name, used as the error atom on the host side.
    pub fn kind(&self) -> &'static str {
        match self {
            DomError::InvalidHandle { .. } => "invalid_handle",
            DomError::FileAccess { .. } => "file_access",
            DomError::Syntax { .. } => "syntax_error",
            DomError::DuplicateAttribute { .. } => "duplicate_attribute",
            DomError::UnbalancedTag { .. } => "unbalanced_tag",
            DomError::UnterminatedElement { .. } => "unterminated_element",
            DomError::MultipleRoots { .. } => "multiple_roots",
            DomError::NoRootElement { .. } => "no_root_element",
            DomError::IncompleteDocument { .. } => "incomplete_document",
            DomError::ResourceExhausted(_) => "resource_exhausted",
            DomError::RegistryPoisoned => "registry_poisoned",
            DomError::ContextPoisoned { .. } => "context_poisoned",
        }
    }

    /// Source position, when the error has one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            DomError::Syntax { location, .. }
            | DomError::DuplicateAttribute { location, .. }
            | DomError::UnbalancedTag { location, .. }
            | DomError::UnterminatedElement { location, .. }
            | DomError::MultipleRoots { location, .. } => Some(location),
            _ => None,
        }
    }

    /// True for errors that leave the context in `Building` with the tree partially filled.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DomError::DuplicateAttribute { .. }
                | DomError::UnbalancedTag { .. }
                | DomError::UnterminatedElement { .. }
                | DomError::MultipleRoots { .. }
                | DomError::NoRootElement { .. }
        )
    }
}
