//! Context Registry
//!
//! Maps opaque handles to parser contexts. Finalized contexts stay
//! registered so a late call can be told "finalized" rather than "unknown";
//! `release` forgets a handle entirely.
//!
//! Each context sits behind its own mutex. Callers look a context up, drop
//! the registry, then lock the context, so a long read on one handle never
//! holds up `create`, `release` or work on another handle.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::config::ParserOptions;
use crate::context::{ContextState, ParserContext};
use crate::dom::Document;
use crate::error::{DomError, HandleProblem, Result};

/// Opaque context identifier handed to callers
pub type HandleId = u64;

/// A context shared between the registry and an in-flight call
pub type SharedContext = Arc<Mutex<ParserContext>>;

/// All live parser contexts
#[derive(Debug)]
pub struct ContextRegistry {
    next_id: HandleId,
    contexts: HashMap<HandleId, SharedContext>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        ContextRegistry {
            next_id: 1,
            contexts: HashMap::new(),
        }
    }

    /// Start a new document build with default options
    pub fn create(&mut self) -> Result<HandleId> {
        self.create_with_options(ParserOptions::default())
    }

    /// Start a new document build
    pub fn create_with_options(&mut self, options: ParserOptions) -> Result<HandleId> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| DomError::ResourceExhausted("handle space exhausted".to_string()))?;
        self.contexts
            .try_reserve(1)
            .map_err(|_| DomError::ResourceExhausted("context registry allocation failed".to_string()))?;

        debug!(
            handle = id,
            skip_whitespace_text = options.skip_whitespace_text,
            max_depth = options.max_depth,
            "context created"
        );
        self.contexts
            .insert(id, Arc::new(Mutex::new(ParserContext::new(id, options))));
        Ok(id)
    }

    /// Look up a handle's context without locking it
    pub fn context(&self, handle: HandleId) -> Result<SharedContext> {
        self.contexts.get(&handle).cloned().ok_or(DomError::InvalidHandle {
            handle,
            problem: HandleProblem::Unknown,
        })
    }

    /// Read a file into the handle's document
    pub fn read_file(&self, handle: HandleId, path: &Path) -> Result<()> {
        let ctx = self.context(handle)?;
        let mut ctx = lock_context(&ctx, handle)?;
        ctx.read_file(path)
    }

    /// Parse in-memory input into the handle's document
    pub fn read_bytes(&self, handle: HandleId, source_name: &str, bytes: Vec<u8>) -> Result<()> {
        let ctx = self.context(handle)?;
        let mut ctx = lock_context(&ctx, handle)?;
        ctx.read_bytes(source_name, bytes)
    }

    /// Complete the handle's document and take ownership of it
    pub fn finish(&self, handle: HandleId) -> Result<Document> {
        let ctx = self.context(handle)?;
        let mut ctx = lock_context(&ctx, handle)?;
        ctx.finish()
    }

    /// Forget a handle. Returns false when it was not registered.
    ///
    /// A call still working on the context keeps it alive until it returns.
    pub fn release(&mut self, handle: HandleId) -> bool {
        let removed = self.contexts.remove(&handle).is_some();
        if removed {
            debug!(handle, "context released");
        }
        removed
    }

    /// Lifecycle state of a handle, None when unknown
    pub fn state(&self, handle: HandleId) -> Option<ContextState> {
        self.contexts
            .get(&handle)
            .map(|ctx| ctx.lock().unwrap_or_else(PoisonError::into_inner).state())
    }

    /// Number of registered contexts, finalized ones included
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock one context
///
/// # Errors
///
/// Returns `ContextPoisoned` if an earlier call panicked while building into it.
pub fn lock_context(ctx: &SharedContext, handle: HandleId) -> Result<MutexGuard<'_, ParserContext>> {
    ctx.lock().map_err(|_| DomError::ContextPoisoned { handle })
}
