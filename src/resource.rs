//! ResourceArc Wrappers
//!
//! The process-wide context registry and the handle resource the host holds.
//! Contexts live in the registry; the resource only carries the handle ID and
//! releases it when the BEAM collects the reference.

use std::sync::{LazyLock, Mutex, PoisonError};

use rustler::ResourceArc;

use crate::context::ParserContext;
use crate::error::{DomError, Result};
use crate::registry::{lock_context, ContextRegistry, HandleId};

/// Every context created through the NIFs. Held only for handle bookkeeping.
static CONTEXTS: LazyLock<Mutex<ContextRegistry>> = LazyLock::new(|| Mutex::new(ContextRegistry::new()));

/// Run `f` against the registry
///
/// # Errors
///
/// Returns `RegistryPoisoned` if an earlier call panicked while holding the lock.
pub fn with_registry<F, R>(f: F) -> Result<R>
where
    F: FnOnce(&mut ContextRegistry) -> Result<R>,
{
    let mut guard = CONTEXTS.lock().map_err(|_| DomError::RegistryPoisoned)?;
    f(&mut guard)
}

/// Run `f` against one context
///
/// The registry lock is released before the context is locked, so `f` may
/// run for as long as a read takes.
pub fn with_context<F, R>(handle: HandleId, f: F) -> Result<R>
where
    F: FnOnce(&mut ParserContext) -> Result<R>,
{
    let ctx = with_registry(|registry| registry.context(handle))?;
    let mut guard = lock_context(&ctx, handle)?;
    f(&mut guard)
}

/// Host-side handle for one parser context
pub struct ContextResource {
    pub id: HandleId,
}

impl ContextResource {
    pub fn new(id: HandleId) -> Self {
        ContextResource { id }
    }
}

#[rustler::resource_impl]
impl rustler::Resource for ContextResource {}

impl Drop for ContextResource {
    fn drop(&mut self) {
        release_from(&CONTEXTS, self.id);
    }
}

/// Release a handle even if the registry lock was poisoned
fn release_from(contexts: &Mutex<ContextRegistry>, id: HandleId) -> bool {
    contexts
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .release(id)
}

/// Type alias for the handle ResourceArc
pub type ContextRef = ResourceArc<ContextResource>;
