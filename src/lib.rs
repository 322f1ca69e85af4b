//! XmlDom - Incremental XML DOM builder
//!
//! A document is built in three steps:
//! 1. create: open a parser context, get a handle
//! 2. readfile / readbinary: parse one source into the context's tree
//! 3. finish: seal the tree and hand it to the caller
//!
//! Every source contributes one root element; roots of successive sources
//! become siblings under the document node.

use rustler::{Binary, Encoder, Env, NifMap, NifResult, ResourceArc, Term};

pub mod config;
pub mod context;
pub mod core;
pub mod dom;
pub mod error;
pub mod reader;
pub mod registry;
mod resource;
mod term;

pub use config::ParserOptions;
pub use context::{ContextState, ParserContext};
pub use dom::{Document, NodeId, NodeKind};
pub use error::{DomError, Location};
pub use registry::{ContextRegistry, HandleId};

use resource::{with_context, with_registry, ContextRef, ContextResource};
use term::{document_to_term, error_to_term};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Context Lifecycle NIFs
// ============================================================================

/// Options map accepted by `create_with_options/1`
#[derive(NifMap)]
struct HostOptions {
    skip_whitespace_text: bool,
    max_depth: u32,
}

impl From<HostOptions> for ParserOptions {
    fn from(opts: HostOptions) -> Self {
        ParserOptions::new()
            .skip_whitespace_text(opts.skip_whitespace_text)
            .max_depth(opts.max_depth)
    }
}

/// Open a new context with default options
/// Returns {:ok, handle} or {:error, reason}
#[rustler::nif]
fn create<'a>(env: Env<'a>) -> NifResult<Term<'a>> {
    handle_to_term(env, with_registry(|registry| registry.create()))
}

/// Open a new context with explicit options
#[rustler::nif]
fn create_with_options<'a>(env: Env<'a>, options: HostOptions) -> NifResult<Term<'a>> {
    let options = ParserOptions::from(options);
    handle_to_term(env, with_registry(|registry| registry.create_with_options(options)))
}

/// Parse a file into the context's tree
/// Runs on a dirty I/O scheduler. Only this handle's context is locked
/// for the duration.
#[rustler::nif(schedule = "DirtyIo")]
fn readfile<'a>(env: Env<'a>, handle: ContextRef, path: &str) -> NifResult<Term<'a>> {
    let result = with_context(handle.id, |ctx| ctx.read_file(std::path::Path::new(path)));
    unit_to_term(env, result)
}

/// Parse an in-memory source into the context's tree
#[rustler::nif(schedule = "DirtyCpu")]
fn readbinary<'a>(env: Env<'a>, handle: ContextRef, source_name: &str, input: Binary<'a>) -> NifResult<Term<'a>> {
    let bytes = input.as_slice().to_vec();
    let result = with_context(handle.id, |ctx| ctx.read_bytes(source_name, bytes));
    unit_to_term(env, result)
}

/// Seal the tree and return it
/// Returns {:ok, {:document, sources, children}} or {:error, reason}
#[rustler::nif(schedule = "DirtyCpu")]
fn finish<'a>(env: Env<'a>, handle: ContextRef) -> NifResult<Term<'a>> {
    // Term building happens outside the context lock
    match with_context(handle.id, |ctx| ctx.finish()) {
        Ok(doc) => {
            let tree = document_to_term(env, &doc)?;
            Ok((term::ok(), tree).encode(env))
        }
        Err(err) => error_to_term(env, &err),
    }
}

fn handle_to_term<'a>(env: Env<'a>, result: error::Result<HandleId>) -> NifResult<Term<'a>> {
    match result {
        Ok(id) => {
            let arc = ResourceArc::new(ContextResource::new(id));
            Ok((term::ok(), arc).encode(env))
        }
        Err(err) => error_to_term(env, &err),
    }
}

fn unit_to_term<'a>(env: Env<'a>, result: error::Result<()>) -> NifResult<Term<'a>> {
    match result {
        Ok(()) => Ok(term::ok().encode(env)),
        Err(err) => error_to_term(env, &err),
    }
}

// ============================================================================
// NIF Initialization
// ============================================================================

rustler::init!("Elixir.XmlDom.Native");
