//! Elixir Term Conversion Utilities
//!
//! Converts finished documents and errors to Elixir terms.

use rustler::types::atom::nil;
use rustler::{Atom, Encoder, Env, NewBinary, NifResult, Term};

use crate::dom::{Document, NodeId, NodeKind, DOCUMENT_NODE};
use crate::error::{DomError, HandleProblem, Location};

// Pre-defined atoms for efficiency - created once at compile time
rustler::atoms! {
    ok,
    error,
    document,
    element,
    // error detail keys
    handle,
    problem,
    unknown,
    finalized,
    path,
    reason,
    source,
    line,
    column,
    offset,
    name,
    expected,
    found,
    first,
    second,
    open,
}

/// Partially built element or document: children accumulate until the
/// sibling chain is exhausted.
struct Frame<'a> {
    id: NodeId,
    next_child: Option<NodeId>,
    children: Vec<Term<'a>>,
}

/// Convert a document to `{:document, [source], children}`
///
/// Elements become `{:element, name, [{attr, value}], children, {source, line}}`
/// and text nodes plain binaries. Built with an explicit stack so nesting
/// depth is bounded by memory, not by the call stack.
pub fn document_to_term<'a>(env: Env<'a>, doc: &Document) -> NifResult<Term<'a>> {
    let mut stack = vec![Frame {
        id: DOCUMENT_NODE,
        next_child: doc.get_node(DOCUMENT_NODE).and_then(|n| n.first_child),
        children: Vec::new(),
    }];

    loop {
        let Some(frame) = stack.last_mut() else {
            return Ok(nil().encode(env));
        };

        if let Some(child) = frame.next_child {
            let node = match doc.get_node(child) {
                Some(n) => n,
                None => {
                    frame.next_child = None;
                    continue;
                }
            };
            frame.next_child = node.next_sibling;

            match node.kind {
                NodeKind::Text => {
                    let content = doc.text_content(child).unwrap_or("");
                    frame.children.push(str_to_binary(env, content));
                }
                NodeKind::Element => stack.push(Frame {
                    id: child,
                    next_child: node.first_child,
                    children: Vec::new(),
                }),
                NodeKind::Document => {}
            }
            continue;
        }

        let Some(done) = stack.pop() else {
            return Ok(nil().encode(env));
        };
        let term = close_frame(env, doc, done);
        match stack.last_mut() {
            Some(parent) => parent.children.push(term),
            None => return Ok(term),
        }
    }
}

fn close_frame<'a>(env: Env<'a>, doc: &Document, frame: Frame<'a>) -> Term<'a> {
    if frame.id == DOCUMENT_NODE {
        let sources: Vec<Term<'a>> = doc.sources().iter().map(|s| str_to_binary(env, s)).collect();
        return (document(), sources, frame.children).encode(env);
    }

    let name_term = str_to_binary(env, doc.node_name(frame.id).unwrap_or(""));
    let attrs: Vec<(Term<'a>, Term<'a>)> = doc
        .attributes(frame.id)
        .map(|(k, v)| (str_to_binary(env, k), str_to_binary(env, v)))
        .collect();

    let origin = match doc.location(frame.id) {
        Some(loc) => (
            str_to_binary(env, doc.source_name(loc.source).unwrap_or("")),
            loc.line,
        )
            .encode(env),
        None => nil().encode(env),
    };

    (element(), name_term, attrs, frame.children, origin).encode(env)
}

/// Convert an error to `{:error, {kind, message, details}}`
pub fn error_to_term<'a>(env: Env<'a>, err: &DomError) -> NifResult<Term<'a>> {
    let kind = Atom::from_str(env, err.kind())?;
    let message = str_to_binary(env, &err.to_string());
    let details = error_details(env, err)?;
    Ok((error(), (kind, message, details)).encode(env))
}

fn error_details<'a>(env: Env<'a>, err: &DomError) -> NifResult<Term<'a>> {
    let mut pairs: Vec<(Atom, Term<'a>)> = Vec::new();

    match err {
        DomError::InvalidHandle { handle: id, problem: p } => {
            pairs.push((handle(), id.encode(env)));
            let p = match p {
                HandleProblem::Unknown => unknown(),
                HandleProblem::Finalized => finalized(),
            };
            pairs.push((problem(), p.encode(env)));
        }
        DomError::FileAccess { path: p, source: io } => {
            pairs.push((path(), str_to_binary(env, &p.display().to_string())));
            pairs.push((reason(), str_to_binary(env, &io.to_string())));
        }
        DomError::Syntax { offset: off, .. } => {
            pairs.push((offset(), off.encode(env)));
        }
        DomError::DuplicateAttribute { name: attr, element: elem, .. } => {
            pairs.push((name(), str_to_binary(env, attr)));
            pairs.push((element(), str_to_binary(env, elem)));
        }
        DomError::UnbalancedTag { expected: exp, found: f, .. } => {
            let exp = match exp {
                Some(e) => str_to_binary(env, e),
                None => nil().encode(env),
            };
            pairs.push((expected(), exp));
            pairs.push((found(), str_to_binary(env, f)));
        }
        DomError::UnterminatedElement { name: n, .. } => {
            pairs.push((name(), str_to_binary(env, n)));
        }
        DomError::MultipleRoots { first: a, second: b, .. } => {
            pairs.push((first(), str_to_binary(env, a)));
            pairs.push((second(), str_to_binary(env, b)));
        }
        DomError::NoRootElement { source_name } => {
            pairs.push((source(), str_to_binary(env, source_name)));
        }
        DomError::IncompleteDocument { open: names } => {
            let names: Vec<Term<'a>> = names.iter().map(|n| str_to_binary(env, n)).collect();
            pairs.push((open(), names.encode(env)));
        }
        DomError::ContextPoisoned { handle: id } => {
            pairs.push((handle(), id.encode(env)));
        }
        DomError::ResourceExhausted(_) | DomError::RegistryPoisoned => {}
    }

    if let Some(loc) = err.location() {
        push_location(env, loc, &mut pairs);
    }

    Term::map_from_pairs(env, pairs.as_slice())
}

fn push_location<'a>(env: Env<'a>, loc: &Location, pairs: &mut Vec<(Atom, Term<'a>)>) {
    pairs.push((source(), str_to_binary(env, &loc.source)));
    pairs.push((line(), loc.line.encode(env)));
    pairs.push((column(), loc.column.encode(env)));
}

/// Convert a string to a binary term (more efficient than .encode())
#[inline]
pub fn str_to_binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    let bytes = s.as_bytes();
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}
