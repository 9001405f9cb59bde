/*!
The low-level Carousel Object System (COS) layer of the `quire` PDF engine.

A PDF document is a graph of indirect objects addressed by
(object number, generation) pairs. This crate provides the identity and
reference types for that graph, the boundary trait through which references
are dereferenced ([`resolve::Resolver`]), the document lifecycle flag that
gates structural mutation, a capability-partitioned cache for expensive
derived resources, and a pluggable allocator for random access scratch
buffers.

Tokenizing and decoding of the PDF syntax itself live behind the resolver
boundary and are not part of this crate.
*/

use std::fmt;

pub mod cache;
pub mod io;
pub mod object;
pub mod resolve;
pub mod state;

/// Errors produced by the COS layer.
#[derive(Debug)]
pub enum Error {
    /// An argument violated a documented invariant.
    InvalidArgument(&'static str),
    /// A reference could not be dereferenced because the object store has no
    /// entry for its key.
    MissingObject(object::ObjectKey),
    /// The underlying byte source failed.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::MissingObject(key) => write!(f, "no object for key {key}"),
            Self::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
