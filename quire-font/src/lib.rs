/*!
Font table machinery for the `quire` PDF engine.

Two mostly independent pieces live here:

- [`gsub`]: a tolerant reader for the OpenType `GSUB` table, with a
  substitution interface that caches context-insensitive lookups.
- [`type1`]: an interpreter for Type 1 charstrings that renders glyph
  outlines lazily and memoizes the result.

Both readers follow the same philosophy: a malformed table should degrade
to "no substitutions" or "no outline" rather than take the document down,
so most structural damage is logged and skipped instead of surfaced as an
error.
*/

use std::fmt;

pub mod gsub;
pub mod type1;

mod stream;
mod tag;

pub use stream::TableStream;
pub use tag::Tag;

/// Errors produced while reading font tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A read ran past the end of the table data.
    ReadOutOfBounds,
    /// A substitution subtable declared a format this reader does not know.
    InvalidSubstFormat(u16),
    /// A coverage table and its subtable disagree about the glyph count.
    CoverageMismatch,
    /// A coverage table declared an unknown format.
    UnknownCoverageFormat(u16),
    /// A ligature declared an implausible component count.
    InvalidComponentCount(u16),
    /// A glyph the charstring interpreter needs does not exist in the font.
    MissingGlyph,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOutOfBounds => write!(f, "read past the end of the table"),
            Self::InvalidSubstFormat(format) => {
                write!(f, "unknown substitution subtable format {format}")
            }
            Self::CoverageMismatch => {
                write!(f, "coverage size does not match the substitution data")
            }
            Self::UnknownCoverageFormat(format) => {
                write!(f, "unknown coverage table format {format}")
            }
            Self::InvalidComponentCount(count) => {
                write!(f, "implausible ligature component count {count}")
            }
            Self::MissingGlyph => write!(f, "glyph not present in the font"),
        }
    }
}

impl std::error::Error for Error {}
