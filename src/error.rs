//! Error types shared by every stage of the pipeline.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All the ways reading a symbol table can go wrong.
///
/// The STABS grammar errors (`UnexpectedEnd` through
/// `InvalidMemberFunctionModifiers`) carry a short context string naming the
/// production that was being parsed, mirroring the error messages emitted by
/// the toolchain this format comes from.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of input while parsing {0}")]
    UnexpectedEnd(&'static str),

    #[error("expected '{expected}' while parsing {context}")]
    ExpectedChar { expected: char, context: &'static str },

    /// A known GCC bug truncates long symbol strings. Hitting the end of the
    /// input inside an identifier is the signature of that bug and is
    /// downgraded to a warning by the symbol stream parser.
    #[error("symbol string truncated, most likely by a known bug in GCC")]
    Truncated,

    #[error("invalid symbol descriptor '{0}'")]
    InvalidDescriptor(char),

    #[error("invalid visibility character '{0}'")]
    InvalidVisibility(char),

    #[error("invalid member function modifier character '{0}'")]
    InvalidMemberFunctionModifiers(char),

    #[error("malformed {context} at offset {offset:#x}")]
    Format { context: &'static str, offset: usize },

    #[error("unknown symbol with code {code:#x}: {string}")]
    UnknownSymbol { code: u32, string: String },

    #[error("no '{0}' section found")]
    MissingSection(String),

    #[error("failed to look up {what} '{key}'")]
    Lookup { what: &'static str, key: String },

    #[error("{0}")]
    Fatal(String),
}

impl Error {
    pub(crate) fn format(context: &'static str, offset: usize) -> Self {
        Error::Format { context, offset }
    }
}
