//! IR errors definitions.

use crate::Addr;
use std::fmt;
use thiserror::Error;

/// An alias for result that can be a [`IrError`].
pub type IrResult<T> = Result<T, IrError>;

/// The IR error type.
#[derive(Debug, Error)]
pub enum IrError {
    /// Error that can be returned when formatting IR parts.
    #[error("Formatting error: {0}")]
    Fmt(#[from] fmt::Error),

    /// Low level syntax error reported by the assembly parsers.
    #[error("syntax error near {0:?} ({1:?})")]
    Syntax(String, nom::error::ErrorKind),

    /// Error located in an assembly source, wrapping the underlying error.
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<IrError>,
    },

    /// Custom internal error type.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("could not convert {} into {}", from, to)]
    Conversion { from: String, to: String },

    #[error("invalid type: {0}")]
    InvalidType(String),

    #[error("unknown directive or instruction: {0}")]
    Unknown(String),

    #[error("invalid operands for {0}")]
    BadOperands(String),

    #[error("unexpected {0} outside of {1}")]
    Misplaced(String, String),

    #[error("label :{0} is not defined")]
    UnknownLabel(String),

    #[error("label :{0} is defined twice")]
    DuplicateLabel(String),

    #[error("register {0} is out of the {1} declared registers")]
    BadRegister(String, u32),

    #[error("class {0} is defined twice")]
    DuplicateClass(String),

    #[error("member {0} is defined twice")]
    DuplicateMember(String),

    #[error("method {0} has no code")]
    NoCode(String),

    #[error("instruction not found (address: {0})")]
    InstructionNotFound(Addr),

    #[error("unterminated {0}")]
    Unterminated(String),
}

impl IrError {
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            located @ Self::Line { .. } => located,
            other => Self::Line {
                line,
                source: Box::new(other),
            },
        }
    }
}

impl nom::error::ParseError<&str> for IrError {
    fn from_error_kind(input: &str, kind: nom::error::ErrorKind) -> Self {
        Self::Syntax(input.chars().take(32).collect(), kind)
    }

    fn append(_: &str, _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl<E> nom::error::FromExternalError<&str, E> for IrError {
    fn from_external_error(input: &str, kind: nom::error::ErrorKind, _: E) -> Self {
        Self::Syntax(input.chars().take(32).collect(), kind)
    }
}
