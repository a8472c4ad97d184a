//! Error kinds shared across the parser and runtime, per the error-handling
//! design: parse errors are fatal to construction; runtime errors are
//! recovered at the action-record or placement boundary and only ever
//! logged via `tracing`.

use thiserror::Error;

/// A failure while decoding the wire format. Fatal: the player fails to
/// construct.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed binary: {0}")]
    MalformedBinary(String),

    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("variable-length integer exceeded 5 bytes")]
    EncodedIntOverrun,

    #[error("character id {0} defined twice")]
    DuplicateCharacterId(u16),

    #[error("inflate failed: {0}")]
    Inflate(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// A failure recovered at a single action-record or placement boundary.
/// Never propagates past the frame that produced it; always paired with a
/// `tracing::warn!` at the call site.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("placement referenced unknown character id {0}")]
    DictionaryMiss(u16),

    #[error("shape tesselation failed: {0}")]
    TesselationFailure(String),

    #[error("action popped from an empty value stack")]
    StackUnderflow,

    #[error("script limit exceeded: {0}")]
    ScriptLimit(&'static str),

    #[error("type error: {0}")]
    TypeError(&'static str),
}
