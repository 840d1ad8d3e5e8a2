use thiserror::Error;

/// Errors raised while decoding a pickle stream.
#[derive(Debug, Error)]
pub enum PickleError {
    /// The stream ended in the middle of an opcode's payload.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The stream ended without a STOP opcode.
    #[error("stream ended without STOP")]
    MissingStop,

    /// The stack still held values after STOP.
    #[error("stack is not empty at the end")]
    DanglingStack,

    /// An opcode needed more stack items than were present, or found a
    /// mark where a value was expected.
    #[error("stack underflow")]
    StackUnderflow,

    /// An opcode outside the supported set.
    #[error("pickle opcode {0:#04x} not supported")]
    UnsupportedOpcode(u8),

    /// An ASCII-line number failed to parse.
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),

    /// A malformed string escape or surrogate sequence.
    #[error("invalid string escape")]
    InvalidEscape,

    /// A dictionary key of a kind that cannot be represented.
    #[error("unsupported dictionary key type")]
    InvalidKey,

    /// An opcode found a value of the wrong kind on the stack.
    #[error("operand type mismatch")]
    TypeMismatch,

    /// A GET referenced a memo slot that was never PUT.
    #[error("unknown memo key: {0}")]
    UnknownMemo(i64),

    /// I/O error while reading.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
