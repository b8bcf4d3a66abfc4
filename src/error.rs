//! Error taxonomy for the wire protocol core
// (c) 2025 Ross Younger

use thiserror::Error;

use crate::message::TypeTag;

/// Bytes were unavailable or malformed while decoding a combinator, frame or message.
#[derive(Debug, Error)]
pub enum ReadError {
    /// A primitive could not obtain the bytes it required.
    #[error("short read: needed {needed} bytes, got {got}")]
    ShortRead {
        /// Bytes required by the combinator.
        needed: usize,
        /// Bytes actually available.
        got: usize,
    },
    /// A length-prefixed field declared more bytes than remain in the stream.
    #[error("length prefix of {len} bytes exceeds the remaining stream")]
    LengthPrefixTooLong {
        /// The declared length.
        len: usize,
    },
    /// A `len_prefixed_string` field was not valid UTF-8.
    #[error("invalid UTF-8 in string field: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// Trailing bytes remained in a frame body after its combinator finished decoding.
    #[error("{0} bytes of trailing garbage after decoding frame body")]
    TrailingGarbage(usize),
    /// The underlying transport failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Well-formed bytes (or in-memory values) that violate a protocol constraint.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A `number` combinator was asked to write a value outside its domain.
    #[error("value {value} does not fit in a {width}-byte big-endian integer")]
    IntegerOverflow {
        /// The value that was rejected.
        value: u64,
        /// The combinator's declared width, in bytes.
        width: u8,
    },
    /// A `chain` combinator was given a tuple of the wrong arity.
    #[error("tuple arity mismatch: expected {expected} elements, got {got}")]
    ArityMismatch {
        /// Number of children the chain declares.
        expected: usize,
        /// Number of elements actually supplied.
        got: usize,
    },
    /// A combinator was asked to write (or received while reading) a value shaped
    /// unlike anything it knows how to handle.
    #[error("value of unexpected shape for combinator {combinator}")]
    ValueShape {
        /// Name of the combinator that rejected the value.
        combinator: &'static str,
    },
    /// A frame's declared size did not leave room for the 16-byte header.
    #[error("frame size {size} is smaller than the 16-byte header")]
    FrameTooSmall {
        /// The frame's declared `size` field.
        size: u16,
    },
    /// An encoded body was too large to fit the frame header's 16-bit size field.
    #[error("encoded body of {body_len} bytes plus header overflows a u16 frame size")]
    FrameTooLarge {
        /// Length of the encoded body, in bytes.
        body_len: usize,
    },
}

/// A decoded message is structurally valid but semantically wrong for the context in
/// which it arrived. Raised by the connection engine, never by combinators.
#[derive(Debug, Error)]
pub enum InvalidMessageError {
    /// A handshake step expected one message type and received another.
    #[error("expected message type {expected:?}, found type code {found:#04x} (id={id})")]
    UnexpectedType {
        /// The type that was expected.
        expected: TypeTag,
        /// The wire type code actually received.
        found: u8,
        /// The message id it arrived with.
        id: u32,
    },
    /// A mandatory handshake header was absent.
    #[error("required handshake header `{0}` is missing")]
    MissingHeader(&'static str),
    /// The peer closed the connection before the handshake completed.
    #[error("connection closed before the handshake completed")]
    ConnectionClosed,
    /// A call-level frame (`CALL_REQ`/`CALL_RES`/`ERROR`) was sent or received before
    /// the connection reached [`Ready`](crate::connection::Phase::Ready), or a `PING`
    /// was sent or received before the handshake even started.
    #[error("frame rejected: connection is not ready for it yet")]
    NotReady,
    /// A well-formed value violated a protocol constraint while being framed for the
    /// wire; re-raised here because, in this context, it is a semantic violation
    /// rather than a bare encoding failure.
    #[error(transparent)]
    Encoding(#[from] ProtocolError),
}

/// The unified error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// See [`ReadError`].
    #[error(transparent)]
    Read(#[from] ReadError),
    /// See [`ProtocolError`].
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// See [`InvalidMessageError`].
    #[error(transparent)]
    InvalidMessage(#[from] InvalidMessageError),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Read(ReadError::Io(value))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
