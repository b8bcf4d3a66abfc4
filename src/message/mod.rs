//! The message catalog
// (c) 2025 Ross Younger

//! The fixed set of TChannel message variants, each described by a wire shape built
//! from [`crate::rw`] combinators and keyed by a one-byte type tag. [`catalog`]
//! assembles those shapes into a single [`Rw::Switch`](crate::rw::Rw::Switch) so that
//! the tag-to-combinator mapping has exactly one definition, shared by the tests in
//! this module and by the frame codec's per-tag body lookup ([`body_rw_for_tag`]).
//!
//! Call request/response and error payload shapes are not part of the public
//! TChannel wire protocol's arg-streaming machinery (fragmentation, checksums beyond
//! the type byte, and so on are out of scope here — see the crate documentation);
//! `arg1`..`arg3`, headers and tracing fields round-trip opaquely as raw bytes.

mod call;
mod error_msg;
mod init;

use std::collections::BTreeMap;

use crate::error::{ProtocolError, Result};
use crate::rw::{Rw, Value};

pub use call::{CallReqPayload, CallResPayload, Tracing};
pub use error_msg::ErrorPayload;
pub use init::InitPayload;

/// A pair of application-defined header strings, e.g. `host_port` / `process_name`
/// during handshake, or transport headers on a call.
pub type HeaderList = Vec<(String, String)>;

/// The one-byte wire tag identifying a message variant.
///
/// Numeric assignments follow the public TChannel wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeTag {
    /// Client-to-server handshake request.
    InitReq,
    /// Server-to-client handshake response.
    InitRes,
    /// A call request.
    CallReq,
    /// A call response.
    CallRes,
    /// A call error.
    Error,
    /// A liveness probe.
    PingReq,
    /// A liveness probe response.
    PingRes,
}

impl TypeTag {
    /// All type tags this catalog knows about.
    pub const ALL: [TypeTag; 7] = [
        TypeTag::InitReq,
        TypeTag::InitRes,
        TypeTag::CallReq,
        TypeTag::CallRes,
        TypeTag::Error,
        TypeTag::PingReq,
        TypeTag::PingRes,
    ];

    /// The one-byte wire code for this tag.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            TypeTag::InitReq => 0x01,
            TypeTag::InitRes => 0x02,
            TypeTag::CallReq => 0x03,
            TypeTag::CallRes => 0x04,
            TypeTag::PingReq => 0xd0,
            TypeTag::PingRes => 0xd1,
            TypeTag::Error => 0xff,
        }
    }

    /// Looks up the tag for a wire code, if it is one this catalog recognises.
    #[must_use]
    pub fn from_code(code: u8) -> Option<TypeTag> {
        match code {
            0x01 => Some(TypeTag::InitReq),
            0x02 => Some(TypeTag::InitRes),
            0x03 => Some(TypeTag::CallReq),
            0x04 => Some(TypeTag::CallRes),
            0xd0 => Some(TypeTag::PingReq),
            0xd1 => Some(TypeTag::PingRes),
            0xff => Some(TypeTag::Error),
            _ => None,
        }
    }
}

/// A decoded TChannel message: the type-specific payload plus enough information to
/// re-encode it identically.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `INIT_REQ`.
    InitReq(InitPayload),
    /// `INIT_RES`.
    InitRes(InitPayload),
    /// `CALL_REQ`.
    CallReq(CallReqPayload),
    /// `CALL_RES`.
    CallRes(CallResPayload),
    /// `ERROR`.
    Error(ErrorPayload),
    /// `PING_REQ`. Carries no payload.
    PingReq,
    /// `PING_RES`. Carries no payload.
    PingRes,
    /// A frame whose type tag this catalog does not recognise. Per the wire format,
    /// reading an unknown tag yields an empty-payload context rather than failing the
    /// stream; the raw tag is retained for diagnostics.
    Unknown(u8),
}

impl Message {
    /// The wire type tag this message would be framed under.
    #[must_use]
    pub fn type_tag_code(&self) -> u8 {
        match self {
            Message::InitReq(_) => TypeTag::InitReq.code(),
            Message::InitRes(_) => TypeTag::InitRes.code(),
            Message::CallReq(_) => TypeTag::CallReq.code(),
            Message::CallRes(_) => TypeTag::CallRes.code(),
            Message::Error(_) => TypeTag::Error.code(),
            Message::PingReq => TypeTag::PingReq.code(),
            Message::PingRes => TypeTag::PingRes.code(),
            Message::Unknown(code) => *code,
        }
    }

    /// Converts this message to the dynamic [`Value`] its body combinator expects.
    #[must_use]
    pub fn to_body_value(&self) -> Value {
        match self {
            Message::InitReq(p) | Message::InitRes(p) => p.to_value(),
            Message::CallReq(p) => p.to_value(),
            Message::CallRes(p) => p.to_value(),
            Message::Error(p) => p.to_value(),
            Message::PingReq | Message::PingRes | Message::Unknown(_) => Value::None,
        }
    }

    /// Reconstructs a [`Message`] from a wire code and its already-decoded body value.
    pub fn from_parts(code: u8, value: Value) -> Result<Message> {
        Ok(match TypeTag::from_code(code) {
            Some(TypeTag::InitReq) => Message::InitReq(InitPayload::from_value(&value)?),
            Some(TypeTag::InitRes) => Message::InitRes(InitPayload::from_value(&value)?),
            Some(TypeTag::CallReq) => Message::CallReq(CallReqPayload::from_value(&value)?),
            Some(TypeTag::CallRes) => Message::CallRes(CallResPayload::from_value(&value)?),
            Some(TypeTag::Error) => Message::Error(ErrorPayload::from_value(&value)?),
            Some(TypeTag::PingReq) => Message::PingReq,
            Some(TypeTag::PingRes) => Message::PingRes,
            None => Message::Unknown(code),
        })
    }
}

/// The body combinator for every known type tag, assembled as one switch so the
/// tag-to-shape mapping has a single definition.
#[must_use]
pub fn catalog() -> Rw {
    Rw::switch(
        Rw::number(1),
        BTreeMap::from([
            (u64::from(TypeTag::InitReq.code()), init::payload_rw()),
            (u64::from(TypeTag::InitRes.code()), init::payload_rw()),
            (u64::from(TypeTag::CallReq.code()), call::call_req_rw()),
            (u64::from(TypeTag::CallRes.code()), call::call_res_rw()),
            (u64::from(TypeTag::Error.code()), error_msg::error_rw()),
            (u64::from(TypeTag::PingReq.code()), Rw::none()),
            (u64::from(TypeTag::PingRes.code()), Rw::none()),
        ]),
    )
}

/// The body combinator for a single wire code, without re-consuming the tag byte
/// (the frame header already carries it separately — see [`crate::frame`]). Unknown
/// codes get [`Rw::none`], matching the "unknown tag, empty payload" wire rule.
#[must_use]
pub fn body_rw_for_tag(code: u8) -> Rw {
    catalog()
        .case_for(u64::from(code))
        .cloned()
        .unwrap_or_else(Rw::none)
}

pub(crate) fn headers_rw() -> Rw {
    Rw::headers(
        Rw::number(2),
        Rw::len_prefixed_string(Rw::number(2), false),
        Rw::len_prefixed_string(Rw::number(2), false),
    )
}

pub(crate) fn headers_to_value(headers: &HeaderList) -> Value {
    Value::Pairs(
        headers
            .iter()
            .map(|(k, v)| (Value::Str(k.clone()), Value::Str(v.clone())))
            .collect(),
    )
}

pub(crate) fn headers_from_value(value: &Value) -> Result<HeaderList> {
    match value {
        Value::Pairs(pairs) => pairs
            .iter()
            .map(|(k, v)| match (k, v) {
                (Value::Str(k), Value::Str(v)) => Ok((k.clone(), v.clone())),
                _ => Err(ProtocolError::ValueShape { combinator: "headers" }.into()),
            })
            .collect(),
        _ => Err(ProtocolError::ValueShape { combinator: "headers" }.into()),
    }
}
