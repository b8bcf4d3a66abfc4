//! `CALL_REQ` / `CALL_RES` payload shapes
// (c) 2025 Ross Younger

use crate::error::{ProtocolError, Result};
use crate::rw::{FieldKey, Rw, Value};

use super::{headers_from_value, headers_to_value, HeaderList};

/// Opaque call tracing identifiers. The core carries these on the wire but never
/// interprets them; that is a service-routing concern layered above this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tracing {
    /// Span id.
    pub span: u64,
    /// Parent span id.
    pub parent: u64,
    /// Trace id.
    pub trace: u64,
    /// Trace flags.
    pub flags: u8,
}

impl Tracing {
    /// Converts to the `chain(number(8), number(8), number(8), number(1))` tuple
    /// shape shared by `CALL_REQ`/`CALL_RES`/`ERROR`.
    pub(super) fn to_wire_value(self) -> Value {
        Value::Tuple(vec![
            Value::UInt(self.span),
            Value::UInt(self.parent),
            Value::UInt(self.trace),
            Value::UInt(u64::from(self.flags)),
        ])
    }

    pub(super) fn from_wire_value(value: &Value) -> Result<Tracing> {
        match value {
            Value::Tuple(parts) if parts.len() == 4 => {
                let uint = |v: &Value| match v {
                    Value::UInt(n) => Ok(*n),
                    _ => Err(ProtocolError::ValueShape { combinator: "tracing" }.into()),
                };
                Ok(Tracing {
                    span: uint(&parts[0])?,
                    parent: uint(&parts[1])?,
                    trace: uint(&parts[2])?,
                    flags: u8::try_from(uint(&parts[3])?)
                        .map_err(|_| ProtocolError::ValueShape { combinator: "tracing.flags" })?,
                })
            }
            _ => Err(ProtocolError::ValueShape { combinator: "tracing" }.into()),
        }
    }
}

pub(super) fn tracing_rw() -> Rw {
    Rw::chain(vec![Rw::number(8), Rw::number(8), Rw::number(8), Rw::number(1)])
}

fn arg_rw() -> Rw {
    Rw::len_prefixed_string(Rw::number(2), true)
}

fn arg_value(arg: &[u8]) -> Value {
    Value::Bytes(arg.to_vec())
}

fn arg_from_value(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        _ => Err(ProtocolError::ValueShape { combinator: "arg" }.into()),
    }
}

/// `CALL_REQ` payload: a call to a named service, with up to three opaque argument
/// blobs. Matches the public TChannel wire shape, simplified to this crate's scope —
/// no fragmentation or arg streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReqPayload {
    /// Per-call flags bitmask.
    pub flags: u8,
    /// Time-to-live in milliseconds.
    pub ttl: u32,
    /// Opaque tracing identifiers.
    pub tracing: Tracing,
    /// Name of the destination service.
    pub service: String,
    /// Transport headers.
    pub headers: HeaderList,
    /// Checksum algorithm identifying how (if at all) the args were checksummed.
    pub checksum_type: u8,
    /// First argument blob (conventionally the method/arg name).
    pub arg1: Vec<u8>,
    /// Second argument blob (conventionally headers).
    pub arg2: Vec<u8>,
    /// Third argument blob (conventionally the body).
    pub arg3: Vec<u8>,
}

impl CallReqPayload {
    pub(super) fn to_value(&self) -> Value {
        Value::map([
            ("flags", Value::UInt(u64::from(self.flags))),
            ("ttl", Value::UInt(u64::from(self.ttl))),
            ("tracing", self.tracing.to_wire_value()),
            ("service", Value::Str(self.service.clone())),
            ("headers", headers_to_value(&self.headers)),
            ("checksum_type", Value::UInt(u64::from(self.checksum_type))),
            ("arg1", arg_value(&self.arg1)),
            ("arg2", arg_value(&self.arg2)),
            ("arg3", arg_value(&self.arg3)),
        ])
    }

    pub(super) fn from_value(value: &Value) -> Result<CallReqPayload> {
        let field = |name: &'static str| {
            value
                .field(name)
                .ok_or(ProtocolError::ValueShape { combinator: name })
        };
        let uint = |v: &Value, name: &'static str| match v {
            Value::UInt(n) => Ok(*n),
            _ => Err(ProtocolError::ValueShape { combinator: name }),
        };
        let service = match field("service")? {
            Value::Str(s) => s.clone(),
            _ => return Err(ProtocolError::ValueShape { combinator: "service" }.into()),
        };
        Ok(CallReqPayload {
            flags: u8::try_from(uint(field("flags")?, "flags")?)
                .map_err(|_| ProtocolError::ValueShape { combinator: "flags" })?,
            ttl: u32::try_from(uint(field("ttl")?, "ttl")?)
                .map_err(|_| ProtocolError::ValueShape { combinator: "ttl" })?,
            tracing: Tracing::from_wire_value(field("tracing")?)?,
            service,
            headers: headers_from_value(field("headers")?)?,
            checksum_type: u8::try_from(uint(field("checksum_type")?, "checksum_type")?)
                .map_err(|_| ProtocolError::ValueShape { combinator: "checksum_type" })?,
            arg1: arg_from_value(field("arg1")?)?,
            arg2: arg_from_value(field("arg2")?)?,
            arg3: arg_from_value(field("arg3")?)?,
        })
    }
}

/// `CALL_RES` payload: as [`CallReqPayload`] but keyed by response `code` instead of
/// destination `service`, and with no `ttl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResPayload {
    /// Per-call flags bitmask.
    pub flags: u8,
    /// Response code (0 = OK, nonzero = application error).
    pub code: u8,
    /// Opaque tracing identifiers.
    pub tracing: Tracing,
    /// Transport headers.
    pub headers: HeaderList,
    /// Checksum algorithm identifying how (if at all) the args were checksummed.
    pub checksum_type: u8,
    /// First argument blob.
    pub arg1: Vec<u8>,
    /// Second argument blob.
    pub arg2: Vec<u8>,
    /// Third argument blob.
    pub arg3: Vec<u8>,
}

impl CallResPayload {
    pub(super) fn to_value(&self) -> Value {
        Value::map([
            ("flags", Value::UInt(u64::from(self.flags))),
            ("code", Value::UInt(u64::from(self.code))),
            ("tracing", self.tracing.to_wire_value()),
            ("headers", headers_to_value(&self.headers)),
            ("checksum_type", Value::UInt(u64::from(self.checksum_type))),
            ("arg1", arg_value(&self.arg1)),
            ("arg2", arg_value(&self.arg2)),
            ("arg3", arg_value(&self.arg3)),
        ])
    }

    pub(super) fn from_value(value: &Value) -> Result<CallResPayload> {
        let field = |name: &'static str| {
            value
                .field(name)
                .ok_or(ProtocolError::ValueShape { combinator: name })
        };
        let uint = |v: &Value, name: &'static str| match v {
            Value::UInt(n) => Ok(*n),
            _ => Err(ProtocolError::ValueShape { combinator: name }),
        };
        Ok(CallResPayload {
            flags: u8::try_from(uint(field("flags")?, "flags")?)
                .map_err(|_| ProtocolError::ValueShape { combinator: "flags" })?,
            code: u8::try_from(uint(field("code")?, "code")?)
                .map_err(|_| ProtocolError::ValueShape { combinator: "code" })?,
            tracing: Tracing::from_wire_value(field("tracing")?)?,
            headers: headers_from_value(field("headers")?)?,
            checksum_type: u8::try_from(uint(field("checksum_type")?, "checksum_type")?)
                .map_err(|_| ProtocolError::ValueShape { combinator: "checksum_type" })?,
            arg1: arg_from_value(field("arg1")?)?,
            arg2: arg_from_value(field("arg2")?)?,
            arg3: arg_from_value(field("arg3")?)?,
        })
    }
}

pub(super) fn call_req_rw() -> Rw {
    Rw::dictionary(vec![
        (FieldKey::Named("flags"), Rw::number(1)),
        (FieldKey::Named("ttl"), Rw::number(4)),
        (FieldKey::Named("tracing"), tracing_rw()),
        (
            FieldKey::Named("service"),
            Rw::len_prefixed_string(Rw::number(1), false),
        ),
        (FieldKey::Named("headers"), call_headers_rw()),
        (FieldKey::Named("checksum_type"), Rw::number(1)),
        (FieldKey::Named("arg1"), arg_rw()),
        (FieldKey::Named("arg2"), arg_rw()),
        (FieldKey::Named("arg3"), arg_rw()),
    ])
}

/// Same field order as [`call_req_rw`] with `ttl` dropped and `code` occupying the
/// position `service` held (see `DESIGN.md` for this Open Question resolution).
pub(super) fn call_res_rw() -> Rw {
    Rw::dictionary(vec![
        (FieldKey::Named("flags"), Rw::number(1)),
        (FieldKey::Named("tracing"), tracing_rw()),
        (FieldKey::Named("code"), Rw::number(1)),
        (FieldKey::Named("headers"), call_headers_rw()),
        (FieldKey::Named("checksum_type"), Rw::number(1)),
        (FieldKey::Named("arg1"), arg_rw()),
        (FieldKey::Named("arg2"), arg_rw()),
        (FieldKey::Named("arg3"), arg_rw()),
    ])
}

/// Call-level headers use a one-byte count and one-byte-prefixed key/value strings,
/// unlike the two-byte-prefixed handshake headers ([`super::headers_rw`]).
fn call_headers_rw() -> Rw {
    Rw::headers(
        Rw::number(1),
        Rw::len_prefixed_string(Rw::number(1), false),
        Rw::len_prefixed_string(Rw::number(1), false),
    )
}
