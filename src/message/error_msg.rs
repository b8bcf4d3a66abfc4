//! `ERROR` payload shape
// (c) 2025 Ross Younger

use crate::error::{ProtocolError, Result};
use crate::rw::{FieldKey, Rw, Value};

use super::call::{tracing_rw, Tracing};

/// `ERROR` payload: a response code, the tracing identifiers carried opaquely on
/// every call, and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    /// The protocol-level error code.
    pub code: u8,
    /// Opaque tracing identifiers, echoing the failed call's.
    pub tracing: Tracing,
    /// A human-readable description of the failure.
    pub message: String,
}

impl ErrorPayload {
    pub(super) fn to_value(&self) -> Value {
        Value::map([
            ("code", Value::UInt(u64::from(self.code))),
            ("tracing", self.tracing.to_wire_value()),
            ("message", Value::Str(self.message.clone())),
        ])
    }

    pub(super) fn from_value(value: &Value) -> Result<ErrorPayload> {
        let field = |name: &'static str| {
            value
                .field(name)
                .ok_or(ProtocolError::ValueShape { combinator: name })
        };
        let code = match field("code")? {
            Value::UInt(v) => u8::try_from(*v).map_err(|_| ProtocolError::ValueShape { combinator: "code" })?,
            _ => return Err(ProtocolError::ValueShape { combinator: "code" }.into()),
        };
        let message = match field("message")? {
            Value::Str(s) => s.clone(),
            _ => return Err(ProtocolError::ValueShape { combinator: "message" }.into()),
        };
        Ok(ErrorPayload {
            code,
            tracing: Tracing::from_wire_value(field("tracing")?)?,
            message,
        })
    }
}

pub(super) fn error_rw() -> Rw {
    Rw::dictionary(vec![
        (FieldKey::Named("code"), Rw::number(1)),
        (FieldKey::Named("tracing"), tracing_rw()),
        (
            FieldKey::Named("message"),
            Rw::len_prefixed_string(Rw::number(2), false),
        ),
    ])
}
