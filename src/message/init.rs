//! `INIT_REQ` / `INIT_RES` payload shape
// (c) 2025 Ross Younger

use crate::error::{ProtocolError, Result};
use crate::rw::{FieldKey, Rw, Value};

use super::{headers_from_value, headers_rw, headers_to_value, HeaderList};

/// The shared payload carried by both handshake messages: a protocol version and an
/// advisory set of headers.
///
/// The core does not itself enforce which headers are present — `host_port` and
/// `process_name` are mandatory per the wire format, but checking for them is the
/// connection engine's job (a missing header there is a semantic violation, raised as
/// an `InvalidMessageException`, not a decode failure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPayload {
    /// The protocol version the sender is offering or acknowledging.
    pub version: u16,
    /// Advisory key/value headers, e.g. `host_port`, `process_name`.
    pub headers: HeaderList,
}

impl InitPayload {
    /// Looks up a header by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub(super) fn to_value(&self) -> Value {
        Value::map([
            ("version", Value::UInt(u64::from(self.version))),
            ("headers", headers_to_value(&self.headers)),
        ])
    }

    pub(super) fn from_value(value: &Value) -> Result<InitPayload> {
        let version = match value.field("version") {
            Some(Value::UInt(v)) => u16::try_from(*v).map_err(|_| ProtocolError::ValueShape {
                combinator: "init.version",
            })?,
            _ => {
                return Err(ProtocolError::ValueShape {
                    combinator: "init.version",
                }
                .into())
            }
        };
        let headers = match value.field("headers") {
            Some(v) => headers_from_value(v)?,
            None => {
                return Err(ProtocolError::ValueShape {
                    combinator: "init.headers",
                }
                .into())
            }
        };
        Ok(InitPayload { version, headers })
    }
}

pub(super) fn payload_rw() -> Rw {
    Rw::dictionary(vec![
        (FieldKey::Named("version"), Rw::number(2)),
        (FieldKey::Named("headers"), headers_rw()),
    ])
}
