//! The per-connection state machine
// (c) 2025 Ross Younger

//! [`Connection`] owns one [`ByteStream`] and walks it through the handshake
//! (`UNSHAKEN` → `HANDSHAKING` → `READY`), allocates message ids, and pumps the
//! inbound frame sequence to a caller-supplied handler. Everything above this layer
//! (service dispatch, retries, load balancing) is out of scope for this crate.
//!
//! The connection is single-threaded: operations on it must not be interleaved, and
//! neither the underlying stream nor the id counter is internally synchronized.
//! Driving several connections concurrently is fine as long as each is pinned to one
//! worker.

use tracing::{debug, error, trace, warn};

use crate::error::{InvalidMessageError, Result};
use crate::frame::{decode_frame, encode_frame};
use crate::message::{HeaderList, InitPayload, Message, TypeTag};
use crate::transport::ByteStream;

/// The local protocol version offered during handshake. Mismatches with the peer's
/// offered version are not reconciled by this crate; the peer's value is only
/// recorded for inspection (see [`Connection::remote_version`]).
pub const PROTOCOL_VERSION: u16 = 2;

/// Where a [`Connection`] is in its handshake lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No handshake has been started yet.
    Unshaken,
    /// A handshake is in flight: `INIT_REQ` sent (or received) but not yet answered.
    Handshaking,
    /// The handshake completed; calls may be exchanged.
    Ready,
}

/// One TChannel connection: a byte stream plus handshake and id-allocation state.
#[derive(Debug)]
pub struct Connection<S: ByteStream> {
    stream: S,
    next_id: u32,
    phase: Phase,
    remote_host_port: Option<String>,
    remote_process_name: Option<String>,
    remote_version: Option<u16>,
}

impl<S: ByteStream> Connection<S> {
    /// Wraps `stream` as a fresh, unshaken connection.
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            next_id: 0,
            phase: Phase::Unshaken,
            remote_host_port: None,
            remote_process_name: None,
            remote_version: None,
        }
    }

    /// The connection's current handshake phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The peer's `host_port` header, once the handshake has completed.
    #[must_use]
    pub fn remote_host_port(&self) -> Option<&str> {
        self.remote_host_port.as_deref()
    }

    /// The peer's `process_name` header, once the handshake has completed.
    #[must_use]
    pub fn remote_process_name(&self) -> Option<&str> {
        self.remote_process_name.as_deref()
    }

    /// The protocol version the peer offered during handshake.
    #[must_use]
    pub fn remote_version(&self) -> Option<u16> {
        self.remote_version
    }

    /// Unwraps the connection, returning the underlying stream.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Allocates the next message id. Ids start at 1 and increase strictly
    /// monotonically for the lifetime of the connection.
    #[must_use]
    pub fn next_message_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Frames and writes `message`, allocating an id if `id` is `None`, and returns
    /// the id used.
    ///
    /// A [`ProtocolError`](crate::error::ProtocolError) raised while encoding is
    /// re-surfaced as an [`InvalidMessageError::Encoding`], since in this context a
    /// combinator domain violation means the connection was asked to send something
    /// it cannot represent on the wire — a semantic error, not a transport one.
    ///
    /// Fails with [`InvalidMessageError::NotReady`] if `message` is a call-level frame
    /// (`CALL_REQ`/`CALL_RES`/`ERROR`) sent before the handshake reached
    /// [`Phase::Ready`], or a `PING` sent before the handshake even started. Handshake
    /// frames are never gated here; [`Connection::initiate_handshake`] and
    /// [`Connection::await_handshake`] manage the phase transition around them
    /// themselves.
    pub fn frame_and_write(&mut self, message: &Message, id: Option<u32>) -> Result<u32> {
        self.check_phase_for_frame(message)?;
        let id = id.unwrap_or_else(|| self.next_message_id());
        match encode_frame(id, message, &mut self.stream) {
            Ok(()) => {
                trace!("wrote frame id={} type={:#04x}", id, message.type_tag_code());
                Ok(id)
            }
            Err(crate::error::Error::Protocol(e)) => Err(InvalidMessageError::Encoding(e).into()),
            Err(other) => Err(other),
        }
    }

    /// Emits a `PING_REQ` under a fresh id and returns it.
    pub fn ping(&mut self) -> Result<u32> {
        self.frame_and_write(&Message::PingReq, None)
    }

    /// Emits a `PING_RES` reusing `id`.
    pub fn pong(&mut self, id: u32) -> Result<()> {
        self.frame_and_write(&Message::PingRes, Some(id)).map(|_| ())
    }

    /// Client side of the handshake: emits `INIT_REQ` with [`PROTOCOL_VERSION`] and
    /// `headers`, and transitions to [`Phase::Handshaking`].
    pub fn initiate_handshake(&mut self, headers: HeaderList) -> Result<u32> {
        let payload = InitPayload {
            version: PROTOCOL_VERSION,
            headers,
        };
        let id = self.frame_and_write(&Message::InitReq(payload), None)?;
        self.phase = Phase::Handshaking;
        debug!("sent INIT_REQ id={}", id);
        Ok(id)
    }

    /// Server side of the handshake: reads `INIT_REQ`, records the peer's attributes,
    /// replies with `INIT_RES` reusing the request's id, and transitions to
    /// [`Phase::Ready`].
    ///
    /// Fails with [`InvalidMessageError::UnexpectedType`] if the inbound frame is not
    /// `INIT_REQ`, and with [`InvalidMessageError::MissingHeader`] if the peer's
    /// headers lack `host_port` or `process_name`.
    pub fn await_handshake(&mut self, headers: HeaderList) -> Result<()> {
        self.phase = Phase::Handshaking;
        let (id, message) = self.expect_frame()?;
        let Message::InitReq(peer) = message else {
            error!("expected INIT_REQ, got type {:#04x}", message.type_tag_code());
            return Err(InvalidMessageError::UnexpectedType {
                expected: TypeTag::InitReq,
                found: message.type_tag_code(),
                id,
            }
            .into());
        };
        self.adopt_peer(&peer)?;
        self.frame_and_write(
            &Message::InitRes(InitPayload {
                version: PROTOCOL_VERSION,
                headers,
            }),
            Some(id),
        )?;
        self.phase = Phase::Ready;
        debug!(
            "handshake complete with {} ({})",
            self.remote_process_name().unwrap_or("?"),
            self.remote_host_port().unwrap_or("?")
        );
        Ok(())
    }

    /// Client side of the handshake reply: reads `INIT_RES`, records the peer's
    /// attributes, and transitions to [`Phase::Ready`].
    pub fn await_handshake_reply(&mut self) -> Result<()> {
        let (id, message) = self.expect_frame()?;
        let Message::InitRes(peer) = message else {
            error!("expected INIT_RES, got type {:#04x}", message.type_tag_code());
            return Err(InvalidMessageError::UnexpectedType {
                expected: TypeTag::InitRes,
                found: message.type_tag_code(),
                id,
            }
            .into());
        };
        self.adopt_peer(&peer)?;
        self.phase = Phase::Ready;
        debug!("handshake reply accepted, peer version={}", peer.version);
        Ok(())
    }

    /// Pumps frames off the inbound stream, invoking `handler(id, message, self)` for
    /// each, until a clean EOF. Errors from `handler` or from decoding stop the loop
    /// and propagate.
    ///
    /// Per I5, an inbound call-level frame that arrives before the handshake reached
    /// [`Phase::Ready`] fails the loop with [`InvalidMessageError::NotReady`] rather
    /// than reaching `handler`.
    pub fn handle_calls<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(u32, Message, &mut Connection<S>) -> Result<()>,
    {
        loop {
            let Some((id, message)) = self.next_frame()? else {
                trace!("inbound stream closed, ending dispatch loop");
                break;
            };
            self.check_phase_for_frame(&message)?;
            handler(id, message, self)?;
        }
        Ok(())
    }

    /// I5: gates outbound frames by phase. Handshake frames are always allowed (the
    /// handshake methods are what drive the phase forward); `PING`/`PING_RES` are
    /// allowed from [`Phase::Handshaking`] onward; everything else needs
    /// [`Phase::Ready`].
    fn check_phase_for_frame(&self, message: &Message) -> Result<()> {
        match message {
            Message::InitReq(_) | Message::InitRes(_) => Ok(()),
            Message::PingReq | Message::PingRes if self.phase != Phase::Unshaken => Ok(()),
            _ if self.phase == Phase::Ready => Ok(()),
            _ => {
                warn!(
                    "rejecting frame type {:#04x} while phase is {:?}",
                    message.type_tag_code(),
                    self.phase
                );
                Err(InvalidMessageError::NotReady.into())
            }
        }
    }

    fn adopt_peer(&mut self, payload: &InitPayload) -> Result<()> {
        let host_port = payload
            .header("host_port")
            .ok_or_else(|| {
                error!("peer handshake is missing the host_port header");
                InvalidMessageError::MissingHeader("host_port")
            })?
            .to_string();
        let process_name = payload
            .header("process_name")
            .ok_or_else(|| {
                error!("peer handshake is missing the process_name header");
                InvalidMessageError::MissingHeader("process_name")
            })?
            .to_string();
        self.remote_host_port = Some(host_port);
        self.remote_process_name = Some(process_name);
        self.remote_version = Some(payload.version);
        Ok(())
    }

    /// Narrow-scoped inbound read: borrows `self.stream` only for the duration of the
    /// decode, so callers (e.g. [`Connection::handle_calls`]) may pass `self` on to a
    /// handler immediately afterwards without a borrow conflict.
    fn next_frame(&mut self) -> Result<Option<(u32, Message)>> {
        decode_frame(&mut self.stream)
    }

    fn expect_frame(&mut self) -> Result<(u32, Message)> {
        self.next_frame()?.ok_or_else(|| InvalidMessageError::ConnectionClosed.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::MemoryStream;
    use pretty_assertions::assert_eq;

    fn handshake_headers() -> HeaderList {
        vec![
            ("host_port".to_string(), "h:1".to_string()),
            ("process_name".to_string(), "p".to_string()),
        ]
    }

    // P3/I3: ids are strictly increasing, starting at 1.
    #[test]
    fn p3_message_ids_increase_monotonically_from_one() {
        let mut conn = Connection::new(MemoryStream::new());
        assert_eq!(conn.next_message_id(), 1);
        assert_eq!(conn.next_message_id(), 2);
        assert_eq!(conn.next_message_id(), 3);
    }

    // S8: server handshake round trip records the peer's attributes.
    #[test]
    fn s8_server_handshake_round_trip() {
        let mut client = Connection::new(MemoryStream::new());
        let req_id = client.initiate_handshake(handshake_headers()).unwrap();
        assert_eq!(client.phase(), Phase::Handshaking);
        let wire = client.into_inner();

        let mut server = Connection::new(wire);
        server.await_handshake(handshake_headers()).unwrap();
        assert_eq!(server.phase(), Phase::Ready);
        assert_eq!(server.remote_host_port(), Some("h:1"));
        assert_eq!(server.remote_process_name(), Some("p"));
        assert_eq!(server.remote_version(), Some(2));
        let _ = req_id;
    }

    // S9: a handshake missing `host_port` fails with InvalidMessageException.
    #[test]
    fn s9_handshake_missing_host_port_is_invalid_message() {
        let mut client = Connection::new(MemoryStream::new());
        let _ = client
            .initiate_handshake(vec![("process_name".to_string(), "p".to_string())])
            .unwrap();
        let wire = client.into_inner();

        let mut server = Connection::new(wire);
        let err = server.await_handshake(handshake_headers()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMessage(InvalidMessageError::MissingHeader("host_port"))
        ));
    }

    #[test]
    fn client_await_handshake_reply_adopts_peer_attributes() {
        let mut server = Connection::new(MemoryStream::new());
        server
            .frame_and_write(
                &Message::InitRes(InitPayload {
                    version: 2,
                    headers: handshake_headers(),
                }),
                Some(1),
            )
            .unwrap();
        let wire = server.into_inner();

        let mut client = Connection::new(wire);
        client.await_handshake_reply().unwrap();
        assert_eq!(client.phase(), Phase::Ready);
        assert_eq!(client.remote_host_port(), Some("h:1"));
        assert_eq!(client.remote_process_name(), Some("p"));
    }

    #[test]
    fn handshake_wrong_message_type_is_rejected() {
        let mut wire = MemoryStream::new();
        encode_frame(1, &Message::PingReq, &mut wire).unwrap();
        let mut server = Connection::new(wire);
        let err = server.await_handshake(handshake_headers()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMessage(InvalidMessageError::UnexpectedType {
                expected: TypeTag::InitReq,
                found: _,
                id: 1,
            })
        ));
    }

    #[test]
    fn handshake_on_closed_stream_is_invalid_message() {
        let mut server = Connection::new(MemoryStream::new());
        let err = server.await_handshake(handshake_headers()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMessage(InvalidMessageError::ConnectionClosed)
        ));
    }

    // I4/I5-flavoured: pong replies reuse the caller's id rather than allocating one.
    #[test]
    fn pong_reuses_the_requests_id_rather_than_allocating() {
        let mut conn = Connection::new(MemoryStream::new());
        conn.phase = Phase::Handshaking;
        let _ = conn.next_message_id(); // advance the counter so reuse is observable
        conn.pong(99).unwrap();
        assert_eq!(conn.next_message_id(), 2);
    }

    // I5: a PING sent before the handshake even started is rejected.
    #[test]
    fn ping_before_handshake_is_rejected() {
        let mut conn = Connection::new(MemoryStream::new());
        let err = conn.ping().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMessage(InvalidMessageError::NotReady)
        ));
    }

    // I5: a call-level frame sent before the connection is READY is rejected.
    #[test]
    fn call_frame_before_ready_is_rejected() {
        let mut conn = Connection::new(MemoryStream::new());
        conn.phase = Phase::Handshaking;
        let error_message = Message::Error(crate::message::ErrorPayload {
            code: 1,
            tracing: crate::message::Tracing::default(),
            message: "boom".to_string(),
        });
        let err = conn.frame_and_write(&error_message, None).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMessage(InvalidMessageError::NotReady)
        ));
    }

    // S10: handle_calls over a connection that never sends anything ends cleanly.
    #[test]
    fn s10_handle_calls_over_closed_stream_ends_cleanly() {
        let mut conn = Connection::new(MemoryStream::new());
        let mut seen = 0;
        conn.handle_calls(|_, _, _| {
            seen += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, 0);
    }

    #[test]
    fn handle_calls_dispatches_each_frame_and_can_reply_via_the_passed_connection() {
        let mut wire = MemoryStream::new();
        encode_frame(5, &Message::PingReq, &mut wire).unwrap();
        encode_frame(6, &Message::PingReq, &mut wire).unwrap();

        let mut conn = Connection::new(wire);
        conn.phase = Phase::Ready;
        let mut ids_seen = Vec::new();
        conn.handle_calls(|id, message, connection| {
            assert_eq!(message, Message::PingReq);
            ids_seen.push(id);
            connection.pong(id)
        })
        .unwrap();
        assert_eq!(ids_seen, vec![5, 6]);
    }
}
