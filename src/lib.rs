// TChannel protocol core
// (c) 2025 Ross Younger

//! Core of a [TChannel](https://github.com/uber/tchannel) wire protocol implementation:
//! a declarative binary read/write combinator algebra ([`rw`]) together with the framed
//! protocol engine ([`frame`], [`connection`]) that uses it to encode, decode and exchange
//! TChannel messages over a byte-oriented transport.
//!
//! ## 📖 How it fits together
//!
//! * [`rw`] — the combinator algebra: every on-wire shape, from a single big-endian
//!   integer up to a whole message body, is described as a composition of small
//!   readers/writers with computable widths.
//! * [`message`] — the fixed catalog of TChannel message variants, each described by a
//!   combinator from [`rw`] and keyed by its wire type tag.
//! * [`frame`] — the length-prefixed frame header/body codec, and the lazy sequence of
//!   frames read from an inbound byte stream.
//! * [`connection`] — the per-connection state machine: id allocation, the
//!   `INIT_REQ`/`INIT_RES` handshake, ping/pong, and the inbound dispatch loop.
//! * [`transport`] — the byte-stream capability the rest of the crate depends on, plus a
//!   couple of concrete adapters for convenience.
//!
//! ## What this crate is not
//!
//! This is the wire-protocol *core*. It does not select a transport (TCP vs UDS), does
//! not pick an async runtime, and does no service-method routing, retries or load
//! balancing — those are layers above this one.

#![allow(clippy::doc_markdown)]

pub mod connection;
pub mod error;
pub mod frame;
pub mod message;
pub mod rw;
pub mod transport;

pub use connection::Connection;
pub use error::{Error, Result};
pub use message::Message;
