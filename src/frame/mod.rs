//! The frame codec
// (c) 2025 Ross Younger

//! A length-prefixed frame wraps every message on the wire: a fixed 16-byte header
//! (size, type tag, two reserved fields, and a message id) followed by a body whose
//! shape is picked from the [message catalog](crate::message) by the header's type
//! tag. See [`encode_frame`]/[`decode_frame`] for the codec, and [`FrameStream`] for
//! the lazy sequence read from an inbound stream.

mod stream;

pub use stream::FrameStream;

use tracing::error;

use crate::error::{ProtocolError, ReadError, Result};
use crate::message::{body_rw_for_tag, Message};
use crate::transport::{ByteStream, MemoryStream};

/// Size of the frame header, in bytes: `size:u16 + type:u8 + reserved:u8 + id:u32 +
/// reserved:u64`.
pub const HEADER_WIDTH: usize = 16;

/// Writes `message` as one complete frame (header plus body) under `id`.
///
/// The body must be serialized to a scratch buffer first: a combinator's [`width`]
/// is only ever a fixed prefix contribution for variable-length shapes, not the true
/// serialized length, so there is no way to know the frame's `size` field up front.
///
/// [`width`]: crate::rw::Rw::width
pub fn encode_frame(id: u32, message: &Message, stream: &mut dyn ByteStream) -> Result<()> {
    let rw = body_rw_for_tag(message.type_tag_code());
    let mut scratch = MemoryStream::new();
    rw.write(&message.to_body_value(), &mut scratch)?;
    let body = scratch.into_vec();

    let total = HEADER_WIDTH + body.len();
    let size = u16::try_from(total)
        .map_err(|_| ProtocolError::FrameTooLarge { body_len: body.len() })?;

    let mut header = Vec::with_capacity(HEADER_WIDTH);
    header.extend_from_slice(&size.to_be_bytes());
    header.push(message.type_tag_code());
    header.push(0); // reserved
    header.extend_from_slice(&id.to_be_bytes());
    header.extend_from_slice(&0u64.to_be_bytes()); // reserved

    stream.write(&header)?;
    stream.write(&body)?;
    Ok(())
}

/// Reads one frame from `stream`.
///
/// Returns `Ok(None)` on a clean EOF (zero bytes available for the header — the
/// stream simply has nothing left). Any other short read, or trailing bytes left in
/// the body after the variant's combinator has finished, is an error.
pub fn decode_frame(stream: &mut dyn ByteStream) -> Result<Option<(u32, Message)>> {
    let header = stream.read(HEADER_WIDTH)?;
    if header.is_empty() {
        return Ok(None);
    }
    if header.len() != HEADER_WIDTH {
        return Err(ReadError::ShortRead {
            needed: HEADER_WIDTH,
            got: header.len(),
        }
        .into());
    }

    let size = u16::from_be_bytes([header[0], header[1]]);
    let type_code = header[2];
    // header[3] and header[8..16] are the reserved fields; ignored on read.
    let id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);

    if (size as usize) < HEADER_WIDTH {
        return Err(ProtocolError::FrameTooSmall { size }.into());
    }
    let body_len = size as usize - HEADER_WIDTH;

    let body = stream.read(body_len)?;
    if body.len() != body_len {
        return Err(ReadError::ShortRead {
            needed: body_len,
            got: body.len(),
        }
        .into());
    }

    let mut body_stream = MemoryStream::from_bytes(body);
    let value = body_rw_for_tag(type_code).read(&mut body_stream)?;
    if body_stream.remaining() != 0 {
        error!(
            "frame id={} type={:#04x} left {} trailing bytes after decoding",
            id,
            type_code,
            body_stream.remaining()
        );
        return Err(ReadError::TrailingGarbage(body_stream.remaining()).into());
    }

    Ok(Some((id, Message::from_parts(type_code, value)?)))
}
