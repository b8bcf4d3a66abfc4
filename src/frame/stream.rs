//! The lazy sequence of frames read from an inbound byte stream.
// (c) 2025 Ross Younger

use crate::error::Result;
use crate::message::Message;
use crate::transport::ByteStream;

use super::decode_frame;

/// Iterates `(id, message)` pairs off an inbound [`ByteStream`] until a clean EOF.
///
/// The sequence is finite and not restartable: once it yields `None` or an error, it
/// is done. A decode error is yielded once and then the stream stops producing
/// further items, since the underlying byte position after a malformed frame is no
/// longer well-defined.
#[derive(Debug)]
pub struct FrameStream<'s, S: ByteStream + ?Sized> {
    stream: &'s mut S,
    done: bool,
}

impl<'s, S: ByteStream + ?Sized> FrameStream<'s, S> {
    /// Wraps `stream` as a frame sequence.
    #[must_use]
    pub fn new(stream: &'s mut S) -> Self {
        Self { stream, done: false }
    }
}

impl<S: ByteStream + ?Sized> Iterator for FrameStream<'_, S> {
    type Item = Result<(u32, Message)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match decode_frame(self.stream) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
