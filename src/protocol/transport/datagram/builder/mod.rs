//! CAN frame generator for datagrams. Automatically builds the required
//! frame sequence (SINGLE, or FIRST + MIDDLE* + LAST) from a payload.
use crate::core::Alias;
use crate::error::CanIdBuildError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::datagram::{DatagramFrame, FrameRole, MAX_DATAGRAM_PAYLOAD};

#[derive(Debug, Clone, Copy)]
/// Shared parameters for all frames composing a datagram.
pub struct DatagramFrameBuilder<'a> {
    source: Alias,
    destination: Alias,
    payload: &'a [u8],
}

/// Lazy iterator returning frames one by one as they are encoded.
pub struct FrameIterator<'a> {
    builder: DatagramFrameBuilder<'a>,
    bytes_sent: usize,
    finished: bool,
}

impl<'a> Iterator for FrameIterator<'a> {
    type Item = Result<CanFrame, CanIdBuildError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let payload = self.builder.payload;
        let total_len = payload.len();

        if total_len > MAX_DATAGRAM_PAYLOAD {
            self.finished = true;
            return Some(Err(CanIdBuildError::PayloadTooLong { len: total_len }));
        }

        // Payload ≤ 8 bytes (including empty): a single frame.
        let role = if total_len <= 8 {
            FrameRole::Single
        } else if self.bytes_sent == 0 {
            FrameRole::First
        } else if total_len - self.bytes_sent > 8 {
            FrameRole::Middle
        } else {
            FrameRole::Last
        };

        let chunk_len = (total_len - self.bytes_sent).min(8);
        let chunk = &payload[self.bytes_sent..self.bytes_sent + chunk_len];
        self.bytes_sent += chunk_len;
        if matches!(role, FrameRole::Single | FrameRole::Last) {
            self.finished = true;
        }

        let frame = DatagramFrame::new(role, self.builder.source, self.builder.destination, chunk)
            .and_then(|frame| frame.encode());
        if frame.is_err() {
            self.finished = true;
        }
        Some(frame)
    }
}

impl<'a> DatagramFrameBuilder<'a> {
    /// Create a datagram encoder from `source` to `destination`.
    pub fn new(source: Alias, destination: Alias, payload: &'a [u8]) -> Self {
        Self {
            source,
            destination,
            payload,
        }
    }

    /// Start the iteration; each call to `next` yields the next frame.
    pub fn build(self) -> FrameIterator<'a> {
        FrameIterator {
            builder: self,
            bytes_sent: 0,
            finished: false,
        }
    }
}
