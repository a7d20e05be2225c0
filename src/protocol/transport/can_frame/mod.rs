//! In-memory representation of an extended CAN frame as seen by OpenLCB.
use crate::protocol::transport::can_id::CanId;
use embedded_can::{ExtendedId, Frame, Id};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Raw OpenLCB frame as read from the CAN bus.
pub struct CanFrame {
    /// Full 29-bit CAN identifier.
    pub id: CanId,
    /// Payload buffer. Bytes past `len` are meaningless.
    pub data: [u8; 8],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
}

impl CanFrame {
    /// Build a frame from an identifier and up to eight payload bytes.
    pub fn new(id: CanId, payload: &[u8]) -> Option<Self> {
        if payload.len() > 8 {
            return None;
        }
        let mut data = [0u8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Some(Self {
            id,
            data,
            len: payload.len(),
        })
    }

    /// Valid payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(8)]
    }

    /// Convert a driver frame. Standard identifiers and remote frames are not
    /// OpenLCB traffic and yield `None`.
    pub fn from_embedded<F: Frame>(frame: &F) -> Option<Self> {
        if frame.is_remote_frame() {
            return None;
        }
        let id = match frame.id() {
            Id::Standard(_) => return None,
            Id::Extended(ext) => ext.as_raw(),
        };
        Self::new(CanId(id), frame.data())
    }

    /// Convert into a driver frame type.
    pub fn to_embedded<F: Frame>(&self) -> Option<F> {
        let id = ExtendedId::new(self.id.0)?;
        F::new(id, self.payload())
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
