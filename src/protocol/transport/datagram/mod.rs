//! OpenLCB datagram framing on CAN: a datagram of up to
//! [`MAX_DATAGRAM_PAYLOAD`] bytes travels as one SINGLE frame or as
//! FIRST + MIDDLE* + LAST frames. The frame role lives in the CAN frame type
//! bits, the aliases in the identifier, and the payload is the CAN data
//! verbatim (no length or sequence field).
pub use crate::core::MAX_DATAGRAM_PAYLOAD;
use crate::core::Alias;
use crate::error::{CanIdBuildError, FrameDecodeError};
use crate::protocol::transport::{
    can_frame::CanFrame,
    can_id::{CanFrameType, CanId},
};

pub mod assembler;
pub mod builder;

/// Position of a frame inside a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameRole {
    Single,
    First,
    Middle,
    Last,
}

impl FrameRole {
    /// CAN frame type carrying this role.
    pub const fn frame_type(self) -> CanFrameType {
        match self {
            FrameRole::Single => CanFrameType::DatagramSingle,
            FrameRole::First => CanFrameType::DatagramFirst,
            FrameRole::Middle => CanFrameType::DatagramMiddle,
            FrameRole::Last => CanFrameType::DatagramLast,
        }
    }

    pub const fn from_frame_type(frame_type: CanFrameType) -> Option<Self> {
        match frame_type {
            CanFrameType::DatagramSingle => Some(FrameRole::Single),
            CanFrameType::DatagramFirst => Some(FrameRole::First),
            CanFrameType::DatagramMiddle => Some(FrameRole::Middle),
            CanFrameType::DatagramLast => Some(FrameRole::Last),
            CanFrameType::Message | CanFrameType::Stream => None,
        }
    }
}

/// Decoded datagram frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DatagramFrame {
    pub role: FrameRole,
    pub source: Alias,
    pub destination: Alias,
    pub data: [u8; 8],
    pub len: usize,
}

impl DatagramFrame {
    /// Build a frame from up to eight payload bytes.
    pub fn new(
        role: FrameRole,
        source: Alias,
        destination: Alias,
        payload: &[u8],
    ) -> Result<Self, CanIdBuildError> {
        if payload.len() > 8 {
            return Err(CanIdBuildError::PayloadTooLong { len: payload.len() });
        }
        let mut data = [0u8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            role,
            source,
            destination,
            data,
            len: payload.len(),
        })
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(8)]
    }

    /// Encode into a raw CAN frame.
    pub fn encode(&self) -> Result<CanFrame, CanIdBuildError> {
        let id = CanId::builder(self.source)
            .datagram(self.role.frame_type(), self.destination)
            .build()?;
        CanFrame::new(id, self.payload()).ok_or(CanIdBuildError::PayloadTooLong { len: self.len })
    }

    /// Decode a raw CAN frame. Control frames, non-datagram frame types and
    /// frames with a zero source alias are refused; callers drop them
    /// without answering.
    pub fn decode(frame: &CanFrame) -> Result<Self, FrameDecodeError> {
        if !frame.id.is_openlcb_message() {
            return Err(FrameDecodeError::NotOpenLcbMessage);
        }
        let role = frame
            .id
            .frame_type()
            .and_then(FrameRole::from_frame_type)
            .ok_or(FrameDecodeError::UnexpectedFrameType {
                frame_type: frame.id.frame_type_bits(),
            })?;
        if frame.len > 8 {
            return Err(FrameDecodeError::InvalidDataLen { len: frame.len });
        }
        let source = frame.id.source_alias();
        if source == 0 {
            return Err(FrameDecodeError::InvalidSource);
        }
        Ok(Self {
            role,
            source,
            destination: frame.id.variable_field(),
            data: frame.data,
            len: frame.len,
        })
    }
}

/// Number of CAN frames needed for a datagram of `len` bytes.
pub const fn frame_count(len: usize) -> usize {
    if len <= 8 {
        1
    } else {
        (len - 8).div_ceil(8) + 1
    }
}
