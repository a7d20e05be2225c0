//! OpenLCB messages exchanged around datagrams: MTI and control field
//! constants, and the single-frame addressed message used for Datagram OK,
//! Datagram Rejected, Optional Interaction Rejected and Terminate Due To Error.
//!
//! Addressed message payload on CAN:
//!
//! ```text
//! byte 0   (flags << 4) | (destination alias >> 8)
//! byte 1   destination alias & 0xFF
//! byte 2.. message data (up to 6 bytes)
//! ```
use crate::core::Alias;
use crate::error::{CanIdBuildError, FrameDecodeError};
use crate::protocol::transport::{can_frame::CanFrame, can_id::CanId};

//==================================================================================MTI
/// Message Type Indicators.
pub mod mti {
    /// Datagram (carried by datagram frame types on CAN, never as a message frame).
    pub const DATAGRAM: u16 = 0x1C48;
    pub const DATAGRAM_OK: u16 = 0x0A28;
    pub const DATAGRAM_REJECTED: u16 = 0x0A48;
    pub const OPTIONAL_INTERACTION_REJECTED: u16 = 0x0068;
    pub const TERMINATE_DUE_TO_ERROR: u16 = 0x00A8;
    pub const VERIFY_NODE_ID_GLOBAL: u16 = 0x0490;
    pub const VERIFIED_NODE_ID: u16 = 0x0170;
    /// Verified Node ID sent by a node implementing the simple protocol set.
    pub const VERIFIED_NODE_ID_SIMPLE: u16 = 0x0171;

    /// Bit set in every addressed MTI.
    pub const ADDRESSED_BIT: u16 = 0x0008;

    #[inline]
    pub const fn is_addressed(mti: u16) -> bool {
        mti & ADDRESSED_BIT != 0
    }
}

//==================================================================================CONTROL
/// CAN control frame fields (bits 26..12 of a control frame identifier).
pub mod control {
    /// Alias Map Definition.
    pub const AMD: u16 = 0x0701;
    /// Alias Mapping Enquiry.
    pub const AME: u16 = 0x0702;
    /// Alias Map Reset.
    pub const AMR: u16 = 0x0703;
}

//==================================================================================ADDRESSED_MESSAGE
/// Maximum data bytes after the two destination bytes.
pub const MAX_ADDRESSED_DATA: usize = 6;

/// Single-frame addressed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressedMessage {
    pub mti: u16,
    pub source: Alias,
    pub destination: Alias,
    /// Continuation flags nibble (0 for single-frame messages).
    pub flags: u8,
    pub data: [u8; MAX_ADDRESSED_DATA],
    pub len: usize,
}

impl AddressedMessage {
    /// Build a message carrying up to six data bytes.
    pub fn new(
        mti: u16,
        source: Alias,
        destination: Alias,
        data: &[u8],
    ) -> Result<Self, CanIdBuildError> {
        if data.len() > MAX_ADDRESSED_DATA {
            return Err(CanIdBuildError::PayloadTooLong { len: data.len() });
        }
        let mut buffer = [0u8; MAX_ADDRESSED_DATA];
        buffer[..data.len()].copy_from_slice(data);
        Ok(Self {
            mti,
            source,
            destination,
            flags: 0,
            data: buffer,
            len: data.len(),
        })
    }

    /// Datagram Received OK with its flags byte.
    pub fn datagram_ok(source: Alias, destination: Alias, flags: u8) -> Self {
        Self {
            mti: mti::DATAGRAM_OK,
            source,
            destination,
            flags: 0,
            data: [flags, 0, 0, 0, 0, 0],
            len: 1,
        }
    }

    /// Datagram Rejected with a big-endian error code.
    pub fn datagram_rejected(source: Alias, destination: Alias, code: u16) -> Self {
        let [hi, lo] = code.to_be_bytes();
        Self {
            mti: mti::DATAGRAM_REJECTED,
            source,
            destination,
            flags: 0,
            data: [hi, lo, 0, 0, 0, 0],
            len: 2,
        }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(MAX_ADDRESSED_DATA)]
    }

    /// First two data bytes read as a big-endian error code.
    pub fn error_code(&self) -> Option<u16> {
        match self.payload() {
            [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Bytes 2..4 of the data: MTI of the message that caused an OIR/TDE.
    pub fn rejected_mti(&self) -> Option<u16> {
        match self.payload() {
            [_, _, hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Encode into a CAN message frame.
    pub fn encode(&self) -> Result<CanFrame, CanIdBuildError> {
        if !crate::core::is_valid_alias(self.destination) {
            return Err(CanIdBuildError::InvalidDestination {
                alias: self.destination,
            });
        }
        let id = CanId::builder(self.source).message(self.mti).build()?;
        let mut data = [0u8; 8];
        data[0] = ((self.flags & 0x0F) << 4) | (self.destination >> 8) as u8;
        data[1] = (self.destination & 0xFF) as u8;
        let payload = self.payload();
        data[2..2 + payload.len()].copy_from_slice(payload);
        CanFrame::new(id, &data[..2 + payload.len()])
            .ok_or(CanIdBuildError::PayloadTooLong { len: self.len })
    }

    /// Decode a CAN message frame carrying an addressed MTI.
    pub fn decode(frame: &CanFrame) -> Result<Self, FrameDecodeError> {
        let mti = frame.id.mti().ok_or(FrameDecodeError::UnexpectedFrameType {
            frame_type: frame.id.frame_type_bits(),
        })?;
        if !mti::is_addressed(mti) {
            return Err(FrameDecodeError::NotAddressed { mti });
        }
        let payload = frame.payload();
        if payload.len() < 2 {
            return Err(FrameDecodeError::InvalidDataLen { len: payload.len() });
        }
        let source = frame.id.source_alias();
        if source == 0 {
            return Err(FrameDecodeError::InvalidSource);
        }
        let destination = (((payload[0] & 0x0F) as u16) << 8) | payload[1] as u16;
        let mut data = [0u8; MAX_ADDRESSED_DATA];
        let len = payload.len() - 2;
        data[..len].copy_from_slice(&payload[2..]);
        Ok(Self {
            mti,
            source,
            destination,
            flags: payload[0] >> 4,
            data,
            len,
        })
    }
}
