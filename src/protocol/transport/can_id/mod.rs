//! Creation and extraction of the 29-bit CAN identifiers used by OpenLCB.
//!
//! ```text
//! bit  28      reserved, always 1 on transmit
//! bit  27      1 = OpenLCB message frame, 0 = CAN control frame
//! bits 26..24  CAN frame type (message frames)
//! bits 23..12  variable field: MTI (type 1) or destination alias (types 2..=5)
//! bits 11..0   source alias
//! ```
use crate::core::{is_valid_alias, Alias, ALIAS_MASK};
use crate::error::CanIdBuildError;

const RESERVED_BIT: u32 = 1 << 28;
const MESSAGE_BIT: u32 = 1 << 27;

//==================================================================================CAN_FRAME_TYPE
/// Value of bits 26..24 for OpenLCB message frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanFrameType {
    /// Global or addressed message, MTI in the variable field.
    Message,
    /// Complete datagram in a single frame.
    DatagramSingle,
    DatagramFirst,
    DatagramMiddle,
    DatagramLast,
    Stream,
}

impl CanFrameType {
    pub const fn bits(self) -> u8 {
        match self {
            CanFrameType::Message => 1,
            CanFrameType::DatagramSingle => 2,
            CanFrameType::DatagramFirst => 3,
            CanFrameType::DatagramMiddle => 4,
            CanFrameType::DatagramLast => 5,
            CanFrameType::Stream => 7,
        }
    }

    /// Types 0 and 6 are reserved and yield `None`.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(CanFrameType::Message),
            2 => Some(CanFrameType::DatagramSingle),
            3 => Some(CanFrameType::DatagramFirst),
            4 => Some(CanFrameType::DatagramMiddle),
            5 => Some(CanFrameType::DatagramLast),
            7 => Some(CanFrameType::Stream),
            _ => None,
        }
    }
}

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates an extended CAN identifier (29 bits) and exposes the
/// OpenLCB sub-fields.
pub struct CanId(pub u32);

impl CanId {
    /// Creates a `CanIdBuilder` for the given source alias.
    pub fn builder(source_alias: Alias) -> CanIdBuilder {
        CanIdBuilder::new(source_alias)
    }

    /// Twelve-bit source alias.
    pub fn source_alias(&self) -> Alias {
        (self.0 & ALIAS_MASK as u32) as Alias
    }

    /// `true` for OpenLCB message frames, `false` for CAN control frames (CID, RID, AMD...).
    pub fn is_openlcb_message(&self) -> bool {
        self.0 & MESSAGE_BIT != 0
    }

    /// Raw bits 26..24.
    pub fn frame_type_bits(&self) -> u8 {
        ((self.0 >> 24) & 0x07) as u8
    }

    /// CAN frame type of a message frame. `None` for control frames and reserved types.
    pub fn frame_type(&self) -> Option<CanFrameType> {
        if !self.is_openlcb_message() {
            return None;
        }
        CanFrameType::from_bits(self.frame_type_bits())
    }

    /// Bits 23..12.
    pub fn variable_field(&self) -> u16 {
        ((self.0 >> 12) & 0x0FFF) as u16
    }

    /// MTI of a global/addressed message frame.
    pub fn mti(&self) -> Option<u16> {
        match self.frame_type() {
            Some(CanFrameType::Message) => Some(self.variable_field()),
            _ => None,
        }
    }

    /// Destination alias carried by datagram frames.
    pub fn datagram_destination(&self) -> Option<Alias> {
        match self.frame_type() {
            Some(
                CanFrameType::DatagramSingle
                | CanFrameType::DatagramFirst
                | CanFrameType::DatagramMiddle
                | CanFrameType::DatagramLast,
            ) => Some(self.variable_field()),
            _ => None,
        }
    }

    /// 15-bit control field (bits 26..12) of a CAN control frame.
    pub fn control_field(&self) -> Option<u16> {
        if self.is_openlcb_message() {
            None
        } else {
            Some(((self.0 >> 12) & 0x7FFF) as u16)
        }
    }
}

//==================================================================================CAN_ID_BUILDER
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdKind {
    Unset,
    Message { mti: u16 },
    Datagram { frame_type: CanFrameType, destination: Alias },
    Control { field: u16 },
}

#[derive(Debug)]
/// Fluent builder that enforces the OpenLCB identifier rules.
pub struct CanIdBuilder {
    source_alias: Alias,
    kind: IdKind,
}

impl CanIdBuilder {
    /// Initializes the builder for a given source alias.
    pub fn new(source_alias: Alias) -> Self {
        Self {
            source_alias,
            kind: IdKind::Unset,
        }
    }

    /// Global or addressed message with the given MTI.
    pub fn message(mut self, mti: u16) -> Self {
        self.kind = IdKind::Message { mti };
        self
    }

    /// Datagram frame of the given type towards `destination`.
    pub fn datagram(mut self, frame_type: CanFrameType, destination: Alias) -> Self {
        self.kind = IdKind::Datagram {
            frame_type,
            destination,
        };
        self
    }

    /// CAN control frame (AME, AMD, AMR, ...).
    pub fn control(mut self, field: u16) -> Self {
        self.kind = IdKind::Control { field };
        self
    }

    /// Builds the CAN identifier.
    ///
    /// Returns a dedicated error when an alias does not fit in 12 bits (or is
    /// zero), when the MTI needs more than 12 bits, or when no kind was chosen.
    pub fn build(self) -> Result<CanId, CanIdBuildError> {
        if !is_valid_alias(self.source_alias) {
            return Err(CanIdBuildError::InvalidSource {
                alias: self.source_alias,
            });
        }
        let source = self.source_alias as u32;

        match self.kind {
            IdKind::Unset => Err(CanIdBuildError::MissingKind),
            IdKind::Message { mti } => {
                if mti > 0x0FFF {
                    return Err(CanIdBuildError::InvalidMti { mti });
                }
                Ok(CanId(
                    RESERVED_BIT
                        | MESSAGE_BIT
                        | ((CanFrameType::Message.bits() as u32) << 24)
                        | ((mti as u32) << 12)
                        | source,
                ))
            }
            IdKind::Datagram {
                frame_type,
                destination,
            } => {
                if !is_valid_alias(destination) {
                    return Err(CanIdBuildError::InvalidDestination { alias: destination });
                }
                Ok(CanId(
                    RESERVED_BIT
                        | MESSAGE_BIT
                        | ((frame_type.bits() as u32) << 24)
                        | ((destination as u32) << 12)
                        | source,
                ))
            }
            IdKind::Control { field } => {
                if field > 0x7FFF {
                    return Err(CanIdBuildError::InvalidControlField { field });
                }
                Ok(CanId(RESERVED_BIT | ((field as u32) << 12) | source))
            }
        }
    }
}
