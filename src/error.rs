//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (CAN ID construction, frame
//! decoding, datagram submission, handler registration, runner failures).
//!
//! Protocol-level outcomes of a datagram exchange (rejections, timeouts) are
//! not errors: they are reported through
//! [`DatagramResult`](crate::protocol::datagram::codes::DatagramResult).
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors that can occur while building a 29-bit OpenLCB CAN identifier.
pub enum CanIdBuildError {
    /// Source alias is zero or wider than 12 bits.
    #[error("Invalid source alias: {alias:#X}")]
    InvalidSource { alias: u16 },
    /// Destination alias is zero or wider than 12 bits.
    #[error("Invalid destination alias: {alias:#X}")]
    InvalidDestination { alias: u16 },
    /// MTI does not fit in the 12-bit variable field of a CAN message frame.
    #[error("MTI {mti:#X} cannot be carried in a CAN frame")]
    InvalidMti { mti: u16 },
    /// Control field wider than 15 bits.
    #[error("Invalid control field: {field:#X}")]
    InvalidControlField { field: u16 },
    /// No frame kind selected before building.
    #[error("Frame kind not specified")]
    MissingKind,
    /// Payload does not fit in the frame or in a datagram.
    #[error("Payload too long: {len} bytes")]
    PayloadTooLong { len: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures while interpreting a raw CAN frame as a datagram or addressed message.
pub enum FrameDecodeError {
    /// The frame is a CAN control frame, not an OpenLCB message.
    #[error("Not an OpenLCB message frame")]
    NotOpenLcbMessage,
    /// The CAN frame type bits do not describe the expected frame kind.
    #[error("Unexpected CAN frame type {frame_type}")]
    UnexpectedFrameType { frame_type: u8 },
    /// MTI is not an addressed message.
    #[error("MTI {mti:#X} is not addressed")]
    NotAddressed { mti: u16 },
    /// Source alias is zero.
    #[error("Invalid source alias")]
    InvalidSource,
    /// Payload length is incompatible with the frame kind.
    #[error("Invalid data length: {len}")]
    InvalidDataLen { len: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Argument errors returned by `write_datagram` before any frame is sent.
pub enum WriteError {
    /// Payload longer than the transport maximum.
    #[error("Datagram payload too long: {len} bytes")]
    PayloadTooLong { len: usize },
    /// Destination handle carries neither a node id nor an alias.
    #[error("Destination handle is empty")]
    UnknownDestination,
    /// Source node has no alias in the local directory.
    #[error("Source node {node_id:#X} is not a local node")]
    UnknownSource { node_id: u64 },
    /// Frame construction failed.
    #[error(transparent)]
    Build(#[from] CanIdBuildError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Handler registry failures.
pub enum RegistryError {
    /// Every registration slot is taken.
    #[error("Datagram registry is full")]
    Full,
}

#[derive(Error, Debug)]
/// Reasons for the datagram runner loop to stop.
pub enum DatagramRunError<E: core::fmt::Debug> {
    /// Unable to receive frames from the bus.
    #[error("CAN bus receive error: {0:?}")]
    Receive(E),
    /// CAN bus rejected a frame during transmission.
    #[error("CAN bus send error: {0:?}")]
    Send(E),
}
