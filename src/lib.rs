//! `lcb-datagram` library: OpenLCB datagram transport over CAN in a
//! `no_std` environment. The crate exposes the CAN framing layer
//! (identifiers, datagram segmentation and reassembly), alias management,
//! and the datagram service (handler registry, send flows, bus runner).
#![no_std]
//==================================================================================
/// Core data types shared by every layer: node ids, aliases, payload buffer.
pub mod core;
/// Domain and low-level errors (CAN identifier construction, frame decoding,
/// datagram submission, runner failures).
pub mod error;
/// OpenLCB protocol implementation: CAN transport, datagram framing,
/// alias management, and the datagram service.
pub mod protocol;
//==================================================================================
