//! OpenLCB protocol layers: CAN transport and datagram framing, alias
//! management, message definitions, and the datagram service.
pub mod datagram;
pub mod managment;
pub mod messages;
pub mod transport;
