//! Datagram service: handler registry, send flows, result codes and the
//! facade tying them to one CAN bus.
pub mod client;
pub mod codes;
pub mod config;
pub mod registry;
pub mod support;
