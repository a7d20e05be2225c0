//! OpenLCB CAN transport layer: CAN frame representations, 29-bit identifier
//! management, datagram framing and reassembly, and bus abstraction traits.
//!
//! ## Datagram Timing Constants
//!
//! These constants define the default timeouts of the datagram send flow.
//! Both can be overridden at runtime through
//! [`DatagramConfig`](crate::protocol::datagram::config::DatagramConfig).

pub mod can_frame;
pub mod can_id;
pub mod datagram;
pub mod traits;

/// Default time a send flow waits for Datagram Received OK / Datagram
/// Rejected after its last frame went out (ms).
///
/// # Timeout rationale
///
/// A receiving node answers as soon as the datagram is reassembled and its
/// handler ran. On a 125 kbps LCC bus the answer frame itself takes under
/// 1 ms; the budget covers handler latency and bus contention. When it
/// expires the flow reports `TIMEOUT | PERMANENT_ERROR`.
pub const DATAGRAM_RESPONSE_TIMEOUT_MS: u32 = 500;

/// Default time spent looking up the alias of a destination known only by
/// node id (ms).
///
/// The first half waits for an Alias Map Definition answering the Alias
/// Mapping Enquiry; the second half waits for a Verified Node ID answering
/// Verify Node ID Global. When it expires the flow reports
/// `DST_NOT_FOUND | PERMANENT_ERROR` without sending any datagram frame.
pub const ALIAS_RESOLUTION_TIMEOUT_MS: u32 = 1000;
