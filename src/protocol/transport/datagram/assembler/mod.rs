//! OpenLCB datagram assembler: rebuilds datagrams by aggregating the CAN
//! frames of a multi-frame session, keyed by (source alias, destination alias).
//!
//! The assembler is pure: it never touches the bus. Rejections are returned
//! to the caller, which owns the transmit path.
use crate::core::{Alias, DatagramPayload};
use crate::protocol::datagram::codes::{ERROR_OUT_OF_ORDER, ERROR_TOO_LONG};
use crate::protocol::transport::datagram::{DatagramFrame, FrameRole};

//==================================================================================Constants

/// Default number of reassembly sessions handled in parallel (distinct keys).
pub const DEFAULT_MAX_SESSIONS: usize = 8;

//==================================================================================Enums and Structs
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessResult {
    /// Frame successfully integrated but additional fragments are still missing.
    FragmentConsumed,
    /// All fragments were received; the complete datagram is now available.
    DatagramComplete(CompletedDatagram),
    /// Frame broke the sequence; the caller must answer with Datagram Rejected.
    Rejected(Rejection),
}

/// Reassembled datagram handed over by value.
#[derive(Debug, PartialEq, Eq)]
pub struct CompletedDatagram {
    /// Alias of the sending node.
    pub source: Alias,
    /// Local alias the datagram was addressed to.
    pub destination: Alias,
    pub payload: DatagramPayload,
}

/// Datagram Rejected response to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rejection {
    /// Local alias answering (destination of the offending frame).
    pub local: Alias,
    /// Remote alias receiving the rejection (source of the offending frame).
    pub remote: Alias,
    /// 16-bit wire error code.
    pub code: u16,
}

/// Internal structure tracking one in-flight datagram.
#[derive(Debug, Clone, Copy)]
struct DatagramSession {
    live: bool,
    source: Alias,
    destination: Alias,
    buffer: DatagramPayload,
    /// Tick of the last frame appended; smallest is evicted first.
    last_touch: u32,
}

impl DatagramSession {
    const fn new() -> Self {
        Self {
            live: false,
            source: 0,
            destination: 0,
            buffer: DatagramPayload::new(),
            last_touch: 0,
        }
    }

    fn matches(&self, source: Alias, destination: Alias) -> bool {
        self.live && self.source == source && self.destination == destination
    }

    /// Release the session for future datagrams.
    fn reset(&mut self) {
        self.live = false;
        self.buffer.clear();
    }
}

/// Main assembler: owns a fixed pool of reusable sessions.
#[derive(Debug, Clone)]
pub struct DatagramAssembler<const N: usize = DEFAULT_MAX_SESSIONS> {
    sessions: [DatagramSession; N],
    tick: u32,
}

impl<const N: usize> Default for DatagramAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DatagramAssembler<N> {
    /// Instantiate the assembler with an inactive session pool.
    pub const fn new() -> Self {
        Self {
            sessions: [DatagramSession::new(); N],
            tick: 0,
        }
    }

    /// Number of datagrams currently being collected.
    pub fn live_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| s.live).count()
    }

    fn next_tick(&mut self) -> u32 {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }

    //==================================================================================Process Functions
    /// Process one decoded datagram frame addressed to a local alias.
    ///
    /// Returns a `ProcessResult` indicating whether the frame was consumed,
    /// completed a datagram, or must be rejected.
    pub fn process_frame(&mut self, frame: &DatagramFrame) -> ProcessResult {
        let (source, destination) = (frame.source, frame.destination);
        let rejection = |code| {
            ProcessResult::Rejected(Rejection {
                local: destination,
                remote: source,
                code,
            })
        };

        match frame.role {
            FrameRole::Single => {
                // Live sessions of the same key are left untouched.
                let mut payload = DatagramPayload::new();
                if payload.extend_from_slice(frame.payload()).is_err() {
                    return rejection(ERROR_TOO_LONG);
                }
                ProcessResult::DatagramComplete(CompletedDatagram {
                    source,
                    destination,
                    payload,
                })
            }
            FrameRole::First => {
                let tick = self.next_tick();
                let Some(session) = self.claim_session(source, destination) else {
                    // Zero-capacity pool.
                    return rejection(ERROR_OUT_OF_ORDER);
                };

                #[cfg(feature = "defmt")]
                if session.live {
                    defmt::debug!(
                        "datagram from {:#X} to {:#X} restarted",
                        source,
                        destination
                    );
                }

                session.live = true;
                session.source = source;
                session.destination = destination;
                session.last_touch = tick;
                session.buffer.clear();
                if session.buffer.extend_from_slice(frame.payload()).is_err() {
                    session.reset();
                    return rejection(ERROR_TOO_LONG);
                }
                ProcessResult::FragmentConsumed
            }
            FrameRole::Middle | FrameRole::Last => {
                let tick = self.next_tick();
                let Some(session) = self
                    .sessions
                    .iter_mut()
                    .find(|s| s.matches(source, destination))
                else {
                    #[cfg(feature = "defmt")]
                    defmt::debug!(
                        "datagram frame from {:#X} out of order",
                        source
                    );
                    return rejection(ERROR_OUT_OF_ORDER);
                };

                if session.buffer.extend_from_slice(frame.payload()).is_err() {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("datagram from {:#X} too long", source);
                    session.reset();
                    return rejection(ERROR_TOO_LONG);
                }
                session.last_touch = tick;

                if frame.role == FrameRole::Middle {
                    return ProcessResult::FragmentConsumed;
                }

                let payload = session.buffer;
                session.reset();
                ProcessResult::DatagramComplete(CompletedDatagram {
                    source,
                    destination,
                    payload,
                })
            }
        }
    }

    /// Session to (re)start for a FIRST frame: the live session of the same
    /// key, else an inactive one, else the least recently touched.
    fn claim_session(
        &mut self,
        source: Alias,
        destination: Alias,
    ) -> Option<&mut DatagramSession> {
        let index = self
            .sessions
            .iter()
            .position(|s| s.matches(source, destination))
            .or_else(|| self.sessions.iter().position(|s| !s.live))
            .or_else(|| {
                self.sessions
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, s)| self.tick.wrapping_sub(s.last_touch))
                    .map(|(index, _)| index)
            })?;
        self.sessions.get_mut(index)
    }

    /// Drop every session.
    pub fn reset(&mut self) {
        self.sessions.iter_mut().for_each(DatagramSession::reset);
    }
}
