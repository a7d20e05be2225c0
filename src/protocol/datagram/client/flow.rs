//! Pure send-flow state machine: `(state, event) → action`. No bus, no
//! timer; the async [`DatagramClient`](super::DatagramClient) feeds it.
use crate::core::{Alias, NodeId};
use crate::protocol::datagram::codes::DatagramResult;
use crate::protocol::messages::{mti, AddressedMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowState {
    Idle,
    ResolvingAlias,
    Transmitting,
    AwaitingResponse,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowEvent {
    /// Begin; `cached_alias` is the destination alias when already known.
    Start {
        node_id: NodeId,
        cached_alias: Option<Alias>,
    },
    AliasResolved(Alias),
    ResolutionTimeout,
    /// Last frame handed to the bus.
    Transmitted,
    Response(AddressedMessage),
    ResponseTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowAction {
    /// Look the alias of `node_id` up on the bus.
    ResolveAlias { node_id: NodeId },
    /// Send every frame of the datagram to `destination`.
    Transmit { destination: Alias },
    StartResponseTimer,
    /// Nothing to do; keep waiting for the next event.
    Wait,
    /// Terminal result, produced exactly once.
    Complete(DatagramResult),
}

/// One outgoing datagram from `source`.
#[derive(Debug, Clone, Copy)]
pub struct SendFlow {
    state: FlowState,
    source: Alias,
    destination: Alias,
}

impl SendFlow {
    pub const fn new(source: Alias) -> Self {
        Self {
            state: FlowState::Idle,
            source,
            destination: 0,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Destination alias, 0 until resolved.
    pub fn destination(&self) -> Alias {
        self.destination
    }

    pub fn handle(&mut self, event: FlowEvent) -> FlowAction {
        match (self.state, event) {
            (
                FlowState::Idle,
                FlowEvent::Start {
                    cached_alias: Some(alias),
                    ..
                },
            ) => self.transmit(alias),
            (
                FlowState::Idle,
                FlowEvent::Start {
                    node_id,
                    cached_alias: None,
                },
            ) => {
                self.state = FlowState::ResolvingAlias;
                FlowAction::ResolveAlias { node_id }
            }
            (FlowState::ResolvingAlias, FlowEvent::AliasResolved(alias)) => self.transmit(alias),
            (FlowState::ResolvingAlias, FlowEvent::ResolutionTimeout) => {
                self.complete(DatagramResult::destination_not_found())
            }
            (FlowState::Transmitting, FlowEvent::Transmitted) => {
                self.state = FlowState::AwaitingResponse;
                FlowAction::StartResponseTimer
            }
            // A rejection may arrive before the last frame left (e.g. too long).
            (
                FlowState::Transmitting | FlowState::AwaitingResponse,
                FlowEvent::Response(message),
            ) => {
                if message.source != self.destination || message.destination != self.source {
                    return FlowAction::Wait;
                }
                match classify_response(&message) {
                    Some(result) => self.complete(result),
                    None => FlowAction::Wait,
                }
            }
            (FlowState::AwaitingResponse, FlowEvent::ResponseTimeout) => {
                self.complete(DatagramResult::timeout())
            }
            _ => FlowAction::Wait,
        }
    }

    fn transmit(&mut self, destination: Alias) -> FlowAction {
        self.state = FlowState::Transmitting;
        self.destination = destination;
        FlowAction::Transmit { destination }
    }

    fn complete(&mut self, result: DatagramResult) -> FlowAction {
        self.state = FlowState::Done;
        FlowAction::Complete(result)
    }
}

/// Result word for a response message, or `None` when the message does not
/// end the flow.
pub fn classify_response(message: &AddressedMessage) -> Option<DatagramResult> {
    match message.mti {
        mti::DATAGRAM_OK => Some(DatagramResult::ok(
            message.payload().first().copied().unwrap_or(0),
        )),
        mti::DATAGRAM_REJECTED => Some(
            message
                .error_code()
                .map(DatagramResult::rejected)
                .unwrap_or(DatagramResult::PERMANENT_ERROR),
        ),
        mti::OPTIONAL_INTERACTION_REJECTED | mti::TERMINATE_DUE_TO_ERROR => {
            let Some(code) = message.error_code() else {
                return Some(DatagramResult::PERMANENT_ERROR);
            };
            match message.rejected_mti() {
                Some(rejected) if rejected != mti::DATAGRAM => None,
                _ => Some(DatagramResult::rejected(code)),
            }
        }
        _ => None,
    }
}
