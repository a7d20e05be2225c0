//! Send-flow state machine tests: no bus, no timer.
use super::flow::{classify_response, FlowAction, FlowEvent, FlowState, SendFlow};
use crate::protocol::datagram::codes::DatagramResult;
use crate::protocol::messages::{mti, AddressedMessage};

const LOCAL: u16 = 0x22A;
const REMOTE: u16 = 0x77C;
const REMOTE_ID: u64 = 0x0501_01FF_FFDD;

fn response(mti: u16, data: &[u8]) -> FlowEvent {
    FlowEvent::Response(AddressedMessage::new(mti, REMOTE, LOCAL, data).unwrap())
}

/// Flow with a known destination, last frame already sent.
fn awaiting() -> SendFlow {
    let mut flow = SendFlow::new(LOCAL);
    assert_eq!(
        flow.handle(FlowEvent::Start {
            node_id: 0,
            cached_alias: Some(REMOTE),
        }),
        FlowAction::Transmit {
            destination: REMOTE
        }
    );
    assert_eq!(flow.handle(FlowEvent::Transmitted), FlowAction::StartResponseTimer);
    assert_eq!(flow.state(), FlowState::AwaitingResponse);
    flow
}

fn result_of(event: FlowEvent) -> FlowAction {
    awaiting().handle(event)
}

#[test]
/// Datagram OK without flags byte: plain success.
fn ok_without_flags() {
    assert_eq!(
        result_of(response(mti::DATAGRAM_OK, &[])),
        FlowAction::Complete(DatagramResult::OPERATION_SUCCESS)
    );
}

#[test]
/// Datagram OK flags land in the top byte.
fn ok_with_flags() {
    assert_eq!(
        result_of(response(mti::DATAGRAM_OK, &[0xA5])),
        FlowAction::Complete(DatagramResult(0xA501_0000))
    );
    let FlowAction::Complete(result) = result_of(response(mti::DATAGRAM_OK, &[0x80])) else {
        panic!("flow must complete");
    };
    assert!(result.reply_pending());
}

#[test]
/// Datagram Rejected: code verbatim, or permanent error when missing.
fn rejected() {
    assert_eq!(
        result_of(response(mti::DATAGRAM_REJECTED, &[0x55, 0xAA])),
        FlowAction::Complete(DatagramResult(0x55AA))
    );
    assert_eq!(
        result_of(response(mti::DATAGRAM_REJECTED, &[])),
        FlowAction::Complete(DatagramResult::PERMANENT_ERROR)
    );
    assert_eq!(
        result_of(response(mti::DATAGRAM_REJECTED, &[0x00, 0x40])),
        FlowAction::Complete(DatagramResult(0x1040))
    );
}

#[test]
/// OIR and TDE classification table.
fn optional_interaction_rejected_and_terminate() {
    for response_mti in [mti::OPTIONAL_INTERACTION_REJECTED, mti::TERMINATE_DUE_TO_ERROR] {
        // Embedded MTI is the datagram: code used.
        assert_eq!(
            result_of(response(response_mti, &[0x55, 0xAA, 0x1C, 0x48])),
            FlowAction::Complete(DatagramResult(0x55AA))
        );
        // Another MTI: not about us, keep waiting.
        assert_eq!(
            result_of(response(response_mti, &[0x55, 0xAA, 0x1C, 0x49])),
            FlowAction::Wait
        );
        // Code without MTI.
        assert_eq!(
            result_of(response(response_mti, &[0x00, 0xAA])),
            FlowAction::Complete(DatagramResult(0x10AA))
        );
        assert_eq!(
            result_of(response(response_mti, &[0x20, 0x00])),
            FlowAction::Complete(DatagramResult::RESEND_OK)
        );
        // Truncated code.
        assert_eq!(
            result_of(response(response_mti, &[0x55])),
            FlowAction::Complete(DatagramResult::PERMANENT_ERROR)
        );
        // Three bytes: code plus half an MTI, still ours.
        assert_eq!(
            result_of(response(response_mti, &[0x20, 0x40, 0x1C])),
            FlowAction::Complete(DatagramResult(0x2040))
        );
    }
}

#[test]
/// Responses from another node or to another alias are ignored.
fn foreign_responses_ignored() {
    let mut flow = awaiting();
    let stranger = AddressedMessage::datagram_ok(0x123, LOCAL, 0);
    assert_eq!(flow.handle(FlowEvent::Response(stranger)), FlowAction::Wait);
    let other_local = AddressedMessage::datagram_ok(REMOTE, 0x22B, 0);
    assert_eq!(flow.handle(FlowEvent::Response(other_local)), FlowAction::Wait);
    let unrelated = AddressedMessage::new(0x0828, REMOTE, LOCAL, &[]).unwrap();
    assert_eq!(flow.handle(FlowEvent::Response(unrelated)), FlowAction::Wait);
    assert_eq!(flow.state(), FlowState::AwaitingResponse);
}

#[test]
/// Timer expiry reports TIMEOUT | PERMANENT_ERROR.
fn response_timeout() {
    assert_eq!(
        result_of(FlowEvent::ResponseTimeout),
        FlowAction::Complete(DatagramResult(0x8_1000))
    );
}

#[test]
/// Exactly one terminal result: later events are ignored.
fn single_terminal_result() {
    let mut flow = awaiting();
    assert!(matches!(
        flow.handle(response(mti::DATAGRAM_OK, &[])),
        FlowAction::Complete(_)
    ));
    assert_eq!(flow.state(), FlowState::Done);
    assert_eq!(flow.handle(FlowEvent::ResponseTimeout), FlowAction::Wait);
    assert_eq!(flow.handle(response(mti::DATAGRAM_REJECTED, &[0x10, 0x00])), FlowAction::Wait);
}

#[test]
/// A rejection arriving while frames are still queued ends the flow.
fn rejection_during_transmission() {
    let mut flow = SendFlow::new(LOCAL);
    flow.handle(FlowEvent::Start {
        node_id: 0,
        cached_alias: Some(REMOTE),
    });
    assert_eq!(
        flow.handle(response(mti::DATAGRAM_REJECTED, &[0x10, 0x00])),
        FlowAction::Complete(DatagramResult::PERMANENT_ERROR)
    );
}

#[test]
/// The response timer only runs once the last frame is out.
fn no_timeout_while_transmitting() {
    let mut flow = SendFlow::new(LOCAL);
    flow.handle(FlowEvent::Start {
        node_id: 0,
        cached_alias: Some(REMOTE),
    });
    assert_eq!(flow.handle(FlowEvent::ResponseTimeout), FlowAction::Wait);
    assert_eq!(flow.state(), FlowState::Transmitting);
}

#[test]
/// Unknown alias: resolve first, then transmit to the resolved alias.
fn alias_resolution() {
    let mut flow = SendFlow::new(LOCAL);
    assert_eq!(
        flow.handle(FlowEvent::Start {
            node_id: REMOTE_ID,
            cached_alias: None,
        }),
        FlowAction::ResolveAlias { node_id: REMOTE_ID }
    );
    assert_eq!(flow.state(), FlowState::ResolvingAlias);
    assert_eq!(flow.handle(FlowEvent::Transmitted), FlowAction::Wait);
    assert_eq!(
        flow.handle(FlowEvent::AliasResolved(REMOTE)),
        FlowAction::Transmit {
            destination: REMOTE
        }
    );
    assert_eq!(flow.destination(), REMOTE);
}

#[test]
/// Resolution expiry reports DST_NOT_FOUND | PERMANENT_ERROR without transmitting.
fn alias_resolution_timeout() {
    let mut flow = SendFlow::new(LOCAL);
    flow.handle(FlowEvent::Start {
        node_id: REMOTE_ID,
        cached_alias: None,
    });
    assert_eq!(
        flow.handle(FlowEvent::ResolutionTimeout),
        FlowAction::Complete(DatagramResult(0x4_1000))
    );
    assert_eq!(flow.destination(), 0);
}

#[test]
fn classify_ignores_other_messages() {
    let message = AddressedMessage::new(0x0828, REMOTE, LOCAL, &[1, 2]).unwrap();
    assert_eq!(classify_response(&message), None);
}
