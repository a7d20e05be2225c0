//! Sending side of the datagram service.
//!
//! [`DatagramClient::write_datagram`] claims a send-flow slot, resolves the
//! destination alias when needed, queues the frames towards the runner and
//! waits for the response. The decisions are taken by the pure
//! [`SendFlow`](flow::SendFlow) state machine; this module only performs
//! the I/O it asks for.
use futures_util::{future::select, future::Either, pin_mut};

use crate::core::{Alias, NodeHandle, NodeId, MAX_DATAGRAM_PAYLOAD};
use crate::error::WriteError;
use crate::protocol::datagram::codes::DatagramResult;
use crate::protocol::datagram::support::{
    ClientSlot, DatagramSupport, Notify, Outbound, RouteKind, SlotEvent, SlotGuard,
};
use crate::protocol::managment::alias_resolution::{alias_mapping_enquiry, verify_node_id_global};
use crate::protocol::transport::{
    can_frame::CanFrame,
    datagram::{builder::DatagramFrameBuilder, frame_count},
    traits::lcb_timer::LcbTimer,
};

pub mod flow;

use flow::{FlowAction, FlowEvent, SendFlow};

fn flow_event(event: SlotEvent) -> FlowEvent {
    match event {
        SlotEvent::AliasResolved(alias) => FlowEvent::AliasResolved(alias),
        SlotEvent::Response(message) => FlowEvent::Response(message),
    }
}

/// Per-task handle sending datagrams through a [`DatagramSupport`].
pub struct DatagramClient<'a, T: LcbTimer, const CLIENTS: usize, const HANDLERS: usize> {
    support: &'a DatagramSupport<'a, CLIENTS, HANDLERS>,
    timer: T,
}

impl<'a, T: LcbTimer, const CLIENTS: usize, const HANDLERS: usize>
    DatagramClient<'a, T, CLIENTS, HANDLERS>
{
    pub(crate) fn new(support: &'a DatagramSupport<'a, CLIENTS, HANDLERS>, timer: T) -> Self {
        Self { support, timer }
    }

    /// Send `payload` from the local node `source` to `destination` and
    /// wait for the outcome.
    ///
    /// Protocol outcomes (OK, rejection, timeout, unknown destination) are
    /// reported in the returned [`DatagramResult`]. `Err` means the
    /// arguments were refused and nothing was sent.
    pub async fn write_datagram(
        &mut self,
        source: NodeId,
        destination: NodeHandle,
        payload: &[u8],
    ) -> Result<DatagramResult, WriteError> {
        if payload.len() > MAX_DATAGRAM_PAYLOAD {
            return Err(WriteError::PayloadTooLong { len: payload.len() });
        }
        if destination.is_unknown() {
            return Err(WriteError::UnknownDestination);
        }
        let source_alias = self
            .support
            .local_directory()
            .lookup(source)
            .ok_or(WriteError::UnknownSource { node_id: source })?;

        let support = self.support;
        let guard = support.claim_slot().await;
        let mut flow = SendFlow::new(source_alias);
        let mut action = flow.handle(FlowEvent::Start {
            node_id: destination.id,
            cached_alias: support.cached_alias(destination),
        });

        loop {
            #[cfg(feature = "defmt")]
            defmt::trace!("datagram flow {}: {}", flow.state(), action);

            action = match action {
                FlowAction::ResolveAlias { node_id } => {
                    self.resolve(&guard, &mut flow, source_alias, node_id).await?
                }
                FlowAction::Transmit { destination } => {
                    self.transmit(&guard, source_alias, destination, payload)
                        .await?;
                    wait_for_transmission(guard.slot(), &mut flow).await
                }
                FlowAction::StartResponseTimer => {
                    let timeout = support.config().response_timeout_ms();
                    match wait_for_action_until(&mut self.timer, guard.slot(), &mut flow, timeout)
                        .await
                    {
                        Some(action) => action,
                        None => flow.handle(FlowEvent::ResponseTimeout),
                    }
                }
                FlowAction::Wait => wait_for_action(guard.slot(), &mut flow).await,
                FlowAction::Complete(result) => return Ok(result),
            };
        }
    }

    /// Alias Mapping Enquiry for the first half of the budget, then Verify
    /// Node ID Global for the rest.
    async fn resolve(
        &mut self,
        guard: &SlotGuard<'_, CLIENTS>,
        flow: &mut SendFlow,
        source_alias: Alias,
        node_id: NodeId,
    ) -> Result<FlowAction, WriteError> {
        let slot = guard.slot();
        slot.set_route(RouteKind::Resolving { node_id });

        let budget = self.support.config().alias_resolution_timeout_ms();
        let first_half = budget / 2;

        self.queue(alias_mapping_enquiry(source_alias, node_id)?, None)
            .await;
        if let Some(action) = wait_for_action_until(&mut self.timer, slot, flow, first_half).await
        {
            return Ok(action);
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("no AMD for {:#X}, trying Verify Node ID", node_id);
        self.queue(verify_node_id_global(source_alias, node_id)?, None)
            .await;
        Ok(
            match wait_for_action_until(&mut self.timer, slot, flow, budget - first_half).await {
                Some(action) => action,
                None => flow.handle(FlowEvent::ResolutionTimeout),
            },
        )
    }

    /// Queue every frame; the last one makes the runner signal the slot.
    async fn transmit(
        &mut self,
        guard: &SlotGuard<'_, CLIENTS>,
        source_alias: Alias,
        destination: Alias,
        payload: &[u8],
    ) -> Result<(), WriteError> {
        guard.slot().set_route(RouteKind::Awaiting {
            local: source_alias,
            remote: destination,
        });

        let last = frame_count(payload.len()) - 1;
        let frames = DatagramFrameBuilder::new(source_alias, destination, payload).build();
        for (index, frame) in frames.enumerate() {
            let notify = (index == last).then(|| guard.notify());
            self.queue(frame?, notify).await;
        }
        Ok(())
    }

    async fn queue(&self, frame: CanFrame, notify: Option<Notify>) {
        self.support.outbound.send(Outbound { frame, notify }).await;
    }
}

/// Feed slot events to the flow until it asks for something.
async fn wait_for_action(slot: &ClientSlot, flow: &mut SendFlow) -> FlowAction {
    loop {
        let event = slot.events.receive().await;
        match flow.handle(flow_event(event)) {
            FlowAction::Wait => continue,
            action => return action,
        }
    }
}

/// Wait for the last frame to leave while still feeding responses to the
/// flow, since a rejection can end it earlier.
async fn wait_for_transmission(slot: &ClientSlot, flow: &mut SendFlow) -> FlowAction {
    loop {
        let event = {
            let transmitted = slot.transmitted.wait();
            let receive = slot.events.receive();
            pin_mut!(transmitted);
            pin_mut!(receive);
            match select(transmitted, receive).await {
                Either::Left(((), _)) => FlowEvent::Transmitted,
                Either::Right((event, _)) => flow_event(event),
            }
        };
        match flow.handle(event) {
            FlowAction::Wait => continue,
            action => return action,
        }
    }
}

/// Same as [`wait_for_action`], bounded by `millis`. `None` on expiry.
async fn wait_for_action_until<T: LcbTimer>(
    timer: &mut T,
    slot: &ClientSlot,
    flow: &mut SendFlow,
    millis: u32,
) -> Option<FlowAction> {
    let deadline = timer.delay_ms(millis);
    pin_mut!(deadline);

    loop {
        let event = {
            let receive = slot.events.receive();
            pin_mut!(receive);
            match select(deadline.as_mut(), receive).await {
                Either::Left(((), _)) => return None,
                Either::Right((event, _)) => event,
            }
        };
        match flow.handle(flow_event(event)) {
            FlowAction::Wait => continue,
            action => return Some(action),
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
