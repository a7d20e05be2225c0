//! Datagram service built around one CAN bus.
//!
//! [`DatagramSupport`] owns everything shared between tasks: the handler
//! registry, the pool of send-flow slots, the outbound frame queue, and the
//! references to the local and remote alias directories. It is split into:
//!
//! * a [`DatagramRunner`] owning the [`CanBus`] and the reassembly sessions,
//!   which must be driven by exactly one task;
//! * any number of [`DatagramClient`]s, one per task that sends datagrams.
//!
//! Nothing is allocated: the support is typically placed in a `StaticCell`
//! and borrowed for `'static` by the tasks.
use core::cell::Cell;
use core::fmt::Debug;

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    channel::Channel,
    signal::Signal,
};
use futures_util::{future::select, future::Either, pin_mut};

use crate::core::{Alias, NodeHandle, NodeId};
use crate::error::DatagramRunError;
use crate::protocol::datagram::{
    client::DatagramClient,
    codes::{ERROR_NOT_IMPLEMENTED, PERMANENT_ERROR},
    config::DatagramConfig,
    registry::{DatagramRegistry, DatagramReply, IncomingDatagram},
};
use crate::protocol::managment::{
    alias_cache::AliasDirectory,
    alias_resolution::{alias_map_definition, parse_alias_frame, AliasEvent},
};
use crate::protocol::messages::{mti, AddressedMessage};
use crate::protocol::transport::{
    can_frame::CanFrame,
    can_id::CanFrameType,
    datagram::{
        assembler::{CompletedDatagram, DatagramAssembler, ProcessResult},
        DatagramFrame,
    },
    traits::{can_bus::CanBus, lcb_timer::LcbTimer},
};

//==================================================================================Constants
/// Frames queued by clients towards the runner.
pub const OUTBOUND_CAPACITY: usize = 8;
/// Events queued by the runner towards one client slot.
const SLOT_EVENT_CAPACITY: usize = 4;
/// Frames produced while processing one inbound or loopback frame.
const LOCAL_QUEUE_CAPACITY: usize = 4;

//==================================================================================Slots
/// Frame queued for the runner. `notify` marks the last frame of a datagram.
#[derive(Debug, Clone)]
pub(crate) struct Outbound {
    pub frame: CanFrame,
    pub notify: Option<Notify>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Notify {
    pub slot: usize,
    pub generation: u32,
}

/// Traffic a slot currently wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RouteKind {
    Idle,
    /// Alias definitions for `node_id`.
    Resolving { node_id: NodeId },
    /// Responses from `remote` to `local`.
    Awaiting { local: Alias, remote: Alias },
}

#[derive(Debug, Clone, Copy)]
struct Route {
    /// Changes every time the slot is claimed.
    generation: u32,
    kind: RouteKind,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum SlotEvent {
    AliasResolved(Alias),
    Response(AddressedMessage),
}

pub(crate) struct ClientSlot {
    route: Mutex<CriticalSectionRawMutex, Cell<Route>>,
    /// Bus traffic for the flow; full means the event is dropped.
    pub(crate) events: Channel<CriticalSectionRawMutex, SlotEvent, SLOT_EVENT_CAPACITY>,
    /// Set once the last frame of the datagram reached the bus. Never dropped.
    pub(crate) transmitted: Signal<CriticalSectionRawMutex, ()>,
}

impl ClientSlot {
    fn new() -> Self {
        Self {
            route: Mutex::new(Cell::new(Route {
                generation: 0,
                kind: RouteKind::Idle,
            })),
            events: Channel::new(),
            transmitted: Signal::new(),
        }
    }

    fn route(&self) -> Route {
        self.route.lock(Cell::get)
    }

    pub(crate) fn set_route(&self, kind: RouteKind) {
        self.route.lock(|route| {
            let mut current = route.get();
            current.kind = kind;
            route.set(current);
        });
    }

    fn reset(&self, generation: u32) {
        self.route.lock(|route| {
            route.set(Route {
                generation,
                kind: RouteKind::Idle,
            })
        });
        while self.events.try_receive().is_ok() {}
        self.transmitted.reset();
    }

    fn post(&self, event: SlotEvent) {
        if self.events.try_send(event).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("datagram client slot overflow, event dropped");
        }
    }
}

/// Exclusive use of one slot; returns it to the pool when dropped.
pub(crate) struct SlotGuard<'s, const CLIENTS: usize> {
    index: usize,
    generation: u32,
    slot: &'s ClientSlot,
    free: &'s Channel<CriticalSectionRawMutex, usize, CLIENTS>,
}

impl<'s, const CLIENTS: usize> SlotGuard<'s, CLIENTS> {
    pub(crate) fn slot(&self) -> &'s ClientSlot {
        self.slot
    }

    pub(crate) fn notify(&self) -> Notify {
        Notify {
            slot: self.index,
            generation: self.generation,
        }
    }
}

impl<const CLIENTS: usize> Drop for SlotGuard<'_, CLIENTS> {
    fn drop(&mut self) {
        self.slot.reset(self.generation);
        self.free.try_send(self.index).ok();
    }
}

//==================================================================================Support
/// Shared state of the datagram service.
pub struct DatagramSupport<'a, const CLIENTS: usize, const HANDLERS: usize> {
    config: DatagramConfig,
    registry: DatagramRegistry<'a, HANDLERS>,
    local: &'a dyn AliasDirectory,
    remote: &'a dyn AliasDirectory,
    pub(crate) outbound: Channel<CriticalSectionRawMutex, Outbound, OUTBOUND_CAPACITY>,
    free_slots: Channel<CriticalSectionRawMutex, usize, CLIENTS>,
    slots: [ClientSlot; CLIENTS],
    generation: Mutex<CriticalSectionRawMutex, Cell<u32>>,
}

impl<'a, const CLIENTS: usize, const HANDLERS: usize> DatagramSupport<'a, CLIENTS, HANDLERS> {
    /// `local` maps the node ids hosted by this firmware to their aliases;
    /// `remote` caches the mappings learnt from the bus.
    pub fn new(
        local: &'a dyn AliasDirectory,
        remote: &'a dyn AliasDirectory,
        config: DatagramConfig,
    ) -> Self {
        let support = Self {
            config,
            registry: DatagramRegistry::new(),
            local,
            remote,
            outbound: Channel::new(),
            free_slots: Channel::new(),
            slots: core::array::from_fn(|_| ClientSlot::new()),
            generation: Mutex::new(Cell::new(0)),
        };
        for index in 0..CLIENTS {
            support.free_slots.try_send(index).ok();
        }
        support
    }

    pub fn config(&self) -> &DatagramConfig {
        &self.config
    }

    /// Handlers for incoming datagrams. Can be updated at any time.
    pub fn registry(&self) -> &DatagramRegistry<'a, HANDLERS> {
        &self.registry
    }

    pub fn local_directory(&self) -> &'a dyn AliasDirectory {
        self.local
    }

    pub fn remote_directory(&self) -> &'a dyn AliasDirectory {
        self.remote
    }

    /// Sending side for one task. Flows beyond `CLIENTS` wait for a free slot.
    pub fn client<T: LcbTimer>(&'a self, timer: T) -> DatagramClient<'a, T, CLIENTS, HANDLERS> {
        DatagramClient::new(self, timer)
    }

    /// Bus side. Exactly one runner per support.
    pub fn runner<C: CanBus>(&'a self, bus: C) -> DatagramRunner<'a, C, CLIENTS, HANDLERS> {
        DatagramRunner {
            support: self,
            bus,
            assembler: DatagramAssembler::new(),
        }
    }

    /// Alias of `handle` without touching the bus.
    pub(crate) fn cached_alias(&self, handle: NodeHandle) -> Option<Alias> {
        if handle.alias != 0 {
            return Some(handle.alias);
        }
        self.local
            .lookup(handle.id)
            .or_else(|| self.remote.lookup(handle.id))
    }

    fn next_generation(&self) -> u32 {
        self.generation.lock(|generation| {
            let next = generation.get().wrapping_add(1);
            generation.set(next);
            next
        })
    }

    /// Wait for a free slot and claim it.
    pub(crate) async fn claim_slot(&self) -> SlotGuard<'_, CLIENTS> {
        let index = self.free_slots.receive().await;
        let generation = self.next_generation();
        let slot = &self.slots[index];
        slot.reset(generation);
        SlotGuard {
            index,
            generation,
            slot,
            free: &self.free_slots,
        }
    }

    fn notify_transmitted(&self, notify: Option<Notify>) {
        let Some(notify) = notify else {
            return;
        };
        if let Some(slot) = self.slots.get(notify.slot) {
            if slot.route().generation == notify.generation {
                slot.transmitted.signal(());
            }
        }
    }

    fn route_alias_definition(&self, node_id: NodeId, alias: Alias) {
        for slot in &self.slots {
            if slot.route().kind == (RouteKind::Resolving { node_id }) {
                slot.post(SlotEvent::AliasResolved(alias));
            }
        }
    }

    /// A response goes to the oldest flow waiting on that alias pair.
    fn route_response(&self, message: AddressedMessage) {
        let current = self.generation.lock(Cell::get);
        let wanted = RouteKind::Awaiting {
            local: message.destination,
            remote: message.source,
        };
        let oldest = self
            .slots
            .iter()
            .filter_map(|slot| {
                let route = slot.route();
                (route.kind == wanted).then_some((slot, route.generation))
            })
            .max_by_key(|(_, generation)| current.wrapping_sub(*generation));
        match oldest {
            Some((slot, _)) => slot.post(SlotEvent::Response(message)),
            None => {
                #[cfg(feature = "defmt")]
                defmt::trace!("unsolicited datagram response from {:#X}", message.source);
            }
        }
    }
}

//==================================================================================Local queue
/// Frames waiting to be emitted or looped back by the runner.
struct LocalQueue {
    items: [Option<Outbound>; LOCAL_QUEUE_CAPACITY],
    head: usize,
    len: usize,
}

impl LocalQueue {
    const fn new() -> Self {
        const EMPTY: Option<Outbound> = None;
        Self {
            items: [EMPTY; LOCAL_QUEUE_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, item: Outbound) {
        if self.len == LOCAL_QUEUE_CAPACITY {
            #[cfg(feature = "defmt")]
            defmt::warn!("runner queue full, frame dropped");
            return;
        }
        self.items[(self.head + self.len) % LOCAL_QUEUE_CAPACITY] = Some(item);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<Outbound> {
        if self.len == 0 {
            return None;
        }
        let item = self.items[self.head].take();
        self.head = (self.head + 1) % LOCAL_QUEUE_CAPACITY;
        self.len -= 1;
        item
    }

    fn push_message(&mut self, message: AddressedMessage) {
        match message.encode() {
            Ok(frame) => self.push(Outbound { frame, notify: None }),
            Err(_err) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("cannot encode response: {}", _err);
            }
        }
    }
}

//==================================================================================Runner
/// Task owning the CAN bus: receives and reassembles datagrams, dispatches
/// them, answers, and emits the frames queued by clients.
pub struct DatagramRunner<'a, C, const CLIENTS: usize, const HANDLERS: usize>
where
    C: CanBus,
{
    support: &'a DatagramSupport<'a, CLIENTS, HANDLERS>,
    bus: C,
    assembler: DatagramAssembler,
}

impl<'a, C, const CLIENTS: usize, const HANDLERS: usize> DatagramRunner<'a, C, CLIENTS, HANDLERS>
where
    C: CanBus,
    C::Error: Debug,
{
    /// Run until the bus fails.
    pub async fn drive(mut self) -> Result<(), DatagramRunError<C::Error>> {
        let mut queue = LocalQueue::new();

        loop {
            let mut inbound = None;
            let mut outbound = None;
            let mut recv_error = None;

            {
                let recv_future = self.bus.recv();
                let outbound_future = self.support.outbound.receive();
                pin_mut!(recv_future);
                pin_mut!(outbound_future);

                match select(recv_future, outbound_future).await {
                    Either::Left((result, pending_outbound)) => {
                        match result {
                            Ok(frame) => inbound = Some(frame),
                            Err(err) => recv_error = Some(err),
                        }
                        drop(pending_outbound);
                    }
                    Either::Right((item, pending_recv)) => {
                        outbound = Some(item);
                        drop(pending_recv);
                    }
                }
            }

            if let Some(err) = recv_error {
                #[cfg(feature = "defmt")]
                defmt::error!("CAN receive error, datagram runner stops");
                return Err(DatagramRunError::Receive(err));
            }

            if let Some(frame) = inbound {
                self.process(&frame, &mut queue);
            }

            if let Some(item) = outbound {
                queue.push(item);
            }

            self.flush(&mut queue).await?;
        }
    }

    /// Emit queued frames; frames addressed to a local alias are processed
    /// here instead of going to the bus.
    async fn flush(&mut self, queue: &mut LocalQueue) -> Result<(), DatagramRunError<C::Error>> {
        while let Some(item) = queue.pop() {
            if self.is_loopback(&item.frame) {
                self.support.notify_transmitted(item.notify);
                self.process(&item.frame, queue);
            } else {
                self.bus
                    .send(&item.frame)
                    .await
                    .map_err(DatagramRunError::Send)?;
                self.support.notify_transmitted(item.notify);
            }
        }
        Ok(())
    }

    fn is_loopback(&self, frame: &CanFrame) -> bool {
        let destination = match frame.id.frame_type() {
            Some(CanFrameType::Message) => AddressedMessage::decode(frame)
                .ok()
                .map(|message| message.destination),
            Some(_) => frame.id.datagram_destination(),
            None => None,
        };
        destination.is_some_and(|alias| self.support.local.reverse_lookup(alias).is_some())
    }

    //==================================================================================Inbound
    fn process(&mut self, frame: &CanFrame, queue: &mut LocalQueue) {
        if let Some(event) = parse_alias_frame(frame) {
            self.on_alias_event(event, queue);
            return;
        }

        match frame.id.frame_type() {
            Some(CanFrameType::Message) => {
                if let Ok(message) = AddressedMessage::decode(frame) {
                    self.on_addressed_message(message);
                }
            }
            Some(
                CanFrameType::DatagramSingle
                | CanFrameType::DatagramFirst
                | CanFrameType::DatagramMiddle
                | CanFrameType::DatagramLast,
            ) => match DatagramFrame::decode(frame) {
                Ok(datagram_frame) => self.on_datagram_frame(&datagram_frame, queue),
                Err(_err) => {
                    #[cfg(feature = "defmt")]
                    defmt::trace!("datagram frame dropped: {}", _err);
                }
            },
            _ => {}
        }
    }

    fn on_alias_event(&mut self, event: AliasEvent, queue: &mut LocalQueue) {
        let support = self.support;
        match event {
            AliasEvent::Defined { node_id, alias } => {
                if support.local.reverse_lookup(alias).is_some() {
                    return;
                }
                #[cfg(feature = "defmt")]
                defmt::debug!("alias {:#X} is node {:#X}", alias, node_id);
                support.remote.add(node_id, alias);
                support.route_alias_definition(node_id, alias);
            }
            AliasEvent::Reset { node_id, alias } => {
                if support.remote.lookup(node_id) == Some(alias) {
                    support.remote.remove(node_id);
                }
            }
            AliasEvent::Enquiry {
                node_id: Some(node_id),
                ..
            } => {
                let Some(alias) = support.local.lookup(node_id) else {
                    return;
                };
                match alias_map_definition(alias, node_id) {
                    Ok(frame) => queue.push(Outbound { frame, notify: None }),
                    Err(_err) => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("cannot answer enquiry: {}", _err);
                    }
                }
            }
            AliasEvent::Enquiry { node_id: None, .. } => {}
        }
    }

    fn on_addressed_message(&mut self, message: AddressedMessage) {
        let is_response = matches!(
            message.mti,
            mti::DATAGRAM_OK
                | mti::DATAGRAM_REJECTED
                | mti::OPTIONAL_INTERACTION_REJECTED
                | mti::TERMINATE_DUE_TO_ERROR
        );
        if is_response && self.support.local.reverse_lookup(message.destination).is_some() {
            self.support.route_response(message);
        }
    }

    fn on_datagram_frame(&mut self, frame: &DatagramFrame, queue: &mut LocalQueue) {
        let Some(destination) = self.support.local.reverse_lookup(frame.destination) else {
            // Datagram between two other nodes.
            return;
        };

        match self.assembler.process_frame(frame) {
            ProcessResult::FragmentConsumed => {}
            ProcessResult::Rejected(rejection) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("datagram frame rejected: {}", rejection);
                queue.push_message(AddressedMessage::datagram_rejected(
                    rejection.local,
                    rejection.remote,
                    rejection.code,
                ));
            }
            ProcessResult::DatagramComplete(datagram) => {
                let (local, remote) = (datagram.destination, datagram.source);
                let message = match self.dispatch(destination, datagram) {
                    DatagramReply::Ok { flags } => AddressedMessage::datagram_ok(local, remote, flags),
                    DatagramReply::Rejected { code } => {
                        AddressedMessage::datagram_rejected(local, remote, code)
                    }
                };
                queue.push_message(message);
            }
        }
    }

    /// Hand a complete datagram to its handler.
    fn dispatch(&self, destination: NodeId, datagram: CompletedDatagram) -> DatagramReply {
        let support = self.support;
        let Some(datagram_type) = datagram.payload.datagram_type() else {
            return DatagramReply::Rejected {
                code: PERMANENT_ERROR,
            };
        };
        let Some(handler) = support.registry.lookup(destination, datagram_type) else {
            #[cfg(feature = "defmt")]
            defmt::debug!("no handler for datagram type {:#X}", datagram_type);
            return DatagramReply::Rejected {
                code: ERROR_NOT_IMPLEMENTED,
            };
        };

        let source_id = support
            .remote
            .reverse_lookup(datagram.source)
            .or_else(|| support.local.reverse_lookup(datagram.source))
            .unwrap_or(0);

        handler.handle_datagram(IncomingDatagram {
            source: NodeHandle::new(source_id, datagram.source),
            destination,
            payload: datagram.payload,
        })
    }
}
