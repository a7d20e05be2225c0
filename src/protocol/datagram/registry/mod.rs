//! Datagram handler registry: routes a reassembled datagram to the handler
//! registered for its destination node and type byte.
//!
//! Registrations are keyed by `(node, type)`, where `node` is a local node
//! id or `None` for a wildcard matching every local node. An exact node
//! registration wins over a wildcard one. The table is guarded by a single
//! critical-section mutex; handlers are always called outside of it.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::core::{DatagramPayload, NodeHandle, NodeId};
use crate::error::RegistryError;
use crate::protocol::datagram::codes::{ERROR_NOT_IMPLEMENTED, FLAG_REPLY_PENDING};

//==================================================================================HANDLER
/// Datagram delivered to a handler. The payload is owned by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingDatagram {
    /// Sender. `id` is 0 when the sender's node id is not cached.
    pub source: NodeHandle,
    /// Local node the datagram was addressed to.
    pub destination: NodeId,
    pub payload: DatagramPayload,
}

impl IncomingDatagram {
    /// First payload byte.
    pub fn datagram_type(&self) -> Option<u8> {
        self.payload.datagram_type()
    }
}

/// Answer sent back to the datagram's sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DatagramReply {
    /// Datagram Received OK. Bit 7 of `flags` announces a reply datagram.
    Ok { flags: u8 },
    /// Datagram Rejected with a wire error code.
    Rejected { code: u16 },
}

impl DatagramReply {
    pub const fn ok() -> Self {
        DatagramReply::Ok { flags: 0 }
    }

    /// OK announcing that a reply datagram will follow.
    pub const fn ok_reply_pending() -> Self {
        DatagramReply::Ok {
            flags: FLAG_REPLY_PENDING,
        }
    }
}

/// Consumer of datagrams of one type.
///
/// Called from the datagram runner task, so implementations must return
/// quickly. Sending a reply datagram goes through a separate
/// [`DatagramClient`](crate::protocol::datagram::client::DatagramClient)
/// owned by another task.
pub trait DatagramHandler: Sync {
    fn handle_datagram(&self, datagram: IncomingDatagram) -> DatagramReply;
}

impl<F> DatagramHandler for F
where
    F: Fn(IncomingDatagram) -> DatagramReply + Sync,
{
    fn handle_datagram(&self, datagram: IncomingDatagram) -> DatagramReply {
        self(datagram)
    }
}

/// Handler rejecting everything it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectAll {
    pub code: u16,
}

impl Default for RejectAll {
    fn default() -> Self {
        Self {
            code: ERROR_NOT_IMPLEMENTED,
        }
    }
}

impl DatagramHandler for RejectAll {
    fn handle_datagram(&self, _datagram: IncomingDatagram) -> DatagramReply {
        DatagramReply::Rejected { code: self.code }
    }
}

/// Handler identity is its address.
fn same_handler(a: &dyn DatagramHandler, b: &dyn DatagramHandler) -> bool {
    core::ptr::eq(a as *const _ as *const u8, b as *const _ as *const u8)
}

//==================================================================================REGISTRY
#[derive(Clone, Copy)]
struct Registration<'a> {
    node: Option<NodeId>,
    datagram_type: u8,
    handler: &'a dyn DatagramHandler,
}

/// Fixed-capacity `(node | wildcard, type) → handler` table.
pub struct DatagramRegistry<'a, const N: usize> {
    entries: Mutex<CriticalSectionRawMutex, RefCell<[Option<Registration<'a>>; N]>>,
}

impl<'a, const N: usize> Default for DatagramRegistry<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> DatagramRegistry<'a, N> {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(RefCell::new([None; N])),
        }
    }

    /// Register `handler` for datagrams of `datagram_type` sent to `node`
    /// (`None`: any local node).
    ///
    /// Registering the same exact key twice is allowed; the first
    /// registration keeps answering lookups until it is removed.
    pub fn insert(
        &self,
        node: Option<NodeId>,
        datagram_type: u8,
        handler: &'a dyn DatagramHandler,
    ) -> Result<(), RegistryError> {
        self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();
            let free = entries
                .iter_mut()
                .find(|entry| entry.is_none())
                .ok_or(RegistryError::Full)?;
            *free = Some(Registration {
                node,
                datagram_type,
                handler,
            });
            Ok(())
        })
    }

    /// Remove the registration matching the key and the handler's address.
    /// Returns `false` when nothing matched.
    pub fn remove(
        &self,
        node: Option<NodeId>,
        datagram_type: u8,
        handler: &'a dyn DatagramHandler,
    ) -> bool {
        self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();
            let found = entries.iter_mut().find(|entry| {
                entry.is_some_and(|r| {
                    r.node == node
                        && r.datagram_type == datagram_type
                        && same_handler(r.handler, handler)
                })
            });
            match found {
                Some(entry) => {
                    *entry = None;
                    true
                }
                None => false,
            }
        })
    }

    /// Handler for a datagram of `datagram_type` addressed to `node`.
    pub fn lookup(&self, node: NodeId, datagram_type: u8) -> Option<&'a dyn DatagramHandler> {
        self.entries.lock(|entries| {
            let entries = entries.borrow();
            let mut wildcard = None;
            for registration in entries.iter().flatten() {
                if registration.datagram_type != datagram_type {
                    continue;
                }
                match registration.node {
                    Some(owner) if owner == node => return Some(registration.handler),
                    None if wildcard.is_none() => wildcard = Some(registration.handler),
                    _ => {}
                }
            }
            wildcard
        })
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries
            .lock(|entries| entries.borrow().iter().flatten().count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
