use super::*;

const NODE: NodeId = 0x0501_01FF_FFDD;
const OTHER: NodeId = 0x0501_01FF_FF22;

fn accept(_: IncomingDatagram) -> DatagramReply {
    DatagramReply::ok()
}

fn pending(_: IncomingDatagram) -> DatagramReply {
    DatagramReply::ok_reply_pending()
}

static ACCEPT: fn(IncomingDatagram) -> DatagramReply = accept;
static PENDING: fn(IncomingDatagram) -> DatagramReply = pending;
static REJECT: RejectAll = RejectAll { code: 0x1042 };

fn datagram(payload: &[u8]) -> IncomingDatagram {
    IncomingDatagram {
        source: NodeHandle::from_alias(0x555),
        destination: NODE,
        payload: DatagramPayload::from_slice(payload).unwrap(),
    }
}

fn reply_of(handler: Option<&dyn DatagramHandler>) -> Option<DatagramReply> {
    handler.map(|h| h.handle_datagram(datagram(&[0x20])))
}

#[test]
/// An exact registration answers only for its own node.
fn exact_lookup() {
    let registry: DatagramRegistry<'_, 4> = DatagramRegistry::new();
    registry.insert(Some(NODE), 0x20, &ACCEPT).unwrap();
    assert_eq!(reply_of(registry.lookup(NODE, 0x20)), Some(DatagramReply::ok()));
    assert!(registry.lookup(OTHER, 0x20).is_none());
    assert!(registry.lookup(NODE, 0x21).is_none());
}

#[test]
/// Exact node beats wildcard regardless of insertion order.
fn exact_beats_wildcard() {
    let registry: DatagramRegistry<'_, 4> = DatagramRegistry::new();
    registry.insert(None, 0x20, &REJECT).unwrap();
    registry.insert(Some(NODE), 0x20, &PENDING).unwrap();
    assert_eq!(
        reply_of(registry.lookup(NODE, 0x20)),
        Some(DatagramReply::ok_reply_pending())
    );
    assert_eq!(
        reply_of(registry.lookup(OTHER, 0x20)),
        Some(DatagramReply::Rejected { code: 0x1042 })
    );
}

#[test]
/// Duplicate exact keys: the first registration wins until removed.
fn duplicate_first_wins() {
    let registry: DatagramRegistry<'_, 4> = DatagramRegistry::new();
    registry.insert(Some(NODE), 0x20, &ACCEPT).unwrap();
    registry.insert(Some(NODE), 0x20, &PENDING).unwrap();
    assert_eq!(reply_of(registry.lookup(NODE, 0x20)), Some(DatagramReply::ok()));

    assert!(registry.remove(Some(NODE), 0x20, &ACCEPT));
    assert_eq!(
        reply_of(registry.lookup(NODE, 0x20)),
        Some(DatagramReply::ok_reply_pending())
    );
}

#[test]
/// Removal matches on key and handler address.
fn remove_requires_same_handler() {
    let registry: DatagramRegistry<'_, 4> = DatagramRegistry::new();
    registry.insert(None, 0x20, &ACCEPT).unwrap();
    assert!(!registry.remove(None, 0x20, &PENDING));
    assert!(!registry.remove(Some(NODE), 0x20, &ACCEPT));
    assert!(!registry.remove(None, 0x21, &ACCEPT));
    assert_eq!(registry.len(), 1);
    assert!(registry.remove(None, 0x20, &ACCEPT));
    assert!(registry.is_empty());
    assert!(registry.lookup(NODE, 0x20).is_none());
}

#[test]
/// A full registry refuses new entries; removal frees a slot.
fn capacity() {
    let registry: DatagramRegistry<'_, 2> = DatagramRegistry::new();
    registry.insert(None, 0x20, &ACCEPT).unwrap();
    registry.insert(None, 0x21, &ACCEPT).unwrap();
    assert_eq!(registry.insert(None, 0x22, &ACCEPT), Err(RegistryError::Full));
    assert!(registry.remove(None, 0x20, &ACCEPT));
    registry.insert(None, 0x22, &ACCEPT).unwrap();
    assert!(registry.lookup(NODE, 0x22).is_some());
}

#[test]
/// Closures are handlers too.
fn closure_handler() {
    let echo_len = |datagram: IncomingDatagram| DatagramReply::Ok {
        flags: datagram.payload.len() as u8,
    };
    let registry: DatagramRegistry<'_, 1> = DatagramRegistry::new();
    registry.insert(None, 0x30, &echo_len).unwrap();
    let handler = registry.lookup(NODE, 0x30).unwrap();
    assert_eq!(
        handler.handle_datagram(datagram(&[0x30, 1, 2])),
        DatagramReply::Ok { flags: 3 }
    );
}

#[test]
/// `RejectAll` defaults to the permanent "not implemented" code.
fn reject_all_default() {
    assert_eq!(
        RejectAll::default().handle_datagram(datagram(&[0x20])),
        DatagramReply::Rejected { code: 0x1000 }
    );
}
