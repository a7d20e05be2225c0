//! Data types shared by every layer of the crate: node identifiers, bus
//! aliases, node handles, and the fixed-capacity datagram payload buffer.

/// Maximum payload a datagram can transport once reassembled.
pub const MAX_DATAGRAM_PAYLOAD: usize = 72;

/// Mask of the 12 meaningful bits of an alias.
pub const ALIAS_MASK: u16 = 0x0FFF;

/// Mask of the 48 meaningful bits of a node identifier.
pub const NODE_ID_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Full 48-bit node identifier, stored in the low bits of a `u64`.
pub type NodeId = u64;

/// 12-bit bus-local alias. Zero means "unknown".
pub type Alias = u16;

/// Returns `true` when `alias` fits in 12 bits and is not the reserved zero value.
#[inline]
pub const fn is_valid_alias(alias: Alias) -> bool {
    alias != 0 && alias <= ALIAS_MASK
}

/// Encode a node identifier as the six big-endian bytes used on the wire.
pub fn node_id_to_bytes(node_id: NodeId) -> [u8; 6] {
    let raw = (node_id & NODE_ID_MASK).to_be_bytes();
    let mut out = [0u8; 6];
    out.copy_from_slice(&raw[2..]);
    out
}

/// Decode a six-byte big-endian node identifier. Returns `None` when fewer than six bytes are given.
pub fn node_id_from_bytes(bytes: &[u8]) -> Option<NodeId> {
    let bytes = bytes.get(..6)?;
    let mut raw = [0u8; 8];
    raw[2..].copy_from_slice(bytes);
    Some(u64::from_be_bytes(raw))
}

/// Identifies a node by full id, by alias, or by both.
///
/// A zero `id` with a non-zero `alias` means "identify by alias only", and
/// the other way round. At least one of the two must be known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeHandle {
    pub id: NodeId,
    pub alias: Alias,
}

impl NodeHandle {
    #[inline]
    pub const fn new(id: NodeId, alias: Alias) -> Self {
        Self { id, alias }
    }

    #[inline]
    pub const fn from_alias(alias: Alias) -> Self {
        Self { id: 0, alias }
    }

    #[inline]
    pub const fn from_id(id: NodeId) -> Self {
        Self { id, alias: 0 }
    }

    /// Neither the id nor the alias is known.
    #[inline]
    pub const fn is_unknown(&self) -> bool {
        self.id == 0 && self.alias == 0
    }
}

/// Returned when appending would exceed [`MAX_DATAGRAM_PAYLOAD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded;

/// Owned datagram payload. Moving the value moves ownership; dropping it
/// releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramPayload {
    len: usize,
    data: [u8; MAX_DATAGRAM_PAYLOAD],
}

impl Default for DatagramPayload {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramPayload {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            len: 0,
            data: [0; MAX_DATAGRAM_PAYLOAD],
        }
    }

    /// Copy `bytes` into a fresh payload.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CapacityExceeded> {
        let mut payload = Self::new();
        payload.extend_from_slice(bytes)?;
        Ok(payload)
    }

    /// Number of valid bytes stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reset the buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append `bytes`. Leaves the buffer untouched when the result would not fit.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), CapacityExceeded> {
        let end = self.len + bytes.len();
        if end > MAX_DATAGRAM_PAYLOAD {
            return Err(CapacityExceeded);
        }
        self.data[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    /// Drop every byte past `len`.
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// The first byte identifies the datagram protocol (the "type byte").
    #[inline]
    pub fn datagram_type(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }
}
