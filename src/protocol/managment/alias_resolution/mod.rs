//! Frames of the alias resolution exchange: Alias Mapping Enquiry, Alias
//! Map Definition, Alias Map Reset, Verify Node ID Global and Verified Node ID.
use crate::core::{node_id_from_bytes, node_id_to_bytes, Alias, NodeId};
use crate::error::CanIdBuildError;
use crate::protocol::messages::{control, mti};
use crate::protocol::transport::{can_frame::CanFrame, can_id::CanId};

/// Alias-related frame seen on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AliasEvent {
    /// `alias` now belongs to `node_id` (AMD or Verified Node ID).
    Defined { node_id: NodeId, alias: Alias },
    /// `alias` is being released by `node_id`.
    Reset { node_id: NodeId, alias: Alias },
    /// Request for the mapping of `node_id`, or of every node when `None`.
    Enquiry { node_id: Option<NodeId>, from: Alias },
}

fn control_frame(field: u16, source: Alias, node_id: NodeId) -> Result<CanFrame, CanIdBuildError> {
    let id = CanId::builder(source).control(field).build()?;
    CanFrame::new(id, &node_id_to_bytes(node_id)).ok_or(CanIdBuildError::PayloadTooLong { len: 6 })
}

/// Alias Mapping Enquiry for `node_id`, sent from `source`.
pub fn alias_mapping_enquiry(source: Alias, node_id: NodeId) -> Result<CanFrame, CanIdBuildError> {
    control_frame(control::AME, source, node_id)
}

/// Alias Map Definition announcing that `alias` belongs to `node_id`.
pub fn alias_map_definition(alias: Alias, node_id: NodeId) -> Result<CanFrame, CanIdBuildError> {
    control_frame(control::AMD, alias, node_id)
}

/// Alias Map Reset: `alias` no longer belongs to `node_id`.
pub fn alias_map_reset(alias: Alias, node_id: NodeId) -> Result<CanFrame, CanIdBuildError> {
    control_frame(control::AMR, alias, node_id)
}

/// Verify Node ID Global restricted to `node_id`.
pub fn verify_node_id_global(source: Alias, node_id: NodeId) -> Result<CanFrame, CanIdBuildError> {
    let id = CanId::builder(source)
        .message(mti::VERIFY_NODE_ID_GLOBAL)
        .build()?;
    CanFrame::new(id, &node_id_to_bytes(node_id)).ok_or(CanIdBuildError::PayloadTooLong { len: 6 })
}

/// Interpret a frame of the alias resolution exchange. Anything else yields `None`.
pub fn parse_alias_frame(frame: &CanFrame) -> Option<AliasEvent> {
    let alias = frame.id.source_alias();
    if alias == 0 {
        return None;
    }
    let node_id = node_id_from_bytes(frame.payload());

    if let Some(field) = frame.id.control_field() {
        return match field {
            control::AMD => Some(AliasEvent::Defined {
                node_id: node_id?,
                alias,
            }),
            control::AMR => Some(AliasEvent::Reset {
                node_id: node_id?,
                alias,
            }),
            control::AME => Some(AliasEvent::Enquiry {
                node_id,
                from: alias,
            }),
            _ => None,
        };
    }

    match frame.id.mti()? {
        mti::VERIFIED_NODE_ID | mti::VERIFIED_NODE_ID_SIMPLE => Some(AliasEvent::Defined {
            node_id: node_id?,
            alias,
        }),
        _ => None,
    }
}
