use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{FlowId, LinkId};

/// The metrics the simulation kernel samples. Each is keyed by a specific
/// kind of entity — links for the link-layer metrics, flows for the
/// transport-layer ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    LinkRate,
    BufferOccupancy,
    PacketLoss,
    WindowSize,
    FlowRate,
}

impl Metric {
    pub fn ylabel(self) -> &'static str {
        match self {
            Metric::LinkRate => "link rate (Mbps)",
            Metric::BufferOccupancy => "buffer occupancy (pkts)",
            Metric::PacketLoss => "packet loss (pkts)",
            Metric::WindowSize => "window size (pkts)",
            Metric::FlowRate => "flow rate (Mbps)",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Metric::LinkRate => "link-rate",
            Metric::BufferOccupancy => "buffer-occupancy",
            Metric::PacketLoss => "packet-loss",
            Metric::WindowSize => "window-size",
            Metric::FlowRate => "flow-rate",
        };
        write!(f, "{s}")
    }
}

/// The entity a sample is attributed to. Only links and flows are ever
/// plotted; devices and routing state are not sampled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityId {
    Link(LinkId),
    Flow(FlowId),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Link(id) => write!(f, "{id}"),
            EntityId::Flow(id) => write!(f, "{id}"),
        }
    }
}

impl From<LinkId> for EntityId {
    fn from(id: LinkId) -> Self {
        EntityId::Link(id)
    }
}

impl From<FlowId> for EntityId {
    fn from(id: FlowId) -> Self {
        EntityId::Flow(id)
    }
}
