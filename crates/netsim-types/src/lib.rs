pub mod congestion;
pub mod ids;
pub mod metric;
pub mod packet;

pub use congestion::{CongestionAlgorithm, UnknownAlgorithm};
pub use ids::{DeviceId, FlowId, LinkId};
pub use metric::{EntityId, Metric};
pub use packet::{Packet, PacketKind, ACK_SIZE, MSS, ROUTING_UPDATE_SIZE};
