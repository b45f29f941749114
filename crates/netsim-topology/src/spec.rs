use std::collections::HashMap;

use serde::Deserialize;

/// The on-disk shape of a network description (§6). Field names mirror the
/// reference JSON exactly; all unit conversion and cross-reference
/// validation happens after deserialization, in `build`.
#[derive(Debug, Deserialize)]
pub struct NetworkSpec {
    pub hosts: Vec<HostSpec>,
    pub routers: Vec<RouterSpec>,
    pub links: Vec<LinkSpec>,
    pub flows: Vec<FlowSpec>,
}

#[derive(Debug, Deserialize)]
pub struct HostSpec {
    pub id: String,
    pub links: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RouterSpec {
    pub id: String,
    pub links: Vec<String>,
    #[serde(rename = "BFfreq")]
    pub bf_freq: f64,
    #[serde(default)]
    pub routing_table: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkSpec {
    pub id: String,
    pub left_device_id: String,
    pub right_device_id: String,
    pub throughput: f64,
    pub link_delay: f64,
    pub buffer_size: u64,
    #[serde(default)]
    pub show_on_plot: bool,
}

#[derive(Debug, Deserialize)]
pub struct FlowSpec {
    pub id: String,
    pub src_id: String,
    pub dst_id: String,
    /// `null` means an infinite flow.
    pub num_bytes: Option<u64>,
    pub start_time: f64,
    pub tcp: String,
    #[serde(default)]
    pub show_on_plot: bool,
}
