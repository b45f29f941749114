pub mod spec;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use netsim_core::{Controller, Device, Flow, Host, Link, Router};
use netsim_types::{CongestionAlgorithm, DeviceId, FlowId, LinkId};

use spec::NetworkSpec;

/// Read and parse a topology file. Parse/IO failures are wrapped with the
/// path for context, the way a CLI front-end needs to report them.
pub fn load_from_path(path: &Path) -> Result<NetworkSpec> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading topology file '{}'", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing topology file '{}'", path.display()))
}

/// Configuration-error checks from §7: duplicate ids, dangling link/device
/// references, a host with != 1 link, an unparseable `tcp` tag. All of
/// these abort before a `Controller` is ever constructed.
fn validate(spec: &NetworkSpec) -> Result<()> {
    let mut device_ids = HashSet::new();
    for host in &spec.hosts {
        anyhow::ensure!(device_ids.insert(host.id.clone()), "duplicate device id '{}'", host.id);
    }
    for router in &spec.routers {
        anyhow::ensure!(device_ids.insert(router.id.clone()), "duplicate device id '{}'", router.id);
    }

    let mut link_ids = HashSet::new();
    for link in &spec.links {
        anyhow::ensure!(link_ids.insert(link.id.clone()), "duplicate link id '{}'", link.id);
        anyhow::ensure!(
            device_ids.contains(&link.left_device_id),
            "link '{}' references unknown device '{}'",
            link.id,
            link.left_device_id
        );
        anyhow::ensure!(
            device_ids.contains(&link.right_device_id),
            "link '{}' references unknown device '{}'",
            link.id,
            link.right_device_id
        );
    }

    for host in &spec.hosts {
        anyhow::ensure!(
            host.links.len() == 1,
            "host '{}' must have exactly one link, has {}",
            host.id,
            host.links.len()
        );
        for link_id in &host.links {
            anyhow::ensure!(link_ids.contains(link_id), "host '{}' references unknown link '{}'", host.id, link_id);
        }
    }

    for router in &spec.routers {
        for link_id in &router.links {
            anyhow::ensure!(
                link_ids.contains(link_id),
                "router '{}' references unknown link '{}'",
                router.id,
                link_id
            );
        }
        for (host_id, link_id) in &router.routing_table {
            anyhow::ensure!(
                link_ids.contains(link_id),
                "router '{}' routing_table entry for host '{}' references unknown link '{}'",
                router.id,
                host_id,
                link_id
            );
        }
    }

    let mut flow_ids = HashSet::new();
    for flow in &spec.flows {
        anyhow::ensure!(flow_ids.insert(flow.id.clone()), "duplicate flow id '{}'", flow.id);
        anyhow::ensure!(
            device_ids.contains(&flow.src_id),
            "flow '{}' references unknown source device '{}'",
            flow.id,
            flow.src_id
        );
        anyhow::ensure!(
            device_ids.contains(&flow.dst_id),
            "flow '{}' references unknown destination device '{}'",
            flow.id,
            flow.dst_id
        );
        flow.tcp
            .parse::<CongestionAlgorithm>()
            .with_context(|| format!("flow '{}' has an unrecognized tcp tag '{}'", flow.id, flow.tcp))?;
    }

    Ok(())
}

/// Validate and wire a fully parsed topology into a runnable `Controller`:
/// links and devices constructed, router host/router link classification
/// resolved, routing tables seeded, flows registered, show-on-plot entities
/// flagged.
pub fn build(spec: NetworkSpec, log_interval: f64) -> Result<Controller> {
    validate(&spec)?;

    let mut is_host: HashMap<String, bool> = HashMap::new();
    for host in &spec.hosts {
        is_host.insert(host.id.clone(), true);
    }
    for router in &spec.routers {
        is_host.insert(router.id.clone(), false);
    }

    let mut links: HashMap<LinkId, Link> = HashMap::new();
    for l in &spec.links {
        links.insert(
            LinkId::from(l.id.as_str()),
            Link::new(
                LinkId::from(l.id.as_str()),
                DeviceId::from(l.left_device_id.as_str()),
                DeviceId::from(l.right_device_id.as_str()),
                l.throughput,
                l.link_delay,
                l.buffer_size,
            ),
        );
    }

    let mut devices: HashMap<DeviceId, Device> = HashMap::new();
    for h in &spec.hosts {
        let link_id = LinkId::from(h.links[0].as_str());
        devices.insert(DeviceId::from(h.id.as_str()), Device::Host(Host::new(DeviceId::from(h.id.as_str()), link_id)));
    }

    for r in &spec.routers {
        let router_device_id = DeviceId::from(r.id.as_str());
        let mut host_links = Vec::new();
        let mut router_links = Vec::new();
        for link_id_str in &r.links {
            let link_id = LinkId::from(link_id_str.as_str());
            let link = links
                .get(&link_id)
                .with_context(|| format!("router '{}' link '{}' missing after validation", r.id, link_id_str))?;
            let opposite = link.opposite_device(&router_device_id)?;
            if *is_host.get(opposite.as_str()).unwrap_or(&false) {
                host_links.push((link_id, opposite.clone()));
            } else {
                router_links.push(link_id);
            }
        }
        let seeded_routes: HashMap<DeviceId, LinkId> = r
            .routing_table
            .iter()
            .map(|(host_id, link_id)| (DeviceId::from(host_id.as_str()), LinkId::from(link_id.as_str())))
            .collect();
        let router = Router::with_seeded_routes(router_device_id.clone(), host_links, router_links, r.bf_freq, seeded_routes);
        devices.insert(router_device_id, Device::Router(router));
    }

    let mut controller = Controller::new(links, devices, log_interval)?;

    for r in &spec.routers {
        controller.schedule_initial_bf_round(&DeviceId::from(r.id.as_str()))?;
    }
    for l in &spec.links {
        if l.show_on_plot {
            controller.show_link(LinkId::from(l.id.as_str()));
        }
    }

    for f in &spec.flows {
        let algorithm: CongestionAlgorithm = f.tcp.parse().expect("validated above");
        let flow_id = FlowId::from(f.id.as_str());
        let src_id = DeviceId::from(f.src_id.as_str());
        let dst_id = DeviceId::from(f.dst_id.as_str());

        let flow = Flow::new(flow_id.clone(), src_id.clone(), dst_id, algorithm, f.num_bytes);
        controller.add_flow_to_host(&src_id, flow)?;
        controller.register_flow(src_id, flow_id.clone(), f.start_time);
        if f.show_on_plot {
            controller.show_flow(flow_id);
        }
    }

    info!(
        hosts = spec.hosts.len(),
        routers = spec.routers.len(),
        links = spec.links.len(),
        flows = spec.flows.len(),
        "topology wired"
    );

    Ok(controller)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "hosts": [
                {"id": "H1", "links": ["L0"]},
                {"id": "H2", "links": ["L0"]}
            ],
            "routers": [],
            "links": [
                {"id": "L0", "left_device_id": "H1", "right_device_id": "H2",
                 "throughput": 1000000.0, "link_delay": 0.01, "buffer_size": 65536}
            ],
            "flows": [
                {"id": "F0", "src_id": "H1", "dst_id": "H2", "num_bytes": 20480,
                 "start_time": 0.0, "tcp": "reno"}
            ]
        }"#
    }

    #[test]
    fn builds_a_minimal_topology() {
        let spec: NetworkSpec = serde_json::from_str(minimal_json()).unwrap();
        let controller = build(spec, 1.0).unwrap();
        assert_eq!(controller.current_time(), 0.0);
    }

    #[test]
    fn rejects_a_host_with_two_links() {
        let mut spec: NetworkSpec = serde_json::from_str(minimal_json()).unwrap();
        spec.hosts[0].links.push("L0".to_string());
        assert!(validate(&spec).is_err());
    }

    #[test]
    fn rejects_an_unknown_tcp_tag() {
        let mut spec: NetworkSpec = serde_json::from_str(minimal_json()).unwrap();
        spec.flows[0].tcp = "cubic".to_string();
        assert!(validate(&spec).is_err());
    }

    #[test]
    fn rejects_a_dangling_link_reference() {
        let mut spec: NetworkSpec = serde_json::from_str(minimal_json()).unwrap();
        spec.hosts[0].links = vec!["L-missing".to_string()];
        assert!(validate(&spec).is_err());
    }
}
