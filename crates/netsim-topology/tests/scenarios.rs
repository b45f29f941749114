//! End-to-end seed scenarios built from a JSON topology through the public
//! loader/build API, exercising paths the unit tests embedded in
//! `netsim-core` don't reach on their own: a router in the data path and a
//! multi-router backbone's Bellman-Ford convergence.

use netsim_core::Device;
use netsim_types::{DeviceId, EntityId, Metric};

fn build(json: &str, log_interval: f64) -> netsim_core::Controller {
    let spec: netsim_topology::spec::NetworkSpec = serde_json::from_str(json).unwrap();
    netsim_topology::build(spec, log_interval).unwrap()
}

/// S2: a FAST flow across a single router with a pre-seeded static route.
/// The flow should make it to completion and leave behind a non-empty
/// window-size series for the entity the topology flagged `show_on_plot`.
#[test]
fn fast_flow_converges_over_a_routed_path() {
    let json = r#"{
        "hosts": [
            {"id": "H1", "links": ["L1"]},
            {"id": "H2", "links": ["L2"]}
        ],
        "routers": [
            {"id": "R1", "links": ["L1", "L2"], "BFfreq": 0,
             "routing_table": {"H1": "L1", "H2": "L2"}}
        ],
        "links": [
            {"id": "L1", "left_device_id": "H1", "right_device_id": "R1",
             "throughput": 1000000.0, "link_delay": 0.005, "buffer_size": 65536},
            {"id": "L2", "left_device_id": "R1", "right_device_id": "H2",
             "throughput": 1000000.0, "link_delay": 0.005, "buffer_size": 65536}
        ],
        "flows": [
            {"id": "F0", "src_id": "H1", "dst_id": "H2", "num_bytes": 204800,
             "start_time": 0.0, "tcp": "fast", "show_on_plot": true}
        ]
    }"#;

    let mut controller = build(json, 0.1);
    controller.run(120.0).unwrap();

    let series = controller.finish_and_collect();
    let window = series
        .get(&(Metric::WindowSize, EntityId::Flow("F0".into())))
        .expect("window-size series recorded for the shown flow");
    assert!(!window.is_empty());
    // Steady-state FAST keeps the window comfortably above its initial
    // value of 1 packet once the transfer has had time to ramp up.
    let (_, last_window) = window.last().copied().unwrap();
    assert!(last_window > 1.0, "window should have grown past its initial value: {last_window}");
}

/// S4: a two-router backbone where neither router is seeded with a static
/// route. After Bellman-Ford rounds have had time to run and flood, both
/// routers should know a finite-cost route to both hosts.
#[test]
fn two_router_backbone_converges_routes_via_bellman_ford() {
    let json = r#"{
        "hosts": [
            {"id": "H1", "links": ["L1"]},
            {"id": "H2", "links": ["L3"]}
        ],
        "routers": [
            {"id": "R1", "links": ["L1", "L2"], "BFfreq": 1.0},
            {"id": "R2", "links": ["L2", "L3"], "BFfreq": 1.0}
        ],
        "links": [
            {"id": "L1", "left_device_id": "H1", "right_device_id": "R1",
             "throughput": 1000000.0, "link_delay": 0.01, "buffer_size": 65536},
            {"id": "L2", "left_device_id": "R1", "right_device_id": "R2",
             "throughput": 1000000.0, "link_delay": 0.01, "buffer_size": 65536},
            {"id": "L3", "left_device_id": "R2", "right_device_id": "H2",
             "throughput": 1000000.0, "link_delay": 0.01, "buffer_size": 65536}
        ],
        "flows": [
            {"id": "F0", "src_id": "H1", "dst_id": "H2", "num_bytes": null,
             "start_time": 0.0, "tcp": "reno"}
        ]
    }"#;

    // An infinite flow keeps the active-flow set non-empty so the run loop
    // keeps advancing virtual time (and dispatching BF rounds) instead of
    // stopping the instant the one finite send completes.
    let mut controller = build(json, 1.0);
    controller.run(5.0).unwrap();

    let r1 = match controller.device(&DeviceId::from("R1")).unwrap() {
        Device::Router(r) => r,
        Device::Host(_) => panic!("R1 should be a router"),
    };
    let r2 = match controller.device(&DeviceId::from("R2")).unwrap() {
        Device::Router(r) => r,
        Device::Host(_) => panic!("R2 should be a router"),
    };

    assert!(r1.route_for(&DeviceId::from("H1")).is_some());
    assert!(
        r1.route_for(&DeviceId::from("H2")).is_some(),
        "R1 should have learned a route to H2 via flooded routing updates"
    );
    assert!(r2.route_for(&DeviceId::from("H2")).is_some());
    assert!(
        r2.route_for(&DeviceId::from("H1")).is_some(),
        "R2 should have learned a route to H1 via flooded routing updates"
    );
}
