//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Bundled 132/11 kV demonstration network."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use crate::model::{Edge, Network, Node, NodeKind};

pub const DEMO_NAME: &str = "Demo 1";

/// 132 kV grid infeed through a 20 MVA transformer to two 11 kV loads.
pub fn demo_network() -> Network {
    demo_network_with_tap(0)
}

pub fn demo_network_with_tap(tap_position: i32) -> Network {
    let mut transformer =
        Node::transformer("n4", "Tx_01", 11.0, 20_000.0, Some(11.25), tap_position);
    if let NodeKind::Transformer(data) = &mut transformer.kind {
        data.vector_group = Some("Dyn11".to_owned());
    }
    let mut load_a = Node::load("n6", "Load_A", 11.0, 3000.0, Some(0.85));
    if let NodeKind::Load(data) = &mut load_a.kind {
        data.scale_factor = Some(1.0);
    }

    Network::new(DEMO_NAME)
        .with_node(Node::source("n1", "Main_Source", 132.0, Some(20.0), Some(10.0)))
        .with_node(Node::busbar("n2", "HV1", 132.0))
        .with_node(Node::busbar("n3", "HV2", 132.0))
        .with_node(transformer)
        .with_node(Node::busbar("n5", "MV1", 11.0))
        .with_node(load_a)
        .with_node(Node::load("n7", "Load_B", 11.0, 3000.0, Some(0.85)))
        .with_edge(Edge::new("e1", "n1", "n2", 10_000.0, "Wolf"))
        .with_edge(Edge::new("e2", "n2", "n3", 10_000.0, "Wolf"))
        .with_edge(Edge::new("e3", "n3", "n4", 50.0, "Wolf"))
        .with_edge(Edge::new("e4", "n4", "n5", 50.0, "Hare"))
        .with_edge(Edge::new("e5", "n5", "n6", 1000.0, "Hare"))
        .with_edge(Edge::new("e6", "n5", "n7", 1000.0, "Hare"))
}
