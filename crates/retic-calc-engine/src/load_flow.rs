//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Backward sweep: subtree loads and branch currents."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
//! Backward (leaf-to-root) sweep of the radial forest.
//!
//! Branch currents are derived from the nominal voltage of the edge's level,
//! not from the solved voltage. One backward and one forward sweep is the
//! whole solution; there is no iteration towards convergence.

use retic_common::PowerFactorWeighting;
use serde::{Deserialize, Serialize};

use crate::{impedance::ResolvedNetwork, topology::Topology};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Apparent power served at and below a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtreeLoad {
    pub kva: f64,
    pub active_kw: f64,
    pub reactive_kvar: f64,
    /// `Σ Sᵢ·pfᵢ`, numerator of the kVA-weighted power factor.
    pub weighted_pf_kva: f64,
}

impl SubtreeLoad {
    fn accumulate(&mut self, other: &SubtreeLoad) {
        self.kva += other.kva;
        self.active_kw += other.active_kw;
        self.reactive_kvar += other.reactive_kvar;
        self.weighted_pf_kva += other.weighted_pf_kva;
    }

    /// Composite power factor of the subtree; unity when it serves nothing.
    pub fn power_factor(&self, weighting: PowerFactorWeighting) -> f64 {
        let pf = match weighting {
            PowerFactorWeighting::KvaWeighted => {
                if self.kva <= 0.0 {
                    return 1.0;
                }
                self.weighted_pf_kva / self.kva
            }
            PowerFactorWeighting::PowerTriangle => {
                let apparent = self.active_kw.hypot(self.reactive_kvar);
                if apparent <= 0.0 {
                    return 1.0;
                }
                self.active_kw / apparent
            }
        };
        pf.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadFlow {
    pub subtrees: Vec<Option<SubtreeLoad>>,
    /// Current magnitude in amperes per tree edge, indexed like `Network::edges`.
    pub edge_currents: Vec<Option<f64>>,
}

impl LoadFlow {
    pub fn subtree(&self, node: usize) -> Option<&SubtreeLoad> {
        self.subtrees.get(node).and_then(Option::as_ref)
    }

    pub fn edge_current(&self, edge: usize) -> Option<f64> {
        self.edge_currents.get(edge).copied().flatten()
    }
}

pub fn aggregate_loads(topology: &Topology, resolved: &ResolvedNetwork) -> LoadFlow {
    let mut subtrees: Vec<Option<SubtreeLoad>> = vec![None; resolved.nodes.len()];
    let mut edge_currents: Vec<Option<f64>> = vec![None; resolved.lines.len()];

    for tree in &topology.trees {
        // Reversed pre-order visits every child before its parent.
        for &node in tree.preorder.iter().rev() {
            let mut subtree = subtrees[node].unwrap_or_default();
            if let Some(load) = resolved.node(node).and_then(|p| p.load) {
                subtree.accumulate(&SubtreeLoad {
                    kva: load.kva,
                    active_kw: load.active_kw(),
                    reactive_kvar: load.reactive_kvar(),
                    weighted_pf_kva: load.kva * load.power_factor,
                });
            }
            subtrees[node] = Some(subtree);

            let Some(link) = topology.parent(node) else {
                continue;
            };
            if let Some(line) = resolved.line(link.edge) {
                edge_currents[link.edge] = Some(line_current(subtree.kva, line.level_kv));
            }
            subtrees[link.upstream]
                .get_or_insert_with(SubtreeLoad::default)
                .accumulate(&subtree);
        }
    }

    LoadFlow {
        subtrees,
        edge_currents,
    }
}

/// Three-phase line current for an apparent power at a line-to-line voltage.
pub fn line_current(kva: f64, level_kv: f64) -> f64 {
    if level_kv <= 0.0 {
        return 0.0;
    }
    kva * 1000.0 / (SQRT_3 * level_kv * 1000.0)
}
