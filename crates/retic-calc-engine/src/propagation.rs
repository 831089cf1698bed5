//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Forward sweep: voltages, fault levels and thermal status."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use num_complex::Complex64;
use retic_common::AnalysisConfig;
use serde::{Deserialize, Serialize};

use crate::{
    errors::AnalysisIssue,
    impedance::{LineParameters, ResolvedNetwork},
    load_flow::LoadFlow,
    model::{Impedance, Network},
    topology::Topology,
};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeStatus {
    Normal,
    Overload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    pub voltage_kv: f64,
    pub nominal_kv: f64,
    pub voltage_pu: f64,
    pub angle_deg: f64,
    /// Upstream Thevenin impedance at the node's own level.
    pub fault_impedance: Impedance,
    /// `None` when the upstream impedance is zero.
    pub fault_current_ka: Option<f64>,
    pub distance_m: f64,
    pub load_kva: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeState {
    pub voltage_drop_percent: f64,
    pub current_a: f64,
    pub ampacity_a: Option<f64>,
    pub loading_percent: Option<f64>,
    pub status: EdgeStatus,
}

#[derive(Debug, Clone, Default)]
pub struct Propagation {
    pub nodes: Vec<Option<NodeState>>,
    pub edges: Vec<Option<EdgeState>>,
    pub issues: Vec<AnalysisIssue>,
}

impl Propagation {
    pub fn node(&self, index: usize) -> Option<&NodeState> {
        self.nodes.get(index).and_then(Option::as_ref)
    }

    pub fn edge(&self, index: usize) -> Option<&EdgeState> {
        self.edges.get(index).and_then(Option::as_ref)
    }
}

/// Voltage at the far end of a line and the phase shift it introduces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineDrop {
    /// In-phase drop as a percentage of the nominal phase voltage.
    pub percent: f64,
    pub angle_deg: f64,
}

/// `ΔV + jδV = I∠−φ · (R + jX)`, evaluated per phase.
pub fn line_drop(
    line: &LineParameters,
    current_a: f64,
    power_factor: f64,
    sending_kv: f64,
) -> LineDrop {
    let nominal_phase_v = line.level_kv * 1000.0 / SQRT_3;
    if nominal_phase_v <= 0.0 {
        return LineDrop {
            percent: 0.0,
            angle_deg: 0.0,
        };
    }
    let phi = power_factor.clamp(0.0, 1.0).acos();
    let drop = Complex64::from_polar(current_a, -phi) * line.impedance.as_complex();

    let sending_phase_v = sending_kv * 1000.0 / SQRT_3;
    LineDrop {
        percent: 100.0 * drop.re / nominal_phase_v,
        angle_deg: -drop.im.atan2(sending_phase_v - drop.re).to_degrees(),
    }
}

pub fn propagate(
    network: &Network,
    topology: &Topology,
    resolved: &ResolvedNetwork,
    flow: &LoadFlow,
    config: &AnalysisConfig,
) -> Propagation {
    let mut nodes: Vec<Option<NodeState>> = vec![None; network.nodes.len()];
    let mut edges: Vec<Option<EdgeState>> = vec![None; network.edges.len()];
    let mut issues = Vec::new();

    for index in topology.preorder() {
        let Some(params) = resolved.node(index) else {
            continue;
        };
        let load_kva = flow.subtree(index).map_or(0.0, |s| s.kva);

        let (voltage_kv, angle_deg, upstream_z, distance_m) = match topology.parent(index) {
            None => (
                params.nominal_kv,
                0.0,
                params.source_impedance.unwrap_or(Impedance::ZERO),
                0.0,
            ),
            Some(link) => {
                let (Some(parent), Some(line)) =
                    (nodes[link.upstream].as_ref(), resolved.line(link.edge))
                else {
                    continue;
                };
                let current_a = flow.edge_current(link.edge).unwrap_or(0.0);
                let power_factor = flow
                    .subtree(index)
                    .map_or(1.0, |s| s.power_factor(config.power_factor_weighting));
                let drop = line_drop(line, current_a, power_factor, parent.voltage_kv);

                let edge = edge_state(line, current_a, drop.percent);
                if edge.status == EdgeStatus::Overload {
                    issues.push(AnalysisIssue::Overload {
                        edge: network.edges[link.edge].id.clone(),
                        conductor: line.conductor.clone(),
                        current_a,
                        ampacity_a: edge.ampacity_a.unwrap_or_default(),
                        loading_percent: edge.loading_percent.unwrap_or_default(),
                    });
                }
                edges[link.edge] = Some(edge);

                (
                    parent.voltage_kv - drop.percent / 100.0 * line.level_kv,
                    parent.angle_deg + drop.angle_deg,
                    parent.fault_impedance + line.impedance,
                    parent.distance_m + line.length_m,
                )
            }
        };

        // A transformer refers the upstream impedance to its secondary and
        // carries the primary per-unit voltage across, scaled by the tap.
        let (voltage_kv, fault_impedance) = match &params.transformer {
            Some(tx) => {
                let primary_pu = if tx.primary_kv > 0.0 {
                    voltage_kv / tx.primary_kv
                } else {
                    1.0
                };
                (
                    primary_pu * tx.secondary_kv * tx.tap_factor,
                    upstream_z.referred(tx.secondary_kv, tx.primary_kv) + tx.impedance,
                )
            }
            None => (voltage_kv, upstream_z),
        };

        let name = topology.label(index);
        let voltage_pu = voltage_kv / params.nominal_kv;
        if voltage_pu < config.voltage_min_pu {
            issues.push(AnalysisIssue::UnderVoltage {
                node: name.to_owned(),
                voltage_pu,
                limit_pu: config.voltage_min_pu,
            });
        } else if voltage_pu > config.voltage_max_pu {
            issues.push(AnalysisIssue::OverVoltage {
                node: name.to_owned(),
                voltage_pu,
                limit_pu: config.voltage_max_pu,
            });
        }

        let fault_current_ka = fault_current_ka(voltage_kv, &fault_impedance);
        if fault_current_ka.is_none() {
            issues.push(AnalysisIssue::UnboundedFault {
                node: name.to_owned(),
            });
        }

        nodes[index] = Some(NodeState {
            voltage_kv,
            nominal_kv: params.nominal_kv,
            voltage_pu,
            angle_deg,
            fault_impedance,
            fault_current_ka,
            distance_m,
            load_kva,
        });
    }

    Propagation {
        nodes,
        edges,
        issues,
    }
}

/// Symmetrical three-phase bolted fault current in kA. `None` when the fault
/// path has no impedance; an infinite impedance carries no fault current.
pub fn fault_current_ka(voltage_kv: f64, impedance: &Impedance) -> Option<f64> {
    let magnitude = impedance.magnitude();
    if magnitude.is_infinite() {
        return Some(0.0);
    }
    if !(magnitude > 0.0) {
        return None;
    }
    Some(voltage_kv * 1000.0 / SQRT_3 / magnitude / 1000.0)
}

fn edge_state(line: &LineParameters, current_a: f64, voltage_drop_percent: f64) -> EdgeState {
    let loading_percent = line
        .ampacity_a
        .filter(|a| *a > 0.0)
        .map(|a| current_a / a * 100.0);
    let status = match line.ampacity_a {
        Some(ampacity) if current_a > ampacity => EdgeStatus::Overload,
        _ => EdgeStatus::Normal,
    };
    EdgeState {
        voltage_drop_percent,
        current_a,
        ampacity_a: line.ampacity_a,
        loading_percent,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(r: f64, x: f64, level_kv: f64) -> LineParameters {
        LineParameters {
            impedance: Impedance::new(r, x),
            ampacity_a: Some(100.0),
            conductor: "Test".into(),
            level_kv,
            length_m: 1000.0,
        }
    }

    #[test]
    fn in_phase_drop_matches_r_cos_plus_x_sin() {
        let line = line(0.5, 0.4, 11.0);
        let drop = line_drop(&line, 50.0, 0.8, 11.0);
        let phase_v = 11_000.0 / SQRT_3;
        let expected = 100.0 * 50.0 * (0.5 * 0.8 + 0.4 * 0.6) / phase_v;
        assert!((drop.percent - expected).abs() < 1e-9);
        assert!(drop.angle_deg < 0.0);
    }

    #[test]
    fn unity_power_factor_on_resistive_line_has_no_quadrature_drop() {
        let drop = line_drop(&line(1.0, 0.0, 0.4), 10.0, 1.0, 0.4);
        assert!(drop.angle_deg.abs() < 1e-12);
        assert!(drop.percent > 0.0);
    }

    #[test]
    fn zero_impedance_has_no_fault_bound() {
        assert_eq!(fault_current_ka(11.0, &Impedance::ZERO), None);
        let ka = fault_current_ka(11.0, &Impedance::new(0.0, 11.0 / SQRT_3)).unwrap();
        assert!((ka - 1.0).abs() < 1e-9);
    }

    #[test]
    fn infinite_impedance_carries_no_fault_current() {
        let open = Impedance::new(0.0, f64::INFINITY);
        assert_eq!(fault_current_ka(11.0, &open), Some(0.0));
        let undefined = Impedance::new(f64::NAN, 0.0);
        assert_eq!(fault_current_ka(11.0, &undefined), None);
    }

    #[test]
    fn overload_requires_current_above_ampacity() {
        let line = line(0.1, 0.1, 11.0);
        assert_eq!(edge_state(&line, 100.0, 0.0).status, EdgeStatus::Normal);
        let over = edge_state(&line, 121.0, 0.0);
        assert_eq!(over.status, EdgeStatus::Overload);
        assert!((over.loading_percent.unwrap() - 121.0).abs() < 1e-9);

        let unresolved = LineParameters {
            ampacity_a: None,
            ..line
        };
        let state = edge_state(&unresolved, 1e6, 0.0);
        assert_eq!(state.status, EdgeStatus::Normal);
        assert_eq!(state.loading_percent, None);
    }
}
