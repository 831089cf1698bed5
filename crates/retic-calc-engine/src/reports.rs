//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Result contract, summary text and report export."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    errors::{AnalysisIssue, Result},
    model::{Edge, Network},
    propagation::{EdgeStatus, Propagation},
    topology::Topology,
};

/// Analysis output handed to the results panel. Field names are part of the
/// rendering contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub voltage_profile: Vec<VoltageProfilePoint>,
    pub fault_currents: Vec<FaultCurrent>,
    pub edge_analysis: Vec<EdgeAnalysis>,
    pub node_results: IndexMap<String, NodeResult>,
    pub alerts: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoltageProfilePoint {
    /// Cumulative line length from the source, in metres.
    pub distance: f64,
    /// Per-unit voltage.
    pub voltage: f64,
    pub node_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultType {
    #[serde(rename = "3-Phase")]
    ThreePhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultCurrent {
    pub node_name: String,
    #[serde(rename = "currentKA")]
    pub current_ka: Option<f64>,
    #[serde(rename = "type")]
    pub fault_type: FaultType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeAnalysis {
    pub edge_id: String,
    /// Percent of the edge's nominal voltage.
    pub voltage_drop: f64,
    /// Amperes.
    pub current: f64,
    pub status: EdgeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub voltage_pu: f64,
    pub voltage_angle: f64,
    #[serde(rename = "loadKVA")]
    pub load_kva: f64,
}

impl SimulationResult {
    /// Result for an input that could not be analysed at all.
    pub fn empty(issue: &AnalysisIssue) -> Self {
        Self {
            alerts: vec![issue.to_string()],
            summary: format!("No analysis performed: {issue}."),
            ..Self::default()
        }
    }

    /// Echo each analysed edge's voltage drop onto the editor's edge list.
    /// Edges that were not analysed lose any stale value.
    pub fn apply_voltage_drops(&self, edges: &mut [Edge]) {
        let drops: HashMap<&str, f64> = self
            .edge_analysis
            .iter()
            .map(|e| (e.edge_id.as_str(), e.voltage_drop))
            .collect();
        for edge in edges {
            edge.voltage_drop = drops.get(edge.id.as_str()).copied();
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// A result together with the structured issues behind its alert strings.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub result: SimulationResult,
    pub issues: Vec<AnalysisIssue>,
}

impl AnalysisReport {
    pub fn exporter(&self) -> ReportExporter<'_> {
        ReportExporter::new(&self.result)
    }
}

/// Map propagated state into the result contract, in tree pre-order.
pub fn assemble(
    network: &Network,
    topology: &Topology,
    propagation: &Propagation,
    issues: Vec<AnalysisIssue>,
) -> AnalysisReport {
    if let Some(fatal) = issues.iter().find(|i| i.is_fatal()) {
        return AnalysisReport {
            result: SimulationResult::empty(fatal),
            issues,
        };
    }

    let mut result = SimulationResult::default();
    let mut lowest: Option<(String, f64)> = None;

    for index in topology.preorder() {
        let Some(state) = propagation.node(index) else {
            continue;
        };
        let label = topology.label(index).to_owned();

        if let Some(link) = topology.parent(index) {
            if let Some(edge) = propagation.edge(link.edge) {
                result.edge_analysis.push(EdgeAnalysis {
                    edge_id: network.edges[link.edge].id.clone(),
                    voltage_drop: edge.voltage_drop_percent,
                    current: edge.current_a,
                    status: edge.status,
                });
            }
        }

        result.voltage_profile.push(VoltageProfilePoint {
            distance: state.distance_m,
            voltage: state.voltage_pu,
            node_name: label.clone(),
        });
        result.fault_currents.push(FaultCurrent {
            node_name: label.clone(),
            current_ka: state.fault_current_ka,
            fault_type: FaultType::ThreePhase,
        });

        if lowest
            .as_ref()
            .map_or(true, |(_, pu)| state.voltage_pu < *pu)
        {
            lowest = Some((label.clone(), state.voltage_pu));
        }

        result.node_results.insert(
            label,
            NodeResult {
                voltage_pu: state.voltage_pu,
                voltage_angle: state.angle_deg,
                load_kva: state.load_kva,
            },
        );
    }

    result.alerts = issues.iter().map(ToString::to_string).collect();
    result.summary = compose_summary(&issues, lowest.as_ref().map(|(n, v)| (n.as_str(), *v)));

    AnalysisReport { result, issues }
}

/// One-line verdict built from violation counts and worst-case figures.
pub fn compose_summary(issues: &[AnalysisIssue], lowest: Option<(&str, f64)>) -> String {
    let violations = issues.iter().filter(|i| i.is_violation()).count();
    let overloads: Vec<String> = issues
        .iter()
        .filter_map(|issue| match issue {
            AnalysisIssue::Overload {
                conductor,
                loading_percent,
                ..
            } => Some(format!("{conductor} @ {loading_percent:.0}%")),
            _ => None,
        })
        .collect();

    let voltage = match lowest {
        Some((node, pu)) => format!("lowest voltage {pu:.2} p.u. at {node}"),
        None => "no node voltages computed".to_owned(),
    };
    let thermal = if overloads.is_empty() {
        "all conductors within rating".to_owned()
    } else {
        format!(
            "{} conductor(s) overloaded ({})",
            overloads.len(),
            overloads.join(", ")
        )
    };

    if violations == 0 {
        format!("No violations found: {voltage}; {thermal}.")
    } else {
        format!("{violations} violation(s) found: {voltage}; {thermal}.")
    }
}

#[derive(Debug)]
pub struct ReportExporter<'a> {
    result: &'a SimulationResult,
}

impl<'a> ReportExporter<'a> {
    pub fn new(result: &'a SimulationResult) -> Self {
        Self { result }
    }

    /// Write `analysis.json` into `output_dir` and return its path.
    pub fn export(&self, network_name: &str, output_dir: &Path) -> Result<PathBuf> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }

        let generated_at = Utc::now().to_rfc3339();
        let envelope = ReportEnvelope {
            generated_at: &generated_at,
            network_name,
            schema: analysis_schema(),
            data: self.result,
        };

        let path = output_dir.join("analysis.json");
        fs::write(&path, serde_json::to_string_pretty(&envelope)?)?;
        info!("Analysis report exported to {}", path.display());
        Ok(path)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportEnvelope<'a, T: Serialize> {
    generated_at: &'a str,
    network_name: &'a str,
    schema: serde_json::Value,
    data: &'a T,
}

fn analysis_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "SimulationResult",
        "type": "object",
        "properties": {
            "voltageProfile": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "distance": {"type": "number"},
                        "voltage": {"type": "number"},
                        "nodeName": {"type": "string"}
                    },
                    "required": ["distance", "voltage", "nodeName"]
                }
            },
            "faultCurrents": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "nodeName": {"type": "string"},
                        "currentKA": {"type": ["number", "null"]},
                        "type": {"const": "3-Phase"}
                    },
                    "required": ["nodeName", "currentKA", "type"]
                }
            },
            "edgeAnalysis": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "edgeId": {"type": "string"},
                        "voltageDrop": {"type": "number"},
                        "current": {"type": "number"},
                        "status": {"enum": ["NORMAL", "OVERLOAD"]}
                    },
                    "required": ["edgeId", "voltageDrop", "current", "status"]
                }
            },
            "nodeResults": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "properties": {
                        "voltagePu": {"type": "number"},
                        "voltageAngle": {"type": "number"},
                        "loadKVA": {"type": "number"}
                    },
                    "required": ["voltagePu", "voltageAngle", "loadKVA"]
                }
            },
            "alerts": {"type": "array", "items": {"type": "string"}},
            "summary": {"type": "string"}
        },
        "required": [
            "voltageProfile",
            "faultCurrents",
            "edgeAnalysis",
            "nodeResults",
            "alerts",
            "summary"
        ]
    })
}
