//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "I/O errors and the analysis alert taxonomy."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CalcEngineError>;

/// Failures at the file/serialization boundary. The analysis itself never fails.
#[derive(Debug, Error)]
pub enum CalcEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("yaml serialization error: {0}")]
    YamlSerializationFailed(#[from] serde_yaml::Error),
    #[error("toml parse error: {0}")]
    TomlParseFailed(#[from] toml::de::Error),
    #[error("unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("invalid library: {0}")]
    InvalidLibrary(String),
}

/// Alert category, following the structural/data/range taxonomy plus the
/// electrical violations raised during propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueClass {
    Structural,
    Data,
    Range,
    Voltage,
    Thermal,
    Fault,
}

/// Something the engine noticed while analysing a network. The `Display`
/// rendering is the alert string handed to the results panel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisIssue {
    #[error("Network is empty: no analysable nodes")]
    EmptyNetwork,
    #[error("No source node: network cannot be energised")]
    NoSource,
    #[error(
        "Multiple sources ({}) feed one connected network; {excluded} node(s) excluded from analysis",
        .sources.join(", ")
    )]
    MultipleRoots { sources: Vec<String>, excluded: usize },
    #[error("Cycle: edge {edge} would close a loop between {from} and {to}; edge rejected")]
    Cycle {
        edge: String,
        from: String,
        to: String,
    },
    #[error("Island: {} not connected to any source; excluded from analysis", .nodes.join(", "))]
    Island { nodes: Vec<String> },
    #[error("Source {node} has no valid nominal voltage; its network is excluded from analysis")]
    InvalidSourceVoltage { node: String },

    #[error("Duplicate node id {id}; later definition ignored")]
    DuplicateNode { id: String },
    #[error("Edge {edge} references unknown node {node}; edge skipped")]
    DanglingEdge { edge: String, node: String },
    #[error("Edge {edge} connects to annotation {node}; edge skipped")]
    AnnotationEdge { edge: String, node: String },
    #[error("Edge {edge}: unknown conductor '{code}', using {fallback}")]
    UnknownConductor {
        edge: String,
        code: String,
        fallback: String,
    },
    #[error("Edge {edge}: conductor '{code}' unresolved and no fallback available; modelled as zero impedance")]
    UnresolvedConductor { edge: String, code: String },
    #[error("Transformer {node}: rating {rating_kva} kVA not in table, using {used_kva} kVA entry ({z_percent}%Z)")]
    TransformerRatingSubstituted {
        node: String,
        rating_kva: f64,
        used_kva: f64,
        z_percent: f64,
    },
    #[error("Transformer {node}: no valid rating; impedance taken as zero")]
    TransformerRatingMissing { node: String },
    #[error("Node {node}: nominal {declared_kv} kV differs from supply level {level_kv} kV; using {level_kv} kV")]
    VoltageLevelMismatch {
        node: String,
        declared_kv: f64,
        level_kv: f64,
    },
    #[error("Node {node}: invalid nominal voltage; using supply level {level_kv} kV")]
    InvalidNominalVoltage { node: String, level_kv: f64 },

    #[error("Transformer {node}: tap {requested} outside [{min}, {max}], clamped to {applied}")]
    TapClamped {
        node: String,
        requested: i32,
        applied: i32,
        min: i32,
        max: i32,
    },
    #[error("Load {node}: power factor {requested} outside (0, 1], using {applied}")]
    PowerFactorClamped {
        node: String,
        requested: f64,
        applied: f64,
    },
    #[error("Node {node}: {field} {requested} invalid, using 0")]
    NegativeValue {
        node: String,
        field: &'static str,
        requested: f64,
    },
    #[error("Edge {edge}: length {requested} m invalid, using 0 m")]
    LengthClamped { edge: String, requested: f64 },
    #[error("Source {node}: fault level {requested} kA invalid; treated as infinite bus")]
    FaultLevelInvalid { node: String, requested: f64 },
    #[error("Source {node}: X/R ratio {requested} invalid, using {applied}")]
    XrRatioInvalid {
        node: String,
        requested: f64,
        applied: f64,
    },
    #[error("Transformer {node}: impedance {requested}% invalid; using library value")]
    ImpedancePercentInvalid { node: String, requested: f64 },

    #[error("Node {node} voltage {voltage_pu:.3} p.u. under {limit_pu:.2} p.u. limit")]
    UnderVoltage {
        node: String,
        voltage_pu: f64,
        limit_pu: f64,
    },
    #[error("Node {node} voltage {voltage_pu:.3} p.u. over {limit_pu:.2} p.u. limit")]
    OverVoltage {
        node: String,
        voltage_pu: f64,
        limit_pu: f64,
    },
    #[error("Cable {edge} ({conductor}) overloaded {loading_percent:.0}%: {current_a:.1} A on {ampacity_a:.0} A rating")]
    Overload {
        edge: String,
        conductor: String,
        current_a: f64,
        ampacity_a: f64,
        loading_percent: f64,
    },
    #[error("Node {node}: fault current unbounded (zero upstream impedance)")]
    UnboundedFault { node: String },
}

impl AnalysisIssue {
    pub fn class(&self) -> IssueClass {
        match self {
            AnalysisIssue::EmptyNetwork
            | AnalysisIssue::NoSource
            | AnalysisIssue::MultipleRoots { .. }
            | AnalysisIssue::Cycle { .. }
            | AnalysisIssue::Island { .. }
            | AnalysisIssue::InvalidSourceVoltage { .. } => IssueClass::Structural,
            AnalysisIssue::DuplicateNode { .. }
            | AnalysisIssue::DanglingEdge { .. }
            | AnalysisIssue::AnnotationEdge { .. }
            | AnalysisIssue::UnknownConductor { .. }
            | AnalysisIssue::UnresolvedConductor { .. }
            | AnalysisIssue::TransformerRatingSubstituted { .. }
            | AnalysisIssue::TransformerRatingMissing { .. }
            | AnalysisIssue::VoltageLevelMismatch { .. }
            | AnalysisIssue::InvalidNominalVoltage { .. } => IssueClass::Data,
            AnalysisIssue::TapClamped { .. }
            | AnalysisIssue::PowerFactorClamped { .. }
            | AnalysisIssue::NegativeValue { .. }
            | AnalysisIssue::LengthClamped { .. }
            | AnalysisIssue::FaultLevelInvalid { .. }
            | AnalysisIssue::XrRatioInvalid { .. }
            | AnalysisIssue::ImpedancePercentInvalid { .. } => IssueClass::Range,
            AnalysisIssue::UnderVoltage { .. } | AnalysisIssue::OverVoltage { .. } => {
                IssueClass::Voltage
            }
            AnalysisIssue::Overload { .. } => IssueClass::Thermal,
            AnalysisIssue::UnboundedFault { .. } => IssueClass::Fault,
        }
    }

    /// Voltage and thermal findings count as violations in the summary.
    pub fn is_violation(&self) -> bool {
        matches!(self.class(), IssueClass::Voltage | IssueClass::Thermal)
    }

    /// Issues after which nothing numeric can be produced.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AnalysisIssue::EmptyNetwork | AnalysisIssue::NoSource)
    }

    /// Node the alert is about, as labelled in the results.
    pub fn node(&self) -> Option<&str> {
        match self {
            AnalysisIssue::InvalidSourceVoltage { node }
            | AnalysisIssue::DanglingEdge { node, .. }
            | AnalysisIssue::AnnotationEdge { node, .. }
            | AnalysisIssue::TransformerRatingSubstituted { node, .. }
            | AnalysisIssue::TransformerRatingMissing { node }
            | AnalysisIssue::VoltageLevelMismatch { node, .. }
            | AnalysisIssue::InvalidNominalVoltage { node, .. }
            | AnalysisIssue::TapClamped { node, .. }
            | AnalysisIssue::PowerFactorClamped { node, .. }
            | AnalysisIssue::NegativeValue { node, .. }
            | AnalysisIssue::FaultLevelInvalid { node, .. }
            | AnalysisIssue::XrRatioInvalid { node, .. }
            | AnalysisIssue::ImpedancePercentInvalid { node, .. }
            | AnalysisIssue::UnderVoltage { node, .. }
            | AnalysisIssue::OverVoltage { node, .. }
            | AnalysisIssue::UnboundedFault { node } => Some(node.as_str()),
            AnalysisIssue::DuplicateNode { id } => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn edge(&self) -> Option<&str> {
        match self {
            AnalysisIssue::Cycle { edge, .. }
            | AnalysisIssue::DanglingEdge { edge, .. }
            | AnalysisIssue::AnnotationEdge { edge, .. }
            | AnalysisIssue::UnknownConductor { edge, .. }
            | AnalysisIssue::UnresolvedConductor { edge, .. }
            | AnalysisIssue::LengthClamped { edge, .. }
            | AnalysisIssue::Overload { edge, .. } => Some(edge.as_str()),
            _ => None,
        }
    }
}
