//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Radial network data model and complex impedance arithmetic."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use std::{collections::HashMap, ops::Add};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Node/edge collection as drawn in the diagram editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Network {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("network")
    }

    /// Reporting label per node, indexed like `nodes`. A name shared by more
    /// than one electrical node becomes `name (id)`.
    pub fn node_labels(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for node in self.nodes.iter().filter(|n| !n.is_annotation()) {
            *counts.entry(node.name.as_str()).or_default() += 1;
        }
        self.nodes
            .iter()
            .map(|node| {
                if counts.get(node.name.as_str()).copied().unwrap_or(0) > 1 {
                    format!("{} ({})", node.name, node.id)
                } else {
                    node.name.clone()
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    /// Nominal line-to-line voltage in kV. For a transformer this is the secondary side.
    #[serde(rename = "voltage", default)]
    pub nominal_kv: f64,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn source(
        id: impl Into<String>,
        name: impl Into<String>,
        nominal_kv: f64,
        fault_level_ka: Option<f64>,
        xr_ratio: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nominal_kv,
            kind: NodeKind::Source(SourceData {
                fault_level_ka,
                xr_ratio,
            }),
        }
    }

    pub fn busbar(id: impl Into<String>, name: impl Into<String>, nominal_kv: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nominal_kv,
            kind: NodeKind::Busbar,
        }
    }

    pub fn transformer(
        id: impl Into<String>,
        name: impl Into<String>,
        secondary_kv: f64,
        rating_kva: f64,
        z_percent: Option<f64>,
        tap_position: i32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nominal_kv: secondary_kv,
            kind: NodeKind::Transformer(TransformerData {
                rating_kva: Some(rating_kva),
                z_percent,
                tap_position,
                vector_group: None,
            }),
        }
    }

    pub fn load(
        id: impl Into<String>,
        name: impl Into<String>,
        nominal_kv: f64,
        rating_kva: f64,
        power_factor: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nominal_kv,
            kind: NodeKind::Load(LoadData {
                rating_kva,
                power_factor,
                scale_factor: None,
            }),
        }
    }

    pub fn annotation(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: text.into(),
            nominal_kv: 0.0,
            kind: NodeKind::Text,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.kind, NodeKind::Source(_))
    }

    /// Annotation nodes carry no electrical meaning and are skipped by the engine.
    pub fn is_annotation(&self) -> bool {
        matches!(self.kind, NodeKind::Text)
    }
}

/// One shape per node kind, each carrying exactly the fields that kind uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Source(SourceData),
    Busbar,
    Transformer(TransformerData),
    Load(LoadData),
    Text,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceData {
    /// Three-phase fault level; absent means an infinite bus.
    #[serde(
        default,
        rename = "faultLevel3Ph",
        skip_serializing_if = "Option::is_none"
    )]
    pub fault_level_ka: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xr_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransformerData {
    #[serde(default, rename = "rating", skip_serializing_if = "Option::is_none")]
    pub rating_kva: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_percent: Option<f64>,
    #[serde(default)]
    pub tap_position: i32,
    /// Display metadata only; the engine applies no phase shift.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_group: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadData {
    #[serde(default, rename = "rating")]
    pub rating_kva: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_factor: Option<f64>,
    #[serde(
        default,
        rename = "loadScaleFactor",
        skip_serializing_if = "Option::is_none"
    )]
    pub scale_factor: Option<f64>,
}

/// Line segment between two nodes. Undirected until the topology orients it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "length")]
    pub length_m: f64,
    #[serde(rename = "conductorType")]
    pub conductor: String,
    /// Echo of the last analysed voltage drop, written back for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_drop: Option<f64>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        length_m: f64,
        conductor: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            length_m,
            conductor: conductor.into(),
            voltage_drop: None,
        }
    }
}

/// Series impedance in ohms.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Impedance {
    pub resistance_ohm: f64,
    pub reactance_ohm: f64,
}

impl Impedance {
    pub const ZERO: Impedance = Impedance {
        resistance_ohm: 0.0,
        reactance_ohm: 0.0,
    };

    pub fn new(resistance_ohm: f64, reactance_ohm: f64) -> Self {
        Self {
            resistance_ohm,
            reactance_ohm,
        }
    }

    /// Split a magnitude into `R` and `X` using an X/R ratio.
    pub fn from_magnitude(magnitude_ohm: f64, xr_ratio: f64) -> Self {
        let resistance_ohm = magnitude_ohm / (1.0 + xr_ratio * xr_ratio).sqrt();
        Self {
            resistance_ohm,
            reactance_ohm: resistance_ohm * xr_ratio,
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.resistance_ohm.hypot(self.reactance_ohm)
    }

    pub fn scale(&self, factor: f64) -> Impedance {
        Impedance {
            resistance_ohm: self.resistance_ohm * factor,
            reactance_ohm: self.reactance_ohm * factor,
        }
    }

    /// Refer an impedance across a voltage boundary: `Z · (V_new / V_old)²`.
    pub fn referred(&self, v_new_kv: f64, v_old_kv: f64) -> Impedance {
        if v_old_kv <= 0.0 {
            return *self;
        }
        let ratio = v_new_kv / v_old_kv;
        self.scale(ratio * ratio)
    }

    pub fn as_complex(&self) -> Complex64 {
        Complex64::new(self.resistance_ohm, self.reactance_ohm)
    }
}

impl Add for Impedance {
    type Output = Impedance;

    fn add(self, other: Impedance) -> Impedance {
        Impedance {
            resistance_ohm: self.resistance_ohm + other.resistance_ohm,
            reactance_ohm: self.reactance_ohm + other.reactance_ohm,
        }
    }
}
