//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Network, editor document and library file ingest."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use std::{fs, path::Path};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    errors::{CalcEngineError, Result},
    library::Libraries,
    model::{Edge, LoadData, Network, Node, NodeKind, SourceData, TransformerData},
};

/// Diagram as saved by the editor: loosely-typed `data` bags plus canvas coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EditorDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<EditorNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditorNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: EditorNodeType,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub data: NodeData,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditorNodeType {
    Source,
    Transformer,
    Busbar,
    Load,
    Text,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub voltage: f64,
    pub rating: Option<f64>,
    #[serde(rename = "faultLevel3Ph")]
    pub fault_level_3ph: Option<f64>,
    pub xr_ratio: Option<f64>,
    pub z_percent: Option<f64>,
    pub tap_position: Option<f64>,
    pub vector_group: Option<String>,
    pub power_factor: Option<f64>,
    pub load_scale_factor: Option<f64>,
}

impl From<EditorNode> for Node {
    fn from(node: EditorNode) -> Self {
        let data = node.data;
        let kind = match node.node_type {
            EditorNodeType::Source => NodeKind::Source(SourceData {
                fault_level_ka: data.fault_level_3ph,
                xr_ratio: data.xr_ratio,
            }),
            EditorNodeType::Busbar => NodeKind::Busbar,
            EditorNodeType::Transformer => NodeKind::Transformer(TransformerData {
                rating_kva: data.rating,
                z_percent: data.z_percent,
                // Float-to-int `as` saturates and maps NaN to 0.
                tap_position: data.tap_position.map_or(0, |tap| tap.round() as i32),
                vector_group: data.vector_group,
            }),
            EditorNodeType::Load => NodeKind::Load(LoadData {
                rating_kva: data.rating.unwrap_or(0.0),
                power_factor: data.power_factor,
                scale_factor: data.load_scale_factor,
            }),
            EditorNodeType::Text => NodeKind::Text,
        };
        Node {
            id: node.id,
            name: data.name,
            nominal_kv: data.voltage,
            kind,
        }
    }
}

impl From<EditorDocument> for Network {
    fn from(document: EditorDocument) -> Self {
        Network {
            name: document.name,
            nodes: document.nodes.into_iter().map(Node::from).collect(),
            edges: document.edges,
        }
    }
}

/// Parse JSON when the text opens with `{`, YAML otherwise.
pub fn parse_document<T: DeserializeOwned>(data: &str) -> Result<T> {
    if data.trim_start().starts_with('{') {
        Ok(serde_json::from_str(data)?)
    } else {
        serde_yaml::from_str(data).map_err(CalcEngineError::YamlSerializationFailed)
    }
}

/// Read a tagged network from JSON or YAML.
pub fn load_network_from_file(path: impl AsRef<Path>) -> Result<Network> {
    let data = fs::read_to_string(path)?;
    parse_document(&data)
}

/// Read an editor save file from JSON or YAML and convert it into a network.
pub fn load_editor_document_from_file(path: impl AsRef<Path>) -> Result<Network> {
    let data = fs::read_to_string(path)?;
    let document: EditorDocument = parse_document(&data)?;
    Ok(document.into())
}

/// Read a replacement conductor/transformer table; the format follows the extension.
pub fn load_libraries_from_file(path: impl AsRef<Path>) -> Result<Libraries> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let libraries: Libraries = match extension.as_deref() {
        Some("toml") => toml::from_str(&data)?,
        Some("json") => serde_json::from_str(&data)?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&data)?,
        _ => return Err(CalcEngineError::UnsupportedFormat(path.to_path_buf())),
    };
    libraries.validated()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDITOR_JSON: &str = r#"{
        "nodes": [
            {"id": "n1", "type": "SOURCE", "x": 100, "y": 300,
             "data": {"name": "Main_Source", "voltage": 132, "faultLevel3Ph": 20, "xrRatio": 10}},
            {"id": "n5", "type": "TRANSFORMER", "x": 400, "y": 300,
             "data": {"name": "TX_20MVA", "voltage": 11, "rating": 20000, "zPercent": 11.25, "tapPosition": 2, "vectorGroup": "Dyn11"}},
            {"id": "n8", "type": "LOAD", "x": 700, "y": 200,
             "data": {"name": "Load_A", "voltage": 11, "rating": 3000, "powerFactor": 0.85}},
            {"id": "t1", "type": "TEXT", "x": 0, "y": 0, "data": {"name": "Substation", "voltage": 0}}
        ],
        "edges": [
            {"id": "e1", "from": "n1", "to": "n5", "length": 50, "conductorType": "Wolf", "voltageDrop": 0.1}
        ]
    }"#;

    #[test]
    fn editor_document_converts_to_tagged_nodes() {
        let document: EditorDocument = serde_json::from_str(EDITOR_JSON).unwrap();
        let network = Network::from(document);

        assert_eq!(network.nodes.len(), 4);
        assert_eq!(
            network.nodes[0].kind,
            NodeKind::Source(SourceData {
                fault_level_ka: Some(20.0),
                xr_ratio: Some(10.0),
            })
        );
        match &network.nodes[1].kind {
            NodeKind::Transformer(tx) => {
                assert_eq!(tx.rating_kva, Some(20_000.0));
                assert_eq!(tx.tap_position, 2);
                assert_eq!(tx.vector_group.as_deref(), Some("Dyn11"));
            }
            other => panic!("expected transformer, got {other:?}"),
        }
        assert!(network.nodes[3].is_annotation());
        assert_eq!(network.edges[0].voltage_drop, Some(0.1));
    }

    #[test]
    fn yaml_network_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeder.yaml");
        fs::write(
            &path,
            r#"
name: Feeder
nodes:
  - id: s
    name: Grid
    voltage: 11
    type: SOURCE
  - id: l
    name: Shop
    voltage: 11
    type: LOAD
    rating: 50
edges:
  - id: e1
    from: s
    to: l
    length: 120
    conductorType: Mink
"#,
        )
        .unwrap();
        let network = load_network_from_file(&path).unwrap();
        assert_eq!(network.display_name(), "Feeder");
        assert!(matches!(
            network.nodes[1].kind,
            NodeKind::Load(LoadData { rating_kva, .. }) if rating_kva == 50.0
        ));
    }

    #[test]
    fn editor_file_loads_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagram.json");
        fs::write(&path, EDITOR_JSON).unwrap();
        let network = load_editor_document_from_file(&path).unwrap();
        assert_eq!(network.nodes[2].name, "Load_A");
    }

    #[test]
    fn library_file_format_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("regional.toml");
        fs::write(
            &toml_path,
            r#"
[conductors.Oak]
resistance_ohm_per_km = 0.2
reactance_ohm_per_km = 0.3
ampacity_a = 300.0
category = "AAAC"

[[transformers]]
rating_kva = 500.0
z_percent = 4.75
"#,
        )
        .unwrap();
        let libraries = load_libraries_from_file(&toml_path).unwrap();
        assert_eq!(libraries.conductor("Oak").unwrap().ampacity_a, 300.0);

        let bad = dir.path().join("regional.csv");
        fs::write(&bad, "code,r,x").unwrap();
        assert!(matches!(
            load_libraries_from_file(&bad),
            Err(CalcEngineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn empty_library_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, r#"{"conductors": {}, "transformers": []}"#).unwrap();
        assert!(matches!(
            Libraries::from_file(&path),
            Err(CalcEngineError::InvalidLibrary(_))
        ));
    }
}
