//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Local impedance, voltage level and load data per tree element."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
//! Resolves every analysed node and tree edge into local electrical data.
//!
//! Impedances are expressed in ohms at the element's own voltage level. Nothing
//! is referred across transformers here; that happens during propagation.

use retic_common::{AnalysisConfig, TransformerImpedanceModel};

use crate::{
    errors::AnalysisIssue,
    library::Libraries,
    model::{Impedance, LoadData, Network, Node, NodeKind, SourceData, TransformerData},
    topology::Topology,
};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Relative tolerance when comparing a declared nominal voltage with its supply level.
const LEVEL_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct TransformerParameters {
    pub impedance: Impedance,
    pub primary_kv: f64,
    pub secondary_kv: f64,
    pub tap: i32,
    pub tap_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadParameters {
    pub kva: f64,
    pub power_factor: f64,
}

impl LoadParameters {
    pub fn active_kw(&self) -> f64 {
        self.kva * self.power_factor
    }

    pub fn reactive_kvar(&self) -> f64 {
        self.kva * (1.0 - self.power_factor * self.power_factor).max(0.0).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeParameters {
    /// Level of the edge feeding the node (the source's own level at a root).
    pub level_kv: f64,
    /// Base for the node's per-unit voltage and the level of its outgoing edges.
    pub nominal_kv: f64,
    pub source_impedance: Option<Impedance>,
    pub transformer: Option<TransformerParameters>,
    pub load: Option<LoadParameters>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineParameters {
    pub impedance: Impedance,
    /// `None` when the conductor could not be resolved at all.
    pub ampacity_a: Option<f64>,
    pub conductor: String,
    pub level_kv: f64,
    pub length_m: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedNetwork {
    pub nodes: Vec<Option<NodeParameters>>,
    pub lines: Vec<Option<LineParameters>>,
    pub issues: Vec<AnalysisIssue>,
}

impl ResolvedNetwork {
    pub fn node(&self, index: usize) -> Option<&NodeParameters> {
        self.nodes.get(index).and_then(Option::as_ref)
    }

    pub fn line(&self, index: usize) -> Option<&LineParameters> {
        self.lines.get(index).and_then(Option::as_ref)
    }
}

pub fn resolve(
    network: &Network,
    topology: &Topology,
    libraries: &Libraries,
    config: &AnalysisConfig,
) -> ResolvedNetwork {
    let mut resolver = Resolver {
        libraries,
        config,
        issues: Vec::new(),
    };
    let mut nodes: Vec<Option<NodeParameters>> = vec![None; network.nodes.len()];
    let mut lines: Vec<Option<LineParameters>> = vec![None; network.edges.len()];

    for index in topology.preorder() {
        let node = &network.nodes[index];
        let supply_kv = match topology.parent(index) {
            None => node.nominal_kv,
            Some(link) => {
                let Some(upstream) = nodes[link.upstream].as_ref() else {
                    continue;
                };
                let level_kv = upstream.nominal_kv;
                lines[link.edge] = Some(resolver.line(network, link.edge, level_kv));
                level_kv
            }
        };
        let is_root = topology.parent(index).is_none();
        nodes[index] = Some(resolver.node(node, topology.label(index), supply_kv, is_root));
    }

    ResolvedNetwork {
        nodes,
        lines,
        issues: resolver.issues,
    }
}

struct Resolver<'a> {
    libraries: &'a Libraries,
    config: &'a AnalysisConfig,
    issues: Vec<AnalysisIssue>,
}

impl Resolver<'_> {
    fn node(
        &mut self,
        node: &Node,
        label: &str,
        supply_kv: f64,
        is_root: bool,
    ) -> NodeParameters {
        let mut parameters = NodeParameters {
            level_kv: supply_kv,
            nominal_kv: supply_kv,
            source_impedance: None,
            transformer: None,
            load: None,
        };

        match &node.kind {
            NodeKind::Transformer(data) => {
                let transformer = self.transformer(node, label, data, supply_kv);
                parameters.nominal_kv = transformer.secondary_kv;
                parameters.transformer = Some(transformer);
                return parameters;
            }
            NodeKind::Source(data) if is_root => {
                parameters.source_impedance = Some(self.source(label, data, supply_kv));
            }
            NodeKind::Load(data) => {
                parameters.load = Some(self.load(label, data));
            }
            _ => {}
        }

        if !is_root {
            self.check_level(node, label, supply_kv);
        }
        parameters
    }

    fn check_level(&mut self, node: &Node, label: &str, level_kv: f64) {
        let declared = node.nominal_kv;
        if !(declared.is_finite() && declared > 0.0) {
            self.issues.push(AnalysisIssue::InvalidNominalVoltage {
                node: label.to_owned(),
                level_kv,
            });
        } else if (declared - level_kv).abs() > LEVEL_TOLERANCE * level_kv {
            self.issues.push(AnalysisIssue::VoltageLevelMismatch {
                node: label.to_owned(),
                declared_kv: declared,
                level_kv,
            });
        }
    }

    /// Thevenin impedance behind a source from its three-phase fault level.
    fn source(&mut self, label: &str, data: &SourceData, level_kv: f64) -> Impedance {
        let fault_ka = match data.fault_level_ka {
            None => return Impedance::ZERO,
            Some(ka) if ka.is_finite() && ka > 0.0 => ka,
            Some(requested) => {
                self.issues.push(AnalysisIssue::FaultLevelInvalid {
                    node: label.to_owned(),
                    requested,
                });
                return Impedance::ZERO;
            }
        };

        let xr = match data.xr_ratio {
            None => self.config.default_xr_ratio,
            Some(xr) if xr.is_finite() && xr > 0.0 => xr,
            Some(requested) => {
                self.issues.push(AnalysisIssue::XrRatioInvalid {
                    node: label.to_owned(),
                    requested,
                    applied: self.config.default_xr_ratio,
                });
                self.config.default_xr_ratio
            }
        };

        let phase_volts = level_kv * 1000.0 / SQRT_3;
        Impedance::from_magnitude(phase_volts / (fault_ka * 1000.0), xr)
    }

    fn transformer(
        &mut self,
        node: &Node,
        label: &str,
        data: &TransformerData,
        primary_kv: f64,
    ) -> TransformerParameters {
        let secondary_kv = if node.nominal_kv.is_finite() && node.nominal_kv > 0.0 {
            node.nominal_kv
        } else {
            self.issues.push(AnalysisIssue::InvalidNominalVoltage {
                node: label.to_owned(),
                level_kv: primary_kv,
            });
            primary_kv
        };

        let tap = data
            .tap_position
            .clamp(self.config.tap_min, self.config.tap_max);
        if tap != data.tap_position {
            self.issues.push(AnalysisIssue::TapClamped {
                node: label.to_owned(),
                requested: data.tap_position,
                applied: tap,
                min: self.config.tap_min,
                max: self.config.tap_max,
            });
        }

        let impedance = match data.rating_kva {
            Some(rating) if rating.is_finite() && rating > 0.0 => {
                match self.impedance_percent(label, data, rating) {
                    Some(z_percent) => {
                        let magnitude =
                            z_percent / 100.0 * secondary_kv * secondary_kv / (rating / 1000.0);
                        match self.config.transformer_impedance {
                            TransformerImpedanceModel::PurelyReactive => {
                                Impedance::new(0.0, magnitude)
                            }
                            TransformerImpedanceModel::XrRatio { xr } => {
                                Impedance::from_magnitude(magnitude, xr)
                            }
                        }
                    }
                    None => Impedance::ZERO,
                }
            }
            _ => {
                self.issues.push(AnalysisIssue::TransformerRatingMissing {
                    node: label.to_owned(),
                });
                Impedance::ZERO
            }
        };

        TransformerParameters {
            impedance,
            primary_kv,
            secondary_kv,
            tap,
            tap_factor: self.config.tap_factor(tap),
        }
    }

    /// Nameplate %Z, else the library entry nearest to the rating.
    fn impedance_percent(
        &mut self,
        label: &str,
        data: &TransformerData,
        rating_kva: f64,
    ) -> Option<f64> {
        match data.z_percent {
            Some(z) if z.is_finite() && z > 0.0 => return Some(z),
            Some(requested) => self.issues.push(AnalysisIssue::ImpedancePercentInvalid {
                node: label.to_owned(),
                requested,
            }),
            None => {}
        }

        match self.libraries.transformer_impedance(rating_kva) {
            Some(lookup) => {
                if !lookup.exact {
                    self.issues
                        .push(AnalysisIssue::TransformerRatingSubstituted {
                            node: label.to_owned(),
                            rating_kva,
                            used_kva: lookup.rating_kva,
                            z_percent: lookup.z_percent,
                        });
                }
                Some(lookup.z_percent)
            }
            None => {
                self.issues.push(AnalysisIssue::TransformerRatingMissing {
                    node: label.to_owned(),
                });
                None
            }
        }
    }

    fn load(&mut self, label: &str, data: &LoadData) -> LoadParameters {
        let rating = self.non_negative(label, "rating", data.rating_kva);
        let scale = match data.scale_factor {
            None => 1.0,
            Some(scale) => self.non_negative(label, "loadScaleFactor", scale),
        };

        let default_pf = self.config.default_power_factor;
        let power_factor = match data.power_factor {
            None => default_pf,
            Some(pf) if pf > 0.0 && pf <= 1.0 => pf,
            Some(requested) => {
                let applied = if !requested.is_finite() {
                    default_pf
                } else if requested > 1.0 {
                    1.0
                } else {
                    self.config.min_power_factor
                };
                self.issues.push(AnalysisIssue::PowerFactorClamped {
                    node: label.to_owned(),
                    requested,
                    applied,
                });
                applied
            }
        };

        LoadParameters {
            kva: rating * scale,
            power_factor,
        }
    }

    fn non_negative(&mut self, label: &str, field: &'static str, value: f64) -> f64 {
        if value.is_finite() && value >= 0.0 {
            value
        } else {
            self.issues.push(AnalysisIssue::NegativeValue {
                node: label.to_owned(),
                field,
                requested: value,
            });
            0.0
        }
    }

    fn line(&mut self, network: &Network, edge_index: usize, level_kv: f64) -> LineParameters {
        let edge = &network.edges[edge_index];
        let length_m = if edge.length_m.is_finite() && edge.length_m >= 0.0 {
            edge.length_m
        } else {
            self.issues.push(AnalysisIssue::LengthClamped {
                edge: edge.id.clone(),
                requested: edge.length_m,
            });
            0.0
        };

        let resolved = match self.libraries.conductor(&edge.conductor) {
            Some(spec) => Some((edge.conductor.as_str(), spec)),
            None => {
                let fallback = self.config.fallback_conductor.as_str();
                match self.libraries.conductor(fallback) {
                    Some(spec) => {
                        self.issues.push(AnalysisIssue::UnknownConductor {
                            edge: edge.id.clone(),
                            code: edge.conductor.clone(),
                            fallback: fallback.to_owned(),
                        });
                        Some((fallback, spec))
                    }
                    None => {
                        self.issues.push(AnalysisIssue::UnresolvedConductor {
                            edge: edge.id.clone(),
                            code: edge.conductor.clone(),
                        });
                        None
                    }
                }
            }
        };

        match resolved {
            Some((code, spec)) => LineParameters {
                impedance: spec.impedance(length_m),
                ampacity_a: Some(spec.ampacity_a),
                conductor: code.to_owned(),
                level_kv,
                length_m,
            },
            None => LineParameters {
                impedance: Impedance::ZERO,
                ampacity_a: None,
                conductor: edge.conductor.clone(),
                level_kv,
                length_m,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::Edge, topology};

    fn resolve_default(network: &Network) -> ResolvedNetwork {
        let topology = topology::build(network);
        resolve(
            network,
            &topology,
            &Libraries::sans(),
            &AnalysisConfig::default(),
        )
    }

    fn substation() -> Network {
        Network::new("substation")
            .with_node(Node::source("s", "Grid", 132.0, Some(20.0), Some(10.0)))
            .with_node(Node::transformer("t", "T1", 11.0, 20_000.0, Some(11.25), 0))
            .with_node(Node::busbar("b", "MV_Bus", 11.0))
            .with_edge(Edge::new("e1", "s", "t", 50.0, "Wolf"))
            .with_edge(Edge::new("e2", "t", "b", 1000.0, "Hare"))
    }

    #[test]
    fn source_impedance_follows_fault_level() {
        let resolved = resolve_default(&substation());
        let z = resolved.node(0).unwrap().source_impedance.unwrap();
        let expected = 132_000.0 / SQRT_3 / 20_000.0;
        assert!((z.magnitude() - expected).abs() < 1e-9);
        assert!((z.reactance_ohm / z.resistance_ohm - 10.0).abs() < 1e-9);
    }

    #[test]
    fn transformer_impedance_is_local_to_secondary() {
        let resolved = resolve_default(&substation());
        let params = resolved.node(1).unwrap();
        let tx = params.transformer.as_ref().unwrap();
        assert_eq!(tx.primary_kv, 132.0);
        assert_eq!(tx.secondary_kv, 11.0);
        assert_eq!(params.nominal_kv, 11.0);
        assert_eq!(tx.impedance.resistance_ohm, 0.0);
        assert!((tx.impedance.reactance_ohm - 0.680_625).abs() < 1e-9);
        assert!(resolved.issues.is_empty());
    }

    #[test]
    fn lines_take_the_upstream_output_level() {
        let resolved = resolve_default(&substation());
        assert_eq!(resolved.line(0).unwrap().level_kv, 132.0);
        let hare = resolved.line(1).unwrap();
        assert_eq!(hare.level_kv, 11.0);
        assert_eq!(hare.ampacity_a, Some(130.0));
        assert!((hare.impedance.resistance_ohm - 0.5426).abs() < 1e-12);
    }

    #[test]
    fn transformer_xr_model_splits_impedance() {
        let network = substation();
        let topology = topology::build(&network);
        let config = AnalysisConfig {
            transformer_impedance: TransformerImpedanceModel::XrRatio { xr: 8.0 },
            ..AnalysisConfig::default()
        };
        let resolved = resolve(&network, &topology, &Libraries::sans(), &config);
        let z = resolved.node(1).unwrap().transformer.as_ref().unwrap().impedance;
        assert!((z.magnitude() - 0.680_625).abs() < 1e-9);
        assert!(z.resistance_ohm > 0.0);
    }

    #[test]
    fn missing_percent_impedance_uses_nearest_rating() {
        let network = Network::default()
            .with_node(Node::source("s", "Grid", 11.0, None, None))
            .with_node(Node::transformer("t", "Mini", 0.4, 400.0, None, 0))
            .with_edge(Edge::new("e", "s", "t", 10.0, "Mink"));
        let resolved = resolve_default(&network);
        assert_eq!(
            resolved.issues,
            vec![AnalysisIssue::TransformerRatingSubstituted {
                node: "Mini".into(),
                rating_kva: 400.0,
                used_kva: 315.0,
                z_percent: 4.5,
            }]
        );
        let z = resolved.node(1).unwrap().transformer.as_ref().unwrap().impedance;
        assert!((z.reactance_ohm - 0.045 * 0.16 / 0.4).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_values_are_clamped_with_alerts() {
        let mut load = Node::load("l", "Shop", 11.0, -5.0, Some(1.2));
        if let NodeKind::Load(data) = &mut load.kind {
            data.scale_factor = Some(2.0);
        }
        let network = Network::default()
            .with_node(Node::source("s", "Grid", 11.0, Some(-1.0), Some(4.0)))
            .with_node(Node::transformer("t", "T", 11.0, 1000.0, Some(5.0), 9))
            .with_node(load)
            .with_edge(Edge::new("e1", "s", "t", 10.0, "Mink"))
            .with_edge(Edge::new("e2", "t", "l", -3.0, "Unobtainium"));
        let resolved = resolve_default(&network);

        assert_eq!(
            resolved.issues,
            vec![
                AnalysisIssue::FaultLevelInvalid {
                    node: "Grid".into(),
                    requested: -1.0,
                },
                AnalysisIssue::TapClamped {
                    node: "T".into(),
                    requested: 9,
                    applied: 5,
                    min: -5,
                    max: 5,
                },
                AnalysisIssue::LengthClamped {
                    edge: "e2".into(),
                    requested: -3.0,
                },
                AnalysisIssue::UnknownConductor {
                    edge: "e2".into(),
                    code: "Unobtainium".into(),
                    fallback: "Mink".into(),
                },
                AnalysisIssue::NegativeValue {
                    node: "Shop".into(),
                    field: "rating",
                    requested: -5.0,
                },
                AnalysisIssue::PowerFactorClamped {
                    node: "Shop".into(),
                    requested: 1.2,
                    applied: 1.0,
                },
            ]
        );
        assert_eq!(resolved.node(0).unwrap().source_impedance, Some(Impedance::ZERO));
        assert_eq!(resolved.node(2).unwrap().load.unwrap().kva, 0.0);
        assert_eq!(resolved.line(1).unwrap().conductor, "Mink");
        assert_eq!(resolved.line(1).unwrap().length_m, 0.0);
    }

    #[test]
    fn mismatched_nominal_inherits_supply_level() {
        let network = Network::default()
            .with_node(Node::source("s", "Grid", 11.0, None, None))
            .with_node(Node::busbar("b", "Bus", 22.0))
            .with_node(Node::load("l", "L", 0.0, 10.0, None))
            .with_edge(Edge::new("e1", "s", "b", 10.0, "Mink"))
            .with_edge(Edge::new("e2", "b", "l", 10.0, "Mink"));
        let resolved = resolve_default(&network);
        assert_eq!(resolved.node(1).unwrap().nominal_kv, 11.0);
        assert_eq!(resolved.node(2).unwrap().nominal_kv, 11.0);
        assert_eq!(resolved.node(2).unwrap().load.unwrap().power_factor, 0.9);
        assert_eq!(
            resolved.issues,
            vec![
                AnalysisIssue::VoltageLevelMismatch {
                    node: "Bus".into(),
                    declared_kv: 22.0,
                    level_kv: 11.0,
                },
                AnalysisIssue::InvalidNominalVoltage {
                    node: "L".into(),
                    level_kv: 11.0,
                },
            ]
        );
    }

    #[test]
    fn reactive_power_follows_power_factor() {
        let load = LoadParameters {
            kva: 100.0,
            power_factor: 0.8,
        };
        assert!((load.active_kw() - 80.0).abs() < 1e-12);
        assert!((load.reactive_kvar() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn unusable_data_falls_back_to_defaults() {
        let mut missing_rating = Node::transformer("t1", "Step", 11.0, 0.0, Some(5.0), 0);
        if let NodeKind::Transformer(data) = &mut missing_rating.kind {
            data.rating_kva = None;
        }
        let network = Network::default()
            .with_node(Node::source("s", "Grid", 11.0, Some(10.0), Some(-2.0)))
            .with_node(missing_rating)
            .with_node(Node::transformer("t2", "Mini", 0.4, 1000.0, Some(-1.0), 0))
            .with_node(Node::load("l", "Shop", 0.4, 50.0, Some(f64::NAN)))
            .with_edge(Edge::new("e1", "s", "t1", 10.0, "Mink"))
            .with_edge(Edge::new("e2", "t1", "t2", 10.0, "Bogus"))
            .with_edge(Edge::new("e3", "t2", "l", 10.0, "ABC 50mm"));
        let topology = topology::build(&network);
        let config = AnalysisConfig {
            fallback_conductor: "Nothing".into(),
            ..AnalysisConfig::default()
        };
        let resolved = resolve(&network, &topology, &Libraries::sans(), &config);

        assert_eq!(resolved.issues.len(), 5);
        assert_eq!(
            resolved.issues[0],
            AnalysisIssue::XrRatioInvalid {
                node: "Grid".into(),
                requested: -2.0,
                applied: 10.0,
            }
        );
        assert_eq!(
            resolved.issues[1],
            AnalysisIssue::TransformerRatingMissing {
                node: "Step".into()
            }
        );
        assert_eq!(
            resolved.issues[2],
            AnalysisIssue::UnresolvedConductor {
                edge: "e2".into(),
                code: "Bogus".into(),
            }
        );
        assert_eq!(
            resolved.issues[3],
            AnalysisIssue::ImpedancePercentInvalid {
                node: "Mini".into(),
                requested: -1.0,
            }
        );
        assert!(matches!(
            &resolved.issues[4],
            AnalysisIssue::PowerFactorClamped { node, requested, applied }
                if node == "Shop" && requested.is_nan() && *applied == 0.9
        ));

        let source = resolved.node(0).unwrap().source_impedance.unwrap();
        assert!((source.reactance_ohm / source.resistance_ohm - 10.0).abs() < 1e-9);

        let step = resolved.node(1).unwrap().transformer.as_ref().unwrap();
        assert_eq!(step.impedance, Impedance::ZERO);

        let bogus = resolved.line(1).unwrap();
        assert_eq!(bogus.impedance, Impedance::ZERO);
        assert_eq!(bogus.ampacity_a, None);
        assert_eq!(bogus.conductor, "Bogus");

        let mini = resolved.node(2).unwrap().transformer.as_ref().unwrap();
        assert!((mini.impedance.reactance_ohm - 0.05 * 0.16 / 1.0).abs() < 1e-12);

        assert_eq!(resolved.node(3).unwrap().load.unwrap().power_factor, 0.9);
    }
}
