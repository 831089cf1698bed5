//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Rooted-tree view of a drawn network, one tree per source."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
//! Turns an arbitrary node/edge list into a forest of source-rooted trees.
//!
//! Nodes stay in the caller's arena (`Network::nodes`) and are referred to by
//! index; the topology only annotates each reachable node with its tree
//! position. Structural problems become [`AnalysisIssue`]s and the offending
//! part is left out, so the valid remainder can still be analysed.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::{Bfs, EdgeRef};

use crate::{errors::AnalysisIssue, model::Network};

/// Edge through which a node is fed, and the node on its upstream end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub edge: usize,
    pub upstream: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePosition {
    pub tree: usize,
    pub depth: usize,
    pub parent: Option<ParentLink>,
    /// Downstream neighbours in input edge order.
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub root: usize,
    /// Root first, each subtree completed before its next sibling.
    pub preorder: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Topology {
    positions: Vec<Option<TreePosition>>,
    labels: Vec<String>,
    pub trees: Vec<Tree>,
    pub issues: Vec<AnalysisIssue>,
}

impl Topology {
    fn fatal(labels: Vec<String>, issue: AnalysisIssue) -> Self {
        Self {
            positions: vec![None; labels.len()],
            labels,
            trees: Vec::new(),
            issues: vec![issue],
        }
    }

    /// Tree position of a node, or `None` when it is excluded from analysis.
    pub fn position(&self, node: usize) -> Option<&TreePosition> {
        self.positions.get(node).and_then(Option::as_ref)
    }

    /// Name used for `node` in results and alerts.
    pub fn label(&self, node: usize) -> &str {
        self.labels.get(node).map(String::as_str).unwrap_or_default()
    }

    pub fn parent(&self, node: usize) -> Option<ParentLink> {
        self.position(node).and_then(|p| p.parent)
    }

    /// True when no numeric output can be produced at all.
    pub fn is_fatal(&self) -> bool {
        self.issues.iter().any(AnalysisIssue::is_fatal)
    }

    pub fn analysed_node_count(&self) -> usize {
        self.trees.iter().map(|t| t.preorder.len()).sum()
    }

    /// Every node of every tree in traversal order.
    pub fn preorder(&self) -> impl Iterator<Item = usize> + '_ {
        self.trees.iter().flat_map(|t| t.preorder.iter().copied())
    }
}

/// Build the rooted forest for `network`.
pub fn build(network: &Network) -> Topology {
    let node_count = network.nodes.len();
    let labels = network.node_labels();
    let mut issues = Vec::new();

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(node_count);
    let mut analysable = vec![false; node_count];
    for (i, node) in network.nodes.iter().enumerate() {
        if index.contains_key(node.id.as_str()) {
            issues.push(AnalysisIssue::DuplicateNode {
                id: node.id.clone(),
            });
            continue;
        }
        index.insert(node.id.as_str(), i);
        analysable[i] = !node.is_annotation();
    }

    if !analysable.iter().any(|a| *a) {
        return Topology::fatal(labels, AnalysisIssue::EmptyNetwork);
    }
    if !(0..node_count).any(|i| analysable[i] && network.nodes[i].is_source()) {
        return Topology::fatal(labels, AnalysisIssue::NoSource);
    }

    let mut graph = UnGraph::<usize, usize>::with_capacity(node_count, network.edges.len());
    let mut graph_index: Vec<Option<NodeIndex>> = vec![None; node_count];
    for i in (0..node_count).filter(|&i| analysable[i]) {
        graph_index[i] = Some(graph.add_node(i));
    }

    for (e, edge) in network.edges.iter().enumerate() {
        let endpoint = |id: &str| -> Result<usize, AnalysisIssue> {
            match index.get(id) {
                None => Err(AnalysisIssue::DanglingEdge {
                    edge: edge.id.clone(),
                    node: id.to_owned(),
                }),
                Some(&i) if !analysable[i] => Err(AnalysisIssue::AnnotationEdge {
                    edge: edge.id.clone(),
                    node: network.nodes[i].name.clone(),
                }),
                Some(&i) => Ok(i),
            }
        };
        let (from, to) = match (endpoint(&edge.from), endpoint(&edge.to)) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(issue), _) | (_, Err(issue)) => {
                issues.push(issue);
                continue;
            }
        };
        if from == to {
            issues.push(AnalysisIssue::Cycle {
                edge: edge.id.clone(),
                from: labels[from].clone(),
                to: labels[to].clone(),
            });
            continue;
        }
        if let (Some(a), Some(b)) = (graph_index[from], graph_index[to]) {
            graph.add_edge(a, b, e);
        }
    }

    let components = components(&graph, &graph_index, &analysable);

    let mut roots = Vec::new();
    for members in &components {
        let sources: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&i| network.nodes[i].is_source())
            .collect();
        match sources.as_slice() {
            [] => issues.push(AnalysisIssue::Island {
                nodes: members
                    .iter()
                    .map(|&i| labels[i].clone())
                    .collect(),
            }),
            [root] => {
                let kv = network.nodes[*root].nominal_kv;
                if kv.is_finite() && kv > 0.0 {
                    roots.push(*root);
                } else {
                    issues.push(AnalysisIssue::InvalidSourceVoltage {
                        node: labels[*root].clone(),
                    });
                }
            }
            _ => issues.push(AnalysisIssue::MultipleRoots {
                sources: sources
                    .iter()
                    .map(|&i| labels[i].clone())
                    .collect(),
                excluded: members.len(),
            }),
        }
    }
    roots.sort_unstable();

    let mut positions: Vec<Option<TreePosition>> = vec![None; node_count];
    let mut rejected = vec![false; network.edges.len()];
    let mut trees = Vec::with_capacity(roots.len());
    for root in roots {
        let tree_id = trees.len();
        let mut grower = TreeGrower {
            network,
            labels: &labels,
            graph: &graph,
            graph_index: &graph_index,
            positions: &mut positions,
            rejected: &mut rejected,
            issues: &mut issues,
        };
        grower.grow(root, tree_id);
        trees.push(Tree {
            root,
            preorder: preorder(&positions, root),
        });
    }

    Topology {
        positions,
        labels,
        trees,
        issues,
    }
}

/// Members of each connected component, sorted by input order; components are
/// ordered by their first member.
fn components(
    graph: &UnGraph<usize, usize>,
    graph_index: &[Option<NodeIndex>],
    analysable: &[bool],
) -> Vec<Vec<usize>> {
    let mut seen = vec![false; analysable.len()];
    let mut found = Vec::new();
    for start in 0..analysable.len() {
        if !analysable[start] || seen[start] {
            continue;
        }
        let Some(start_gi) = graph_index[start] else {
            continue;
        };
        let mut members = Vec::new();
        let mut bfs = Bfs::new(graph, start_gi);
        while let Some(gi) = bfs.next(graph) {
            let node = graph[gi];
            seen[node] = true;
            members.push(node);
        }
        members.sort_unstable();
        found.push(members);
    }
    found
}

struct TreeGrower<'a> {
    network: &'a Network,
    labels: &'a [String],
    graph: &'a UnGraph<usize, usize>,
    graph_index: &'a [Option<NodeIndex>],
    positions: &'a mut Vec<Option<TreePosition>>,
    rejected: &'a mut Vec<bool>,
    issues: &'a mut Vec<AnalysisIssue>,
}

impl TreeGrower<'_> {
    /// Breadth-first spanning tree from `root`; every edge closing a loop is rejected.
    fn grow(&mut self, root: usize, tree: usize) {
        self.positions[root] = Some(TreePosition {
            tree,
            depth: 0,
            parent: None,
            children: Vec::new(),
        });

        let mut queue = VecDeque::from([root]);
        while let Some(u) = queue.pop_front() {
            let Some(gu) = self.graph_index[u] else {
                continue;
            };
            let (depth, parent_edge) = match &self.positions[u] {
                Some(position) => (position.depth, position.parent.map(|p| p.edge)),
                None => continue,
            };

            let mut incident: Vec<(usize, usize)> = self
                .graph
                .edges(gu)
                .map(|edge_ref| {
                    let other = if edge_ref.source() == gu {
                        edge_ref.target()
                    } else {
                        edge_ref.source()
                    };
                    (*edge_ref.weight(), self.graph[other])
                })
                .collect();
            incident.sort_unstable();

            for (edge, v) in incident {
                if Some(edge) == parent_edge || self.rejected[edge] {
                    continue;
                }
                if self.positions[v].is_none() {
                    self.positions[v] = Some(TreePosition {
                        tree,
                        depth: depth + 1,
                        parent: Some(ParentLink { edge, upstream: u }),
                        children: Vec::new(),
                    });
                    if let Some(position) = self.positions[u].as_mut() {
                        position.children.push(v);
                    }
                    queue.push_back(v);
                } else {
                    self.rejected[edge] = true;
                    self.issues.push(AnalysisIssue::Cycle {
                        edge: self.network.edges[edge].id.clone(),
                        from: self.labels[u].clone(),
                        to: self.labels[v].clone(),
                    });
                }
            }
        }
    }
}

fn preorder(positions: &[Option<TreePosition>], root: usize) -> Vec<usize> {
    let mut order = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        order.push(node);
        if let Some(position) = &positions[node] {
            stack.extend(position.children.iter().rev().copied());
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node};

    fn feeder() -> Network {
        Network::new("feeder")
            .with_node(Node::source("s", "Source", 11.0, Some(10.0), None))
            .with_node(Node::busbar("b", "Bus", 11.0))
            .with_node(Node::load("l1", "Load_1", 11.0, 100.0, Some(0.9)))
            .with_node(Node::load("l2", "Load_2", 11.0, 100.0, Some(0.9)))
            .with_edge(Edge::new("e1", "s", "b", 100.0, "Mink"))
            .with_edge(Edge::new("e2", "l1", "b", 100.0, "Mink"))
            .with_edge(Edge::new("e3", "b", "l2", 100.0, "Mink"))
    }

    #[test]
    fn radial_feeder_builds_one_oriented_tree() {
        let network = feeder();
        let topology = build(&network);
        assert!(topology.issues.is_empty());
        assert_eq!(topology.trees.len(), 1);
        assert_eq!(topology.trees[0].preorder, vec![0, 1, 2, 3]);

        // e2 is stored bus-last but oriented bus -> load.
        let link = topology.parent(2).unwrap();
        assert_eq!(link, ParentLink { edge: 1, upstream: 1 });
        assert_eq!(topology.position(3).unwrap().depth, 2);
        assert_eq!(topology.position(1).unwrap().children, vec![2, 3]);
    }

    #[test]
    fn closing_edge_is_rejected_and_tree_kept() {
        let network = feeder().with_edge(Edge::new("loop", "l1", "l2", 10.0, "Mink"));
        let topology = build(&network);
        assert_eq!(topology.analysed_node_count(), 4);
        assert_eq!(
            topology.issues,
            vec![AnalysisIssue::Cycle {
                edge: "loop".into(),
                from: "Load_1".into(),
                to: "Load_2".into(),
            }]
        );
        assert!(!topology.is_fatal());
    }

    #[test]
    fn self_loop_and_parallel_edges_are_cycles() {
        let network = feeder()
            .with_edge(Edge::new("self", "b", "b", 1.0, "Mink"))
            .with_edge(Edge::new("twin", "s", "b", 100.0, "Mink"));
        let topology = build(&network);
        let cycles: Vec<_> = topology
            .issues
            .iter()
            .filter_map(|i| match i {
                AnalysisIssue::Cycle { edge, .. } => Some(edge.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(cycles, vec!["self", "twin"]);
        assert_eq!(topology.parent(1).unwrap().edge, 0);
    }

    #[test]
    fn islands_are_reported_not_fatal() {
        let network = feeder()
            .with_node(Node::busbar("x", "Orphan_Bus", 11.0))
            .with_node(Node::load("y", "Orphan_Load", 11.0, 10.0, None))
            .with_edge(Edge::new("e9", "x", "y", 50.0, "Mink"));
        let topology = build(&network);
        assert_eq!(
            topology.issues,
            vec![AnalysisIssue::Island {
                nodes: vec!["Orphan_Bus".into(), "Orphan_Load".into()],
            }]
        );
        assert!(topology.position(4).is_none());
        assert_eq!(topology.analysed_node_count(), 4);
    }

    #[test]
    fn two_sources_in_one_component_exclude_it() {
        let network = feeder()
            .with_node(Node::source("s2", "Backfeed", 11.0, None, None))
            .with_edge(Edge::new("tie", "s2", "l2", 10.0, "Mink"))
            .with_node(Node::source("s3", "Separate", 0.4, None, None))
            .with_node(Node::load("l3", "Shop", 0.4, 20.0, None))
            .with_edge(Edge::new("e10", "s3", "l3", 30.0, "ABC 50mm"));
        let topology = build(&network);
        assert_eq!(
            topology.issues,
            vec![AnalysisIssue::MultipleRoots {
                sources: vec!["Source".into(), "Backfeed".into()],
                excluded: 5,
            }]
        );
        assert_eq!(topology.trees.len(), 1);
        assert_eq!(topology.trees[0].preorder, vec![5, 6]);
    }

    #[test]
    fn empty_and_sourceless_networks_are_fatal() {
        let empty = build(&Network::default());
        assert_eq!(empty.issues, vec![AnalysisIssue::EmptyNetwork]);
        assert!(empty.is_fatal());

        let notes_only = build(&Network::default().with_node(Node::annotation("t", "note")));
        assert_eq!(notes_only.issues, vec![AnalysisIssue::EmptyNetwork]);

        let sourceless = build(
            &Network::default()
                .with_node(Node::busbar("b", "Bus", 11.0))
                .with_node(Node::busbar("b", "Bus again", 11.0)),
        );
        assert_eq!(sourceless.issues, vec![AnalysisIssue::NoSource]);
        assert!(sourceless.trees.is_empty());
    }

    #[test]
    fn dangling_and_annotation_edges_are_skipped() {
        let network = feeder()
            .with_node(Node::annotation("note", "Substation A"))
            .with_edge(Edge::new("e7", "b", "ghost", 10.0, "Mink"))
            .with_edge(Edge::new("e8", "note", "b", 10.0, "Mink"));
        let topology = build(&network);
        assert_eq!(
            topology.issues,
            vec![
                AnalysisIssue::DanglingEdge {
                    edge: "e7".into(),
                    node: "ghost".into(),
                },
                AnalysisIssue::AnnotationEdge {
                    edge: "e8".into(),
                    node: "Substation A".into(),
                },
            ]
        );
        assert_eq!(topology.analysed_node_count(), 4);
    }

    #[test]
    fn duplicate_node_ids_keep_first_definition() {
        let network = feeder().with_node(Node::busbar("b", "Shadow", 11.0));
        let topology = build(&network);
        assert_eq!(
            topology.issues,
            vec![AnalysisIssue::DuplicateNode { id: "b".into() }]
        );
        assert!(topology.position(4).is_none());
    }

    #[test]
    fn source_without_voltage_excludes_its_tree() {
        let network = Network::default()
            .with_node(Node::source("s", "Dead", 0.0, None, None))
            .with_node(Node::load("l", "L", 11.0, 10.0, None))
            .with_edge(Edge::new("e", "s", "l", 1.0, "Mink"));
        let topology = build(&network);
        assert_eq!(
            topology.issues,
            vec![AnalysisIssue::InvalidSourceVoltage {
                node: "Dead".into()
            }]
        );
        assert!(topology.trees.is_empty());
        assert!(!topology.is_fatal());
    }

    #[test]
    fn shared_names_are_disambiguated_in_alerts() {
        let network = Network::default()
            .with_node(Node::source("s", "Grid", 11.0, None, None))
            .with_node(Node::load("a", "Pump", 11.0, 10.0, None))
            .with_node(Node::load("b", "Pump", 11.0, 10.0, None))
            .with_edge(Edge::new("e1", "s", "a", 1.0, "Mink"))
            .with_edge(Edge::new("e2", "s", "b", 1.0, "Mink"))
            .with_edge(Edge::new("e3", "a", "b", 1.0, "Mink"));
        let topology = build(&network);
        assert_eq!(
            topology.issues,
            vec![AnalysisIssue::Cycle {
                edge: "e3".into(),
                from: "Pump (a)".into(),
                to: "Pump (b)".into(),
            }]
        );
        assert_eq!(topology.label(0), "Grid");
        assert_eq!(topology.label(2), "Pump (b)");
    }
}
