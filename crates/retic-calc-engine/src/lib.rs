//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Deterministic analysis engine for radial distribution networks."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
pub mod api;
pub mod demo;
pub mod errors;
pub mod impedance;
pub mod io;
pub mod library;
pub mod load_flow;
pub mod model;
pub mod propagation;
pub mod reports;
pub mod topology;

use retic_logging::{log_system_event, retic_debug, retic_warn, LogContext, SystemEventOutcome};

pub use errors::{AnalysisIssue, CalcEngineError, IssueClass, Result};
pub use library::Libraries;
pub use model::{Edge, Network, Node, NodeKind};
pub use reports::{AnalysisReport, SimulationResult};
pub use retic_common::AnalysisConfig;

/// Reusable analysis entry point holding the reference tables and rules.
///
/// Keeps no state between calls, so one instance can serve concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    libraries: Libraries,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(libraries: Libraries, config: AnalysisConfig) -> Self {
        Self { libraries, config }
    }

    pub fn libraries(&self) -> &Libraries {
        &self.libraries
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(&self, network: &Network) -> AnalysisReport {
        analyze_network(network, &self.libraries, &self.config)
    }
}

/// Run the full pipeline: topology, impedances, backward sweep, forward sweep, assembly.
pub fn analyze_network(
    network: &Network,
    libraries: &Libraries,
    config: &AnalysisConfig,
) -> AnalysisReport {
    let ctx = LogContext::new().with_network(network.display_name());

    let topology = topology::build(network);
    let mut issues = topology.issues.clone();
    report_issues(&ctx.clone().with_pass("topology"), &topology.issues);
    retic_debug!(
        context = ctx.clone().with_pass("topology"),
        "{} tree(s) covering {} of {} node(s)",
        topology.trees.len(),
        topology.analysed_node_count(),
        network.nodes.len()
    );

    if topology.is_fatal() {
        let report = reports::assemble(network, &topology, &Default::default(), issues);
        log_system_event(
            Some(&ctx),
            "analysis.run",
            &report.result.summary,
            SystemEventOutcome::Fault,
        );
        return report;
    }

    let resolved = impedance::resolve(network, &topology, libraries, config);
    report_issues(&ctx.clone().with_pass("impedance"), &resolved.issues);
    issues.extend(resolved.issues.iter().cloned());
    retic_debug!(
        context = ctx.clone().with_pass("impedance"),
        "resolved {} line(s)",
        resolved.lines.iter().flatten().count()
    );

    let flow = load_flow::aggregate_loads(&topology, &resolved);
    retic_debug!(
        context = ctx.clone().with_pass("aggregate"),
        "aggregated {:.1} kVA across {} tree(s)",
        topology
            .trees
            .iter()
            .filter_map(|t| flow.subtree(t.root))
            .map(|s| s.kva)
            .sum::<f64>(),
        topology.trees.len()
    );

    let propagation = propagation::propagate(network, &topology, &resolved, &flow, config);
    report_issues(&ctx.clone().with_pass("propagate"), &propagation.issues);
    issues.extend(propagation.issues.iter().cloned());
    retic_debug!(
        context = ctx.clone().with_pass("propagate"),
        "propagation finished with {} violation(s)",
        propagation
            .issues
            .iter()
            .filter(|i| i.is_violation())
            .count()
    );

    let report = reports::assemble(network, &topology, &propagation, issues);
    log_system_event(
        Some(&ctx),
        "analysis.run",
        &report.result.summary,
        SystemEventOutcome::Success,
    );
    report
}

fn report_issues(ctx: &LogContext<'_>, issues: &[AnalysisIssue]) {
    for issue in issues {
        let mut issue_ctx = ctx.clone();
        if let Some(node) = issue.node() {
            issue_ctx = issue_ctx.with_node(node);
        }
        if let Some(edge) = issue.edge() {
            issue_ctx = issue_ctx.with_edge(edge);
        }
        retic_warn!(context = issue_ctx, "{issue}");
    }
}
