//! ---
//! retic_section: "03-logging"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Structured logging adapters and sinks."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Context-carrying logging helpers shared by the engine and its front ends.

use tracing::Level;

pub mod macros;

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Name of the network being analysed.
    pub network: Option<&'a str>,
    /// Node the event refers to.
    pub node: Option<&'a str>,
    /// Edge the event refers to.
    pub edge: Option<&'a str>,
    /// Analysis pass emitting the event (topology, impedance, aggregate, propagate, assemble).
    pub pass: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a network name.
    pub fn with_network(mut self, network: &'a str) -> Self {
        self.network = Some(network);
        self
    }

    /// Attach a node identifier.
    pub fn with_node(mut self, node: &'a str) -> Self {
        self.node = Some(node);
        self
    }

    /// Attach an edge identifier.
    pub fn with_edge(mut self, edge: &'a str) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Attach the emitting analysis pass.
    pub fn with_pass(mut self, pass: &'a str) -> Self {
        self.pass = Some(pass);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized system event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    // `tracing::event!` needs a constant level, hence the two arms.
    match outcome {
        SystemEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            network = ctx.network.unwrap_or(""),
            node = ctx.node.unwrap_or(""),
            edge = ctx.edge.unwrap_or(""),
            pass = ctx.pass.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            network = ctx.network.unwrap_or(""),
            node = ctx.node.unwrap_or(""),
            edge = ctx.edge.unwrap_or(""),
            pass = ctx.pass.unwrap_or(""),
            message = %message
        ),
    }
}
