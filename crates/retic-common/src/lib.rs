//! ---
//! retic_section: "01-core-functionality"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Shared primitives and utilities for the analysis tooling."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
//! Core shared primitives for the Retic workspace.
//! This crate exposes configuration loading and tracing setup consumed by
//! the calculation engine and the command-line front end.

pub mod config;
pub mod logging;

pub use config::{
    AnalysisConfig, ApiConfig, AppConfig, LibraryConfig, LoadedAppConfig, LoggingConfig,
    PowerFactorWeighting, TransformerImpedanceModel,
};
pub use logging::{init_tracing, LogFormat};
