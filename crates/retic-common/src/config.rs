//! ---
//! retic_section: "01-core-functionality"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Shared primitives and utilities for the analysis tooling."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_api_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8088))
}

fn default_voltage_min_pu() -> f64 {
    0.95
}

fn default_voltage_max_pu() -> f64 {
    1.05
}

fn default_tap_step_percent() -> f64 {
    2.5
}

fn default_tap_min() -> i32 {
    -5
}

fn default_tap_max() -> i32 {
    5
}

fn default_xr_ratio() -> f64 {
    10.0
}

fn default_power_factor() -> f64 {
    0.9
}

fn default_min_power_factor() -> f64 {
    0.01
}

fn default_fallback_conductor() -> String {
    "Mink".to_owned()
}

/// Primary configuration object for Retic tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub libraries: LibraryConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and built-in defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "RETIC_CONFIG";
    pub const DEFAULT_CANDIDATES: [&'static str; 2] = ["retic.toml", "config/retic.toml"];

    /// Load configuration from disk, respecting the `RETIC_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// Unlike a daemon configuration a missing file is not an error: the
    /// built-in defaults describe a complete, usable analysis setup.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!("no configuration file found, using built-in defaults");
        Ok(LoadedAppConfig {
            config: Self::default(),
            source: None,
        })
    }

    /// Read and validate one configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Enables the rolling JSON file sink when set.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

/// Location of a conductor/transformer table replacing the built-in SANS set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LibraryConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_api_listen(),
        }
    }
}

/// How the power factor of a branch feeding several loads is derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PowerFactorWeighting {
    /// `Σ(Sᵢ·pfᵢ) / ΣSᵢ` over the downstream loads.
    #[default]
    KvaWeighted,
    /// `ΣP / |ΣP + jΣQ|` over the downstream loads.
    PowerTriangle,
}

/// Resistive/reactive split applied to a transformer's impedance magnitude.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum TransformerImpedanceModel {
    /// `X = |Z|`, `R = 0`.
    #[default]
    PurelyReactive,
    /// Split `|Z|` with the given X/R ratio.
    XrRatio { xr: f64 },
}

/// Tunable rules of the analysis engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    #[serde(default = "default_voltage_min_pu")]
    pub voltage_min_pu: f64,
    #[serde(default = "default_voltage_max_pu")]
    pub voltage_max_pu: f64,
    #[serde(default = "default_tap_step_percent")]
    pub tap_step_percent: f64,
    #[serde(default = "default_tap_min")]
    pub tap_min: i32,
    #[serde(default = "default_tap_max")]
    pub tap_max: i32,
    #[serde(default = "default_xr_ratio")]
    pub default_xr_ratio: f64,
    #[serde(default = "default_power_factor")]
    pub default_power_factor: f64,
    #[serde(default = "default_min_power_factor")]
    pub min_power_factor: f64,
    #[serde(default = "default_fallback_conductor")]
    pub fallback_conductor: String,
    #[serde(default)]
    pub power_factor_weighting: PowerFactorWeighting,
    #[serde(default)]
    pub transformer_impedance: TransformerImpedanceModel,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            voltage_min_pu: default_voltage_min_pu(),
            voltage_max_pu: default_voltage_max_pu(),
            tap_step_percent: default_tap_step_percent(),
            tap_min: default_tap_min(),
            tap_max: default_tap_max(),
            default_xr_ratio: default_xr_ratio(),
            default_power_factor: default_power_factor(),
            min_power_factor: default_min_power_factor(),
            fallback_conductor: default_fallback_conductor(),
            power_factor_weighting: PowerFactorWeighting::default(),
            transformer_impedance: TransformerImpedanceModel::default(),
        }
    }
}

impl AnalysisConfig {
    /// Voltage multiplier applied by a transformer at the given tap step.
    pub fn tap_factor(&self, tap: i32) -> f64 {
        1.0 + f64::from(tap) * self.tap_step_percent / 100.0
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.voltage_min_pu > 0.0 && self.voltage_min_pu < self.voltage_max_pu) {
            return Err(anyhow!(
                "analysis voltage band must satisfy 0 < voltage_min_pu < voltage_max_pu (got {} .. {})",
                self.voltage_min_pu,
                self.voltage_max_pu
            ));
        }
        if !(self.tap_step_percent.is_finite() && self.tap_step_percent >= 0.0) {
            return Err(anyhow!(
                "tap_step_percent must be a non-negative number (got {})",
                self.tap_step_percent
            ));
        }
        if self.tap_min > self.tap_max {
            return Err(anyhow!(
                "tap_min ({}) must not exceed tap_max ({})",
                self.tap_min,
                self.tap_max
            ));
        }
        if !(self.default_xr_ratio.is_finite() && self.default_xr_ratio > 0.0) {
            return Err(anyhow!(
                "default_xr_ratio must be positive (got {})",
                self.default_xr_ratio
            ));
        }
        for (field, value) in [
            ("default_power_factor", self.default_power_factor),
            ("min_power_factor", self.min_power_factor),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(anyhow!("{field} must lie in (0, 1] (got {value})"));
            }
        }
        if self.fallback_conductor.trim().is_empty() {
            return Err(anyhow!("fallback_conductor cannot be empty"));
        }
        if let TransformerImpedanceModel::XrRatio { xr } = self.transformer_impedance {
            if !(xr.is_finite() && xr > 0.0) {
                return Err(anyhow!("transformer_impedance xr must be positive (got {xr})"));
            }
        }
        Ok(())
    }
}
