//! ---
//! retic_section: "08-network-analysis"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Conductor and transformer reference tables."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{CalcEngineError, Result},
    model::Impedance,
};

/// Per-kilometre electrical data of one conductor type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConductorSpec {
    pub resistance_ohm_per_km: f64,
    pub reactance_ohm_per_km: f64,
    pub ampacity_a: f64,
    pub category: String,
}

impl ConductorSpec {
    pub fn new(r: f64, x: f64, ampacity_a: f64, category: &str) -> Self {
        Self {
            resistance_ohm_per_km: r,
            reactance_ohm_per_km: x,
            ampacity_a,
            category: category.to_owned(),
        }
    }

    pub fn impedance(&self, length_m: f64) -> Impedance {
        let length_km = length_m / 1000.0;
        Impedance {
            resistance_ohm: self.resistance_ohm_per_km * length_km,
            reactance_ohm: self.reactance_ohm_per_km * length_km,
        }
    }
}

/// Default short-circuit impedance of a transformer rating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TransformerImpedance {
    pub rating_kva: f64,
    pub z_percent: f64,
}

/// Result of a nearest-rating lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformerLookup {
    pub rating_kva: f64,
    pub z_percent: f64,
    pub exact: bool,
}

/// Reference tables consumed, never mutated, by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Libraries {
    pub conductors: IndexMap<String, ConductorSpec>,
    pub transformers: Vec<TransformerImpedance>,
}

impl Default for Libraries {
    fn default() -> Self {
        Self::sans()
    }
}

impl Libraries {
    /// South African (SANS) overhead line, cable and transformer data.
    pub fn sans() -> Self {
        let conductors = [
            ("Hare", ConductorSpec::new(0.5426, 0.359, 130.0, "ACSR")),
            ("Mink", ConductorSpec::new(0.273, 0.336, 180.0, "ACSR")),
            ("Rabbit", ConductorSpec::new(0.5426, 0.359, 125.0, "ACSR")),
            ("Dog", ConductorSpec::new(0.2733, 0.33, 210.0, "ACSR")),
            ("Wolf", ConductorSpec::new(0.1828, 0.32, 265.0, "ACSR")),
            ("ABC 50mm", ConductorSpec::new(0.72, 0.1, 140.0, "LV ABC")),
            ("ABC 95mm", ConductorSpec::new(0.32, 0.09, 215.0, "LV ABC")),
            ("PVC 16mm Cu", ConductorSpec::new(1.15, 0.1, 80.0, "Cable")),
            ("PVC 70mm Cu", ConductorSpec::new(0.268, 0.09, 200.0, "Cable")),
            ("PILC 185mm Cu", ConductorSpec::new(0.099, 0.08, 380.0, "Cable")),
        ]
        .into_iter()
        .map(|(code, spec)| (code.to_owned(), spec))
        .collect();

        let transformers = [
            (16.0, 4.0),
            (25.0, 4.0),
            (50.0, 4.0),
            (100.0, 4.5),
            (200.0, 4.5),
            (315.0, 4.5),
            (500.0, 4.5),
            (630.0, 4.5),
            (800.0, 5.0),
            (1000.0, 5.0),
            (1250.0, 5.0),
            (1600.0, 6.0),
            (2000.0, 6.0),
            (2500.0, 6.25),
            (5000.0, 7.0),
            (10000.0, 8.0),
            (20000.0, 10.0),
            (40000.0, 12.5),
        ]
        .into_iter()
        .map(|(rating_kva, z_percent)| TransformerImpedance {
            rating_kva,
            z_percent,
        })
        .collect();

        Self {
            conductors,
            transformers,
        }
    }

    /// Build libraries from caller-supplied tables, validating and sorting them.
    pub fn new(
        conductors: IndexMap<String, ConductorSpec>,
        transformers: Vec<TransformerImpedance>,
    ) -> Result<Self> {
        Self {
            conductors,
            transformers,
        }
        .validated()
    }

    /// Load a regional replacement table from TOML, JSON or YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        crate::io::load_libraries_from_file(path)
    }

    pub(crate) fn validated(mut self) -> Result<Self> {
        if self.conductors.is_empty() {
            return Err(CalcEngineError::InvalidLibrary(
                "conductor table is empty".into(),
            ));
        }
        if self.transformers.is_empty() {
            return Err(CalcEngineError::InvalidLibrary(
                "transformer impedance table is empty".into(),
            ));
        }
        for (code, spec) in &self.conductors {
            let impedance = [spec.resistance_ohm_per_km, spec.reactance_ohm_per_km];
            if impedance.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(CalcEngineError::InvalidLibrary(format!(
                    "conductor '{code}' has negative or non-finite impedance"
                )));
            }
            if !(spec.ampacity_a.is_finite() && spec.ampacity_a > 0.0) {
                return Err(CalcEngineError::InvalidLibrary(format!(
                    "conductor '{code}' needs a positive ampacity"
                )));
            }
        }
        for entry in &self.transformers {
            if !(entry.rating_kva.is_finite() && entry.rating_kva > 0.0)
                || !(entry.z_percent.is_finite() && entry.z_percent > 0.0)
            {
                return Err(CalcEngineError::InvalidLibrary(format!(
                    "transformer entry {} kVA / {}% is not positive",
                    entry.rating_kva, entry.z_percent
                )));
            }
        }
        self.transformers
            .sort_by(|a, b| a.rating_kva.total_cmp(&b.rating_kva));
        Ok(self)
    }

    pub fn conductor(&self, code: &str) -> Option<&ConductorSpec> {
        self.conductors.get(code)
    }

    /// Nearest table entry by absolute kVA difference; ties go to the lower rating.
    pub fn transformer_impedance(&self, rating_kva: f64) -> Option<TransformerLookup> {
        let mut best: Option<(f64, &TransformerImpedance)> = None;
        for entry in &self.transformers {
            let distance = (entry.rating_kva - rating_kva).abs();
            match best {
                Some((best_distance, _)) if distance >= best_distance => {}
                _ => best = Some((distance, entry)),
            }
        }
        best.map(|(distance, entry)| TransformerLookup {
            rating_kva: entry.rating_kva,
            z_percent: entry.z_percent,
            exact: distance < 1e-9,
        })
    }
}
