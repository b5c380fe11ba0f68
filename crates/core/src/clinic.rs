use serde::{Deserialize, Serialize};

/// Clinic configuration the simulated patient is grounded in.
///
/// Supplied by the caller on every request and treated as opaque text and
/// number substitutions; the pipeline never validates or stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicProfile {
    pub clinic_name: String,
    pub practitioner_name: String,
    pub first_visit_cost: f64,
    pub address: String,
    pub office_hours: String,
    #[serde(default)]
    pub decompression: bool,
    #[serde(default, rename = "classIVLaser")]
    pub class_iv_laser: bool,
    #[serde(default)]
    pub shockwave: bool,
}

/// Difficulty and persona of the simulated patient.
///
/// The set is closed; anything unrecognized silently falls back to
/// [`Mode::Cooperative`] so a stale client can never fail a request
/// over a mode identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Cooperative,
    Challenging,
    Skeptical,
    Boundary,
}

impl Mode {
    /// Wire identifier, as sent in the `mode` form field.
    pub fn id(self) -> &'static str {
        match self {
            Mode::Cooperative => "cooperative",
            Mode::Challenging => "challenging",
            Mode::Skeptical => "skeptical",
            Mode::Boundary => "boundary",
        }
    }

    /// Parses a mode identifier, coercing unknown values to the default.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "challenging" => Mode::Challenging,
            "skeptical" => Mode::Skeptical,
            "boundary" => Mode::Boundary,
            _ => Mode::Cooperative,
        }
    }
}
