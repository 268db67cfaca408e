//! Recorded water-quality parameters and their static metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------ //
//  Parameter                                                          //
// ------------------------------------------------------------------ //

/// Every parameter a pool reading can carry.
///
/// The first eight are monitored live (thresholds, scoring, alerts); the
/// remaining ones are recorded into history and exported but carry no
/// threshold by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Parameter {
    Temperature,
    Ph,
    DissolvedOxygen,
    Ammonia,
    Nitrite,
    Nitrate,
    WaterLevel,
    Turbidity,
    Bod,
    Co2,
    Alkalinity,
    Hardness,
    Calcium,
    Phosphorus,
    H2s,
    Plankton,
}

/// How a parameter contributes to the aggregate quality score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scoring {
    /// `1 - |v - ideal| / spread`
    Centered { ideal: f64, spread: f64 },
    /// `(v - floor) / range`
    Rising { floor: f64, range: f64 },
    /// `1 - v / limit`
    Falling { limit: f64 },
}

impl Scoring {
    /// Goodness of `value` in `[0, 1]`.
    pub fn score(self, value: f64) -> f64 {
        let raw = match self {
            Scoring::Centered { ideal, spread } => 1.0 - (value - ideal).abs() / spread,
            Scoring::Rising { floor, range } => (value - floor) / range,
            Scoring::Falling { limit } => 1.0 - value / limit,
        };
        raw.clamp(0.0, 1.0)
    }
}

impl Parameter {
    pub const ALL: [Parameter; 16] = [
        Parameter::Temperature,
        Parameter::Ph,
        Parameter::DissolvedOxygen,
        Parameter::Ammonia,
        Parameter::Nitrite,
        Parameter::Nitrate,
        Parameter::WaterLevel,
        Parameter::Turbidity,
        Parameter::Bod,
        Parameter::Co2,
        Parameter::Alkalinity,
        Parameter::Hardness,
        Parameter::Calcium,
        Parameter::Phosphorus,
        Parameter::H2s,
        Parameter::Plankton,
    ];

    /// Stable key used in configuration, JSON payloads and averages.
    pub fn key(self) -> &'static str {
        match self {
            Parameter::Temperature     => "temperature",
            Parameter::Ph              => "ph",
            Parameter::DissolvedOxygen => "dissolvedOxygen",
            Parameter::Ammonia         => "ammonia",
            Parameter::Nitrite         => "nitrite",
            Parameter::Nitrate         => "nitrate",
            Parameter::WaterLevel      => "waterLevel",
            Parameter::Turbidity       => "turbidity",
            Parameter::Bod             => "bod",
            Parameter::Co2             => "co2",
            Parameter::Alkalinity      => "alkalinity",
            Parameter::Hardness        => "hardness",
            Parameter::Calcium         => "calcium",
            Parameter::Phosphorus      => "phosphorus",
            Parameter::H2s             => "h2s",
            Parameter::Plankton        => "plankton",
        }
    }

    /// Case-insensitive lookup, so environment-derived (lowercased) keys
    /// resolve too.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key().eq_ignore_ascii_case(key))
    }

    /// Human-readable name used in alert messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Parameter::Temperature     => "Temperature",
            Parameter::Ph              => "pH",
            Parameter::DissolvedOxygen => "Dissolved Oxygen",
            Parameter::Ammonia         => "Ammonia",
            Parameter::Nitrite         => "Nitrite",
            Parameter::Nitrate         => "Nitrate",
            Parameter::WaterLevel      => "Water Level",
            Parameter::Turbidity       => "Turbidity",
            Parameter::Bod             => "BOD",
            Parameter::Co2             => "CO2",
            Parameter::Alkalinity      => "Alkalinity",
            Parameter::Hardness        => "Hardness",
            Parameter::Calcium         => "Calcium",
            Parameter::Phosphorus      => "Phosphorus",
            Parameter::H2s             => "H2S",
            Parameter::Plankton        => "Plankton",
        }
    }

    /// Unit suffix appended directly after a formatted value.
    pub fn unit(self) -> &'static str {
        match self {
            Parameter::Temperature => "°C",
            Parameter::Ph => "",
            Parameter::WaterLevel => "%",
            Parameter::Turbidity => " NTU",
            Parameter::Plankton => " No./L",
            _ => " mg/L",
        }
    }

    /// Value substituted when a reading is missing or not finite.
    ///
    /// Every fallback lies inside the default safe band so a sensor gap
    /// never raises an alert on its own.
    pub fn fallback(self) -> f64 {
        match self {
            Parameter::Temperature     => 20.0,
            Parameter::Ph              => 7.2,
            Parameter::DissolvedOxygen => 7.5,
            Parameter::Ammonia         => 0.3,
            Parameter::Nitrite         => 0.1,
            Parameter::Nitrate         => 15.0,
            Parameter::WaterLevel      => 90.0,
            Parameter::Turbidity       => 5.0,
            Parameter::Bod             => 3.0,
            Parameter::Co2             => 10.0,
            Parameter::Alkalinity      => 150.0,
            Parameter::Hardness        => 200.0,
            Parameter::Calcium         => 50.0,
            Parameter::Phosphorus      => 2.0,
            Parameter::H2s             => 0.1,
            Parameter::Plankton        => 25_000.0,
        }
    }

    /// Decimal places used when the parameter is written to CSV.
    pub fn precision(self) -> usize {
        match self {
            Parameter::Ammonia | Parameter::Nitrite | Parameter::H2s => 3,
            Parameter::Plankton => 0,
            _ => 2,
        }
    }

    /// Quality scoring rule, `None` for record-only parameters.
    pub fn scoring(self) -> Option<Scoring> {
        let rule = match self {
            Parameter::Temperature     => Scoring::Centered { ideal: 20.0, spread: 5.0 },
            Parameter::Ph              => Scoring::Centered { ideal: 7.2, spread: 1.5 },
            Parameter::DissolvedOxygen => Scoring::Rising { floor: 5.0, range: 4.0 },
            Parameter::Ammonia         => Scoring::Falling { limit: 2.0 },
            Parameter::Nitrite         => Scoring::Falling { limit: 1.0 },
            Parameter::Nitrate         => Scoring::Falling { limit: 40.0 },
            Parameter::WaterLevel      => Scoring::Rising { floor: 0.0, range: 100.0 },
            Parameter::Turbidity       => Scoring::Falling { limit: 15.0 },
            _ => return None,
        };
        Some(rule)
    }

    /// Returns `value` when it is usable, the fallback otherwise.
    pub fn normalize(self, value: Option<f64>) -> f64 {
        match value {
            Some(v) if v.is_finite() => v,
            _ => self.fallback(),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
