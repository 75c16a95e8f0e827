use geo::Point;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DashboardError;

/// The 27 Brazilian federative units, ordered by UF code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StateCode {
    AC,
    AL,
    AM,
    AP,
    BA,
    CE,
    DF,
    ES,
    GO,
    MA,
    MG,
    MS,
    MT,
    PA,
    PB,
    PE,
    PI,
    PR,
    RJ,
    RN,
    RO,
    RR,
    RS,
    SC,
    SE,
    SP,
    TO,
}

// (uf, lat, lon) approximate geographic centres.
const CENTROIDS: [(StateCode, f64, f64); 27] = [
    (StateCode::AC, -9.0238, -70.8120),
    (StateCode::AL, -9.5713, -36.7820),
    (StateCode::AM, -3.4168, -65.8561),
    (StateCode::AP, 1.4100, -51.7700),
    (StateCode::BA, -12.5797, -41.7007),
    (StateCode::CE, -5.4984, -39.3206),
    (StateCode::DF, -15.7998, -47.8645),
    (StateCode::ES, -19.1834, -40.3089),
    (StateCode::GO, -15.8270, -49.8362),
    (StateCode::MA, -4.9609, -45.2744),
    (StateCode::MG, -18.5122, -44.5550),
    (StateCode::MS, -20.7722, -54.7852),
    (StateCode::MT, -12.6819, -56.9211),
    (StateCode::PA, -1.9981, -54.9306),
    (StateCode::PB, -7.2400, -36.7820),
    (StateCode::PE, -8.8137, -36.9541),
    (StateCode::PI, -7.7183, -42.7289),
    (StateCode::PR, -25.2521, -52.0215),
    (StateCode::RJ, -22.9099, -43.2095),
    (StateCode::RN, -5.4026, -36.9541),
    (StateCode::RO, -11.5057, -63.5806),
    (StateCode::RR, 2.7376, -62.0751),
    (StateCode::RS, -30.0346, -51.2177),
    (StateCode::SC, -27.2423, -50.2189),
    (StateCode::SE, -10.5741, -37.3857),
    (StateCode::SP, -23.5505, -46.6333),
    (StateCode::TO, -10.1753, -48.2982),
];

static BY_UF: Lazy<HashMap<&'static str, StateCode>> = Lazy::new(|| {
    StateCode::ALL.iter().map(|s| (s.as_str(), *s)).collect()
});

impl StateCode {
    pub const ALL: [StateCode; 27] = [
        StateCode::AC,
        StateCode::AL,
        StateCode::AM,
        StateCode::AP,
        StateCode::BA,
        StateCode::CE,
        StateCode::DF,
        StateCode::ES,
        StateCode::GO,
        StateCode::MA,
        StateCode::MG,
        StateCode::MS,
        StateCode::MT,
        StateCode::PA,
        StateCode::PB,
        StateCode::PE,
        StateCode::PI,
        StateCode::PR,
        StateCode::RJ,
        StateCode::RN,
        StateCode::RO,
        StateCode::RR,
        StateCode::RS,
        StateCode::SC,
        StateCode::SE,
        StateCode::SP,
        StateCode::TO,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateCode::AC => "AC",
            StateCode::AL => "AL",
            StateCode::AM => "AM",
            StateCode::AP => "AP",
            StateCode::BA => "BA",
            StateCode::CE => "CE",
            StateCode::DF => "DF",
            StateCode::ES => "ES",
            StateCode::GO => "GO",
            StateCode::MA => "MA",
            StateCode::MG => "MG",
            StateCode::MS => "MS",
            StateCode::MT => "MT",
            StateCode::PA => "PA",
            StateCode::PB => "PB",
            StateCode::PE => "PE",
            StateCode::PI => "PI",
            StateCode::PR => "PR",
            StateCode::RJ => "RJ",
            StateCode::RN => "RN",
            StateCode::RO => "RO",
            StateCode::RR => "RR",
            StateCode::RS => "RS",
            StateCode::SC => "SC",
            StateCode::SE => "SE",
            StateCode::SP => "SP",
            StateCode::TO => "TO",
        }
    }

    /// Fixed marker position; `x` is longitude, `y` latitude.
    pub fn centroid(&self) -> Point<f64> {
        let (_, lat, lon) = CENTROIDS[*self as usize];
        Point::new(lon, lat)
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateCode {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        BY_UF
            .get(upper.as_str())
            .copied()
            .ok_or_else(|| DashboardError::UnknownState(s.to_string()))
    }
}

/// Reduction applied across rows that share a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationMode {
    Sum,
    Mean,
}

impl AggregationMode {
    /// Multiplier applied to the maximum-value marker(s).
    pub fn dampened_scale(&self, scale: f64) -> f64 {
        match self {
            AggregationMode::Sum => scale - scale / 3.0,
            AggregationMode::Mean => scale - scale / 1.09,
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationMode::Sum => f.write_str("Sum"),
            AggregationMode::Mean => f.write_str("Mean"),
        }
    }
}

impl FromStr for AggregationMode {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(AggregationMode::Sum),
            "mean" => Ok(AggregationMode::Mean),
            _ => Err(DashboardError::Validation(format!(
                "unsupported aggregation mode '{}', expected Sum or Mean",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregatedRow {
    pub state: StateCode,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub state: StateCode,
    pub lat: f64,
    pub lon: f64,
    pub label_text: String,
    pub size: f64,
}
