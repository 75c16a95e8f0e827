//! Plotly figure documents.
//!
//! Only the subset of the plotly.js schema the dashboard emits is modelled.
//! Figures serialize to `{"data": [...], "layout": {...}}` and are handed to
//! the browser untouched.

use crate::config::MapConfig;
use crate::types::MarkerSpec;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Scattergeo(ScatterGeo),
    Bar(Bar),
    Pie(Pie),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScatterGeo {
    pub name: String,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub text: Vec<String>,
    pub mode: String,
    pub hoverinfo: String,
    pub marker: Marker,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Marker {
    pub size: Vec<f64>,
    pub sizemode: String,
    pub line: MarkerLine,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MarkerLine {
    pub width: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Bar {
    pub x: Vec<String>,
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Pie {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub hovertemplate: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct Layout {
    pub title: Title,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showlegend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoLayout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<Axis>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Axis {
    pub title: Title,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeoLayout {
    pub scope: String,
    pub projection: Projection,
    pub center: Center,
    pub showland: bool,
    pub landcolor: String,
    pub showcountries: bool,
    pub countrycolor: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Projection {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Center {
    pub lat: f64,
    pub lon: f64,
}

fn titled(text: &str) -> Title {
    Title {
        text: text.to_string(),
    }
}

/// Uppercases the first character and lowercases the rest.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// One `scattergeo` trace per marker on a South America map centred on Brazil.
pub fn state_map_figure(markers: &[MarkerSpec], label: &str, map: &MapConfig) -> Figure {
    let data = markers
        .iter()
        .map(|m| {
            Trace::Scattergeo(ScatterGeo {
                name: m.state.to_string(),
                lat: vec![m.lat],
                lon: vec![m.lon],
                text: vec![m.label_text.clone()],
                mode: "markers".to_string(),
                hoverinfo: "text".to_string(),
                marker: Marker {
                    size: vec![m.size],
                    sizemode: "diameter".to_string(),
                    line: MarkerLine {
                        width: 0.5,
                        color: "rgb(40,40,40)".to_string(),
                    },
                },
            })
        })
        .collect();

    Figure {
        data,
        layout: Layout {
            title: titled(&format!("{} {}", capitalize(label), map.title_suffix)),
            width: Some(map.width),
            height: Some(map.height),
            showlegend: Some(true),
            geo: Some(GeoLayout {
                scope: "south america".to_string(),
                projection: Projection {
                    kind: map.projection.clone(),
                },
                center: Center {
                    lat: map.center_lat,
                    lon: map.center_lon,
                },
                showland: true,
                landcolor: "rgb(217, 217, 217)".to_string(),
                showcountries: true,
                countrycolor: "rgb(255, 255, 255)".to_string(),
            }),
            ..Default::default()
        },
    }
}

pub fn city_cases_figure(state: &str, city: &str, series: &[(NaiveDate, f64)]) -> Figure {
    Figure {
        data: vec![Trace::Bar(Bar {
            x: series.iter().map(|(d, _)| d.to_string()).collect(),
            y: series.iter().map(|(_, v)| *v).collect(),
            name: Some("cases".to_string()),
        })],
        layout: Layout {
            title: titled(&format!("Mostrando os dados de {}, {}", city, state)),
            xaxis: Some(Axis {
                title: titled("date"),
            }),
            yaxis: Some(Axis {
                title: titled("cases"),
            }),
            ..Default::default()
        },
    }
}

pub fn region_cases_figure(cases: &[(String, f64)]) -> Figure {
    Figure {
        data: vec![Trace::Pie(Pie {
            labels: cases.iter().map(|(r, _)| r.clone()).collect(),
            values: cases.iter().map(|(_, v)| *v).collect(),
            hovertemplate: "Região=%{label}<br>Quantidade de Casos=%{value}<extra></extra>"
                .to_string(),
        })],
        layout: Layout {
            title: titled("Distribuição de Casos por Região (2020 - 2021)"),
            ..Default::default()
        },
    }
}

pub fn region_deaths_figure(deaths: &[(String, f64)]) -> Figure {
    Figure {
        data: vec![Trace::Bar(Bar {
            x: deaths.iter().map(|(r, _)| r.clone()).collect(),
            y: deaths.iter().map(|(_, v)| *v).collect(),
            name: None,
        })],
        layout: Layout {
            title: titled("Óbitos Totais por Região (2020 - 2021)"),
            xaxis: Some(Axis {
                title: titled("Região"),
            }),
            yaxis: Some(Axis {
                title: titled("Quantidade de Mortes"),
            }),
            ..Default::default()
        },
    }
}
