use std::collections::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result, anyhow};

use crate::types::AggregationMode;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub cities_csv: PathBuf,
    pub states_csv: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_title_suffix")]
    pub title_suffix: String,
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,
    #[serde(default = "default_center_lon")]
    pub center_lon: f64,
    #[serde(default = "default_projection")]
    pub projection: String,
    // Keyed by value column name.
    #[serde(default = "default_scales")]
    pub scales: HashMap<String, ScaleConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ScaleConfig {
    pub sum: f64,
    pub mean: f64,
}

impl ScaleConfig {
    pub fn for_mode(&self, mode: AggregationMode) -> f64 {
        match mode {
            AggregationMode::Sum => self.sum,
            AggregationMode::Mean => self.mean,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title_suffix: default_title_suffix(),
            center_lat: default_center_lat(),
            center_lon: default_center_lon(),
            projection: default_projection(),
            scales: default_scales(),
        }
    }
}

impl MapConfig {
    pub fn scale_for(&self, column: &str, mode: AggregationMode) -> Result<f64> {
        self.scales
            .get(column)
            .map(|s| s.for_mode(mode))
            .ok_or_else(|| anyhow!("No marker scale configured for column '{}'", column))
    }
}

fn default_width() -> u32 {
    1000
}

fn default_height() -> u32 {
    800
}

fn default_title_suffix() -> String {
    "de COVID-19 por Estado".to_string()
}

fn default_center_lat() -> f64 {
    -14.235
}

fn default_center_lon() -> f64 {
    -51.9253
}

fn default_projection() -> String {
    "natural earth".to_string()
}

// Tuned against the per-state daily dataset: cumulative counts summed
// over every day reach the hundreds of millions for SP.
fn default_scales() -> HashMap<String, ScaleConfig> {
    let mut scales = HashMap::new();
    scales.insert("cases".to_string(), ScaleConfig {
        sum: 2.0e-7,
        mean: 1.0e-4,
    });
    scales.insert("deaths".to_string(), ScaleConfig {
        sum: 8.0e-6,
        mean: 4.0e-3,
    });
    scales
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    None,
    Glossary,
    LibreTranslate,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslationConfig {
    #[serde(default = "default_provider")]
    pub provider: TranslationProvider,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_glossary")]
    pub glossary: HashMap<String, String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_endpoint(),
            api_key: None,
            source: default_source(),
            target: default_target(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            glossary: default_glossary(),
        }
    }
}

fn default_provider() -> TranslationProvider {
    TranslationProvider::Glossary
}

fn default_endpoint() -> String {
    "http://localhost:5000".to_string()
}

fn default_source() -> String {
    "en".to_string()
}

fn default_target() -> String {
    "pt".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    4000
}

fn default_glossary() -> HashMap<String, String> {
    let mut glossary = HashMap::new();
    glossary.insert("cases".to_string(), "casos".to_string());
    glossary.insert("deaths".to_string(), "óbitos".to_string());
    glossary
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("web")
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (column, scale) in &self.map.scales {
            for factor in [scale.sum, scale.mean] {
                if !(factor.is_finite() && factor > 0.0) {
                    return Err(anyhow!(
                        "Scale factors for '{}' must be positive, got {}",
                        column,
                        factor
                    ));
                }
            }
        }
        if self.map.width == 0 || self.map.height == 0 {
            return Err(anyhow!("Map width and height must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [input]
            cities_csv = "data/brazil_covid19_cities.csv"
            states_csv = "data/brazil_covid19.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.map.width, 1000);
        assert_eq!(config.translation.provider, TranslationProvider::Glossary);
        assert_eq!(config.translation.glossary["deaths"], "óbitos");
        assert_eq!(config.server.port, 8080);
        assert!(config.map.scale_for("cases", AggregationMode::Mean).unwrap() > 0.0);
    }

    #[test]
    fn explicit_sections_override_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [input]
            cities_csv = "c.csv"
            states_csv = "s.csv"

            [map]
            width = 640
            title_suffix = "por UF"

            [map.scales.cases]
            sum = 0.5
            mean = 2.0

            [translation]
            provider = "libretranslate"
            endpoint = "https://translate.example.org"
            max_retries = 0

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.map.width, 640);
        assert_eq!(config.map.height, 800);
        assert_eq!(config.map.title_suffix, "por UF");
        assert_eq!(config.map.scale_for("cases", AggregationMode::Sum).unwrap(), 0.5);
        assert!(config.map.scale_for("deaths", AggregationMode::Sum).is_err());
        assert_eq!(config.translation.provider, TranslationProvider::LibreTranslate);
        assert_eq!(config.translation.max_retries, 0);
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn rejects_non_positive_scale() {
        let err = AppConfig::from_toml(
            r#"
            [input]
            cities_csv = "c.csv"
            states_csv = "s.csv"

            [map.scales.cases]
            sum = 0.0
            mean = 1.0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }

    #[test]
    fn missing_input_section_fails() {
        assert!(AppConfig::from_toml("[server]\nport = 1\n").is_err());
    }
}
