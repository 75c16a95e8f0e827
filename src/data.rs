use crate::config::AppConfig;
use crate::error::{DashboardError, DashboardResult};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

pub const CITY_COLUMNS: [&str; 5] = ["date", "state", "name", "cases", "deaths"];
pub const STATE_COLUMNS: [&str; 5] = ["date", "region", "state", "cases", "deaths"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column-addressable CSV table. Cells stay as text and are parsed on access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

/// Both dashboard datasets, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub cities: Frame,
    pub states: Frame,
}

pub fn load_data(config: &AppConfig) -> Result<Datasets> {
    info!(path = ?config.input.cities_csv, "Loading city dataset");
    let cities = Frame::from_path(&config.input.cities_csv)
        .with_context(|| format!("Failed to load {:?}", config.input.cities_csv))?;
    cities.require_columns(&CITY_COLUMNS)?;
    cities.dates("date")?;
    info!(rows = cities.len(), "Loaded city dataset");

    info!(path = ?config.input.states_csv, "Loading state dataset");
    let states = Frame::from_path(&config.input.states_csv)
        .with_context(|| format!("Failed to load {:?}", config.input.states_csv))?;
    states.require_columns(&STATE_COLUMNS)?;
    states.dates("date")?;
    info!(rows = states.len(), "Loaded state dataset");

    Ok(Datasets { cities, states })
}

impl Frame {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();
        Self {
            headers,
            index,
            rows,
        }
    }

    pub fn from_path(path: &Path) -> DashboardResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> DashboardResult<Self> {
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self::new(headers, rows))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> DashboardResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DashboardError::Validation(format!("missing column '{}'", name)))
    }

    pub fn require_columns(&self, names: &[&str]) -> DashboardResult<()> {
        for name in names {
            self.column(name)?;
        }
        Ok(())
    }

    pub fn str_values(&self, name: &str) -> DashboardResult<Vec<&str>> {
        let idx = self.column(name)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
            .collect())
    }

    /// Numeric column; an empty cell is `None`, anything unparsable is rejected.
    pub fn f64_values(&self, name: &str) -> DashboardResult<Vec<Option<f64>>> {
        let idx = self.column(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(line, row)| {
                let raw = row.get(idx).map(String::as_str).unwrap_or("");
                if raw.is_empty() {
                    return Ok(None);
                }
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Some)
                    .ok_or_else(|| {
                        DashboardError::Validation(format!(
                            "row {}: column '{}' is not numeric: '{}'",
                            line + 1,
                            name,
                            raw
                        ))
                    })
            })
            .collect()
    }

    pub fn dates(&self, name: &str) -> DashboardResult<Vec<NaiveDate>> {
        self.str_values(name)?
            .into_iter()
            .enumerate()
            .map(|(line, raw)| {
                NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
                    DashboardError::Validation(format!(
                        "row {}: column '{}' is not a date: '{}'",
                        line + 1,
                        name,
                        raw
                    ))
                })
            })
            .collect()
    }

    /// Rows for which `keep(row_index)` holds, in original order.
    pub fn filter<F>(&self, mut keep: F) -> Frame
    where
        F: FnMut(usize) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(*i))
            .map(|(_, row)| row.clone())
            .collect();
        Frame {
            headers: self.headers.clone(),
            index: self.index.clone(),
            rows,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const STATES_CSV: &str = "\
date,region,state,cases,deaths
2020-03-01,Sudeste,SP,10,1
2020-03-01,Sul,RS,2,0
2020-03-02,Sudeste,SP,20,2
2020-03-02,Sul,RS,4,1
2020-03-03,Nordeste,BA,7,0
2020-03-03,Sudeste,SP,35,3
";

    pub(crate) const CITIES_CSV: &str = "\
date,state,name,code,cases,deaths
2020-03-01,SP,São Paulo,3550308,8,1
2020-03-01,SP,Campinas,3509502,1,0
2020-03-01,RJ,Rio de Janeiro,3304557,3,0
2020-03-02,SP,São Paulo,3550308,15,2
2020-03-02,RJ,Niterói,3303302,1,0
";

    pub(crate) fn frame(csv: &str) -> Frame {
        Frame::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn reads_headers_and_rows() {
        let f = frame(STATES_CSV);
        assert_eq!(f.len(), 6);
        assert_eq!(f.headers()[1], "region");
        assert_eq!(f.str_values("state").unwrap()[4], "BA");
        assert_eq!(f.f64_values("cases").unwrap()[5], Some(35.0));
    }

    #[test]
    fn empty_cells_are_missing_not_zero() {
        let f = frame("state,cases\nSP,10\nSP,\nRJ,0\n");
        assert_eq!(f.f64_values("cases").unwrap(), vec![Some(10.0), None, Some(0.0)]);
    }

    #[test]
    fn missing_column_is_a_validation_error() {
        let f = frame(STATES_CSV);
        assert!(matches!(f.column("population"), Err(DashboardError::Validation(_))));
        assert!(f.require_columns(&STATE_COLUMNS).is_ok());
        assert!(f.require_columns(&CITY_COLUMNS).is_err());
    }

    #[test]
    fn rejects_non_numeric_cells() {
        let f = frame("state,cases\nSP,12\nRJ,twelve\n");
        let err = f.f64_values("cases").unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn parses_dates() {
        let f = frame(STATES_CSV);
        let dates = f.dates("date").unwrap();
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
        assert!(frame("date\n01/03/2020\n").dates("date").is_err());
    }

    #[test]
    fn filter_keeps_order_and_schema() {
        let f = frame(STATES_CSV);
        let states = f.str_values("state").unwrap();
        let sp = f.filter(|i| states[i] == "SP");
        assert_eq!(sp.len(), 3);
        assert_eq!(sp.f64_values("cases").unwrap(), vec![Some(10.0), Some(20.0), Some(35.0)]);
        assert_eq!(sp.headers(), f.headers());
    }

    #[test]
    fn load_data_validates_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let cities = dir.path().join("cities.csv");
        let states = dir.path().join("states.csv");
        File::create(&cities).unwrap().write_all(CITIES_CSV.as_bytes()).unwrap();
        File::create(&states).unwrap().write_all(STATES_CSV.as_bytes()).unwrap();

        let config = AppConfig::from_toml(&format!(
            "[input]\ncities_csv = {:?}\nstates_csv = {:?}\n",
            cities, states
        ))
        .unwrap();
        let data = load_data(&config).unwrap();
        assert_eq!(data.cities.len(), 5);
        assert_eq!(data.states.len(), 6);

        // Swapped files: the city file has no region column.
        let swapped = AppConfig::from_toml(&format!(
            "[input]\ncities_csv = {:?}\nstates_csv = {:?}\n",
            cities, cities
        ))
        .unwrap();
        assert!(load_data(&swapped).is_err());
    }
}
