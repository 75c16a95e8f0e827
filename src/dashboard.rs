use crate::config::MapConfig;
use crate::data::{Datasets, Frame};
use crate::error::{DashboardError, DashboardResult};
use crate::processing::{self, TableFilter};
use crate::render::{self, Figure};
use crate::translate::Translator;
use crate::types::AggregationMode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Map request. `scale` overrides the configured factor for the column/mode pair.
#[derive(Debug, Clone)]
pub struct MapRequest {
    pub column: String,
    pub mode: AggregationMode,
    pub scale: Option<f64>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateBounds {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

/// Which raw dataset a table view reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Cities,
    States,
}

impl FromStr for DatasetKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cities" => Ok(DatasetKind::Cities),
            "states" => Ok(DatasetKind::States),
            _ => Err(DashboardError::Validation(format!(
                "unknown dataset '{}', expected cities or states",
                s
            ))),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Cities => f.write_str("cities"),
            DatasetKind::States => f.write_str("states"),
        }
    }
}

/// One page of a filtered raw dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    /// Matching rows before paging.
    pub total: usize,
    pub rows: Vec<Vec<String>>,
}

/// Every chart the dashboard offers, over datasets loaded once.
pub struct Dashboard {
    data: Datasets,
    map: MapConfig,
    translator: Arc<dyn Translator>,
}

/// Builds the per-state bubble map for `frame`.
///
/// Aggregation and sizing are pure; the only side effect is one
/// `translator` call for the value label. A translator failure is
/// returned as [`DashboardError::Translation`] so callers can retry.
/// Input and `scale` are validated before the translator is called.
pub async fn create_map(
    frame: &Frame,
    value_column: &str,
    scale: f64,
    mode: AggregationMode,
    translator: &dyn Translator,
    map: &MapConfig,
) -> DashboardResult<Figure> {
    processing::validate_scale(scale)?;
    let rows = processing::aggregate_by_state(frame, value_column, mode)?;
    let label = translator.translate(value_column).await?;
    let markers = processing::compute_markers(&rows, scale, mode, &label)?;
    Ok(render::state_map_figure(&markers, &label, map))
}

impl Dashboard {
    pub fn new(data: Datasets, map: MapConfig, translator: Arc<dyn Translator>) -> Self {
        Self {
            data,
            map,
            translator,
        }
    }

    pub async fn map(&self, request: &MapRequest) -> DashboardResult<Figure> {
        let scale = match request.scale {
            Some(scale) => scale,
            None => self
                .map
                .scale_for(&request.column, request.mode)
                .map_err(|e| DashboardError::Validation(e.to_string()))?,
        };

        let frame = match (request.start, request.end) {
            (None, None) => Cow::Borrowed(&self.data.states),
            (start, end) => {
                let bounds = self.bounds()?;
                Cow::Owned(processing::filter_date_range(
                    &self.data.states,
                    start.unwrap_or(bounds.min),
                    end.unwrap_or(bounds.max),
                )?)
            }
        };

        info!(
            column = %request.column,
            mode = %request.mode,
            scale,
            rows = frame.len(),
            "Building state map"
        );
        create_map(
            &frame,
            &request.column,
            scale,
            request.mode,
            self.translator.as_ref(),
            &self.map,
        )
        .await
    }

    pub fn states(&self) -> DashboardResult<Vec<String>> {
        processing::list_states(&self.data.cities)
    }

    pub fn cities(&self, state: &str) -> DashboardResult<Vec<String>> {
        processing::list_cities(&self.data.cities, state)
    }

    pub fn city(&self, state: &str, city: &str) -> DashboardResult<Figure> {
        let series = processing::city_series(&self.data.cities, state, city)?;
        info!(state, city, points = series.len(), "Building city chart");
        Ok(render::city_cases_figure(state, city, &series))
    }

    pub fn bounds(&self) -> DashboardResult<DateBounds> {
        let (min, max) = processing::date_bounds(&self.data.states)?;
        Ok(DateBounds { min, max })
    }

    /// Region pie over `[start, end]`; both default to the latest date.
    pub fn regions(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> DashboardResult<Figure> {
        let bounds = self.bounds()?;
        let window = processing::filter_date_range(
            &self.data.states,
            start.unwrap_or(bounds.max),
            end.unwrap_or(bounds.max),
        )?;
        let cases = processing::last_by_region(&window, "cases")?;
        Ok(render::region_cases_figure(&cases))
    }

    pub fn deaths(&self) -> DashboardResult<Figure> {
        let deaths = processing::last_by_region(&self.data.states, "deaths")?;
        Ok(render::region_deaths_figure(&deaths))
    }

    /// Raw rows of `dataset` matching `filter`, one page at a time.
    pub fn table(&self, dataset: DatasetKind, filter: &TableFilter) -> DashboardResult<TableView> {
        let frame = match dataset {
            DatasetKind::Cities => &self.data.cities,
            DatasetKind::States => &self.data.states,
        };
        let matched = processing::filter_table(frame, filter)?;
        info!(%dataset, total = matched.len(), "Building table view");

        Ok(TableView {
            columns: matched.headers().to_vec(),
            total: matched.len(),
            rows: matched
                .rows()
                .iter()
                .skip(filter.offset)
                .take(filter.limit)
                .cloned()
                .collect(),
        })
    }
}
