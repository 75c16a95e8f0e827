use crate::data::Frame;
use crate::error::{DashboardError, DashboardResult};
use crate::types::{AggregatedRow, AggregationMode, MarkerSpec, StateCode};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Groups `frame` by its `state` column and reduces `value_column` per state.
///
/// Rows come back ordered by UF code, one per state present in the input.
/// Empty cells are skipped; a state with no values at all reduces to zero.
/// Empty input, missing columns, negative or non-numeric values and unknown
/// state codes are all rejected before any reduction happens.
pub fn aggregate_by_state(
    frame: &Frame,
    value_column: &str,
    mode: AggregationMode,
) -> DashboardResult<Vec<AggregatedRow>> {
    if frame.is_empty() {
        return Err(DashboardError::Validation("dataset is empty".to_string()));
    }
    frame.require_columns(&["state", value_column])?;

    let states = frame.str_values("state")?;
    let values = frame.f64_values(value_column)?;

    // Missing cells keep their state in the output but count toward neither
    // the total nor the mean's denominator.
    let mut groups: BTreeMap<StateCode, (f64, usize)> = BTreeMap::new();
    for (line, (code, value)) in states.iter().zip(values).enumerate() {
        let state: StateCode = code.parse()?;
        let entry = groups.entry(state).or_insert((0.0, 0));
        let Some(value) = value else { continue };
        if value < 0.0 {
            return Err(DashboardError::Validation(format!(
                "row {}: column '{}' is negative: {}",
                line + 1,
                value_column,
                value
            )));
        }
        entry.0 += value;
        entry.1 += 1;
    }

    debug!(states = groups.len(), %mode, column = value_column, "Aggregated rows");

    Ok(groups
        .into_iter()
        .map(|(state, (total, count))| AggregatedRow {
            state,
            value: match mode {
                AggregationMode::Sum => total,
                AggregationMode::Mean if count == 0 => 0.0,
                AggregationMode::Mean => total / count as f64,
            },
        })
        .collect())
}

/// Marker size for one state. Every row equal to `max` is dampened, so ties share it.
pub fn marker_size(value: f64, max: f64, scale: f64, mode: AggregationMode) -> f64 {
    if value == max {
        value * mode.dampened_scale(scale)
    } else {
        value * scale
    }
}

/// Two decimals with a decimal comma: `12.345` becomes `"12,35"`.
pub fn format_value(value: f64) -> String {
    format!("{:.2}", value).replace('.', ",")
}

pub fn validate_scale(scale: f64) -> DashboardResult<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(DashboardError::Validation(format!(
            "scale factor must be positive, got {}",
            scale
        )))
    }
}

pub fn compute_markers(
    rows: &[AggregatedRow],
    scale: f64,
    mode: AggregationMode,
    unit_label: &str,
) -> DashboardResult<Vec<MarkerSpec>> {
    validate_scale(scale)?;

    let max = rows.iter().map(|r| r.value).fold(f64::NEG_INFINITY, f64::max);

    Ok(rows
        .iter()
        .map(|row| {
            let centroid = row.state.centroid();
            MarkerSpec {
                state: row.state,
                lat: centroid.y(),
                lon: centroid.x(),
                label_text: format!("{}: {} {}", row.state, format_value(row.value), unit_label),
                size: marker_size(row.value, max, scale, mode),
            }
        })
        .collect())
}

/// Distinct values in first-seen order.
pub fn distinct_in_order<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

pub fn list_states(cities: &Frame) -> DashboardResult<Vec<String>> {
    Ok(distinct_in_order(cities.str_values("state")?))
}

pub fn list_cities(cities: &Frame, state: &str) -> DashboardResult<Vec<String>> {
    let states = cities.str_values("state")?;
    let names = cities.str_values("name")?;
    Ok(distinct_in_order(
        states
            .iter()
            .zip(names)
            .filter(|(s, _)| **s == state)
            .map(|(_, n)| n),
    ))
}

/// Daily `cases` for one city; days without a reported value are left out.
pub fn city_series(
    cities: &Frame,
    state: &str,
    city: &str,
) -> DashboardResult<Vec<(NaiveDate, f64)>> {
    let states = cities.str_values("state")?;
    let names = cities.str_values("name")?;
    let selected = cities.filter(|i| states[i] == state && names[i] == city);
    if selected.is_empty() {
        return Err(DashboardError::Validation(format!(
            "no rows for city '{}' in state '{}'",
            city, state
        )));
    }

    let dates = selected.dates("date")?;
    let cases = selected.f64_values("cases")?;
    Ok(dates
        .into_iter()
        .zip(cases)
        .filter_map(|(date, value)| value.map(|v| (date, v)))
        .collect())
}

/// Earliest and latest date in `frame`.
pub fn date_bounds(frame: &Frame) -> DashboardResult<(NaiveDate, NaiveDate)> {
    let dates = frame.dates("date")?;
    match (dates.iter().min(), dates.iter().max()) {
        (Some(min), Some(max)) => Ok((*min, *max)),
        _ => Err(DashboardError::Validation("dataset is empty".to_string())),
    }
}

/// Rows with `start <= date <= end`.
pub fn filter_date_range(
    frame: &Frame,
    start: NaiveDate,
    end: NaiveDate,
) -> DashboardResult<Frame> {
    if start > end {
        return Err(DashboardError::Validation(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }
    let dates = frame.dates("date")?;
    Ok(frame.filter(|i| dates[i] >= start && dates[i] <= end))
}

/// Last non-empty `value_column` for each region, regions in sorted order.
///
/// A region whose cells are all empty is left out.
pub fn last_by_region(frame: &Frame, value_column: &str) -> DashboardResult<Vec<(String, f64)>> {
    let regions = frame.str_values("region")?;
    let values = frame.f64_values(value_column)?;

    let mut last: BTreeMap<String, f64> = BTreeMap::new();
    for (region, value) in regions.into_iter().zip(values) {
        if let Some(value) = value {
            last.insert(region.to_string(), value);
        }
    }
    Ok(last.into_iter().collect())
}

fn default_limit() -> usize {
    100
}

/// Row filter for raw table views. Unset fields match everything.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableFilter {
    pub state: Option<String>,
    /// Matches the `name` column of the city dataset.
    pub city: Option<String>,
    pub region: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for TableFilter {
    fn default() -> Self {
        Self {
            state: None,
            city: None,
            region: None,
            start: None,
            end: None,
            offset: 0,
            limit: default_limit(),
        }
    }
}

/// Rows matching every set field of `filter`. Filtering on a column the
/// frame does not have is a validation error.
pub fn filter_table(frame: &Frame, filter: &TableFilter) -> DashboardResult<Frame> {
    let mut keep = vec![true; frame.len()];

    let exact = [
        ("state", &filter.state),
        ("name", &filter.city),
        ("region", &filter.region),
    ];
    for (column, wanted) in exact {
        if let Some(wanted) = wanted {
            let values = frame.str_values(column)?;
            for (k, value) in keep.iter_mut().zip(values) {
                *k &= value == wanted.as_str();
            }
        }
    }

    if filter.start.is_some() || filter.end.is_some() {
        let start = filter.start.unwrap_or(NaiveDate::MIN);
        let end = filter.end.unwrap_or(NaiveDate::MAX);
        if start > end {
            return Err(DashboardError::Validation(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        let dates = frame.dates("date")?;
        for (k, date) in keep.iter_mut().zip(dates) {
            *k &= date >= start && date <= end;
        }
    }

    Ok(frame.filter(|i| keep[i]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::{frame, CITIES_CSV, STATES_CSV};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sum_and_mean_per_state() {
        let f = frame("state,cases\nSP,10\nSP,20\nRJ,5\n");

        let sum = aggregate_by_state(&f, "cases", AggregationMode::Sum).unwrap();
        assert_eq!(
            sum,
            vec![
                AggregatedRow {
                    state: StateCode::RJ,
                    value: 5.0,
                },
                AggregatedRow {
                    state: StateCode::SP,
                    value: 30.0,
                },
            ]
        );

        let mean = aggregate_by_state(&f, "cases", AggregationMode::Mean).unwrap();
        assert_eq!(mean[1].value, 15.0);
    }

    #[test]
    fn empty_cells_do_not_count_toward_the_mean() {
        let f = frame("state,cases\nSP,10\nSP,\nRJ,\n");

        let mean = aggregate_by_state(&f, "cases", AggregationMode::Mean).unwrap();
        assert_eq!(
            mean,
            vec![
                AggregatedRow {
                    state: StateCode::RJ,
                    value: 0.0,
                },
                AggregatedRow {
                    state: StateCode::SP,
                    value: 10.0,
                },
            ]
        );

        let sum = aggregate_by_state(&f, "cases", AggregationMode::Sum).unwrap();
        assert_eq!(sum[1].value, 10.0);
    }

    #[test]
    fn one_row_per_distinct_state() {
        let f = frame(STATES_CSV);
        let rows = aggregate_by_state(&f, "deaths", AggregationMode::Sum).unwrap();
        let states: Vec<_> = rows.iter().map(|r| r.state).collect();
        assert_eq!(states, vec![StateCode::BA, StateCode::RS, StateCode::SP]);
        assert_eq!(rows[2].value, 6.0);
    }

    #[test]
    fn aggregation_rejects_bad_input() {
        let empty = frame("state,cases\n");
        assert!(matches!(
            aggregate_by_state(&empty, "cases", AggregationMode::Sum),
            Err(DashboardError::Validation(_))
        ));

        let no_column = frame("state,cases\nSP,1\n");
        assert!(matches!(
            aggregate_by_state(&no_column, "deaths", AggregationMode::Sum),
            Err(DashboardError::Validation(_))
        ));

        let negative = frame("state,cases\nSP,-1\n");
        assert!(matches!(
            aggregate_by_state(&negative, "cases", AggregationMode::Sum),
            Err(DashboardError::Validation(_))
        ));

        let unknown = frame("state,cases\nSP,1\nZZ,2\n");
        assert!(matches!(
            aggregate_by_state(&unknown, "cases", AggregationMode::Sum),
            Err(DashboardError::UnknownState(code)) if code == "ZZ"
        ));
    }

    #[test]
    fn max_marker_is_dampened() {
        let size = marker_size(100.0, 100.0, 1.0, AggregationMode::Sum);
        assert!((size - 66.666_666).abs() < 1e-3);
        assert_eq!(marker_size(40.0, 100.0, 1.0, AggregationMode::Sum), 40.0);

        let mean = marker_size(100.0, 100.0, 1.0, AggregationMode::Mean);
        assert!(mean < 100.0 * 1.0);
        assert!((mean - 100.0 * (1.0 - 1.0 / 1.09)).abs() < 1e-9);
    }

    #[test]
    fn tied_maxima_are_all_dampened() {
        let rows = vec![
            AggregatedRow {
                state: StateCode::MG,
                value: 50.0,
            },
            AggregatedRow {
                state: StateCode::RJ,
                value: 50.0,
            },
            AggregatedRow {
                state: StateCode::SC,
                value: 10.0,
            },
        ];
        let markers = compute_markers(&rows, 3.0, AggregationMode::Sum, "casos").unwrap();
        assert_eq!(markers[0].size, 100.0);
        assert_eq!(markers[1].size, 100.0);
        assert_eq!(markers[2].size, 30.0);
    }

    #[test]
    fn decimal_comma_formatting() {
        assert_eq!(format_value(12.345), "12,35");
        assert_eq!(format_value(30.0), "30,00");
        assert_eq!(format_value(2.0 / 3.0), "0,67");
    }

    #[test]
    fn markers_carry_centroid_and_label() {
        let rows = vec![AggregatedRow {
            state: StateCode::SP,
            value: 12.345,
        }];
        let markers = compute_markers(&rows, 1.0, AggregationMode::Mean, "casos").unwrap();
        let sp = &markers[0];
        assert_eq!(sp.label_text, "SP: 12,35 casos");
        assert_eq!(sp.lat, StateCode::SP.centroid().y());
        assert_eq!(sp.lon, StateCode::SP.centroid().x());
        assert!(sp.size >= 0.0);
    }

    #[test]
    fn compute_markers_rejects_bad_scale() {
        let rows = vec![AggregatedRow {
            state: StateCode::SP,
            value: 1.0,
        }];
        assert!(compute_markers(&rows, 0.0, AggregationMode::Sum, "x").is_err());
        assert!(compute_markers(&rows, f64::NAN, AggregationMode::Sum, "x").is_err());
        assert!(validate_scale(-1.0).is_err());
        assert!(validate_scale(0.25).is_ok());
    }

    #[test]
    fn lists_states_and_cities_in_first_seen_order() {
        let f = frame(CITIES_CSV);
        assert_eq!(list_states(&f).unwrap(), vec!["SP", "RJ"]);
        assert_eq!(list_cities(&f, "SP").unwrap(), vec!["São Paulo", "Campinas"]);
        assert_eq!(list_cities(&f, "RJ").unwrap(), vec!["Rio de Janeiro", "Niterói"]);
        assert!(list_cities(&f, "AC").unwrap().is_empty());
    }

    #[test]
    fn city_series_selects_one_city() {
        let f = frame(CITIES_CSV);
        let series = city_series(&f, "SP", "São Paulo").unwrap();
        assert_eq!(series, vec![(date(2020, 3, 1), 8.0), (date(2020, 3, 2), 15.0)]);
        assert!(city_series(&f, "RJ", "São Paulo").is_err());
    }

    #[test]
    fn date_range_is_inclusive() {
        let f = frame(STATES_CSV);
        assert_eq!(date_bounds(&f).unwrap(), (date(2020, 3, 1), date(2020, 3, 3)));

        let window = filter_date_range(&f, date(2020, 3, 2), date(2020, 3, 3)).unwrap();
        assert_eq!(window.len(), 4);
        assert!(filter_date_range(&f, date(2020, 3, 3), date(2020, 3, 1)).is_err());
    }

    #[test]
    fn last_value_per_region() {
        let f = frame(STATES_CSV);
        let cases = last_by_region(&f, "cases").unwrap();
        assert_eq!(
            cases,
            vec![
                ("Nordeste".to_string(), 7.0),
                ("Sudeste".to_string(), 35.0),
                ("Sul".to_string(), 4.0),
            ]
        );
        let deaths = last_by_region(&f, "deaths").unwrap();
        assert_eq!(deaths[1], ("Sudeste".to_string(), 3.0));
    }

    #[test]
    fn table_filter_combines_columns_and_dates() {
        let f = frame(STATES_CSV);
        let filter = TableFilter {
            region: Some("Sudeste".to_string()),
            start: Some(date(2020, 3, 2)),
            ..Default::default()
        };
        let rows = filter_table(&f, &filter).unwrap();
        assert_eq!(rows.f64_values("cases").unwrap(), vec![Some(20.0), Some(35.0)]);

        let reversed = TableFilter {
            start: Some(date(2020, 3, 3)),
            end: Some(date(2020, 3, 1)),
            ..Default::default()
        };
        assert!(filter_table(&f, &reversed).is_err());
        assert_eq!(filter_table(&f, &TableFilter::default()).unwrap().len(), 6);
    }

    #[test]
    fn last_by_region_skips_empty_cells() {
        let f = frame("region,deaths\nSul,5\nSul,\nNorte,\n");
        assert_eq!(last_by_region(&f, "deaths").unwrap(), vec![("Sul".to_string(), 5.0)]);
    }

    #[test]
    fn city_series_skips_unreported_days() {
        let f = frame("date,state,name,cases\n2020-03-01,SP,Campinas,1\n2020-03-02,SP,Campinas,\n");
        assert_eq!(city_series(&f, "SP", "Campinas").unwrap(), vec![(date(2020, 3, 1), 1.0)]);
    }
}
