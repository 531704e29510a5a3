//! Polars `DataFrame` panel loader.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::resolve_excess_return;
use crate::error::{DataError, Result};
use crate::observation::{FACTOR_COUNT, Observation};
use crate::panel::Panel;

/// Column names of a panel `DataFrame`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelColumns {
    /// Integer security identifier
    pub security_id: String,
    /// Trading date (`Date` or `YYYY-MM-DD` strings)
    pub date: String,
    /// Excess return; when absent it is derived from `ret` and `rf`
    pub excess_return: String,
    /// Raw security return
    pub ret: String,
    /// Risk-free rate
    pub rf: String,
    /// Factor return columns in regression order
    pub factors: [String; FACTOR_COUNT],
}

impl Default for PanelColumns {
    fn default() -> Self {
        Self {
            security_id: "security_id".to_string(),
            date: "date".to_string(),
            excess_return: "excess_return".to_string(),
            ret: "ret".to_string(),
            rf: "rf".to_string(),
            factors: ["mktrf".to_string(), "smb".to_string(), "hml".to_string()],
        }
    }
}

impl PanelColumns {
    /// Column layout of the CRSP daily file joined with the factor file.
    pub fn crsp() -> Self {
        Self {
            security_id: "permno".to_string(),
            excess_return: "exret".to_string(),
            ..Default::default()
        }
    }
}

fn required<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()))
}

fn optional_float(df: &DataFrame, name: &str) -> Result<Option<Column>> {
    match df.column(name) {
        Ok(column) => Ok(Some(column.cast(&DataType::Float64)?)),
        Err(_) => Ok(None),
    }
}

/// Build a panel from a `DataFrame`.
///
/// # Errors
///
/// Returns an error if a required column is missing, a value cannot be
/// converted, or the rows violate the timeline invariants.
pub fn panel_from_dataframe(df: &DataFrame, columns: &PanelColumns) -> Result<Panel> {
    let ids = required(df, &columns.security_id)?.cast(&DataType::Int64)?;
    let ids = ids.i64()?;
    let dates = required(df, &columns.date)?.cast(&DataType::String)?;
    let dates = dates.str()?;

    let excess = optional_float(df, &columns.excess_return)?;
    let ret = optional_float(df, &columns.ret)?;
    let rf = optional_float(df, &columns.rf)?;
    if excess.is_none() && (ret.is_none() || rf.is_none()) {
        return Err(DataError::MissingColumn(columns.excess_return.clone()));
    }
    let excess = excess.as_ref().map(|c| c.f64()).transpose()?;
    let ret = ret.as_ref().map(|c| c.f64()).transpose()?;
    let rf = rf.as_ref().map(|c| c.f64()).transpose()?;

    let factor_columns = columns
        .factors
        .iter()
        .map(|name| Ok(required(df, name)?.cast(&DataType::Float64)?))
        .collect::<Result<Vec<Column>>>()?;
    let factors = factor_columns
        .iter()
        .map(|c| c.f64())
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let security_id = ids
            .get(i)
            .ok_or_else(|| DataError::Parse(format!("Missing security_id in row {i}")))?;
        let date = dates
            .get(i)
            .ok_or_else(|| DataError::Parse(format!("Missing date in row {i}")))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| DataError::Parse(format!("Invalid date '{date}' in row {i}: {e}")))?;

        let excess_return = resolve_excess_return(
            excess.and_then(|ca| ca.get(i)),
            ret.and_then(|ca| ca.get(i)),
            rf.and_then(|ca| ca.get(i)),
        );

        let mut values = [f64::NAN; FACTOR_COUNT];
        for (value, ca) in values.iter_mut().zip(&factors) {
            *value = ca.get(i).unwrap_or(f64::NAN);
        }

        rows.push(Observation::new(security_id, date, excess_return, values));
    }

    let panel = Panel::from_observations(rows)?;
    info!(
        securities = panel.security_count(),
        observations = panel.observation_count(),
        "Converted DataFrame to panel"
    );
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor_series() -> Vec<Column> {
        vec![
            Series::new("mktrf".into(), vec![0.01, 0.02, -0.01]).into(),
            Series::new("smb".into(), vec![0.001, 0.002, 0.003]).into(),
            Series::new("hml".into(), vec![-0.004, 0.0, 0.004]).into(),
        ]
    }

    #[test]
    fn test_panel_from_dataframe() {
        let mut cols: Vec<Column> = vec![
            Series::new("security_id".into(), vec![5i64, 5, 3]).into(),
            Series::new("date".into(), vec!["2020-01-03", "2020-01-02", "2020-01-02"]).into(),
            Series::new("excess_return".into(), vec![0.1, 0.2, 0.3]).into(),
        ];
        cols.extend(factor_series());
        let df = DataFrame::new(cols).unwrap();

        let panel = panel_from_dataframe(&df, &PanelColumns::default()).unwrap();
        assert_eq!(panel.security_ids(), vec![3, 5]);

        let timeline = panel.get(5).unwrap();
        assert_eq!(timeline.observations()[0].excess_return, 0.2);
        assert_eq!(timeline.observations()[1].factors, [0.01, 0.001, -0.004]);
    }

    #[test]
    fn test_crsp_columns_with_date_dtype() {
        let mut cols: Vec<Column> = vec![
            Series::new("permno".into(), vec![10001i64, 10001, 10001]).into(),
            Series::new("date".into(), vec!["2020-01-02", "2020-01-03", "2020-01-06"]).into(),
            Series::new("ret".into(), vec![0.05, 0.01, 0.0]).into(),
            Series::new("rf".into(), vec![0.01, 0.01, 0.01]).into(),
        ];
        cols.extend(factor_series());
        let df = DataFrame::new(cols)
            .unwrap()
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()
            .unwrap();

        let panel = panel_from_dataframe(&df, &PanelColumns::crsp()).unwrap();
        let observations = panel.get(10001).unwrap().observations();
        assert_eq!(observations.len(), 3);
        assert!((observations[0].excess_return - 0.04).abs() < 1e-12);
        assert_eq!(
            observations[2].date,
            NaiveDate::from_ymd_opt(2020, 1, 6).unwrap()
        );
    }

    #[test]
    fn test_missing_factor_column() {
        let df = DataFrame::new(vec![
            Series::new("security_id".into(), vec![1i64]).into(),
            Series::new("date".into(), vec!["2020-01-02"]).into(),
            Series::new("excess_return".into(), vec![0.1]).into(),
        ])
        .unwrap();

        let err = panel_from_dataframe(&df, &PanelColumns::default()).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn(name) if name == "mktrf"));
    }

    #[test]
    fn test_missing_return_columns() {
        let mut cols: Vec<Column> = vec![
            Series::new("security_id".into(), vec![1i64, 1, 1]).into(),
            Series::new("date".into(), vec!["2020-01-02", "2020-01-03", "2020-01-06"]).into(),
        ];
        cols.extend(factor_series());
        let df = DataFrame::new(cols).unwrap();

        let err = panel_from_dataframe(&df, &PanelColumns::default()).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn(name) if name == "excess_return"));
    }
}
