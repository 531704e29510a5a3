//! CSV panel loader.

use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use super::resolve_excess_return;
use crate::error::Result;
use crate::observation::{Observation, SecurityId};
use crate::panel::Panel;

/// One CSV row of the joined security/factor file.
#[derive(Debug, Deserialize)]
struct PanelRow {
    #[serde(alias = "permno")]
    security_id: SecurityId,
    date: NaiveDate,
    #[serde(default, alias = "exret")]
    excess_return: Option<f64>,
    #[serde(default)]
    ret: Option<f64>,
    #[serde(default)]
    rf: Option<f64>,
    #[serde(default)]
    mktrf: Option<f64>,
    #[serde(default)]
    smb: Option<f64>,
    #[serde(default)]
    hml: Option<f64>,
}

impl PanelRow {
    fn into_observation(self) -> Observation {
        Observation::new(
            self.security_id,
            self.date,
            resolve_excess_return(self.excess_return, self.ret, self.rf),
            [
                self.mktrf.unwrap_or(f64::NAN),
                self.smb.unwrap_or(f64::NAN),
                self.hml.unwrap_or(f64::NAN),
            ],
        )
    }
}

/// Load a panel from a CSV file with a header row.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a row fails to parse, or the
/// rows violate the timeline invariants.
pub fn read_panel_csv<P: AsRef<Path>>(path: P) -> Result<Panel> {
    let path = path.as_ref();
    info!("Loading panel from: {}", path.display());
    let file = File::open(path)?;
    read_panel_csv_from(file)
}

/// Load a panel from any CSV reader with a header row.
///
/// # Errors
///
/// Returns an error if a row fails to parse or the rows violate the timeline
/// invariants.
pub fn read_panel_csv_from<R: Read>(reader: R) -> Result<Panel> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut incomplete = 0usize;
    for result in rdr.deserialize::<PanelRow>() {
        let observation = result?.into_observation();
        if !observation.is_complete() {
            incomplete += 1;
        }
        rows.push(observation);
    }

    if incomplete > 0 {
        debug!(incomplete, "Rows with missing values kept as NaN");
    }

    let panel = Panel::from_observations(rows)?;
    info!(
        securities = panel.security_count(),
        observations = panel.observation_count(),
        "Loaded panel"
    );
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DataError, InputShapeError};

    #[test]
    fn test_read_excess_return_layout() {
        let data = "\
security_id,date,excess_return,mktrf,smb,hml
2,2020-01-03,0.01,0.02,0.003,-0.001
1,2020-01-02,-0.01,0.01,0.002,0.004
2,2020-01-02,0.02,0.01,0.002,0.004
";
        let panel = read_panel_csv_from(data.as_bytes()).unwrap();
        assert_eq!(panel.security_ids(), vec![1, 2]);
        assert_eq!(panel.get(2).unwrap().len(), 2);

        let first = panel.get(2).unwrap().observations()[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(first.excess_return, 0.02);
        assert_eq!(first.factors, [0.01, 0.002, 0.004]);
    }

    #[test]
    fn test_read_crsp_layout_derives_excess_return() {
        let data = "\
permno,date,ret,rf,mktrf,smb,hml
10001,2020-01-02,0.05,0.01,0.01,0.002,0.004
10001,2020-01-03,,0.01,0.01,0.002,
";
        let panel = read_panel_csv_from(data.as_bytes()).unwrap();
        let observations = panel.get(10001).unwrap().observations();

        assert!((observations[0].excess_return - 0.04).abs() < 1e-12);
        assert!(observations[0].is_complete());
        assert!(observations[1].excess_return.is_nan());
        assert!(observations[1].factors[2].is_nan());
    }

    #[test]
    fn test_duplicate_rows_are_input_shape_errors() {
        let data = "\
security_id,date,excess_return,mktrf,smb,hml
1,2020-01-02,0.01,0.02,0.003,-0.001
1,2020-01-02,0.01,0.02,0.003,-0.001
";
        let err = read_panel_csv_from(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DataError::InputShape(InputShapeError::DuplicateDate { security_id: 1, .. })
        ));
    }

    #[test]
    fn test_malformed_date_is_csv_error() {
        let data = "\
security_id,date,excess_return,mktrf,smb,hml
1,not-a-date,0.01,0.02,0.003,-0.001
";
        assert!(matches!(
            read_panel_csv_from(data.as_bytes()).unwrap_err(),
            DataError::Csv(_)
        ));
    }
}
