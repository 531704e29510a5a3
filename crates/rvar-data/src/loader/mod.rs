//! Panel loaders.
//!
//! Both loaders accept the column layout of a CRSP daily file joined with the
//! daily Fama-French factors: `permno` is accepted for `security_id`, and the
//! excess return is either read directly (`excess_return` / `exret`) or derived
//! as `ret - rf`. Empty numeric fields become NaN.

pub mod delimited;
pub mod frame;

pub use delimited::{read_panel_csv, read_panel_csv_from};
pub use frame::{PanelColumns, panel_from_dataframe};

/// Resolve the excess return of a row from the fields available.
pub(crate) fn resolve_excess_return(
    excess_return: Option<f64>,
    ret: Option<f64>,
    rf: Option<f64>,
) -> f64 {
    match (excess_return, ret, rf) {
        (Some(exret), _, _) => exret,
        (None, Some(ret), Some(rf)) => ret - rf,
        _ => f64::NAN,
    }
}
