//! Polars view of the characteristic table.

use polars::prelude::*;

use crate::export::{CharacteristicTable, ExportError};

impl CharacteristicTable {
    /// Convert the table into a `DataFrame` with columns
    /// `security_id` (i64), `date` (Date) and the characteristic (f64).
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be assembled.
    pub fn to_dataframe(&self) -> Result<DataFrame, ExportError> {
        let ids: Vec<i64> = self.records().iter().map(|r| r.security_id).collect();
        let dates: Vec<String> = self
            .records()
            .iter()
            .map(|r| r.date.format("%Y-%m-%d").to_string())
            .collect();
        let values: Vec<f64> = self
            .records()
            .iter()
            .map(|r| r.residual_variance)
            .collect();

        let df = DataFrame::new(vec![
            Series::new("security_id".into(), ids).into(),
            Series::new("date".into(), dates).into(),
            Series::new(self.name().into(), values).into(),
        ])?;

        let df = df
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()?;

        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rvar_data::ResidualVarianceRecord;

    #[test]
    fn test_to_dataframe() {
        let d = |day| NaiveDate::from_ymd_opt(2021, 8, day).unwrap();
        let table = CharacteristicTable::new(
            "rvar_ff3",
            vec![
                ResidualVarianceRecord::new(7, d(2), 0.5),
                ResidualVarianceRecord::new(7, d(3), 0.25),
            ],
        );

        let df = table.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names(), vec!["security_id", "date", "rvar_ff3"]);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);

        let values = df.column("rvar_ff3").unwrap().f64().unwrap();
        assert_eq!(values.get(1), Some(0.25));
    }

    #[test]
    fn test_empty_table() {
        let df = CharacteristicTable::new("rvar_ff3", vec![])
            .to_dataframe()
            .unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 3);
    }
}
