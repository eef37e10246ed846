use std::path::Path;

use super::dataframe::{Column, DataFrame};
use super::factor::FactorColumn;
use crate::error::{LmmError, Result};

impl DataFrame {
    /// Read a CSV file with a header row into a DataFrame.
    ///
    /// Column types are auto-detected: if every field in a column parses as
    /// `f64` it becomes a numeric column, otherwise a factor column. Fields
    /// are trimmed of surrounding whitespace.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let ncols = headers.len();

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); ncols];
        for record in reader.records() {
            let record = record?;
            if record.len() != ncols {
                return Err(LmmError::Data(format!(
                    "row has {} fields but header has {} columns",
                    record.len(),
                    ncols
                )));
            }
            for (i, field) in record.iter().enumerate() {
                raw[i].push(field.to_string());
            }
        }

        if ncols == 0 || raw[0].is_empty() {
            return Ok(DataFrame::new());
        }

        let mut df = DataFrame::new();
        for (header, values) in headers.iter().zip(raw.iter()) {
            let parsed: std::result::Result<Vec<f64>, _> =
                values.iter().map(|s| s.parse::<f64>()).collect();
            let column = match parsed {
                Ok(floats) => Column::Float(floats),
                Err(_) => Column::Factor(FactorColumn::new(values)),
            };
            df.insert(header, column)?;
        }

        Ok(df)
    }
}
