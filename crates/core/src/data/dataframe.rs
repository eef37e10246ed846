use indexmap::IndexMap;

use super::factor::FactorColumn;
use crate::error::{LmmError, Result};

/// A single column: numeric observations or a categorical factor.
#[derive(Debug, Clone)]
pub enum Column {
    Float(Vec<f64>),
    Factor(FactorColumn),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Factor(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A lightweight columnar table holding the observations of one model.
///
/// Columns are stored in insertion order and must all have the same length.
/// This is the input format for [`crate::model::LmmBuilder`]; the estimation
/// core itself only sees design matrices.
#[derive(Debug, Clone, Default)]
pub struct DataFrame {
    pub(crate) columns: IndexMap<String, Column>,
    pub(crate) nrows: usize,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a numeric column.
    pub fn add_float(&mut self, name: &str, data: Vec<f64>) -> Result<()> {
        self.insert(name, Column::Float(data))
    }

    /// Add a factor column; levels are discovered in order of first appearance.
    pub fn add_factor<S: AsRef<str>>(&mut self, name: &str, data: &[S]) -> Result<()> {
        self.insert(name, Column::Factor(FactorColumn::new(data)))
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| LmmError::ColumnNotFound(name.to_string()))
    }

    /// A numeric column's values.
    pub fn float(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Float(v) => Ok(v.as_slice()),
            Column::Factor(_) => Err(LmmError::Data(format!(
                "column '{name}' is categorical, expected numeric"
            ))),
        }
    }

    /// A factor column.
    pub fn factor(&self, name: &str) -> Result<&FactorColumn> {
        match self.column(name)? {
            Column::Factor(f) => Ok(f),
            Column::Float(_) => Err(LmmError::Data(format!(
                "column '{name}' is numeric, expected a factor"
            ))),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|s| s.as_str()).collect()
    }

    pub(crate) fn insert(&mut self, name: &str, column: Column) -> Result<()> {
        if self.columns.contains_key(name) {
            return Err(LmmError::Data(format!("column '{name}' already exists")));
        }

        let len = column.len();
        if self.columns.is_empty() {
            self.nrows = len;
        } else if len != self.nrows {
            return Err(LmmError::DimensionMismatch {
                expected: self.nrows,
                got: len,
                context: format!("adding column '{name}'"),
            });
        }

        self.columns.insert(name.to_string(), column);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        let mut df = DataFrame::new();
        df.add_float("reaction", vec![249.6, 258.7, 250.8, 321.4]).unwrap();
        df.add_float("days", vec![0.0, 1.0, 0.0, 1.0]).unwrap();
        df.add_factor("subject", &["S308", "S308", "S309", "S309"]).unwrap();
        df
    }

    #[test]
    fn dimensions_and_names() {
        let df = sample();
        assert_eq!(df.nrows(), 4);
        assert_eq!(df.ncols(), 3);
        assert_eq!(df.column_names(), vec!["reaction", "days", "subject"]);
    }

    #[test]
    fn typed_access() {
        let df = sample();
        assert_eq!(df.float("days").unwrap(), &[0.0, 1.0, 0.0, 1.0]);
        assert_eq!(df.factor("subject").unwrap().n_levels(), 2);
    }

    #[test]
    fn missing_column() {
        let df = sample();
        assert!(matches!(
            df.column("nope").unwrap_err(),
            LmmError::ColumnNotFound(_)
        ));
    }

    #[test]
    fn wrong_column_type() {
        let df = sample();
        assert!(matches!(df.float("subject").unwrap_err(), LmmError::Data(_)));
        assert!(matches!(df.factor("days").unwrap_err(), LmmError::Data(_)));
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut df = sample();
        let err = df.add_float("short", vec![1.0]).unwrap_err();
        assert!(matches!(err, LmmError::DimensionMismatch { .. }));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut df = sample();
        assert!(df.add_float("days", vec![0.0; 4]).is_err());
    }
}
