use indexmap::IndexMap;

/// A categorical column mapping string levels to 0-based integer codes.
///
/// Levels are discovered in order of first appearance, which makes the code
/// assignment deterministic for a given input ordering. Grouping factors in a
/// mixed model are always represented this way.
#[derive(Debug, Clone)]
pub struct FactorColumn {
    /// Level name -> code, ordered by first appearance.
    levels: IndexMap<String, usize>,
    /// Per-observation level codes.
    codes: Vec<usize>,
}

impl FactorColumn {
    pub fn new<S: AsRef<str>>(values: &[S]) -> Self {
        let mut levels = IndexMap::new();
        let mut codes = Vec::with_capacity(values.len());

        for val in values {
            let next = levels.len();
            let code = *levels.entry(val.as_ref().to_string()).or_insert(next);
            codes.push(code);
        }

        FactorColumn { levels, codes }
    }

    /// Number of distinct levels.
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Per-observation level codes.
    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    /// Level names in code order.
    pub fn level_names(&self) -> Vec<String> {
        self.levels.keys().cloned().collect()
    }

    /// Name of the level with the given code, if it exists.
    pub fn level_name(&self, code: usize) -> Option<&str> {
        self.levels.get_index(code).map(|(name, _)| name.as_str())
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
