use super::traits::CovStructure;

/// Flattened layout of the covariance parameter vector θ.
///
/// θ concatenates the free parameters of every grouping factor's template in
/// term order. The layout records where each term's slice starts, and exposes
/// the feasible box and starting point for the optimizer. The ordering is
/// fixed at model construction, so a given θ always means the same thing.
#[derive(Debug, Clone)]
pub struct ThetaLayout {
    offsets: Vec<usize>,
    bounds: Vec<(f64, f64)>,
    initial: Vec<f64>,
}

impl ThetaLayout {
    pub fn new(structures: &[&dyn CovStructure]) -> Self {
        let mut offsets = Vec::with_capacity(structures.len() + 1);
        let mut bounds = Vec::new();
        let mut initial = Vec::new();

        let mut offset = 0;
        for s in structures {
            offsets.push(offset);
            offset += s.n_params();
            bounds.extend(s.bounds());
            initial.extend(s.initial());
        }
        offsets.push(offset);

        Self {
            offsets,
            bounds,
            initial,
        }
    }

    /// Total dimension of θ.
    pub fn dim(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    /// Number of terms in the layout.
    pub fn n_terms(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// The slice of θ belonging to the given term.
    pub fn slice<'a>(&self, theta: &'a [f64], term: usize) -> &'a [f64] {
        &theta[self.offsets[term]..self.offsets[term + 1]]
    }

    /// Feasible box per θ component.
    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    /// Starting point: identity relative factors for every term.
    pub fn initial(&self) -> Vec<f64> {
        self.initial.clone()
    }

    /// Clamp θ into its feasible box in place.
    pub fn clamp(&self, theta: &mut [f64]) {
        for (value, (lo, hi)) in theta.iter_mut().zip(self.bounds.iter()) {
            *value = value.clamp(*lo, *hi);
        }
    }
}
