use nalgebra::Point3;

/// Affinity estimate returned by an external scoring engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseScore {
    /// Predicted binding affinity in pK units (higher binds tighter).
    pub affinity_pk: f64,
    /// Empirical (Vina-like) affinity in kcal/mol, when the engine reports one.
    pub vina_affinity: Option<f64>,
}

impl PoseScore {
    /// Half-maximal inhibitory concentration estimate in nanomolar.
    pub fn ic50_nanomolar(&self) -> f64 {
        ic50_nanomolar(self.affinity_pk)
    }
}

/// Converts a pK value into an IC50 in nanomolar: `10^(9 - pK)`.
#[inline]
pub fn ic50_nanomolar(affinity_pk: f64) -> f64 {
    10f64.powf(9.0 - affinity_pk)
}

/// One 3D pose of a congener.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformer {
    /// Coordinates for every atom of the owning congener, in atom order.
    pub coordinates: Vec<Point3<f64>>,
    /// Final energy in kcal/mol; `None` until optimized.
    pub energy: Option<f64>,
    /// Energy above the congener minimum, set by ranking.
    pub relative_energy: Option<f64>,
    /// Set by the clash filter.
    pub clashing: bool,
    /// Position in the energy ordering, set by ranking.
    pub rank: Option<usize>,
    pub score: Option<PoseScore>,
}

impl Conformer {
    pub fn new(coordinates: Vec<Point3<f64>>) -> Self {
        Self {
            coordinates,
            energy: None,
            relative_energy: None,
            clashing: false,
            rank: None,
            score: None,
        }
    }

    #[inline]
    pub fn atom_count(&self) -> usize {
        self.coordinates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conformer_has_no_derived_state() {
        let conf = Conformer::new(vec![Point3::origin(); 3]);
        assert_eq!(conf.atom_count(), 3);
        assert!(conf.energy.is_none());
        assert!(conf.relative_energy.is_none());
        assert!(!conf.clashing);
        assert!(conf.rank.is_none());
        assert!(conf.score.is_none());
    }

    #[test]
    fn ic50_follows_pk_definition() {
        assert!((ic50_nanomolar(9.0) - 1.0).abs() < 1e-12);
        assert!((ic50_nanomolar(6.0) - 1000.0).abs() < 1e-9);
        let score = PoseScore {
            affinity_pk: 7.0,
            vina_affinity: Some(-8.2),
        };
        assert!((score.ic50_nanomolar() - 100.0).abs() < 1e-9);
    }
}
