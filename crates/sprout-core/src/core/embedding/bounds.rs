use crate::core::models::molecule::Molecule;
use itertools::Itertools;
use nalgebra::{DMatrix, Point3};

/// Upper bound used for atom pairs without any geometric constraint.
pub const UNBOUNDED: f64 = 1000.0;

const BOND_MARGIN: f64 = 0.05;
const ANGLE_MARGIN: f64 = 0.15;
const TORSION_MARGIN: f64 = 0.10;
const VDW_SCALE: f64 = 0.7;
const TORSION_VDW_SCALE: f64 = 0.5;

/// Lower and upper interatomic distance limits for every atom pair.
///
/// Both matrices are symmetric with zero diagonals; `lower <= upper` holds
/// for every pair after [`DistanceBounds::smooth`].
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceBounds {
    lower: DMatrix<f64>,
    upper: DMatrix<f64>,
}

impl DistanceBounds {
    /// Derives bounds from connectivity alone.
    ///
    /// - 1-2 pairs: sum of covalent radii corrected for bond order
    /// - 1-3 pairs: law of cosines with the hybridization angle of the centre
    /// - 1-4 pairs: between the cis and trans distances of the torsion
    /// - farther pairs: scaled van der Waals contact as the lower limit
    pub fn from_topology(molecule: &Molecule) -> Self {
        let n = molecule.atom_count();
        let mut bounds = Self {
            lower: DMatrix::zeros(n, n),
            upper: DMatrix::from_element(n, n, UNBOUNDED),
        };
        for i in 0..n {
            bounds.upper[(i, i)] = 0.0;
        }

        let topology = molecule.topological_distances();
        let bond_length = |a: usize, b: usize| {
            molecule
                .bond_between(a, b)
                .and_then(|bond| molecule.ideal_bond_length(bond))
        };

        for (index, bond) in molecule.bonds().iter().enumerate() {
            if let Some(d) = molecule.ideal_bond_length(index) {
                bounds.set(bond.atom1, bond.atom2, d - BOND_MARGIN, d + BOND_MARGIN);
            }
        }

        for center in 0..n {
            let angle = molecule.ideal_angle(center);
            let neighbors: Vec<usize> = molecule.neighbors(center).collect();
            for (a, &i) in neighbors.iter().enumerate() {
                for &k in &neighbors[a + 1..] {
                    if topology[i][k] != 2 {
                        continue;
                    }
                    let (Some(d1), Some(d2)) = (bond_length(i, center), bond_length(center, k)) else {
                        continue;
                    };
                    let d = (d1 * d1 + d2 * d2 - 2.0 * d1 * d2 * angle.cos()).sqrt();
                    bounds.set(i, k, d - ANGLE_MARGIN, d + ANGLE_MARGIN);
                }
            }
        }

        let mut torsion_seen = DMatrix::from_element(n, n, false);
        for bond in molecule.bonds() {
            let (j, k) = (bond.atom1, bond.atom2);
            let (Some(d_jk), theta_j, theta_k) = (
                bond_length(j, k),
                molecule.ideal_angle(j),
                molecule.ideal_angle(k),
            ) else {
                continue;
            };
            for i in molecule.neighbors(j).filter(|&i| i != k) {
                for l in molecule.neighbors(k).filter(|&l| l != j && l != i) {
                    if topology[i][l] != 3 {
                        continue;
                    }
                    let (Some(d_ij), Some(d_kl)) = (bond_length(i, j), bond_length(k, l)) else {
                        continue;
                    };
                    let (cis, trans) = torsion_extremes(d_ij, d_jk, d_kl, theta_j, theta_k);
                    let vdw_floor = TORSION_VDW_SCALE * vdw_sum(molecule, i, l);
                    let lo = (cis - TORSION_MARGIN).max(vdw_floor).min(trans);
                    let hi = trans + TORSION_MARGIN;
                    if torsion_seen[(i, l)] {
                        let lo = lo.min(bounds.lower[(i, l)]);
                        let hi = hi.max(bounds.upper[(i, l)]);
                        bounds.set(i, l, lo, hi);
                    } else {
                        bounds.set(i, l, lo, hi);
                        torsion_seen[(i, l)] = true;
                        torsion_seen[(l, i)] = true;
                    }
                }
            }
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if topology[i][j] > 3 {
                    bounds.lower[(i, j)] = VDW_SCALE * vdw_sum(molecule, i, j);
                    bounds.lower[(j, i)] = bounds.lower[(i, j)];
                }
            }
        }

        bounds
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lower.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn lower(&self, i: usize, j: usize) -> f64 {
        self.lower[(i, j)]
    }

    #[inline]
    pub fn upper(&self, i: usize, j: usize) -> f64 {
        self.upper[(i, j)]
    }

    fn set(&mut self, i: usize, j: usize, lower: f64, upper: f64) {
        let lower = lower.max(0.0);
        self.lower[(i, j)] = lower;
        self.lower[(j, i)] = lower;
        self.upper[(i, j)] = upper;
        self.upper[(j, i)] = upper;
    }

    /// Fixes every pair of `atoms` to its distance in `positions`, where
    /// `positions[k]` is the position of `atoms[k]`.
    pub fn pin(&mut self, atoms: &[usize], positions: &[Point3<f64>]) {
        for (a, (&i, pi)) in atoms.iter().zip(positions).enumerate() {
            for (&j, pj) in atoms[a + 1..].iter().zip(&positions[a + 1..]) {
                let d = (pi - pj).norm();
                self.set(i, j, d, d);
            }
        }
    }

    /// Tightens the bounds to satisfy the triangle inequality (Floyd-Warshall).
    ///
    /// Pairs whose limits cross during smoothing collapse to the midpoint.
    pub fn smooth(&mut self) {
        let n = self.len();
        for k in 0..n {
            for i in 0..n {
                if i == k {
                    continue;
                }
                let u_ik = self.upper[(i, k)];
                let l_ik = self.lower[(i, k)];
                for j in (i + 1)..n {
                    if j == k {
                        continue;
                    }
                    let u_kj = self.upper[(k, j)];
                    let l_kj = self.lower[(k, j)];

                    let via = u_ik + u_kj;
                    if via < self.upper[(i, j)] {
                        self.upper[(i, j)] = via;
                        self.upper[(j, i)] = via;
                    }
                    let gap = (l_ik - u_kj).max(l_kj - u_ik);
                    if gap > self.lower[(i, j)] {
                        self.lower[(i, j)] = gap;
                        self.lower[(j, i)] = gap;
                    }
                }
            }
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if self.lower[(i, j)] > self.upper[(i, j)] {
                    let mid = 0.5 * (self.lower[(i, j)] + self.upper[(i, j)]);
                    self.set(i, j, mid, mid);
                }
            }
        }
    }

    /// Largest amount by which any pair of `coordinates` leaves its bounds.
    pub fn max_violation(&self, coordinates: &[Point3<f64>]) -> f64 {
        (0..coordinates.len())
            .tuple_combinations()
            .map(|(i, j)| {
                let d = (coordinates[i] - coordinates[j]).norm();
                (d - self.upper[(i, j)]).max(self.lower[(i, j)] - d)
            })
            .fold(0.0f64, f64::max)
    }
}

fn vdw_sum(molecule: &Molecule, i: usize, j: usize) -> f64 {
    let atoms = molecule.atoms();
    atoms[i].element.vdw_radius() + atoms[j].element.vdw_radius()
}

/// Cis (0 degree) and trans (180 degree) end-to-end distances of a four-atom
/// chain with bond lengths `d_ij`, `d_jk`, `d_kl` and bond angles at `j`, `k`.
fn torsion_extremes(d_ij: f64, d_jk: f64, d_kl: f64, theta_j: f64, theta_k: f64) -> (f64, f64) {
    let ix = d_ij * theta_j.cos();
    let iy = d_ij * theta_j.sin();
    let lx = d_jk - d_kl * theta_k.cos();
    let ly = d_kl * theta_k.sin();
    let cis = ((lx - ix).powi(2) + (ly - iy).powi(2)).sqrt();
    let trans = ((lx - ix).powi(2) + (ly + iy).powi(2)).sqrt();
    (cis, trans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::tests::ethane;

    #[test]
    fn bonded_pairs_use_covalent_radii() {
        let mol = ethane();
        let bounds = DistanceBounds::from_topology(&mol);
        assert!((bounds.lower(0, 1) - 1.47).abs() < 1e-9);
        assert!((bounds.upper(0, 1) - 1.57).abs() < 1e-9);
        assert!((bounds.lower(0, 2) - 1.02).abs() < 1e-9);
        assert_eq!(bounds.lower(0, 1), bounds.lower(1, 0));
    }

    #[test]
    fn geminal_pairs_follow_tetrahedral_angle() {
        let mol = ethane();
        let bounds = DistanceBounds::from_topology(&mol);
        let d = (1.52f64.powi(2) + 1.07f64.powi(2) - 2.0 * 1.52 * 1.07 * 109.47f64.to_radians().cos()).sqrt();
        assert!((bounds.lower(1, 2) - (d - ANGLE_MARGIN)).abs() < 1e-9);
        assert!((bounds.upper(1, 2) - (d + ANGLE_MARGIN)).abs() < 1e-9);
    }

    #[test]
    fn vicinal_pairs_span_cis_to_trans() {
        let mol = ethane();
        let bounds = DistanceBounds::from_topology(&mol);
        let (cis, trans) = torsion_extremes(1.07, 1.52, 1.07, 109.47f64.to_radians(), 109.47f64.to_radians());
        assert!(cis < trans);
        assert!(bounds.lower(2, 5) >= cis - TORSION_MARGIN - 1e-9);
        assert!((bounds.upper(2, 5) - (trans + TORSION_MARGIN)).abs() < 1e-9);
    }

    #[test]
    fn smoothing_caps_unbounded_pairs() {
        let mol = ethane();
        let mut bounds = DistanceBounds::from_topology(&mol);
        bounds.smooth();
        for i in 0..bounds.len() {
            for j in 0..bounds.len() {
                assert!(bounds.lower(i, j) <= bounds.upper(i, j) + 1e-12);
                assert!(bounds.upper(i, j) < UNBOUNDED);
            }
        }
    }

    #[test]
    fn pinned_pairs_match_reference_geometry() {
        let mol = ethane();
        let positions = mol.positions().unwrap();
        let mut bounds = DistanceBounds::from_topology(&mol);
        bounds.pin(&[0, 1, 2], &positions[..3]);
        bounds.smooth();
        let d = (positions[1] - positions[2]).norm();
        assert!((bounds.lower(1, 2) - d).abs() < 1e-9);
        assert!((bounds.upper(1, 2) - d).abs() < 1e-9);
    }

    #[test]
    fn reference_geometry_has_small_violation() {
        let mol = ethane();
        let mut bounds = DistanceBounds::from_topology(&mol);
        bounds.smooth();
        assert!(bounds.max_violation(&mol.positions().unwrap()) < 0.1);
    }
}
