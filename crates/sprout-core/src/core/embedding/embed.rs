use super::bounds::DistanceBounds;
use crate::core::models::molecule::Molecule;
use crate::core::utils::geometry::{aligned_rmsd_subset, superpose};
use crate::core::utils::minimize::{MinimizeError, MinimizerSettings, minimize};
use nalgebra::{DMatrix, Point3, SymmetricEigen};
use rand::Rng;
use std::convert::Infallible;
use thiserror::Error;

/// Largest tolerated deviation of a bond involving a free atom from its
/// ideal length after refinement, in Angstroms.
pub const BOND_TOLERANCE: f64 = 0.25;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmbedError {
    #[error("Molecule has no atoms")]
    Empty,
    #[error("Rigid atom {0} has no template coordinates")]
    MissingCoordinates(usize),
    #[error("Rigid atom index {0} is out of range")]
    RigidOutOfRange(usize),
}

/// Why a single embedding attempt was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum AttemptFailure {
    #[error("Embedding produced non-finite coordinates")]
    NonFinite,
    #[error("Maximum bond deviation {0:.3} A exceeds tolerance")]
    BondViolation(f64),
}

/// Distance-geometry embedder for one molecule with an optional rigid core.
///
/// Rigid atoms are pinned to their current coordinates in the molecule; all
/// other atoms are placed from the topology alone.
#[derive(Debug, Clone)]
pub struct Embedder {
    bounds: DistanceBounds,
    rigid: Vec<usize>,
    is_rigid: Vec<bool>,
    template: Vec<Point3<f64>>,
    checked_bonds: Vec<(usize, usize, f64)>,
    refinement: MinimizerSettings,
}

impl Embedder {
    pub fn new(molecule: &Molecule, rigid: &[usize]) -> Result<Self, EmbedError> {
        let n = molecule.atom_count();
        if n == 0 {
            return Err(EmbedError::Empty);
        }

        let mut is_rigid = vec![false; n];
        let mut template = Vec::with_capacity(rigid.len());
        for &index in rigid {
            let atom = molecule.atom(index).ok_or(EmbedError::RigidOutOfRange(index))?;
            let position = atom.position.ok_or(EmbedError::MissingCoordinates(index))?;
            is_rigid[index] = true;
            template.push(position);
        }

        let mut bounds = DistanceBounds::from_topology(molecule);
        bounds.pin(rigid, &template);
        bounds.smooth();

        let checked_bonds = molecule
            .bonds()
            .iter()
            .enumerate()
            .filter(|(_, b)| !(is_rigid[b.atom1] && is_rigid[b.atom2]))
            .filter_map(|(i, b)| Some((b.atom1, b.atom2, molecule.ideal_bond_length(i)?)))
            .collect();

        Ok(Self {
            bounds,
            rigid: rigid.to_vec(),
            is_rigid,
            template,
            checked_bonds,
            refinement: MinimizerSettings {
                max_iterations: 300,
                gradient_tolerance: 1e-3,
                energy_tolerance: 1e-9,
                history: 8,
                max_step: 0.5,
            },
        })
    }

    #[inline]
    pub fn bounds(&self) -> &DistanceBounds {
        &self.bounds
    }

    #[inline]
    pub fn atom_count(&self) -> usize {
        self.bounds.len()
    }

    /// Runs one randomized embedding.
    pub fn embed<R: Rng>(&self, rng: &mut R) -> Result<Vec<Point3<f64>>, AttemptFailure> {
        let n = self.atom_count();
        if n == 1 {
            return Ok(vec![self.template.first().copied().unwrap_or_else(Point3::origin)]);
        }

        let mut coords = self.initial_coordinates(rng);
        let frozen = vec![false; n];
        self.refine(&mut coords, &frozen)?;

        if !self.rigid.is_empty() {
            self.fit_to_template(&mut coords);
            for (&index, position) in self.rigid.iter().zip(&self.template) {
                let at = 3 * index;
                coords[at] = position.x;
                coords[at + 1] = position.y;
                coords[at + 2] = position.z;
            }
            self.refine(&mut coords, &self.is_rigid)?;
        }

        let points = to_points(&coords);
        let worst = self
            .checked_bonds
            .iter()
            .map(|&(a, b, ideal)| ((points[a] - points[b]).norm() - ideal).abs())
            .fold(0.0f64, f64::max);
        if worst > BOND_TOLERANCE {
            return Err(AttemptFailure::BondViolation(worst));
        }
        Ok(points)
    }

    /// Random distances within bounds, embedded through the three leading
    /// eigenpairs of the metric matrix about the centroid.
    fn initial_coordinates<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        let n = self.atom_count();
        let mut squared = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            for j in (i + 1)..n {
                let lo = self.bounds.lower(i, j);
                let hi = self.bounds.upper(i, j).max(lo);
                let d = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
                squared[(i, j)] = d * d;
                squared[(j, i)] = d * d;
            }
        }

        let total: f64 = squared.iter().sum::<f64>() / 2.0;
        let nf = n as f64;
        let to_centroid: Vec<f64> = (0..n)
            .map(|i| squared.row(i).sum() / nf - total / (nf * nf))
            .collect();
        let metric = DMatrix::from_fn(n, n, |i, j| 0.5 * (to_centroid[i] + to_centroid[j] - squared[(i, j)]));

        let eigen = SymmetricEigen::new(metric);
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let mut coords = vec![0.0; 3 * n];
        for (dim, &column) in order.iter().take(3).enumerate() {
            let lambda = eigen.eigenvalues[column];
            if lambda > 1e-8 {
                let scale = lambda.sqrt();
                for i in 0..n {
                    coords[3 * i + dim] = eigen.eigenvectors[(i, column)] * scale;
                }
            } else {
                for i in 0..n {
                    coords[3 * i + dim] = rng.gen_range(-0.5..0.5);
                }
            }
        }
        coords
    }

    /// Minimizes the bound-violation error; `frozen` atoms keep their place.
    fn refine(&self, coords: &mut [f64], frozen: &[bool]) -> Result<(), AttemptFailure> {
        let result = minimize(coords, &self.refinement, |x: &[f64]| -> Result<_, Infallible> {
            let (value, mut gradient) = self.violation_error(x);
            for (i, _) in frozen.iter().enumerate().filter(|&(_, &f)| f) {
                gradient[3 * i..3 * i + 3].fill(0.0);
            }
            Ok((value, gradient))
        });
        match result {
            Ok(_) | Err(MinimizeError::NotConverged { .. }) => {}
            Err(MinimizeError::NonFinite { .. }) => return Err(AttemptFailure::NonFinite),
            Err(MinimizeError::Objective(never)) => match never {},
        }
        if coords.iter().all(|c| c.is_finite()) {
            Ok(())
        } else {
            Err(AttemptFailure::NonFinite)
        }
    }

    fn violation_error(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let n = self.atom_count();
        let mut value = 0.0;
        let mut gradient = vec![0.0; x.len()];
        for i in 0..n {
            for j in (i + 1)..n {
                let delta = [
                    x[3 * i] - x[3 * j],
                    x[3 * i + 1] - x[3 * j + 1],
                    x[3 * i + 2] - x[3 * j + 2],
                ];
                let d2 = delta.iter().map(|c| c * c).sum::<f64>();
                let upper = self.bounds.upper(i, j);
                let lower = self.bounds.lower(i, j);

                // Scaled errors in squared distance, as in classic DG refinement.
                let factor = if d2 > upper * upper && upper > 0.0 {
                    let u2 = upper * upper;
                    let t = d2 / u2 - 1.0;
                    value += t * t;
                    4.0 * t / u2
                } else if d2 < lower * lower {
                    let l2 = lower * lower;
                    let s = l2 + d2;
                    let t = 2.0 * l2 / s - 1.0;
                    value += t * t;
                    -8.0 * t * l2 / (s * s)
                } else {
                    continue;
                };

                for axis in 0..3 {
                    let g = factor * delta[axis];
                    gradient[3 * i + axis] += g;
                    gradient[3 * j + axis] -= g;
                }
            }
        }
        (value, gradient)
    }

    /// Rigidly moves the embedding so its rigid atoms best overlay the
    /// template, picking the handedness that fits better.
    fn fit_to_template(&self, coords: &mut [f64]) {
        let points = to_points(coords);
        let mirrored: Vec<Point3<f64>> = points.iter().map(|p| Point3::new(p.x, p.y, -p.z)).collect();

        let best = [points, mirrored]
            .into_iter()
            .filter_map(|candidate| {
                let core: Vec<Point3<f64>> = self.rigid.iter().map(|&i| candidate[i]).collect();
                let fit = superpose(&core, &self.template)?;
                let error: f64 = core
                    .iter()
                    .zip(&self.template)
                    .map(|(p, t)| (fit.apply(p) - t).norm_squared())
                    .sum();
                Some((error, candidate, fit))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));

        if let Some((_, candidate, fit)) = best {
            for (i, p) in candidate.iter().enumerate() {
                let moved = fit.apply(p);
                coords[3 * i] = moved.x;
                coords[3 * i + 1] = moved.y;
                coords[3 * i + 2] = moved.z;
            }
        }
    }
}

fn to_points(coords: &[f64]) -> Vec<Point3<f64>> {
    coords
        .chunks_exact(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect()
}

/// Whether `candidate` differs from every accepted conformer by at least
/// `minimum_rms` (best-fit RMSD over `atoms`).
pub fn is_distinct(
    candidate: &[Point3<f64>],
    accepted: &[Vec<Point3<f64>>],
    atoms: &[usize],
    minimum_rms: f64,
) -> bool {
    accepted.iter().all(|other| {
        aligned_rmsd_subset(candidate, other, atoms).is_none_or(|rmsd| rmsd >= minimum_rms)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use crate::core::models::molecule::tests::ethane;
    use crate::core::models::topology::BondOrder;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn butane_without_coordinates() -> Molecule {
        let mut mol = Molecule::new("butane");
        let carbons: Vec<usize> = (0..4).map(|_| mol.add_atom(Atom::new(Element::C, None))).collect();
        for pair in carbons.windows(2) {
            mol.add_bond(pair[0], pair[1], BondOrder::Single).unwrap();
        }
        for (c, count) in [(0, 3), (1, 2), (2, 2), (3, 3)] {
            for _ in 0..count {
                let h = mol.add_atom(Atom::new(Element::H, None));
                mol.add_bond(carbons[c], h, BondOrder::Single).unwrap();
            }
        }
        mol
    }

    #[test]
    fn free_embedding_reproduces_bond_lengths() {
        let mol = butane_without_coordinates();
        let embedder = Embedder::new(&mol, &[]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut successes = 0;
        for _ in 0..10 {
            let Ok(coords) = embedder.embed(&mut rng) else {
                continue;
            };
            successes += 1;
            assert_eq!(coords.len(), mol.atom_count());
            for (index, bond) in mol.bonds().iter().enumerate() {
                let d = (coords[bond.atom1] - coords[bond.atom2]).norm();
                let ideal = mol.ideal_bond_length(index).unwrap();
                assert!((d - ideal).abs() <= BOND_TOLERANCE);
            }
        }
        assert!(successes > 0);
    }

    #[test]
    fn rigid_atoms_keep_template_positions() {
        let mol = ethane();
        let rigid = [0, 1, 2, 3];
        let embedder = Embedder::new(&mol, &rigid).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let coords = (0..10)
            .find_map(|_| embedder.embed(&mut rng).ok())
            .expect("at least one embedding succeeds");
        for &i in &rigid {
            assert!((coords[i] - mol.atoms()[i].position.unwrap()).norm() < 1e-9);
        }
    }

    #[test]
    fn rigid_atoms_require_coordinates() {
        let mol = butane_without_coordinates();
        assert_eq!(Embedder::new(&mol, &[0]).unwrap_err(), EmbedError::MissingCoordinates(0));
        assert_eq!(Embedder::new(&mol, &[99]).unwrap_err(), EmbedError::RigidOutOfRange(99));
        assert_eq!(Embedder::new(&Molecule::new("x"), &[]).unwrap_err(), EmbedError::Empty);
    }

    #[test]
    fn distinctness_uses_aligned_rmsd() {
        let mol = ethane();
        let a = mol.positions().unwrap();
        let shifted: Vec<_> = a.iter().map(|p| Point3::new(p.x + 3.0, p.y, p.z)).collect();
        let heavy = mol.heavy_atom_indices();
        assert!(!is_distinct(&shifted, std::slice::from_ref(&a), &heavy, 0.5));
        assert!(is_distinct(&shifted, &[], &heavy, 0.5));

        let all: Vec<usize> = (0..a.len()).collect();
        let mut bent = a.clone();
        bent[2] = Point3::new(-5.0, 6.0, 0.0);
        assert!(is_distinct(&bent, std::slice::from_ref(&a), &all, 0.5));
    }
}
