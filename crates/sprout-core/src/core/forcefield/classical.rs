use super::model::{EnergyError, EnergyModel, Evaluation, check_len};
use super::parameterization::{LigandParameters, ParameterizationError, Parameterizer};
use super::params::{BondedParams, ClassicalParams};
use super::potentials;
use super::term::EnergyTerm;
use crate::core::models::molecule::Molecule;
use itertools::Itertools;
use nalgebra::{Point3, Vector3};

#[derive(Debug, Clone, Copy)]
struct BondTerm {
    atom1: usize,
    atom2: usize,
    length: f64,
}

#[derive(Debug, Clone, Copy)]
struct AngleTerm {
    atom1: usize,
    center: usize,
    atom2: usize,
    angle: f64,
}

#[derive(Debug, Clone, Copy)]
struct PairTerm {
    atom1: usize,
    atom2: usize,
    r_min: f64,
    well_depth: f64,
    charge_product: f64,
    scale: f64,
}

/// Harmonic bonds and angles plus Lennard-Jones and Coulomb between atoms
/// at least three bonds apart (1-4 pairs scaled).
#[derive(Debug, Clone)]
pub struct ClassicalLigandModel {
    atom_count: usize,
    bonded: BondedParams,
    dielectric: f64,
    bonds: Vec<BondTerm>,
    angles: Vec<AngleTerm>,
    pairs: Vec<PairTerm>,
    parameters: LigandParameters,
}

impl ClassicalLigandModel {
    pub fn new(molecule: &Molecule, forcefield: &ClassicalParams) -> Result<Self, ParameterizationError> {
        let parameters = Parameterizer::new(forcefield).parameterize(molecule)?;

        let bonds = molecule
            .bonds()
            .iter()
            .enumerate()
            .filter_map(|(i, bond)| {
                Some(BondTerm {
                    atom1: bond.atom1,
                    atom2: bond.atom2,
                    length: molecule.ideal_bond_length(i)?,
                })
            })
            .collect();

        let mut angles = Vec::new();
        for center in 0..molecule.atom_count() {
            let neighbors: Vec<usize> = molecule.neighbors(center).collect();
            let angle = molecule.ideal_angle(center);
            angles.extend(neighbors.into_iter().tuple_combinations().map(|(a, b)| AngleTerm {
                atom1: a,
                center,
                atom2: b,
                angle,
            }));
        }

        let distances = molecule.topological_distances();
        let mut pairs = Vec::new();
        for (i, j) in (0..molecule.atom_count()).tuple_combinations() {
            let scale = match distances[i][j] {
                0..=2 => continue,
                3 => forcefield.globals.one_four_scale,
                _ => 1.0,
            };
            let (pi, pj) = (parameters.vdw[i], parameters.vdw[j]);
            pairs.push(PairTerm {
                atom1: i,
                atom2: j,
                r_min: 0.5 * (pi.radius + pj.radius),
                well_depth: (pi.well_depth * pj.well_depth).sqrt(),
                charge_product: parameters.charges[i] * parameters.charges[j],
                scale,
            });
        }

        Ok(Self {
            atom_count: molecule.atom_count(),
            bonded: forcefield.bonded.clone(),
            dielectric: forcefield.globals.dielectric_constant,
            bonds,
            angles,
            pairs,
            parameters,
        })
    }

    pub fn charges(&self) -> &[f64] {
        &self.parameters.charges
    }
}

impl EnergyModel for ClassicalLigandModel {
    fn name(&self) -> &'static str {
        "classical"
    }

    fn evaluate(&self, coordinates: &[Point3<f64>]) -> Result<Evaluation, EnergyError> {
        check_len(coordinates, self.atom_count)?;
        let mut terms = EnergyTerm::default();
        let mut gradient = vec![Vector3::zeros(); self.atom_count];

        for bond in &self.bonds {
            let d = coordinates[bond.atom1] - coordinates[bond.atom2];
            let r = d.norm();
            let (energy, de_dr) = potentials::harmonic(r, bond.length, self.bonded.bond_force_constant);
            terms.bonded += energy;
            if r > 1e-12 {
                let g = d * (de_dr / r);
                gradient[bond.atom1] += g;
                gradient[bond.atom2] -= g;
            }
        }

        for angle in &self.angles {
            let u = coordinates[angle.atom1] - coordinates[angle.center];
            let v = coordinates[angle.atom2] - coordinates[angle.center];
            let (nu, nv) = (u.norm(), v.norm());
            if nu < 1e-12 || nv < 1e-12 {
                continue;
            }
            let cos = (u.dot(&v) / (nu * nv)).clamp(-1.0, 1.0);
            let theta = cos.acos();
            let (energy, de_dtheta) =
                potentials::harmonic(theta, angle.angle, self.bonded.angle_force_constant);
            terms.bonded += energy;
            let sin = (1.0 - cos * cos).sqrt();
            if sin < 1e-8 {
                continue;
            }
            // d(theta)/dx = -1/sin * d(cos)/dx
            let factor = -de_dtheta / sin;
            let d_cos_du = v / (nu * nv) - u * (cos / (nu * nu));
            let d_cos_dv = u / (nu * nv) - v * (cos / (nv * nv));
            let ga = d_cos_du * factor;
            let gb = d_cos_dv * factor;
            gradient[angle.atom1] += ga;
            gradient[angle.atom2] += gb;
            gradient[angle.center] -= ga + gb;
        }

        for pair in &self.pairs {
            let d = coordinates[pair.atom1] - coordinates[pair.atom2];
            let r = d.norm();
            let (vdw, dvdw) = potentials::lennard_jones_12_6_with_derivative(r, pair.r_min, pair.well_depth);
            let (elec, delec) = potentials::coulomb_with_derivative(r, pair.charge_product, 1.0, self.dielectric);
            terms.vdw += pair.scale * vdw;
            terms.coulomb += pair.scale * elec;
            if r > 1e-12 {
                let g = d * (pair.scale * (dvdw + delec) / r);
                gradient[pair.atom1] += g;
                gradient[pair.atom2] -= g;
            }
        }

        Ok(Evaluation {
            terms,
            gradient: Some(gradient),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use crate::core::models::molecule::tests::ethane;
    use crate::core::models::topology::BondOrder;
    use crate::core::utils::minimize::numerical_gradient;
    use crate::core::forcefield::model::{flatten, unflatten};

    fn uff() -> ClassicalParams {
        ClassicalParams::builtin("uff").unwrap()
    }

    fn propanol() -> Molecule {
        let mut mol = Molecule::new("propanol");
        let positions = [
            (Element::C, Point3::new(0.0, 0.0, 0.0)),
            (Element::C, Point3::new(1.52, 0.05, 0.0)),
            (Element::C, Point3::new(2.05, 1.47, 0.1)),
            (Element::O, Point3::new(3.45, 1.45, 0.2)),
            (Element::H, Point3::new(3.75, 2.35, 0.3)),
        ];
        for (element, pos) in positions {
            mol.add_atom(Atom::new(element, Some(pos)));
        }
        for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 4)] {
            mol.add_bond(a, b, BondOrder::Single).unwrap();
        }
        mol
    }

    #[test]
    fn pairs_start_at_three_bonds() {
        let model = ClassicalLigandModel::new(&propanol(), &uff()).unwrap();
        let mut pairs: Vec<(usize, usize, f64)> = model
            .pairs
            .iter()
            .map(|p| (p.atom1, p.atom2, p.scale))
            .collect();
        pairs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(pairs, vec![(0, 3, 0.5), (0, 4, 1.0), (1, 4, 0.5)]);
        assert_eq!(model.bonds.len(), 4);
        assert_eq!(model.angles.len(), 3);
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let mol = propanol();
        let model = ClassicalLigandModel::new(&mol, &uff()).unwrap();
        let coords = mol.positions().unwrap();
        let analytic = model.evaluate(&coords).unwrap().gradient.unwrap();
        let numeric = numerical_gradient(&flatten(&coords), 1e-6, |x| {
            model.evaluate(&unflatten(x)).map(|e| e.energy())
        })
        .unwrap();
        for (i, g) in analytic.iter().enumerate() {
            for k in 0..3 {
                let n = numeric[3 * i + k];
                assert!((g[k] - n).abs() < 1e-4 * (1.0 + n.abs()), "atom {i} axis {k}: {} vs {n}", g[k]);
            }
        }
    }

    #[test]
    fn ideal_ethane_has_small_strain() {
        let mol = ethane();
        let model = ClassicalLigandModel::new(&mol, &uff()).unwrap();
        let evaluation = model.evaluate(&mol.positions().unwrap()).unwrap();
        assert!(evaluation.terms.bonded >= 0.0);
        assert!(evaluation.terms.bonded < 5.0, "bonded = {}", evaluation.terms.bonded);
        assert_eq!(evaluation.terms.network, 0.0);
        let charge: f64 = model.charges().iter().sum();
        assert!(charge.abs() < 1e-12);
    }

    #[test]
    fn stretched_bond_raises_energy() {
        let mol = ethane();
        let model = ClassicalLigandModel::new(&mol, &uff()).unwrap();
        let mut coords = mol.positions().unwrap();
        let relaxed = model.evaluate(&coords).unwrap().energy();
        coords[1].x += 0.3;
        let stretched = model.evaluate(&coords).unwrap().energy();
        assert!(stretched > relaxed);
    }

    #[test]
    fn wrong_coordinate_count_is_rejected() {
        let model = ClassicalLigandModel::new(&ethane(), &uff()).unwrap();
        assert!(matches!(
            model.evaluate(&[Point3::origin()]),
            Err(EnergyError::CoordinateMismatch { expected: 8, given: 1 })
        ));
    }
}
