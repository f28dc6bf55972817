use super::params::{ClassicalParams, LennardJonesParam};
use crate::core::models::element::Element;
use crate::core::models::molecule::Molecule;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParameterizationError {
    #[error("Missing VDW parameter for element '{element}' (atom {atom}) in force field '{forcefield}'")]
    MissingVdwParams {
        element: Element,
        atom: usize,
        forcefield: String,
    },
}

/// Charge transferred per unit electronegativity difference across a bond.
const BOND_INCREMENT_SCALE: f64 = 0.1;

/// Bond-increment partial charges.
///
/// Each bond moves `0.1 * (chi_j - chi_i) * order` electrons toward its more
/// electronegative atom, starting from the formal charges, so the total
/// equals the net formal charge.
pub fn assign_partial_charges(molecule: &Molecule) -> Vec<f64> {
    let mut charges: Vec<f64> = molecule
        .atoms()
        .iter()
        .map(|a| a.formal_charge as f64)
        .collect();
    for bond in molecule.bonds() {
        let chi1 = molecule.atoms()[bond.atom1].element.electronegativity();
        let chi2 = molecule.atoms()[bond.atom2].element.electronegativity();
        let order = bond.order.half_units() as f64 / 2.0;
        let transfer = BOND_INCREMENT_SCALE * (chi2 - chi1) * order;
        charges[bond.atom1] += transfer;
        charges[bond.atom2] -= transfer;
    }
    charges
}

/// Per-atom classical parameters of one molecule.
#[derive(Debug, Clone, PartialEq)]
pub struct LigandParameters {
    pub vdw: Vec<LennardJonesParam>,
    pub charges: Vec<f64>,
}

pub struct Parameterizer<'a> {
    forcefield: &'a ClassicalParams,
}

impl<'a> Parameterizer<'a> {
    pub fn new(forcefield: &'a ClassicalParams) -> Self {
        Self { forcefield }
    }

    pub fn parameterize(&self, molecule: &Molecule) -> Result<LigandParameters, ParameterizationError> {
        let vdw = molecule
            .atoms()
            .iter()
            .enumerate()
            .map(|(i, atom)| {
                self.forcefield
                    .vdw(atom.element)
                    .copied()
                    .ok_or_else(|| ParameterizationError::MissingVdwParams {
                        element: atom.element,
                        atom: i,
                        forcefield: self.forcefield.name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LigandParameters {
            vdw,
            charges: assign_partial_charges(molecule),
        })
    }
}
