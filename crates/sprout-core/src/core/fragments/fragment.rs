use crate::core::models::atom::AtomOrigin;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use thiserror::Error;

/// Problems with a single fragment record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FragmentError {
    #[error("Fragment '{0}' has no attachment placeholder atom")]
    NoPlaceholder(String),
    #[error("Fragment '{name}' has {count} placeholder atoms; exactly one is required")]
    MultiplePlaceholders { name: String, count: usize },
    #[error("Placeholder of fragment '{name}' has {degree} bonds; exactly one is required")]
    PlaceholderDegree { name: String, degree: usize },
    #[error("Placeholder of fragment '{name}' is attached by a {order} bond; a single bond is required")]
    PlaceholderBondOrder { name: String, order: BondOrder },
    #[error("Fragment '{0}' has no atoms besides its placeholder")]
    Empty(String),
}

/// A named R-group with exactly one attachment atom.
///
/// The placeholder atom that marked the attachment point in the source file
/// is removed on construction; `attachment` indexes the atom that was bonded
/// to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    name: String,
    molecule: Molecule,
    attachment: usize,
}

impl Fragment {
    pub fn from_molecule(name: &str, mut molecule: Molecule) -> Result<Self, FragmentError> {
        let placeholders: Vec<usize> = molecule
            .atoms()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.element.is_placeholder())
            .map(|(i, _)| i)
            .collect();

        let placeholder = match placeholders.as_slice() {
            [] => return Err(FragmentError::NoPlaceholder(name.to_string())),
            [single] => *single,
            many => {
                return Err(FragmentError::MultiplePlaceholders {
                    name: name.to_string(),
                    count: many.len(),
                });
            }
        };

        let (neighbor, bond) = match molecule.bonds_of(placeholder) {
            [only] => *only,
            other => {
                return Err(FragmentError::PlaceholderDegree {
                    name: name.to_string(),
                    degree: other.len(),
                });
            }
        };
        let order = molecule.bonds()[bond].order;
        if order != BondOrder::Single {
            return Err(FragmentError::PlaceholderBondOrder {
                name: name.to_string(),
                order,
            });
        }

        molecule
            .remove_atom(placeholder)
            .map_err(|_| FragmentError::NoPlaceholder(name.to_string()))?;
        let attachment = if neighbor > placeholder { neighbor - 1 } else { neighbor };
        if molecule.atom_count() == 0 {
            return Err(FragmentError::Empty(name.to_string()));
        }
        molecule.name = name.to_string();
        molecule.atoms_mut().for_each(|a| a.origin = AtomOrigin::Fragment);

        Ok(Self {
            name: name.to_string(),
            molecule,
            attachment,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn molecule(&self) -> &Molecule {
        &self.molecule
    }

    /// Index of the atom that bonds to the scaffold.
    #[inline]
    pub fn attachment(&self) -> usize {
        self.attachment
    }

    #[inline]
    pub fn atom_count(&self) -> usize {
        self.molecule.atom_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;

    fn hydroxyl(placeholder_first: bool) -> Molecule {
        let mut mol = Molecule::new("raw");
        let (r, o) = if placeholder_first {
            let r = mol.add_atom(Atom::new(Element::Dummy, None).with_name("R"));
            (r, mol.add_atom(Atom::new(Element::O, None)))
        } else {
            let o = mol.add_atom(Atom::new(Element::O, None));
            (mol.add_atom(Atom::new(Element::Dummy, None).with_name("R")), o)
        };
        let h = mol.add_atom(Atom::new(Element::H, None));
        mol.add_bond(r, o, BondOrder::Single).unwrap();
        mol.add_bond(o, h, BondOrder::Single).unwrap();
        mol
    }

    #[test]
    fn placeholder_is_removed_and_attachment_recorded() {
        for placeholder_first in [true, false] {
            let fragment = Fragment::from_molecule("hydroxyl", hydroxyl(placeholder_first)).unwrap();
            assert_eq!(fragment.atom_count(), 2);
            assert_eq!(fragment.molecule().bond_count(), 1);
            let anchor = &fragment.molecule().atoms()[fragment.attachment()];
            assert_eq!(anchor.element, Element::O);
            assert!(fragment.molecule().atoms().iter().all(|a| a.origin == AtomOrigin::Fragment));
            assert_eq!(fragment.name(), "hydroxyl");
        }
    }

    #[test]
    fn missing_placeholder_is_rejected() {
        let mut mol = Molecule::new("water");
        mol.add_atom(Atom::new(Element::O, None));
        assert_eq!(
            Fragment::from_molecule("water", mol),
            Err(FragmentError::NoPlaceholder("water".into()))
        );
    }

    #[test]
    fn second_placeholder_is_rejected() {
        let mut mol = hydroxyl(true);
        let extra = mol.add_atom(Atom::new(Element::Dummy, None));
        mol.add_bond(1, extra, BondOrder::Single).unwrap();
        assert!(matches!(
            Fragment::from_molecule("diol", mol),
            Err(FragmentError::MultiplePlaceholders { count: 2, .. })
        ));
    }

    #[test]
    fn placeholder_must_have_one_single_bond() {
        let mut branched = hydroxyl(true);
        branched.add_bond(0, 2, BondOrder::Single).unwrap();
        assert!(matches!(
            Fragment::from_molecule("x", branched),
            Err(FragmentError::PlaceholderDegree { degree: 2, .. })
        ));

        let mut double = Molecule::new("oxo");
        let r = double.add_atom(Atom::new(Element::Dummy, None));
        let o = double.add_atom(Atom::new(Element::O, None));
        double.add_bond(r, o, BondOrder::Double).unwrap();
        assert!(matches!(
            Fragment::from_molecule("oxo", double),
            Err(FragmentError::PlaceholderBondOrder {
                order: BondOrder::Double,
                ..
            })
        ));
    }
}
