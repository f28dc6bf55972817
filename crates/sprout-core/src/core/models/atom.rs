use super::element::Element;
use nalgebra::Point3;

/// Where an atom of a grown molecule came from.
///
/// The conformer generator keeps `Template` atoms rigid unless they are listed
/// in the flexible set; `Fragment` atoms are always free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AtomOrigin {
    /// Atom carried over from the template core.
    Template,
    /// Atom contributed by an attached R-group fragment.
    Fragment,
    /// Atom read from a standalone structure file.
    #[default]
    Input,
}

/// A single atom of a small molecule.
///
/// Positions are optional: atoms added by the attacher have no coordinates
/// until a conformer is embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The element of the atom.
    pub element: Element,
    /// Atom label as read from or written to structure files.
    pub name: String,
    /// Integer formal charge.
    pub formal_charge: i8,
    /// Partial charge in elementary charge units, assigned by a charge model.
    pub partial_charge: f64,
    /// Cartesian coordinates in Angstroms, if known.
    pub position: Option<Point3<f64>>,
    /// Provenance of the atom within a grown molecule.
    pub origin: AtomOrigin,
}

impl Atom {
    pub fn new(element: Element, position: Option<Point3<f64>>) -> Self {
        Self {
            element,
            name: element.symbol().to_string(),
            formal_charge: 0,
            partial_charge: 0.0,
            position,
            origin: AtomOrigin::default(),
        }
    }

    pub fn with_charge(mut self, formal_charge: i8) -> Self {
        self.formal_charge = formal_charge;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    #[inline]
    pub fn is_hydrogen(&self) -> bool {
        self.element.is_hydrogen()
    }

    #[inline]
    pub fn is_heavy(&self) -> bool {
        !self.element.is_hydrogen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_uses_element_symbol_as_name() {
        let atom = Atom::new(Element::Cl, None);
        assert_eq!(atom.name, "Cl");
        assert_eq!(atom.formal_charge, 0);
        assert_eq!(atom.partial_charge, 0.0);
        assert!(atom.position.is_none());
        assert_eq!(atom.origin, AtomOrigin::Input);
    }

    #[test]
    fn builder_methods_set_fields() {
        let atom = Atom::new(Element::N, Some(Point3::new(1.0, 2.0, 3.0)))
            .with_charge(1)
            .with_name("N1");
        assert_eq!(atom.formal_charge, 1);
        assert_eq!(atom.name, "N1");
        assert_eq!(atom.position, Some(Point3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn heavy_and_hydrogen_predicates() {
        assert!(Atom::new(Element::H, None).is_hydrogen());
        assert!(Atom::new(Element::O, None).is_heavy());
    }
}
