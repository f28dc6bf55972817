use super::element::Element;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;
use phf::{Map, Set, phf_map, phf_set};
use std::fmt;

static WATER_RESIDUES: Set<&'static str> = phf_set! {
    "HOH", "WAT", "H2O", "TIP", "TIP3", "TP3", "SPC", "SOL", "DOD",
};

// Charged side-chain atoms of ionizable residues at physiological pH.
static IONIC_ATOM_CHARGES: Map<&'static str, f64> = phf_map! {
    "ASP:OD1" => -0.5, "ASP:OD2" => -0.5,
    "GLU:OE1" => -0.5, "GLU:OE2" => -0.5,
    "LYS:NZ" => 1.0,
    "ARG:NH1" => 0.5, "ARG:NH2" => 0.5,
};

pub fn is_water_residue(residue_name: &str) -> bool {
    WATER_RESIDUES.contains(residue_name.trim().to_ascii_uppercase().as_str())
}

/// Default partial charge for a receptor atom without explicit charge data.
pub fn default_partial_charge(residue_name: &str, atom_name: &str) -> f64 {
    let key = format!(
        "{}:{}",
        residue_name.trim().to_ascii_uppercase(),
        atom_name.trim().to_ascii_uppercase()
    );
    IONIC_ATOM_CHARGES.get(key.as_str()).copied().unwrap_or(0.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceptorAtom {
    pub element: Element,
    pub name: String,
    pub residue_name: String,
    pub residue_number: isize,
    pub chain_id: char,
    pub position: Point3<f64>,
    pub partial_charge: f64,
    pub is_water: bool,
}

impl ReceptorAtom {
    pub fn new(element: Element, name: &str, residue_name: &str, position: Point3<f64>) -> Self {
        Self {
            element,
            name: name.to_string(),
            residue_name: residue_name.to_string(),
            residue_number: 0,
            chain_id: 'A',
            position,
            partial_charge: default_partial_charge(residue_name, name),
            is_water: is_water_residue(residue_name),
        }
    }
}

/// A rigid receptor with a spatial index over its atoms.
///
/// Immutable after construction; shared read-only by every worker.
pub struct Receptor {
    pub name: String,
    atoms: Vec<ReceptorAtom>,
    kdtree: KdTree<f64, 3>,
}

impl fmt::Debug for Receptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receptor")
            .field("name", &self.name)
            .field("atoms", &self.atoms.len())
            .finish()
    }
}

impl Receptor {
    pub fn new(name: &str, atoms: Vec<ReceptorAtom>) -> Self {
        let points: Vec<[f64; 3]> = atoms
            .iter()
            .map(|a| [a.position.x, a.position.y, a.position.z])
            .collect();
        let kdtree: KdTree<f64, 3> = (&points).into();
        Self {
            name: name.to_string(),
            atoms,
            kdtree,
        }
    }

    #[inline]
    pub fn atoms(&self) -> &[ReceptorAtom] {
        &self.atoms
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn water_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.is_water).count()
    }

    /// Closest receptor atom to `point` as `(atom index, distance)`.
    pub fn nearest(&self, point: &Point3<f64>) -> Option<(usize, f64)> {
        if self.atoms.is_empty() {
            return None;
        }
        let nearest = self
            .kdtree
            .nearest_one::<SquaredEuclidean>(&[point.x, point.y, point.z]);
        Some((nearest.item as usize, nearest.distance.sqrt()))
    }

    /// Indices of receptor atoms within `radius` of `point`.
    pub fn within(&self, point: &Point3<f64>, radius: f64) -> Vec<usize> {
        if self.atoms.is_empty() {
            return Vec::new();
        }
        self.kdtree
            .within_unsorted::<SquaredEuclidean>(&[point.x, point.y, point.z], radius * radius)
            .into_iter()
            .map(|n| n.item as usize)
            .collect()
    }
}
