use super::atom::Atom;
use super::topology::{Bond, BondOrder};
use nalgebra::Point3;
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoleculeError {
    #[error("Atom index {0} is out of range")]
    AtomOutOfRange(usize),
    #[error("Atom {0} cannot be bonded to itself")]
    SelfBond(usize),
    #[error("Atoms {0} and {1} are already bonded")]
    DuplicateBond(usize, usize),
}

/// An atom whose bond-order sum exceeds what its element and formal charge
/// allow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValenceViolation {
    pub atom: usize,
    pub valence: f64,
    pub allowed: u8,
}

/// A molecular graph with optional 3D coordinates.
///
/// Atoms and bonds are index-addressed. Removing an atom shifts every later
/// index down by one; callers that keep indices across a removal must remap
/// them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    pub name: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
    /// Data fields carried through structure files (SDF `> <key>` blocks).
    pub properties: BTreeMap<String, String>,
}

impl Molecule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    pub fn add_bond(
        &mut self,
        atom1: usize,
        atom2: usize,
        order: BondOrder,
    ) -> Result<usize, MoleculeError> {
        self.check_index(atom1)?;
        self.check_index(atom2)?;
        if atom1 == atom2 {
            return Err(MoleculeError::SelfBond(atom1));
        }
        if self.bond_between(atom1, atom2).is_some() {
            return Err(MoleculeError::DuplicateBond(atom1, atom2));
        }
        let bond_idx = self.bonds.len();
        self.bonds.push(Bond::new(atom1, atom2, order));
        self.adjacency[atom1].push((atom2, bond_idx));
        self.adjacency[atom2].push((atom1, bond_idx));
        Ok(bond_idx)
    }

    /// Removes an atom together with every bond that touches it.
    pub fn remove_atom(&mut self, index: usize) -> Result<Atom, MoleculeError> {
        self.check_index(index)?;
        let removed = self.atoms.remove(index);
        let shift = |i: usize| if i > index { i - 1 } else { i };
        let bonds: Vec<Bond> = self
            .bonds
            .drain(..)
            .filter(|b| !b.contains(index))
            .map(|b| Bond::new(shift(b.atom1), shift(b.atom2), b.order))
            .collect();
        self.rebuild_adjacency(bonds);
        Ok(removed)
    }

    fn rebuild_adjacency(&mut self, bonds: Vec<Bond>) {
        self.adjacency = vec![Vec::new(); self.atoms.len()];
        for (idx, bond) in bonds.iter().enumerate() {
            self.adjacency[bond.atom1].push((bond.atom2, idx));
            self.adjacency[bond.atom2].push((bond.atom1, idx));
        }
        self.bonds = bonds;
    }

    fn check_index(&self, index: usize) -> Result<(), MoleculeError> {
        if index < self.atoms.len() {
            Ok(())
        } else {
            Err(MoleculeError::AtomOutOfRange(index))
        }
    }

    #[inline]
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    #[inline]
    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    #[inline]
    pub fn atom_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(index)
    }

    pub fn atoms_mut(&mut self) -> impl Iterator<Item = &mut Atom> {
        self.atoms.iter_mut()
    }

    #[inline]
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    #[inline]
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    #[inline]
    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// `(neighbour, bond index)` pairs of an atom.
    #[inline]
    pub fn bonds_of(&self, index: usize) -> &[(usize, usize)] {
        self.adjacency.get(index).map_or(&[], Vec::as_slice)
    }

    pub fn neighbors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bonds_of(index).iter().map(|&(n, _)| n)
    }

    #[inline]
    pub fn degree(&self, index: usize) -> usize {
        self.bonds_of(index).len()
    }

    pub fn bond_between(&self, atom1: usize, atom2: usize) -> Option<usize> {
        self.bonds_of(atom1)
            .iter()
            .find(|&&(n, _)| n == atom2)
            .map(|&(_, b)| b)
    }

    pub fn hydrogen_count(&self, index: usize) -> usize {
        self.neighbors(index)
            .filter(|&n| self.atoms[n].is_hydrogen())
            .count()
    }

    pub fn heavy_atom_indices(&self) -> Vec<usize> {
        (0..self.atoms.len())
            .filter(|&i| self.atoms[i].is_heavy())
            .collect()
    }

    pub fn valence_half_units(&self, index: usize) -> u32 {
        self.bonds_of(index)
            .iter()
            .map(|&(_, b)| self.bonds[b].order.half_units() as u32)
            .sum()
    }

    /// Bond-order sum of an atom; aromatic bonds count 1.5.
    pub fn valence(&self, index: usize) -> f64 {
        self.valence_half_units(index) as f64 / 2.0
    }

    pub fn valence_violations(&self) -> Vec<ValenceViolation> {
        self.atoms
            .iter()
            .enumerate()
            .filter_map(|(i, atom)| {
                let allowed = atom.element.max_valence(atom.formal_charge)?;
                // Aromatic bonds count as single here, the least they can
                // contribute in any Kekule form.
                let minimum: u32 = self
                    .bonds_of(i)
                    .iter()
                    .map(|&(_, b)| match self.bonds[b].order {
                        BondOrder::Aromatic => 1,
                        order => order.half_units() as u32 / 2,
                    })
                    .sum();
                (minimum > allowed as u32).then(|| ValenceViolation {
                    atom: i,
                    valence: self.valence(i),
                    allowed,
                })
            })
            .collect()
    }

    pub fn total_formal_charge(&self) -> i32 {
        self.atoms.iter().map(|a| a.formal_charge as i32).sum()
    }

    /// Whether an atom carries a double, triple, or aromatic bond.
    pub fn is_unsaturated(&self, index: usize) -> bool {
        self.bonds_of(index)
            .iter()
            .any(|&(_, b)| self.bonds[b].order != BondOrder::Single)
    }

    /// Equilibrium length of a bond from covalent radii and bond order.
    pub fn ideal_bond_length(&self, bond_index: usize) -> Option<f64> {
        let bond = self.bonds.get(bond_index)?;
        let r1 = self.atoms[bond.atom1].element.covalent_radius();
        let r2 = self.atoms[bond.atom2].element.covalent_radius();
        Some(r1 + r2 + bond.order.length_adjustment())
    }

    /// Equilibrium bond angle (radians) around a central atom, inferred from
    /// its hybridization.
    pub fn ideal_angle(&self, center: usize) -> f64 {
        let orders: Vec<BondOrder> = self
            .bonds_of(center)
            .iter()
            .map(|&(_, b)| self.bonds[b].order)
            .collect();
        let triples = orders.iter().filter(|&&o| o == BondOrder::Triple).count();
        let doubles = orders.iter().filter(|&&o| o == BondOrder::Double).count();
        let aromatic = orders.contains(&BondOrder::Aromatic);

        if triples > 0 || (doubles >= 2 && orders.len() == 2) {
            std::f64::consts::PI
        } else if doubles > 0 || aromatic {
            120f64.to_radians()
        } else {
            109.47f64.to_radians()
        }
    }

    /// Shortest-path bond counts between every pair of atoms.
    /// Unreachable pairs are `u32::MAX`.
    pub fn topological_distances(&self) -> Vec<Vec<u32>> {
        let n = self.atoms.len();
        let mut distances = vec![vec![u32::MAX; n]; n];
        let mut queue = VecDeque::new();
        for start in 0..n {
            let row = &mut distances[start];
            row[start] = 0;
            queue.clear();
            queue.push_back(start);
            while let Some(current) = queue.pop_front() {
                let next = row[current] + 1;
                for &(neighbor, _) in &self.adjacency[current] {
                    if row[neighbor] == u32::MAX {
                        row[neighbor] = next;
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        distances
    }

    pub fn is_connected(&self) -> bool {
        if self.atoms.is_empty() {
            return true;
        }
        self.topological_distances()[0]
            .iter()
            .all(|&d| d != u32::MAX)
    }

    /// Whether a bond lies on a ring, i.e. its atoms stay connected without it.
    pub fn is_ring_bond(&self, bond_index: usize) -> bool {
        let Some(bond) = self.bonds.get(bond_index) else {
            return false;
        };
        let mut seen = vec![false; self.atoms.len()];
        let mut stack = vec![bond.atom1];
        seen[bond.atom1] = true;
        while let Some(current) = stack.pop() {
            for &(neighbor, b) in &self.adjacency[current] {
                if b == bond_index || seen[neighbor] {
                    continue;
                }
                if neighbor == bond.atom2 {
                    return true;
                }
                seen[neighbor] = true;
                stack.push(neighbor);
            }
        }
        false
    }

    /// Acyclic single bonds whose atoms both carry another heavy neighbour.
    pub fn rotatable_bonds(&self) -> Vec<usize> {
        let has_other_heavy = |atom: usize, other: usize| {
            self.neighbors(atom)
                .any(|n| n != other && self.atoms[n].is_heavy())
        };
        self.bonds
            .iter()
            .enumerate()
            .filter(|(i, bond)| {
                bond.order == BondOrder::Single
                    && self.atoms[bond.atom1].is_heavy()
                    && self.atoms[bond.atom2].is_heavy()
                    && has_other_heavy(bond.atom1, bond.atom2)
                    && has_other_heavy(bond.atom2, bond.atom1)
                    && !self.is_ring_bond(*i)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// All atom positions, or `None` if any atom lacks coordinates.
    pub fn positions(&self) -> Option<Vec<Point3<f64>>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    pub fn has_coordinates(&self) -> bool {
        self.atoms.iter().all(|a| a.position.is_some())
    }
}
