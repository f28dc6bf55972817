use super::atom::AtomOrigin;
use super::conformer::Conformer;
use super::ids::ConformerId;
use super::molecule::Molecule;
use slotmap::SlotMap;
use std::collections::HashSet;

/// Lifecycle state of a congener's conformer ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CongenerStatus {
    /// No pipeline stage has processed the congener yet.
    #[default]
    Pending,
    /// At least one conformer is retained.
    Populated,
    /// A stage left the congener without conformers. Terminal.
    Missing,
}

/// A molecule grown from the template by replacing one attachment hydrogen
/// with one fragment, together with its conformer ensemble.
#[derive(Debug, Clone)]
pub struct Congener {
    pub molecule: Molecule,
    /// Index of the replaced hydrogen in the template.
    pub attachment_index: usize,
    pub fragment_name: String,
    /// Congener index of the template atom that now carries the fragment.
    pub scaffold_atom: usize,
    /// Congener index of the fragment atom bonded to the scaffold atom.
    pub fragment_anchor: usize,
    /// Template atom index to congener atom index; `None` for the removed hydrogen.
    pub template_map: Vec<Option<usize>>,
    pub fragment_atoms: Vec<usize>,
    conformers: SlotMap<ConformerId, Conformer>,
    order: Vec<ConformerId>,
    status: CongenerStatus,
}

impl Congener {
    pub fn new(
        molecule: Molecule,
        attachment_index: usize,
        fragment_name: &str,
        scaffold_atom: usize,
        fragment_anchor: usize,
        template_map: Vec<Option<usize>>,
        fragment_atoms: Vec<usize>,
    ) -> Self {
        Self {
            molecule,
            attachment_index,
            fragment_name: fragment_name.to_string(),
            scaffold_atom,
            fragment_anchor,
            template_map,
            fragment_atoms,
            conformers: SlotMap::with_key(),
            order: Vec::new(),
            status: CongenerStatus::Pending,
        }
    }

    /// Human-readable identity used in logs and output file names.
    pub fn label(&self) -> String {
        format!(
            "{}_a{}_{}",
            sanitize(&self.molecule.name),
            self.attachment_index,
            sanitize(&self.fragment_name)
        )
    }

    #[inline]
    pub fn status(&self) -> CongenerStatus {
        self.status
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        self.status == CongenerStatus::Missing
    }

    /// Re-derives the status after a stage has run. A congener that has been
    /// missing once stays missing.
    pub fn refresh_status(&mut self) -> CongenerStatus {
        self.status = match (self.status, self.conformers.is_empty()) {
            (CongenerStatus::Missing, _) | (_, true) => CongenerStatus::Missing,
            (_, false) => CongenerStatus::Populated,
        };
        self.status
    }

    pub fn add_conformer(&mut self, conformer: Conformer) -> ConformerId {
        let id = self.conformers.insert(conformer);
        self.order.push(id);
        id
    }

    /// Removes a conformer. Removing an already-discarded id is a no-op and
    /// returns `false`.
    pub fn discard(&mut self, id: ConformerId) -> bool {
        if self.conformers.remove(id).is_some() {
            self.order.retain(|&other| other != id);
            true
        } else {
            false
        }
    }

    pub fn discard_all(&mut self) -> usize {
        let count = self.conformers.len();
        self.conformers.clear();
        self.order.clear();
        count
    }

    #[inline]
    pub fn conformer_count(&self) -> usize {
        self.conformers.len()
    }

    pub fn conformer(&self, id: ConformerId) -> Option<&Conformer> {
        self.conformers.get(id)
    }

    pub fn conformer_mut(&mut self, id: ConformerId) -> Option<&mut Conformer> {
        self.conformers.get_mut(id)
    }

    /// Conformer ids in their current order (insertion order until ranked).
    pub fn conformer_ids(&self) -> &[ConformerId] {
        &self.order
    }

    /// Conformers in their current order.
    pub fn conformers(&self) -> impl Iterator<Item = (ConformerId, &Conformer)> {
        self.order
            .iter()
            .filter_map(|&id| self.conformers.get(id).map(|c| (id, c)))
    }

    /// Mutable access to every conformer, in arena order.
    pub fn conformers_mut(&mut self) -> impl Iterator<Item = (ConformerId, &mut Conformer)> {
        self.conformers.iter_mut()
    }

    /// Replaces the conformer order. Ids not present in `order` keep their
    /// relative position after the listed ones.
    pub(crate) fn set_order(&mut self, order: Vec<ConformerId>) {
        let listed: HashSet<ConformerId> = order.iter().copied().collect();
        let mut merged: Vec<ConformerId> = order
            .into_iter()
            .filter(|id| self.conformers.contains_key(*id))
            .collect();
        merged.extend(self.order.iter().copied().filter(|id| !listed.contains(id)));
        self.order = merged;
    }

    /// Congener indices of atoms that keep their template geometry during
    /// conformer generation: template atoms not named in `flexible`
    /// (given as template indices).
    pub fn rigid_atoms(&self, flexible: &[usize]) -> Vec<usize> {
        let flexible: HashSet<usize> = flexible
            .iter()
            .filter_map(|&t| self.template_map.get(t).copied().flatten())
            .collect();
        self.molecule
            .atoms()
            .iter()
            .enumerate()
            .filter(|(i, atom)| atom.origin == AtomOrigin::Template && !flexible.contains(i))
            .map(|(i, _)| i)
            .collect()
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "mol".to_string()
    } else {
        cleaned
    }
}
