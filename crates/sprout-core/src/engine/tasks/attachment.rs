use crate::core::fragments::fragment::Fragment;
use crate::core::models::atom::AtomOrigin;
use crate::core::models::congener::Congener;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument, warn};

/// A (attachment index, fragment) combination that could not be grown.
#[derive(Debug)]
pub struct AttachmentFailure {
    pub attachment_index: usize,
    pub fragment_name: String,
    pub error: EngineError,
}

#[derive(Debug, Default)]
pub struct AttachmentBatch {
    pub congeners: Vec<Congener>,
    pub failures: Vec<AttachmentFailure>,
}

/// Replaces template hydrogen `attachment` by `fragment`.
///
/// Template atoms keep their coordinates and are tagged
/// [`AtomOrigin::Template`]; fragment atoms come without coordinates.
pub fn attach(template: &Molecule, attachment: usize, fragment: &Fragment) -> Result<Congener, EngineError> {
    let atom = template.atom(attachment).ok_or_else(|| EngineError::InvalidAttachment {
        atom: attachment,
        reason: format!("template has only {} atoms", template.atom_count()),
    })?;
    if !atom.is_hydrogen() {
        return Err(EngineError::InvalidAttachment {
            atom: attachment,
            reason: format!("atom is {}, not hydrogen", atom.element),
        });
    }
    let scaffold = match template.bonds_of(attachment) {
        [(neighbor, _)] => *neighbor,
        other => {
            return Err(EngineError::InvalidAttachment {
                atom: attachment,
                reason: format!("hydrogen has {} neighbours, expected 1", other.len()),
            });
        }
    };

    let mut molecule = template.clone();
    molecule.properties.clear();
    molecule.atoms_mut().for_each(|a| a.origin = AtomOrigin::Template);
    molecule
        .remove_atom(attachment)
        .map_err(|e| EngineError::Internal(e.to_string()))?;

    let template_map: Vec<Option<usize>> = (0..template.atom_count())
        .map(|t| match t.cmp(&attachment) {
            std::cmp::Ordering::Less => Some(t),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(t - 1),
        })
        .collect();
    let scaffold_atom = template_map[scaffold].ok_or_else(|| EngineError::Internal("scaffold atom was removed".into()))?;

    let offset = molecule.atom_count();
    for atom in fragment.molecule().atoms() {
        let mut atom = atom.clone();
        atom.position = None;
        atom.origin = AtomOrigin::Fragment;
        molecule.add_atom(atom);
    }
    for bond in fragment.molecule().bonds() {
        molecule
            .add_bond(bond.atom1 + offset, bond.atom2 + offset, bond.order)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
    }
    let fragment_anchor = offset + fragment.attachment();
    molecule
        .add_bond(scaffold_atom, fragment_anchor, BondOrder::Single)
        .map_err(|e| EngineError::Internal(e.to_string()))?;

    if let Some(violation) = molecule.valence_violations().first() {
        return Err(EngineError::Valence {
            atom: violation.atom,
            element: molecule.atoms()[violation.atom].element,
            valence: violation.valence,
            allowed: violation.allowed,
        });
    }

    let fragment_atoms = (offset..molecule.atom_count()).collect();
    Ok(Congener::new(
        molecule,
        attachment,
        fragment.name(),
        scaffold_atom,
        fragment_anchor,
        template_map,
        fragment_atoms,
    ))
}

/// Grows every (attachment × fragment) combination. Failures are collected
/// per combination and never stop the batch.
#[instrument(skip_all, name = "attachment_task")]
pub fn run(
    template: &Molecule,
    attachments: &[usize],
    fragments: &[&Fragment],
    reporter: &ProgressReporter,
) -> AttachmentBatch {
    info!(
        attachments = attachments.len(),
        fragments = fragments.len(),
        "Attaching fragments to template."
    );
    reporter.report(Progress::TaskStart {
        total_steps: (attachments.len() * fragments.len()) as u64,
    });

    let mut batch = AttachmentBatch::default();
    for &attachment in attachments {
        for fragment in fragments {
            match attach(template, attachment, fragment) {
                Ok(congener) => batch.congeners.push(congener),
                Err(error) => {
                    warn!(attachment, fragment = fragment.name(), %error, "Skipping combination.");
                    batch.failures.push(AttachmentFailure {
                        attachment_index: attachment,
                        fragment_name: fragment.name().to_string(),
                        error,
                    });
                }
            }
            reporter.report(Progress::TaskIncrement);
        }
    }
    reporter.report(Progress::TaskFinish);

    info!(
        congeners = batch.congeners.len(),
        failures = batch.failures.len(),
        "Attachment complete."
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fragments::library::FragmentLibrary;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use crate::core::models::molecule::tests::ethane;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn attach_replaces_hydrogen_with_fragment() {
        let library = FragmentLibrary::builtin().unwrap();
        let template = ethane();
        for name in ["methyl", "hydroxyl", "cyano"] {
            let fragment = library.get(name).unwrap();
            let congener = attach(&template, 4, fragment).unwrap();
            let mol = &congener.molecule;
            assert_eq!(mol.atom_count(), template.atom_count() - 1 + fragment.atom_count());
            assert_eq!(mol.bond_count(), template.bond_count() - 1 + fragment.molecule().bond_count() + 1);
            assert_eq!(congener.scaffold_atom, 0);
            assert_eq!(congener.template_map[4], None);
            assert_eq!(congener.template_map[5], Some(4));
            assert_eq!(mol.hydrogen_count(0), 2);
            assert!(mol.bond_between(congener.scaffold_atom, congener.fragment_anchor).is_some());
            assert!(mol.valence_violations().is_empty());
            assert!(mol.is_connected());
            for &i in &congener.fragment_atoms {
                assert!(mol.atoms()[i].position.is_none());
                assert_eq!(mol.atoms()[i].origin, AtomOrigin::Fragment);
            }
            assert_eq!(mol.atoms()[0].position, template.atoms()[0].position);
        }
    }

    #[test]
    fn heavy_or_out_of_range_attachments_are_invalid() {
        let library = FragmentLibrary::builtin().unwrap();
        let methyl = library.get("methyl").unwrap();
        let template = ethane();
        assert!(matches!(
            attach(&template, 0, methyl),
            Err(EngineError::InvalidAttachment { atom: 0, .. })
        ));
        assert!(matches!(
            attach(&template, 42, methyl),
            Err(EngineError::InvalidAttachment { atom: 42, .. })
        ));

        let mut bridged = template.clone();
        bridged.add_bond(2, 1, BondOrder::Single).unwrap();
        assert!(matches!(
            attach(&bridged, 2, methyl),
            Err(EngineError::InvalidAttachment { atom: 2, .. })
        ));
    }

    #[test]
    fn overvalent_fragment_fails_valence_check() {
        let mut mol = Molecule::new("pentavalent");
        let r = mol.add_atom(Atom::new(Element::Dummy, None));
        let c = mol.add_atom(Atom::new(Element::C, None));
        mol.add_bond(r, c, BondOrder::Single).unwrap();
        for _ in 0..4 {
            let h = mol.add_atom(Atom::new(Element::H, None));
            mol.add_bond(c, h, BondOrder::Single).unwrap();
        }
        let fragment = Fragment::from_molecule("bad", mol).unwrap();
        assert!(matches!(
            attach(&ethane(), 2, &fragment),
            Err(EngineError::Valence {
                element: Element::C,
                ..
            })
        ));
    }

    #[test]
    fn batch_collects_failures_without_stopping() {
        let library = FragmentLibrary::builtin().unwrap();
        let fragments: Vec<&Fragment> = ["methyl", "fluoro", "ethyl"]
            .iter()
            .map(|n| library.get(n).unwrap())
            .collect();
        let template = ethane();
        let batch = run(&template, &[3, 0], &fragments, &ProgressReporter::new());
        assert_eq!(batch.congeners.len(), 3);
        assert_eq!(batch.failures.len(), 3);
        assert!(batch.failures.iter().all(|f| f.attachment_index == 0));
        for (congener, fragment) in batch.congeners.iter().zip(&fragments) {
            assert_eq!(congener.fragment_name, fragment.name());
            assert_eq!(
                congener.molecule.atom_count(),
                template.atom_count() - 1 + fragment.atom_count()
            );
            assert_eq!(
                congener.molecule.bond_count(),
                template.bond_count() - 1 + fragment.molecule().bond_count() + 1
            );
        }
    }

    #[test]
    fn random_combinations_never_violate_valence() {
        let library = FragmentLibrary::builtin().unwrap();
        let fragments: Vec<&Fragment> = library.iter().collect();
        let mut rng = StdRng::seed_from_u64(2024);
        let mut template = ethane();
        for _ in 0..60 {
            let hydrogens: Vec<usize> = (0..template.atom_count())
                .filter(|&i| template.atoms()[i].is_hydrogen())
                .collect();
            let attachment = hydrogens[rng.gen_range(0..hydrogens.len())];
            let fragment = fragments[rng.gen_range(0..fragments.len())];
            let congener = attach(&template, attachment, fragment).unwrap();
            assert!(congener.molecule.valence_violations().is_empty());
            assert!(congener.molecule.is_connected());
            // Keep the template small enough to always carry hydrogens.
            if congener.molecule.atom_count() < 40 && congener.molecule.atoms().iter().any(|a| a.is_hydrogen()) {
                template = congener.molecule;
            }
        }
    }
}
