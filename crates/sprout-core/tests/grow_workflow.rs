use nalgebra::Point3;
use sprout::core::fragments::library::FragmentLibrary;
use sprout::core::fragments::selection::{FragmentSelector, NameSelection};
use sprout::core::io::pdb::PdbFile;
use sprout::core::io::report::read_summary_from_path;
use sprout::core::io::sdf::SdfFile;
use sprout::core::io::traits::MolecularFile;
use sprout::core::models::atom::Atom;
use sprout::core::models::congener::CongenerStatus;
use sprout::core::models::conformer::PoseScore;
use sprout::core::models::element::Element;
use sprout::core::models::molecule::Molecule;
use sprout::core::models::receptor::{Receptor, ReceptorAtom};
use sprout::core::models::topology::BondOrder;
use sprout::engine::cancel::CancellationToken;
use sprout::engine::config::{GrowConfig, GrowConfigBuilder};
use sprout::engine::progress::{Progress, ProgressReporter};
use sprout::core::utils::geometry::aligned_rmsd_subset;
use sprout::engine::scoring::{AffinityScorer, Pose, ScoringError};
use sprout::workflows::grow::{self, GrowRequest, SUMMARY_FILE};
use std::path::Path;
use std::sync::Mutex;

fn ethane() -> Molecule {
    let mut mol = Molecule::new("ethane");
    let c1 = mol.add_atom(Atom::new(Element::C, Some(Point3::new(0.0, 0.0, 0.0))));
    let c2 = mol.add_atom(Atom::new(Element::C, Some(Point3::new(1.53, 0.0, 0.0))));
    mol.add_bond(c1, c2, BondOrder::Single).unwrap();
    let hydrogens = [
        (c1, Point3::new(-0.38, 1.03, 0.0)),
        (c1, Point3::new(-0.38, -0.51, 0.89)),
        (c1, Point3::new(-0.38, -0.51, -0.89)),
        (c2, Point3::new(1.91, -1.03, 0.0)),
        (c2, Point3::new(1.91, 0.51, 0.89)),
        (c2, Point3::new(1.91, 0.51, -0.89)),
    ];
    for (parent, position) in hydrogens {
        let h = mol.add_atom(Atom::new(Element::H, Some(position)));
        mol.add_bond(parent, h, BondOrder::Single).unwrap();
    }
    mol
}

/// A loose shell of receptor atoms about 6 Å from the template.
fn pocket() -> Receptor {
    let mut atoms = Vec::new();
    for (i, (x, y, z)) in [
        (0.8, 6.5, 0.0),
        (0.8, -6.5, 0.0),
        (0.8, 0.0, 6.5),
        (0.8, 0.0, -6.5),
        (7.5, 0.0, 0.0),
        (-6.0, 0.0, 0.0),
    ]
    .into_iter()
    .enumerate()
    {
        let element = if i % 2 == 0 { Element::C } else { Element::O };
        let mut atom = ReceptorAtom::new(element, if i % 2 == 0 { "CB" } else { "OG" }, "SER", Point3::new(x, y, z));
        atom.residue_number = i as isize + 1;
        atoms.push(atom);
    }
    Receptor::new("pocket", atoms)
}

/// Scores every pose by its position in the batch.
struct Counting;

impl AffinityScorer for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn score(&self, _: &Path, poses: &[Pose<'_>]) -> Result<Vec<PoseScore>, ScoringError> {
        Ok((0..poses.len())
            .map(|i| PoseScore {
                affinity_pk: 5.0 + i as f64 * 0.1,
                vina_affinity: Some(-4.0 - i as f64 * 0.1),
            })
            .collect())
    }
}

fn config() -> GrowConfig {
    GrowConfigBuilder::new()
        .num_conf(4)
        .minimum_conf_rms(0.3)
        .max_attempts(40)
        .ligand_force_field("uff")
        .energy_range(5.0)
        .build()
        .unwrap()
}

#[test]
fn grows_scores_and_writes_a_congeneric_series() {
    let dir = tempfile::tempdir().unwrap();

    let template_path = dir.path().join("template.sdf");
    SdfFile::write_to_path(&vec![ethane()], &template_path).unwrap();
    let template = SdfFile::read_from_path(&template_path).unwrap().remove(0);

    let receptor_path = dir.path().join("pocket.pdb");
    PdbFile::write_to_path(&pocket(), &receptor_path).unwrap();
    let receptor = PdbFile::read_from_path(&receptor_path).unwrap();

    let library = FragmentLibrary::builtin().unwrap();
    let fragments = NameSelection::new(["methyl", "hydroxyl", "chloro"])
        .select(&library)
        .unwrap();

    let events = Mutex::new(Vec::new());
    let reporter = ProgressReporter::with_callback(Box::new(|event| {
        if let Progress::PhaseStart { name } = event {
            events.lock().unwrap().push(name);
        }
    }));

    let config = config();
    let request = GrowRequest {
        template: &template,
        attachments: &[2],
        fragments: &fragments,
        receptor: Some(&receptor),
        receptor_path: Some(&receptor_path),
    };
    let result = grow::run_with_scorer(request, &config, Some(&Counting), &reporter, &CancellationToken::new()).unwrap();
    drop(reporter);

    assert_eq!(
        events.into_inner().unwrap(),
        vec![
            "Preparation",
            "Attachment",
            "Conformer Generation",
            "Clash Filtering",
            "Minimization",
            "Ranking",
            "Scoring"
        ]
    );
    assert!(!result.cancelled);
    assert!(result.attachment_failures.is_empty());
    assert!(result.scoring_error.is_none());
    assert_eq!(result.congeners.len(), 3);

    for (index, congener) in result.congeners.iter().enumerate() {
        let fragment = fragments[index];
        assert_eq!(congener.fragment_name, fragment.name());
        assert_eq!(
            congener.molecule.atom_count(),
            template.atom_count() - 1 + fragment.atom_count()
        );
        assert_ne!(congener.status(), CongenerStatus::Pending);
        assert_eq!(congener.is_missing(), result.missing.contains(&index));

        let energies: Vec<f64> = congener.conformers().map(|(_, c)| c.energy.unwrap()).collect();
        assert!(energies.windows(2).all(|w| w[0] <= w[1]));
        for (rank, (_, conformer)) in congener.conformers().enumerate() {
            assert_eq!(conformer.rank, Some(rank));
            assert!(conformer.relative_energy.unwrap() <= config.ranking.energy_range);
            assert!(conformer.score.is_some());
            assert!(!conformer.clashing);
        }
    }
    assert!(result.conformer_count() > 0);

    let out = dir.path().join("out");
    let files = result.write_to_directory(&out).unwrap();
    assert_eq!(files.len(), result.conformer_count());
    for file in &files {
        let records = SdfFile::read_from_path(file).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].properties.contains_key("energy"));
        assert!(records[0].properties.contains_key("affinity_pk"));
    }

    let rows = read_summary_from_path(&out.join(SUMMARY_FILE)).unwrap();
    let populated_rows = rows.iter().filter(|r| r.file.is_some()).count();
    assert_eq!(populated_rows, files.len());
    assert_eq!(rows.len(), files.len() + result.missing.len());
    assert!(rows.iter().filter(|r| r.file.is_some()).all(|r| r.ic50_nm.is_some()));
}

#[test]
fn retained_conformers_stay_distinct_after_minimization() {
    let template = ethane();
    let library = FragmentLibrary::builtin().unwrap();
    let fragments = NameSelection::new(["propyl", "ethyl", "methoxy"])
        .select(&library)
        .unwrap();
    let config = GrowConfigBuilder::new()
        .num_conf(30)
        .minimum_conf_rms(0.5)
        .ligand_force_field("uff")
        .energy_range(1000.0)
        .build()
        .unwrap();
    let request = GrowRequest {
        template: &template,
        attachments: &[5],
        fragments: &fragments,
        receptor: None,
        receptor_path: None,
    };
    let result = grow::run(request, &config, &ProgressReporter::new(), &CancellationToken::new()).unwrap();
    assert!(result.conformer_count() > 0);

    for congener in &result.congeners {
        let heavy = congener.molecule.heavy_atom_indices();
        let coords: Vec<_> = congener.conformers().map(|(_, c)| c.coordinates.clone()).collect();
        for (i, a) in coords.iter().enumerate() {
            for b in &coords[i + 1..] {
                let rmsd = aligned_rmsd_subset(a, b, &heavy).unwrap();
                assert!(rmsd >= 0.5, "{}: retained pair at {rmsd:.3} A", congener.label());
            }
        }
    }
}

#[test]
fn cancellation_before_the_run_leaves_congeners_pending() {
    let template = ethane();
    let library = FragmentLibrary::builtin().unwrap();
    let fragments = NameSelection::new(["methyl", "ethyl"]).select(&library).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let request = GrowRequest {
        template: &template,
        attachments: &[2, 5],
        fragments: &fragments,
        receptor: None,
        receptor_path: None,
    };
    let result = grow::run(request, &config(), &ProgressReporter::new(), &cancel).unwrap();
    assert!(result.cancelled);
    assert_eq!(result.congeners.len(), 4);
    assert!(result.missing.is_empty());
    assert!(result.congeners.iter().all(|c| c.status() == CongenerStatus::Pending));
}

#[test]
fn unknown_fragment_names_are_reported() {
    let library = FragmentLibrary::builtin().unwrap();
    let error = NameSelection::new(["methyl", "unobtainium"])
        .select(&library)
        .unwrap_err();
    assert_eq!(error.0, "unobtainium");
}
