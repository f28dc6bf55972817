use super::fragment::{Fragment, FragmentError};
use crate::core::io::sdf::{SdfError, SdfFile};
use crate::core::io::traits::MolecularFile;
use crate::core::models::molecule::Molecule;
use std::collections::BTreeMap;
use std::io::{BufReader, Cursor};
use std::path::Path;
use thiserror::Error;

const BUILTIN_FRAGMENTS: &str = include_str!("../../../data/fragments.sdf");

/// Data field that overrides the record title as the fragment name.
const NAME_FIELD: &str = "name";

/// Represents errors that can occur while loading a fragment library.
#[derive(Debug, Error)]
pub enum FragmentLoadError {
    /// The library file or directory could not be read.
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    /// A structure file is not a valid SD file.
    #[error("Failed to parse fragments from '{path}': {source}")]
    Sdf {
        path: String,
        #[source]
        source: SdfError,
    },
    /// A record neither has a title nor a `name` data field.
    #[error("Record {record} in '{path}' has no name")]
    Unnamed { path: String, record: usize },
    /// Two records resolve to the same fragment name.
    #[error("Duplicate fragment name '{0}'")]
    DuplicateName(String),
    /// A record is not a valid fragment (placeholder problems).
    #[error("Invalid fragment in '{path}': {source}")]
    Invalid {
        path: String,
        #[source]
        source: FragmentError,
    },
}

/// An immutable, name-sorted registry of R-group fragments.
///
/// Libraries are built once (from an SD file, a directory of structure
/// files, or the built-in set) and then passed by reference to the growing
/// pipeline; nothing mutates a library after loading.
#[derive(Debug, Default, Clone)]
pub struct FragmentLibrary {
    fragments: BTreeMap<String, Fragment>,
}

impl FragmentLibrary {
    /// Loads every record of a multi-record SD file. Each fragment is named
    /// by its `name` data field when present, otherwise by its title line.
    pub fn from_sdf_path(path: &Path) -> Result<Self, FragmentLoadError> {
        let molecules = SdfFile::read_from_path(path).map_err(|e| sdf_error(path, e))?;
        let mut library = Self::default();
        library.insert_records(&path.to_string_lossy(), molecules)?;
        Ok(library)
    }

    /// Loads every `.sdf` and `.mol` file of a directory (non-recursive).
    /// Fragments are named by file stem; a file must hold one record.
    pub fn from_directory(dir: &Path) -> Result<Self, FragmentLoadError> {
        let entries = std::fs::read_dir(dir).map_err(|e| FragmentLoadError::Io {
            path: dir.to_string_lossy().to_string(),
            source: e,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FragmentLoadError::Io {
                path: dir.to_string_lossy().to_string(),
                source: e,
            })?;
            let path = entry.path();
            let is_structure = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("sdf") || ext.eq_ignore_ascii_case("mol"));
            if path.is_file() && is_structure {
                paths.push(path);
            }
        }
        paths.sort();

        let mut library = Self::default();
        for path in paths {
            let display = path.to_string_lossy().to_string();
            let molecules = SdfFile::read_from_path(&path).map_err(|e| sdf_error(&path, e))?;
            let Some(molecule) = molecules.into_iter().next() else {
                return Err(FragmentLoadError::Unnamed {
                    path: display,
                    record: 0,
                });
            };
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            library.insert(&display, &name, molecule)?;
        }
        Ok(library)
    }

    /// The embedded library of common substituents.
    pub fn builtin() -> Result<Self, FragmentLoadError> {
        let mut reader = BufReader::new(Cursor::new(BUILTIN_FRAGMENTS));
        let molecules = SdfFile::read_from(&mut reader).map_err(|e| FragmentLoadError::Sdf {
            path: "<builtin>".to_string(),
            source: e,
        })?;
        let mut library = Self::default();
        library.insert_records("<builtin>", molecules)?;
        Ok(library)
    }

    fn insert_records(&mut self, origin: &str, molecules: Vec<Molecule>) -> Result<(), FragmentLoadError> {
        for (record, molecule) in molecules.into_iter().enumerate() {
            let name = molecule
                .properties
                .get(NAME_FIELD)
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| molecule.name.trim().to_string());
            if name.is_empty() {
                return Err(FragmentLoadError::Unnamed {
                    path: origin.to_string(),
                    record,
                });
            }
            self.insert(origin, &name, molecule)?;
        }
        Ok(())
    }

    fn insert(&mut self, origin: &str, name: &str, molecule: Molecule) -> Result<(), FragmentLoadError> {
        if self.fragments.contains_key(name) {
            return Err(FragmentLoadError::DuplicateName(name.to_string()));
        }
        let fragment = Fragment::from_molecule(name, molecule).map_err(|source| FragmentLoadError::Invalid {
            path: origin.to_string(),
            source,
        })?;
        self.fragments.insert(name.to_string(), fragment);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Fragment> {
        self.fragments.get(name)
    }

    /// Fragment names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Fragments in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.values()
    }
}

fn sdf_error(path: &Path, source: SdfError) -> FragmentLoadError {
    match source {
        SdfError::Io(e) => FragmentLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        },
        other => FragmentLoadError::Sdf {
            path: path.to_string_lossy().to_string(),
            source: other,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::element::Element;
    use std::fs;
    use tempfile::tempdir;

    const METHYL: &str = "\
methyl
  test

  5  4  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 R#  0  0  0  0  0  0  0  0  0  0  0  0
    1.5200    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.8766    0.0000   -1.0088 H   0  0  0  0  0  0  0  0  0  0  0  0
    1.8766   -0.8737    0.5044 H   0  0  0  0  0  0  0  0  0  0  0  0
    1.8766    0.8737    0.5044 H   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0  0  0  0
  2  3  1  0  0  0  0
  2  4  1  0  0  0  0
  2  5  1  0  0  0  0
M  END
$$$$
";

    const FLUORO_NAMED: &str = "\
F-record
  test

  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 R   0  0  0  0  0  0  0  0  0  0  0  0
    1.3300    0.0000    0.0000 F   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0  0  0  0
M  END
>  <name>
fluoro

$$$$
";

    #[test]
    fn builtin_library_loads_common_substituents() {
        let library = FragmentLibrary::builtin().unwrap();
        for name in [
            "methyl",
            "ethyl",
            "hydroxyl",
            "amino",
            "fluoro",
            "chloro",
            "bromo",
            "methoxy",
            "cyano",
            "trifluoromethyl",
        ] {
            assert!(library.get(name).is_some(), "missing {name}");
        }
        let names: Vec<&str> = library.names().collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(library.iter().all(|f| f.molecule().valence_violations().is_empty()));

        let cyano = library.get("cyano").unwrap();
        assert_eq!(cyano.molecule().atoms()[cyano.attachment()].element, Element::C);
        assert_eq!(cyano.atom_count(), 2);
    }

    #[test]
    fn loads_sdf_with_titles_and_name_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lib.sdf");
        fs::write(&path, format!("{METHYL}{FLUORO_NAMED}")).unwrap();
        let library = FragmentLibrary::from_sdf_path(&path).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.names().collect::<Vec<_>>(), vec!["fluoro", "methyl"]);
        assert_eq!(library.get("methyl").unwrap().atom_count(), 4);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dup.sdf");
        fs::write(&path, format!("{METHYL}{METHYL}")).unwrap();
        assert!(matches!(
            FragmentLibrary::from_sdf_path(&path),
            Err(FragmentLoadError::DuplicateName(name)) if name == "methyl"
        ));
    }

    #[test]
    fn records_without_placeholder_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.sdf");
        fs::write(&path, METHYL.replace("R# ", "C  ")).unwrap();
        assert!(matches!(
            FragmentLibrary::from_sdf_path(&path),
            Err(FragmentLoadError::Invalid {
                source: FragmentError::NoPlaceholder(_),
                ..
            })
        ));
    }

    #[test]
    fn directory_fragments_are_named_by_file_stem() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("me.mol"), METHYL).unwrap();
        fs::write(dir.path().join("f.sdf"), FLUORO_NAMED).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let library = FragmentLibrary::from_directory(dir.path()).unwrap();
        assert_eq!(library.names().collect::<Vec<_>>(), vec!["f", "me"]);
    }

    #[test]
    fn missing_paths_report_io_errors() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            FragmentLibrary::from_sdf_path(&dir.path().join("absent.sdf")),
            Err(FragmentLoadError::Io { .. })
        ));
        assert!(matches!(
            FragmentLibrary::from_directory(&dir.path().join("absent")),
            Err(FragmentLoadError::Io { .. })
        ));
    }
}
