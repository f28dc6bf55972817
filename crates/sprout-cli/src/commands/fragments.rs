use crate::cli::{FragmentsArgs, FragmentsCommands};
use crate::error::Result;
use sprout::core::fragments::library::FragmentLibrary;
use sprout::engine::error::EngineError;
use std::path::Path;
use tracing::info;

/// Loads the built-in library, or a user library from an SDF file or a
/// directory of SDF/MOL files.
pub fn load_library(path: Option<&Path>) -> Result<FragmentLibrary> {
    let library = match path {
        None => FragmentLibrary::builtin(),
        Some(dir) if dir.is_dir() => FragmentLibrary::from_directory(dir),
        Some(file) => FragmentLibrary::from_sdf_path(file),
    }
    .map_err(EngineError::from)?;
    info!(
        source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "built-in".to_string()),
        fragments = library.len(),
        "Loaded fragment library."
    );
    Ok(library)
}

pub async fn run(args: FragmentsArgs) -> Result<()> {
    match args.command {
        FragmentsCommands::List { library } => {
            let library = load_library(library.as_deref())?;
            for line in listing(&library) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn listing(library: &FragmentLibrary) -> Vec<String> {
    let mut lines = vec![format!("{:<20} {:>6} {:>12}", "NAME", "ATOMS", "ATTACHMENT")];
    for fragment in library.iter() {
        let anchor = fragment
            .molecule()
            .atom(fragment.attachment())
            .map(|atom| format!("{}{}", atom.element, fragment.attachment()))
            .unwrap_or_else(|| fragment.attachment().to_string());
        lines.push(format!("{:<20} {:>6} {:>12}", fragment.name(), fragment.atom_count(), anchor));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_library_is_listed_by_name() {
        let library = load_library(None).unwrap();
        let lines = listing(&library);
        assert_eq!(lines.len(), library.len() + 1);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines.iter().any(|l| l.starts_with("methyl ")));
    }

    #[test]
    fn missing_library_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_library(Some(&dir.path().join("absent.sdf"))).is_err());
    }
}
