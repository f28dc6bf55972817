use crate::core::models::element::Element;
use phf::{Map, phf_map};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct LennardJonesParam {
    /// Distance at the energy minimum (r_min), in Angstroms.
    pub radius: f64,
    pub well_depth: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GlobalParams {
    pub dielectric_constant: f64,
    #[serde(default = "default_one_four_scale")]
    pub one_four_scale: f64,
}

fn default_one_four_scale() -> f64 {
    0.5
}

/// Harmonic constants shared by every bond and angle.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BondedParams {
    /// kcal/(mol·Å²)
    pub bond_force_constant: f64,
    /// kcal/(mol·rad²)
    pub angle_force_constant: f64,
}

/// A classical small-molecule parameter set keyed by element symbol.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ClassicalParams {
    #[serde(default)]
    pub name: String,
    pub globals: GlobalParams,
    pub bonded: BondedParams,
    pub vdw: HashMap<String, LennardJonesParam>,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Unknown force field '{0}': not a built-in name or an existing file")]
    UnknownForceField(String),
}

static UFF_VDW: Map<&'static str, (f64, f64)> = phf_map! {
    "H" => (2.886, 0.044),
    "C" => (3.851, 0.105),
    "N" => (3.660, 0.069),
    "O" => (3.500, 0.060),
    "F" => (3.364, 0.050),
    "P" => (4.147, 0.305),
    "S" => (4.035, 0.274),
    "Cl" => (3.947, 0.227),
    "Br" => (4.189, 0.251),
    "I" => (4.500, 0.339),
    "B" => (4.083, 0.180),
    "Si" => (4.295, 0.402),
    "Se" => (4.205, 0.291),
};

static DREIDING_VDW: Map<&'static str, (f64, f64)> = phf_map! {
    "H" => (3.195, 0.0152),
    "C" => (3.8983, 0.0951),
    "N" => (3.6621, 0.0774),
    "O" => (3.4046, 0.0957),
    "F" => (3.472, 0.0725),
    "P" => (4.15, 0.32),
    "S" => (4.03, 0.344),
    "Cl" => (3.9503, 0.34),
    "Br" => (3.95, 0.37),
    "I" => (4.15, 0.55),
    "B" => (4.02, 0.095),
    "Si" => (4.27, 0.31),
    "Se" => (4.23, 0.43),
};

fn from_table(name: &str, table: &Map<&'static str, (f64, f64)>, bond_k: f64, angle_k: f64) -> ClassicalParams {
    ClassicalParams {
        name: name.to_string(),
        globals: GlobalParams {
            dielectric_constant: 1.0,
            one_four_scale: default_one_four_scale(),
        },
        bonded: BondedParams {
            bond_force_constant: bond_k,
            angle_force_constant: angle_k,
        },
        vdw: table
            .entries()
            .map(|(symbol, &(radius, well_depth))| {
                (symbol.to_string(), LennardJonesParam { radius, well_depth })
            })
            .collect(),
    }
}

impl ClassicalParams {
    pub const BUILTIN_NAMES: [&'static str; 2] = ["uff", "dreiding"];

    pub fn builtin(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "uff" => Some(from_table("uff", &UFF_VDW, 350.0, 60.0)),
            "dreiding" => Some(from_table("dreiding", &DREIDING_VDW, 350.0, 50.0)),
            _ => None,
        }
    }

    /// Resolves a force-field identifier: a built-in name first, then a
    /// TOML file path.
    pub fn from_identifier(identifier: &str) -> Result<Self, ParamLoadError> {
        if let Some(params) = Self::builtin(identifier) {
            return Ok(params);
        }
        let path = Path::new(identifier);
        if path.is_file() {
            return Self::load(path);
        }
        Err(ParamLoadError::UnknownForceField(identifier.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let mut params: Self = toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        if params.name.is_empty() {
            params.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
        }
        Ok(params)
    }

    pub fn vdw(&self, element: Element) -> Option<&LennardJonesParam> {
        self.vdw.get(element.symbol())
    }
}

/// Explicit-water parameters applied to receptor water atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterModel {
    #[default]
    Tip3p,
    Spce,
    /// Water atoms are left out of intermolecular energies.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterParams {
    pub oxygen: LennardJonesParam,
    pub oxygen_charge: f64,
    pub hydrogen_charge: f64,
}

impl WaterModel {
    pub fn parameters(self) -> Option<WaterParams> {
        match self {
            WaterModel::Tip3p => Some(WaterParams {
                oxygen: LennardJonesParam {
                    radius: 3.5364,
                    well_depth: 0.1521,
                },
                oxygen_charge: -0.834,
                hydrogen_charge: 0.417,
            }),
            WaterModel::Spce => Some(WaterParams {
                oxygen: LennardJonesParam {
                    radius: 3.5533,
                    well_depth: 0.1553,
                },
                oxygen_charge: -0.8476,
                hydrogen_charge: 0.4238,
            }),
            WaterModel::None => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown water model '{0}' (expected tip3p, spce, or none)")]
pub struct ParseWaterModelError(pub String);

impl FromStr for WaterModel {
    type Err = ParseWaterModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tip3p" => Ok(WaterModel::Tip3p),
            "spce" | "spc/e" => Ok(WaterModel::Spce),
            "none" => Ok(WaterModel::None),
            _ => Err(ParseWaterModelError(s.to_string())),
        }
    }
}

impl fmt::Display for WaterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WaterModel::Tip3p => "tip3p",
            WaterModel::Spce => "spce",
            WaterModel::None => "none",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn builtin_sets_cover_common_ligand_elements() {
        for name in ClassicalParams::BUILTIN_NAMES {
            let params = ClassicalParams::builtin(name).unwrap();
            assert_eq!(params.name, name);
            for element in [Element::H, Element::C, Element::N, Element::O, Element::S, Element::Cl] {
                assert!(params.vdw(element).is_some(), "{name} lacks {element}");
            }
        }
        assert_eq!(
            ClassicalParams::builtin("UFF").unwrap().vdw(Element::C),
            Some(&LennardJonesParam {
                radius: 3.851,
                well_depth: 0.105
            })
        );
        assert!(ClassicalParams::builtin("gaff").is_none());
    }

    #[test]
    fn load_succeeds_with_valid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("custom.toml");
        fs::write(
            &file_path,
            r#"
            [globals]
            dielectric_constant = 2.0

            [bonded]
            bond_force_constant = 300.0
            angle_force_constant = 40.0

            [vdw.C]
            radius = 3.9
            well_depth = 0.1

            [vdw.H]
            radius = 2.9
            well_depth = 0.02
            "#,
        )
        .unwrap();

        let params = ClassicalParams::load(&file_path).unwrap();
        assert_eq!(params.name, "custom");
        assert_eq!(params.globals.one_four_scale, 0.5);
        assert_eq!(params.bonded.angle_force_constant, 40.0);
        assert_eq!(params.vdw(Element::H).unwrap().radius, 2.9);
        assert!(params.vdw(Element::N).is_none());

        let by_path = ClassicalParams::from_identifier(file_path.to_str().unwrap()).unwrap();
        assert_eq!(by_path, params);
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = ClassicalParams::load(&dir.path().join("non_existent.toml"));
        assert!(matches!(result, Err(ParamLoadError::Io { .. })));
    }

    #[test]
    fn load_fails_for_malformed_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("malformed.toml");
        fs::write(&file_path, "this is not toml").unwrap();
        assert!(matches!(
            ClassicalParams::load(&file_path),
            Err(ParamLoadError::Toml { .. })
        ));
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        assert!(matches!(
            ClassicalParams::from_identifier("no-such-forcefield"),
            Err(ParamLoadError::UnknownForceField(name)) if name == "no-such-forcefield"
        ));
    }

    #[test]
    fn water_models_parse_and_expose_parameters() {
        assert_eq!("TIP3P".parse::<WaterModel>(), Ok(WaterModel::Tip3p));
        assert_eq!("spc/e".parse::<WaterModel>(), Ok(WaterModel::Spce));
        assert_eq!("none".parse::<WaterModel>(), Ok(WaterModel::None));
        assert!("tip4p".parse::<WaterModel>().is_err());

        let tip3p = WaterModel::Tip3p.parameters().unwrap();
        assert_eq!(tip3p.oxygen_charge + 2.0 * tip3p.hydrogen_charge, 0.0);
        assert!(WaterModel::None.parameters().is_none());
        assert_eq!(WaterModel::Spce.to_string(), "spce");
    }
}
