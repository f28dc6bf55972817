use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chemical elements recognized in ligands, fragments, and receptors.
///
/// `Dummy` stands for the reserved placeholder atom that marks a fragment's
/// attachment point; it never survives fragment loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    H,
    B,
    C,
    N,
    O,
    F,
    Na,
    Mg,
    Si,
    P,
    S,
    Cl,
    K,
    Ca,
    Fe,
    Zn,
    Se,
    Br,
    I,
    Dummy,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown element symbol: '{0}'")]
pub struct ParseElementError(pub String);

static SYMBOLS: Map<&'static str, Element> = phf_map! {
    "H" => Element::H, "D" => Element::H,
    "B" => Element::B,
    "C" => Element::C,
    "N" => Element::N,
    "O" => Element::O,
    "F" => Element::F,
    "NA" => Element::Na,
    "MG" => Element::Mg,
    "SI" => Element::Si,
    "P" => Element::P,
    "S" => Element::S,
    "CL" => Element::Cl,
    "K" => Element::K,
    "CA" => Element::Ca,
    "FE" => Element::Fe,
    "ZN" => Element::Zn,
    "SE" => Element::Se,
    "BR" => Element::Br,
    "I" => Element::I,
    "R" => Element::Dummy, "R#" => Element::Dummy, "*" => Element::Dummy,
    "DU" => Element::Dummy, "Q" => Element::Dummy, "A" => Element::Dummy,
};

impl Element {
    pub fn atomic_number(self) -> u8 {
        match self {
            Element::H => 1,
            Element::B => 5,
            Element::C => 6,
            Element::N => 7,
            Element::O => 8,
            Element::F => 9,
            Element::Na => 11,
            Element::Mg => 12,
            Element::Si => 14,
            Element::P => 15,
            Element::S => 16,
            Element::Cl => 17,
            Element::K => 19,
            Element::Ca => 20,
            Element::Fe => 26,
            Element::Zn => 30,
            Element::Se => 34,
            Element::Br => 35,
            Element::I => 53,
            Element::Dummy => 0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Element::H => "H",
            Element::B => "B",
            Element::C => "C",
            Element::N => "N",
            Element::O => "O",
            Element::F => "F",
            Element::Na => "Na",
            Element::Mg => "Mg",
            Element::Si => "Si",
            Element::P => "P",
            Element::S => "S",
            Element::Cl => "Cl",
            Element::K => "K",
            Element::Ca => "Ca",
            Element::Fe => "Fe",
            Element::Zn => "Zn",
            Element::Se => "Se",
            Element::Br => "Br",
            Element::I => "I",
            Element::Dummy => "R",
        }
    }

    /// Single-bond covalent radius in Angstroms.
    pub fn covalent_radius(self) -> f64 {
        match self {
            Element::H => 0.31,
            Element::B => 0.84,
            Element::C => 0.76,
            Element::N => 0.71,
            Element::O => 0.66,
            Element::F => 0.57,
            Element::Na => 1.66,
            Element::Mg => 1.41,
            Element::Si => 1.11,
            Element::P => 1.07,
            Element::S => 1.05,
            Element::Cl => 1.02,
            Element::K => 2.03,
            Element::Ca => 1.76,
            Element::Fe => 1.32,
            Element::Zn => 1.22,
            Element::Se => 1.20,
            Element::Br => 1.20,
            Element::I => 1.39,
            Element::Dummy => 0.77,
        }
    }

    /// Bondi van der Waals radius in Angstroms.
    pub fn vdw_radius(self) -> f64 {
        match self {
            Element::H => 1.20,
            Element::B => 1.92,
            Element::C => 1.70,
            Element::N => 1.55,
            Element::O => 1.52,
            Element::F => 1.47,
            Element::Na => 2.27,
            Element::Mg => 1.73,
            Element::Si => 2.10,
            Element::P => 1.80,
            Element::S => 1.80,
            Element::Cl => 1.75,
            Element::K => 2.75,
            Element::Ca => 2.31,
            Element::Fe => 2.00,
            Element::Zn => 1.39,
            Element::Se => 1.90,
            Element::Br => 1.85,
            Element::I => 1.98,
            Element::Dummy => 1.70,
        }
    }

    /// Pauling electronegativity, used by the bond-increment charge model.
    pub fn electronegativity(self) -> f64 {
        match self {
            Element::H => 2.20,
            Element::B => 2.04,
            Element::C => 2.55,
            Element::N => 3.04,
            Element::O => 3.44,
            Element::F => 3.98,
            Element::Na => 0.93,
            Element::Mg => 1.31,
            Element::Si => 1.90,
            Element::P => 2.19,
            Element::S => 2.58,
            Element::Cl => 3.16,
            Element::K => 0.82,
            Element::Ca => 1.00,
            Element::Fe => 1.83,
            Element::Zn => 1.65,
            Element::Se => 2.55,
            Element::Br => 2.96,
            Element::I => 2.66,
            Element::Dummy => 2.55,
        }
    }

    fn valence_electrons(self) -> Option<i16> {
        match self {
            Element::H => Some(1),
            Element::B => Some(3),
            Element::C | Element::Si => Some(4),
            Element::N | Element::P => Some(5),
            Element::O | Element::S | Element::Se => Some(6),
            Element::F | Element::Cl | Element::Br | Element::I => Some(7),
            _ => None,
        }
    }

    fn hypervalent_limit(self) -> Option<u8> {
        match self {
            Element::P => Some(5),
            Element::S | Element::Se => Some(6),
            Element::Cl | Element::Br | Element::I => Some(7),
            _ => None,
        }
    }

    /// Largest number of bonds (in bond-order units) this element may carry
    /// at the given formal charge.
    ///
    /// Follows the isoelectronic rule: a charged atom behaves like the
    /// neighbouring element with the same number of valence electrons.
    /// Returns `None` for elements whose valence is not checked (metals and
    /// the placeholder).
    pub fn max_valence(self, formal_charge: i8) -> Option<u8> {
        let electrons = self.valence_electrons()? - formal_charge as i16;
        if self == Element::H {
            return Some(if formal_charge == 0 { 1 } else { 0 });
        }
        if electrons <= 0 {
            return Some(0);
        }
        let octet = if electrons >= 4 { 8 - electrons } else { electrons };
        let octet = octet.max(0) as u8;
        match (formal_charge, self.hypervalent_limit()) {
            (0, Some(limit)) => Some(limit.max(octet)),
            _ => Some(octet),
        }
    }

    pub fn is_hydrogen(self) -> bool {
        self == Element::H
    }

    pub fn is_placeholder(self) -> bool {
        self == Element::Dummy
    }
}

impl FromStr for Element {
    type Err = ParseElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase();
        if let Some(element) = SYMBOLS.get(key.as_str()) {
            return Ok(*element);
        }
        // R1, R2, ... style attachment labels
        if key.len() > 1 && key.starts_with('R') && key[1..].chars().all(|c| c.is_ascii_digit()) {
            return Ok(Element::Dummy);
        }
        Err(ParseElementError(s.trim().to_string()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbols_case_insensitively() {
        assert_eq!("Cl".parse::<Element>(), Ok(Element::Cl));
        assert_eq!("CL".parse::<Element>(), Ok(Element::Cl));
        assert_eq!(" c ".parse::<Element>(), Ok(Element::C));
        assert_eq!("D".parse::<Element>(), Ok(Element::H));
    }

    #[test]
    fn placeholder_labels_map_to_dummy() {
        for label in ["R", "R#", "*", "Du", "R1", "R12"] {
            assert_eq!(label.parse::<Element>(), Ok(Element::Dummy), "{label}");
        }
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        assert!(matches!("Xx".parse::<Element>(), Err(ParseElementError(_))));
        assert!("Rx".parse::<Element>().is_err());
    }

    #[test]
    fn neutral_max_valences_match_common_chemistry() {
        assert_eq!(Element::H.max_valence(0), Some(1));
        assert_eq!(Element::C.max_valence(0), Some(4));
        assert_eq!(Element::N.max_valence(0), Some(3));
        assert_eq!(Element::O.max_valence(0), Some(2));
        assert_eq!(Element::F.max_valence(0), Some(1));
        assert_eq!(Element::S.max_valence(0), Some(6));
        assert_eq!(Element::P.max_valence(0), Some(5));
        assert_eq!(Element::B.max_valence(0), Some(3));
    }

    #[test]
    fn charged_max_valences_follow_isoelectronic_rule() {
        assert_eq!(Element::N.max_valence(1), Some(4));
        assert_eq!(Element::O.max_valence(-1), Some(1));
        assert_eq!(Element::O.max_valence(1), Some(3));
        assert_eq!(Element::C.max_valence(1), Some(3));
        assert_eq!(Element::C.max_valence(-1), Some(3));
        assert_eq!(Element::B.max_valence(-1), Some(4));
        assert_eq!(Element::Cl.max_valence(-1), Some(0));
        assert_eq!(Element::H.max_valence(1), Some(0));
    }

    #[test]
    fn metals_and_placeholders_are_not_valence_checked() {
        assert_eq!(Element::Zn.max_valence(2), None);
        assert_eq!(Element::Dummy.max_valence(0), None);
    }
}
