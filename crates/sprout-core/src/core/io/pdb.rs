use super::traits::MolecularFile;
use crate::core::models::element::Element;
use crate::core::models::receptor::{Receptor, ReceptorAtom};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("No ATOM or HETATM records found")]
    Empty,
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Cannot determine element (element field '{element}', atom name '{name}')")]
    UnknownElement { element: String, name: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_float(line: &str, start: usize, end: usize, line_num: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.to_string(),
        },
    })
}

/// Infers an element from a PDB atom name when columns 77-78 are blank.
/// Names whose first column is occupied (e.g. "FE  ", "CL1 ") carry a
/// two-letter symbol; otherwise the first letter after padding is used.
fn element_from_atom_name(raw_name: &str) -> Option<Element> {
    let trimmed = raw_name.trim();
    let letters: String = trimmed
        .chars()
        .skip_while(|c| c.is_ascii_digit())
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let two_letter = raw_name.len() >= 2
        && !raw_name.starts_with(' ')
        && !raw_name.chars().next().is_some_and(|c| c.is_ascii_digit());
    if two_letter && letters.len() >= 2 {
        if let Ok(element) = letters[..2].parse::<Element>() {
            if !element.is_placeholder() {
                return Some(element);
            }
        }
    }
    letters[..1].parse::<Element>().ok().filter(|e| !e.is_placeholder())
}

/// PDB charge field "2+" / "1-" into a signed integer.
fn parse_formal_charge(field: &str) -> Option<i8> {
    let field = field.trim();
    if field.len() != 2 {
        return None;
    }
    let (digit, sign) = field.split_at(1);
    let magnitude: i8 = digit.parse().ok()?;
    match sign {
        "+" => Some(magnitude),
        "-" => Some(-magnitude),
        _ => None,
    }
}

/// Receptors from PDB files. Only the first model is read; alternate
/// locations other than blank or `A` are skipped.
pub struct PdbFile;

impl MolecularFile for PdbFile {
    type Structure = Receptor;
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Receptor, PdbError> {
        let mut atoms = Vec::new();
        let mut name = String::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record = slice_and_trim(&line, 0, 6);
            match record {
                "HEADER" if name.is_empty() => {
                    name = slice_and_trim(&line, 62, 66).to_string();
                }
                "ENDMDL" => break,
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }
                    let alt_loc = line.get(16..17).unwrap_or(" ");
                    if alt_loc != " " && alt_loc != "A" {
                        continue;
                    }
                    atoms.push(parse_atom(&line, line_num)?);
                }
                _ => {}
            }
        }

        if atoms.is_empty() {
            return Err(PdbError::Empty);
        }
        Ok(Receptor::new(&name, atoms))
    }

    fn write_to(receptor: &Receptor, writer: &mut impl Write) -> Result<(), PdbError> {
        for (i, atom) in receptor.atoms().iter().enumerate() {
            let record = if atom.is_water { "HETATM" } else { "ATOM  " };
            let name = if atom.name.len() < 4 {
                format!(" {:<3}", atom.name)
            } else {
                atom.name.clone()
            };
            writeln!(
                writer,
                "{}{:>5} {:<4} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
                record,
                (i + 1) % 100_000,
                name,
                atom.residue_name,
                atom.chain_id,
                atom.residue_number,
                atom.position.x,
                atom.position.y,
                atom.position.z,
                1.0,
                0.0,
                atom.element.symbol().to_ascii_uppercase()
            )?;
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

fn parse_atom(line: &str, line_num: usize) -> Result<ReceptorAtom, PdbError> {
    let raw_name = line.get(12..16).unwrap_or("");
    let atom_name = raw_name.trim();
    let residue_name = slice_and_trim(line, 17, 20);
    let chain_id = line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' ');
    let residue_number: isize = slice_and_trim(line, 22, 26).parse().unwrap_or(0);
    let x = parse_float(line, 30, 38, line_num)?;
    let y = parse_float(line, 38, 46, line_num)?;
    let z = parse_float(line, 46, 54, line_num)?;

    let element_field = slice_and_trim(line, 76, 78);
    let element = element_field
        .parse::<Element>()
        .ok()
        .filter(|e| !e.is_placeholder())
        .or_else(|| element_from_atom_name(raw_name))
        .ok_or_else(|| PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::UnknownElement {
                element: element_field.to_string(),
                name: atom_name.to_string(),
            },
        })?;

    let mut atom = ReceptorAtom::new(element, atom_name, residue_name, Point3::new(x, y, z));
    atom.chain_id = chain_id;
    atom.residue_number = residue_number;
    if let Some(charge) = parse_formal_charge(slice_and_trim(line, 78, 80)) {
        atom.partial_charge = charge as f64;
    }
    Ok(atom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    const POCKET: &str = "\
HEADER    HYDROLASE                               01-JAN-00   1ABC
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071  -5.147  1.00  0.00           C
ATOM      3  OD1 ASP A   2       9.000   5.000  -4.000  1.00  0.00           O
ATOM      4  OD2AASP A   2       9.100   5.100  -4.100  0.50  0.00           O
ATOM      5  OD2BASP A   2       9.200   5.200  -4.200  0.50  0.00           O
HETATM    6 ZN    ZN A 301       1.000   2.000   3.000  1.00  0.00          ZN2+
HETATM    7  O   HOH A 401       0.000   0.000   0.000  1.00  0.00
END
";

    fn read(text: &str) -> Result<Receptor, PdbError> {
        PdbFile::read_from(&mut BufReader::new(Cursor::new(text)))
    }

    #[test]
    fn reads_atoms_with_residue_context() {
        let receptor = read(POCKET).unwrap();
        assert_eq!(receptor.name, "1ABC");
        assert_eq!(receptor.len(), 6);
        let ca = &receptor.atoms()[1];
        assert_eq!(ca.element, Element::C);
        assert_eq!(ca.name, "CA");
        assert_eq!(ca.residue_name, "ALA");
        assert_eq!(ca.residue_number, 1);
        assert_eq!(ca.chain_id, 'A');
        assert_eq!(ca.position, Point3::new(11.639, 6.071, -5.147));
    }

    #[test]
    fn keeps_only_primary_alternate_location() {
        let receptor = read(POCKET).unwrap();
        let od2: Vec<_> = receptor.atoms().iter().filter(|a| a.name == "OD2").collect();
        assert_eq!(od2.len(), 1);
        assert_eq!(od2[0].position.x, 9.1);
    }

    #[test]
    fn charges_come_from_charge_columns_or_residue_table() {
        let receptor = read(POCKET).unwrap();
        assert_eq!(receptor.atoms()[2].partial_charge, -0.5);
        let zinc = receptor.atoms().iter().find(|a| a.element == Element::Zn).unwrap();
        assert_eq!(zinc.partial_charge, 2.0);
    }

    #[test]
    fn element_falls_back_to_atom_name_and_water_is_flagged() {
        let receptor = read(POCKET).unwrap();
        let water = receptor.atoms().last().unwrap();
        assert_eq!(water.element, Element::O);
        assert!(water.is_water);
        assert_eq!(receptor.water_count(), 1);
    }

    #[test]
    fn atom_name_inference_handles_two_letter_symbols() {
        assert_eq!(element_from_atom_name("CL1 "), Some(Element::Cl));
        assert_eq!(element_from_atom_name(" CA "), Some(Element::C));
        assert_eq!(element_from_atom_name("1HB "), Some(Element::H));
        assert_eq!(element_from_atom_name("    "), None);
    }

    #[test]
    fn stops_after_first_model() {
        let text = "\
MODEL        1
ATOM      1  CA  GLY A   1       0.000   0.000   0.000  1.00  0.00           C
ENDMDL
MODEL        2
ATOM      1  CA  GLY A   1       5.000   0.000   0.000  1.00  0.00           C
ENDMDL
";
        assert_eq!(read(text).unwrap().len(), 1);
    }

    #[test]
    fn rejects_bad_coordinates_and_empty_files() {
        let bad = "ATOM      1  CA  GLY A   1       x.000   0.000   0.000  1.00  0.00           C\n";
        assert!(matches!(
            read(bad),
            Err(PdbError::Parse {
                line: 1,
                kind: PdbParseErrorKind::InvalidFloat { .. }
            })
        ));
        assert!(matches!(read("REMARK nothing\n"), Err(PdbError::Empty)));
    }

    #[test]
    fn written_receptor_reads_back() {
        let receptor = read(POCKET).unwrap();
        let mut buffer = Vec::new();
        PdbFile::write_to(&receptor, &mut buffer).unwrap();
        let reread = read(&String::from_utf8(buffer).unwrap()).unwrap();
        assert_eq!(reread.len(), receptor.len());
        for (a, b) in receptor.atoms().iter().zip(reread.atoms()) {
            assert_eq!(a.element, b.element);
            assert_eq!(a.residue_name, b.residue_name);
            assert!((a.position - b.position).norm() < 1e-3);
        }
    }
}
