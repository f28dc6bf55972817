use super::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::element::Element;
use crate::core::models::molecule::{Molecule, MoleculeError};
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("V3000 molfiles are not supported (line {line})")]
    UnsupportedVersion { line: usize },
    #[error("Invalid connectivity on line {line}: {source}")]
    Topology {
        line: usize,
        #[source]
        source: MoleculeError,
    },
    #[error("Coordinate count {given} does not match atom count {expected} for '{name}'")]
    CoordinateMismatch {
        name: String,
        given: usize,
        expected: usize,
    },
    #[error("Atom {atom} of '{name}' has no coordinates")]
    MissingCoordinates { name: String, atom: usize },
}

fn parse_error(line: usize, message: impl Into<String>) -> SdfError {
    SdfError::Parse {
        line,
        message: message.into(),
    }
}

/// MDL SD files (V2000 connection tables), possibly holding many records.
pub struct SdfFile;

impl MolecularFile for SdfFile {
    type Structure = Vec<Molecule>;
    type Error = SdfError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Molecule>, SdfError> {
        let mut molecules = Vec::new();
        let mut block: Vec<(usize, String)> = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim_end() == "$$$$" {
                if !block.is_empty() {
                    molecules.push(parse_record(&block)?);
                }
                block.clear();
            } else {
                block.push((i + 1, line));
            }
        }
        if block.iter().any(|(_, l)| !l.trim().is_empty()) {
            molecules.push(parse_record(&block)?);
        }
        Ok(molecules)
    }

    fn write_to(molecules: &Vec<Molecule>, writer: &mut impl Write) -> Result<(), SdfError> {
        for molecule in molecules {
            let coordinates = molecule.positions().ok_or_else(|| {
                let atom = molecule
                    .atoms()
                    .iter()
                    .position(|a| a.position.is_none())
                    .unwrap_or(0);
                SdfError::MissingCoordinates {
                    name: molecule.name.clone(),
                    atom,
                }
            })?;
            write_record(molecule, &coordinates, &molecule.properties, writer)?;
        }
        Ok(())
    }
}

impl SdfFile {
    /// Writes one record using `coordinates` instead of the atoms' own
    /// positions, with `properties` as data fields.
    pub fn write_pose(
        molecule: &Molecule,
        coordinates: &[Point3<f64>],
        properties: &BTreeMap<String, String>,
        writer: &mut impl Write,
    ) -> Result<(), SdfError> {
        if coordinates.len() != molecule.atom_count() {
            return Err(SdfError::CoordinateMismatch {
                name: molecule.name.clone(),
                given: coordinates.len(),
                expected: molecule.atom_count(),
            });
        }
        write_record(molecule, coordinates, properties, writer)
    }
}

fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line.get(start..end).unwrap_or("").trim()
}

fn charge_from_code(code: i32) -> i8 {
    match code {
        1 => 3,
        2 => 2,
        3 => 1,
        5 => -1,
        6 => -2,
        7 => -3,
        _ => 0,
    }
}

fn code_from_charge(charge: i8) -> i32 {
    match charge {
        3 => 1,
        2 => 2,
        1 => 3,
        -1 => 5,
        -2 => 6,
        -3 => 7,
        _ => 0,
    }
}

fn parse_record(block: &[(usize, String)]) -> Result<Molecule, SdfError> {
    // Leading blank lines between records are tolerated.
    let start = block
        .iter()
        .position(|(_, l)| !l.trim().is_empty())
        .unwrap_or(0)
        .min(block.len());
    let start = if start > 0 && start + 3 < block.len() && block[start + 3].1.contains("V2000") {
        start
    } else {
        0
    };
    let block = &block[start..];
    if block.len() < 4 {
        let line = block.last().map_or(0, |(ln, _)| *ln);
        return Err(parse_error(line, "record must contain a header and a counts line"));
    }

    let (counts_no, counts) = (&block[3].0, block[3].1.as_str());
    if counts.contains("V3000") {
        return Err(SdfError::UnsupportedVersion { line: *counts_no });
    }
    let atom_count = parse_count(counts, 0, 0, *counts_no)?;
    let bond_count = parse_count(counts, 3, 1, *counts_no)?;

    let atom_start = 4;
    let bond_start = atom_start + atom_count;
    if block.len() < bond_start + bond_count {
        let line = block.last().map_or(*counts_no, |(ln, _)| *ln);
        return Err(parse_error(line, "record ended before atoms and bonds were complete"));
    }

    let mut molecule = Molecule::new(block[0].1.trim());
    for (ln, raw) in &block[atom_start..bond_start] {
        molecule.add_atom(parse_atom(raw, *ln)?);
    }
    for (ln, raw) in &block[bond_start..bond_start + bond_count] {
        let (a1, a2, order) = parse_bond(raw, *ln, atom_count)?;
        molecule
            .add_bond(a1, a2, order)
            .map_err(|source| SdfError::Topology { line: *ln, source })?;
    }

    let mut cursor = bond_start + bond_count;
    let mut charges_reset = false;
    while cursor < block.len() {
        let (ln, raw) = (&block[cursor].0, block[cursor].1.as_str());
        cursor += 1;
        if raw.starts_with("M  END") {
            break;
        }
        if raw.starts_with("M  CHG") {
            if !charges_reset {
                molecule.atoms_mut().for_each(|a| a.formal_charge = 0);
                charges_reset = true;
            }
            apply_charge_line(&mut molecule, raw, *ln)?;
        }
    }

    molecule.properties = parse_data_items(&block[cursor.min(block.len())..]);
    Ok(molecule)
}

fn parse_count(line: &str, start: usize, token: usize, line_no: usize) -> Result<usize, SdfError> {
    let fixed = column(line, start, start + 3);
    fixed
        .parse::<usize>()
        .ok()
        .or_else(|| line.split_whitespace().nth(token)?.parse().ok())
        .ok_or_else(|| parse_error(line_no, "invalid atom or bond count"))
}

fn parse_atom(raw: &str, line_no: usize) -> Result<Atom, SdfError> {
    let fixed = (|| {
        let x = column(raw, 0, 10).parse::<f64>().ok()?;
        let y = column(raw, 10, 20).parse::<f64>().ok()?;
        let z = column(raw, 20, 30).parse::<f64>().ok()?;
        let symbol = column(raw, 31, 34);
        (!symbol.is_empty()).then(|| (x, y, z, symbol.to_string(), column(raw, 36, 39).to_string()))
    })();
    let (x, y, z, symbol, charge_field) = match fixed {
        Some(parsed) => parsed,
        None => {
            let tokens: Vec<&str> = raw.split_whitespace().collect();
            if tokens.len() < 4 {
                return Err(parse_error(line_no, "invalid atom line"));
            }
            let coord = |t: &str| {
                t.parse::<f64>()
                    .map_err(|_| parse_error(line_no, "invalid coordinate in atom line"))
            };
            (
                coord(tokens[0])?,
                coord(tokens[1])?,
                coord(tokens[2])?,
                tokens[3].to_string(),
                tokens.get(5).map(|s| s.to_string()).unwrap_or_default(),
            )
        }
    };
    let element: Element = symbol
        .parse()
        .map_err(|e: crate::core::models::element::ParseElementError| parse_error(line_no, e.to_string()))?;
    let charge = charge_field.trim().parse::<i32>().map(charge_from_code).unwrap_or(0);
    Ok(Atom::new(element, Some(Point3::new(x, y, z)))
        .with_name(&symbol)
        .with_charge(charge))
}

fn parse_bond(raw: &str, line_no: usize, atom_count: usize) -> Result<(usize, usize, BondOrder), SdfError> {
    let fixed = || -> Option<(usize, usize, String)> {
        Some((
            column(raw, 0, 3).parse().ok()?,
            column(raw, 3, 6).parse().ok()?,
            column(raw, 6, 9).to_string(),
        ))
    };
    let (a1, a2, order_field) = match fixed() {
        Some(parsed) => parsed,
        None => {
            let tokens: Vec<&str> = raw.split_whitespace().collect();
            let index = |i: usize| -> Result<usize, SdfError> {
                tokens
                    .get(i)
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| parse_error(line_no, "invalid bond line"))
            };
            (index(0)?, index(1)?, tokens.get(2).copied().unwrap_or("").to_string())
        }
    };
    if a1 == 0 || a2 == 0 || a1 > atom_count || a2 > atom_count {
        return Err(parse_error(line_no, "bond references atom outside declared range"));
    }
    let order: BondOrder = order_field
        .parse()
        .map_err(|_| parse_error(line_no, format!("unsupported bond type '{order_field}'")))?;
    Ok((a1 - 1, a2 - 1, order))
}

fn apply_charge_line(molecule: &mut Molecule, raw: &str, line_no: usize) -> Result<(), SdfError> {
    let tokens: Vec<&str> = raw.split_whitespace().skip(2).collect();
    let declared: usize = tokens
        .first()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| parse_error(line_no, "invalid M  CHG entry count"))?;
    let pairs = &tokens[1..];
    if pairs.len() < declared * 2 {
        return Err(parse_error(line_no, "M  CHG line is truncated"));
    }
    for pair in pairs.chunks(2).take(declared) {
        let atom: usize = pair[0]
            .parse()
            .map_err(|_| parse_error(line_no, "invalid atom index in M  CHG"))?;
        let charge: i8 = pair[1]
            .parse()
            .map_err(|_| parse_error(line_no, "invalid charge in M  CHG"))?;
        let target = atom
            .checked_sub(1)
            .and_then(|i| molecule.atom_mut(i))
            .ok_or_else(|| parse_error(line_no, "M  CHG references atom outside range"))?;
        target.formal_charge = charge;
    }
    Ok(())
}

fn parse_data_items(lines: &[(usize, String)]) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut current: Option<(String, Vec<String>)> = None;
    for (_, raw) in lines {
        if raw.starts_with('>') {
            if let Some((key, values)) = current.take() {
                properties.insert(key, values.join("\n"));
            }
            let key = raw
                .find('<')
                .and_then(|open| raw[open + 1..].find('>').map(|close| &raw[open + 1..open + 1 + close]))
                .unwrap_or("")
                .to_string();
            current = Some((key, Vec::new()));
        } else if raw.trim().is_empty() {
            if let Some((key, values)) = current.take() {
                properties.insert(key, values.join("\n"));
            }
        } else if let Some((_, values)) = current.as_mut() {
            values.push(raw.trim_end().to_string());
        }
    }
    if let Some((key, values)) = current {
        properties.insert(key, values.join("\n"));
    }
    properties.retain(|k, _| !k.is_empty());
    properties
}

fn write_record(
    molecule: &Molecule,
    coordinates: &[Point3<f64>],
    properties: &BTreeMap<String, String>,
    writer: &mut impl Write,
) -> Result<(), SdfError> {
    writeln!(writer, "{}", molecule.name)?;
    writeln!(writer, "  sprout          3D")?;
    writeln!(writer)?;
    writeln!(
        writer,
        "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
        molecule.atom_count(),
        molecule.bond_count()
    )?;
    for (atom, pos) in molecule.atoms().iter().zip(coordinates) {
        let symbol = if atom.element.is_placeholder() {
            "R#"
        } else {
            atom.element.symbol()
        };
        writeln!(
            writer,
            "{:>10.4}{:>10.4}{:>10.4} {:<3} 0{:>3}  0  0  0  0  0  0  0  0  0  0",
            pos.x,
            pos.y,
            pos.z,
            symbol,
            code_from_charge(atom.formal_charge)
        )?;
    }
    for bond in molecule.bonds() {
        writeln!(
            writer,
            "{:>3}{:>3}{:>3}  0  0  0  0",
            bond.atom1 + 1,
            bond.atom2 + 1,
            bond.order.mdl_code()
        )?;
    }
    let charged: Vec<(usize, i8)> = molecule
        .atoms()
        .iter()
        .enumerate()
        .filter(|(_, a)| a.formal_charge != 0)
        .map(|(i, a)| (i + 1, a.formal_charge))
        .collect();
    for chunk in charged.chunks(8) {
        write!(writer, "M  CHG{:>3}", chunk.len())?;
        for (idx, charge) in chunk {
            write!(writer, " {:>3} {:>3}", idx, charge)?;
        }
        writeln!(writer)?;
    }
    writeln!(writer, "M  END")?;
    for (key, value) in properties {
        writeln!(writer, ">  <{}>", key)?;
        writeln!(writer, "{}", value)?;
        writeln!(writer)?;
    }
    writeln!(writer, "$$$$")?;
    Ok(())
}
