//! ANI-style learned intramolecular potential.
//!
//! Each atom is described by a radial atomic environment vector (AEV): for
//! every neighbour species and radial shift `Rs`, the sum of
//! `0.25 exp(-eta (r - Rs)^2) fc(r)` over neighbours of that species within
//! the cutoff. A per-element feed-forward network maps the AEV to an atomic
//! energy; the molecular energy is the sum. Gradients are obtained by
//! backpropagating through the networks and the AEV.

use super::model::{EnergyError, EnergyModel, Evaluation, check_len};
use super::potentials::cosine_cutoff;
use super::term::EnergyTerm;
use crate::core::models::element::Element;
use crate::core::models::molecule::Molecule;
use nalgebra::{DMatrix, DVector, Point3, Vector3};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub const HARTREE_TO_KCAL: f64 = 627.5094740631;

/// Elements an atomistic network may be trained for.
pub const SUPPORTED_ELEMENTS: [Element; 7] = [
    Element::H,
    Element::C,
    Element::N,
    Element::O,
    Element::F,
    Element::S,
    Element::Cl,
];

#[derive(Debug, Error)]
pub enum ModelLoadError {
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
    #[error("Unknown element symbol '{0}' in model file")]
    UnknownElement(String),
    #[error("Element {0} is outside the supported set (H, C, N, O, F, S, Cl)")]
    UnsupportedSpecies(Element),
    #[error("No network defined for species {0}")]
    MissingNetwork(Element),
    #[error("Network for {element}: layer {layer} expects {expected} inputs, found {found}")]
    Shape {
        element: Element,
        layer: usize,
        expected: usize,
        found: usize,
    },
    #[error("Network for {0} must end in a single output")]
    OutputWidth(Element),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyUnits {
    #[default]
    Hartree,
    Kcal,
}

impl EnergyUnits {
    fn to_kcal(self) -> f64 {
        match self {
            EnergyUnits::Hartree => HARTREE_TO_KCAL,
            EnergyUnits::Kcal => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationKind {
    Celu,
    Gelu,
    Tanh,
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Celu { alpha: f64 },
    Gelu,
    Tanh,
    Identity,
}

const GELU_COEFF: f64 = 0.044715;
const SQRT_2_OVER_PI: f64 = 0.797_884_560_802_865_4;

impl Activation {
    /// Value and derivative at `x`.
    fn apply(self, x: f64) -> (f64, f64) {
        match self {
            Activation::Celu { alpha } => {
                if x > 0.0 {
                    (x, 1.0)
                } else {
                    let e = (x / alpha).exp();
                    (alpha * (e - 1.0), e)
                }
            }
            Activation::Gelu => {
                let inner = SQRT_2_OVER_PI * (x + GELU_COEFF * x.powi(3));
                let t = inner.tanh();
                let d_inner = SQRT_2_OVER_PI * (1.0 + 3.0 * GELU_COEFF * x * x);
                (
                    0.5 * x * (1.0 + t),
                    0.5 * (1.0 + t) + 0.5 * x * (1.0 - t * t) * d_inner,
                )
            }
            Activation::Tanh => {
                let t = x.tanh();
                (t, 1.0 - t * t)
            }
            Activation::Identity => (x, 1.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLayer {
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
    activation: ActivationKind,
    #[serde(default = "default_alpha")]
    alpha: f64,
}

fn default_alpha() -> f64 {
    0.1
}

#[derive(Debug, Deserialize)]
struct RawNetwork {
    #[serde(default)]
    self_energy: f64,
    layers: Vec<RawLayer>,
}

#[derive(Debug, Deserialize)]
struct RawAev {
    radial_cutoff: f64,
    eta: f64,
    shifts: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    units: EnergyUnits,
    species: Vec<String>,
    aev: RawAev,
    networks: HashMap<String, RawNetwork>,
}

#[derive(Debug, Clone)]
struct Layer {
    weights: DMatrix<f64>,
    biases: DVector<f64>,
    activation: Activation,
}

#[derive(Debug, Clone)]
struct AtomicNetwork {
    self_energy: f64,
    layers: Vec<Layer>,
}

impl AtomicNetwork {
    /// Atomic energy (model units) and its gradient with respect to the input.
    fn forward_backward(&self, input: &DVector<f64>) -> (f64, DVector<f64>) {
        let mut derivatives = Vec::with_capacity(self.layers.len());
        let mut x = input.clone();
        for layer in &self.layers {
            let z = &layer.weights * &x + &layer.biases;
            let mut out = DVector::zeros(z.len());
            let mut deriv = DVector::zeros(z.len());
            for (k, &zk) in z.iter().enumerate() {
                let (value, slope) = layer.activation.apply(zk);
                out[k] = value;
                deriv[k] = slope;
            }
            derivatives.push(deriv);
            x = out;
        }
        let energy = x[0] + self.self_energy;

        let mut upstream = DVector::from_element(1, 1.0);
        for (layer, deriv) in self.layers.iter().zip(&derivatives).rev() {
            let local = upstream.component_mul(deriv);
            upstream = layer.weights.transpose() * local;
        }
        (energy, upstream)
    }
}

#[derive(Debug, Clone)]
pub struct AevParams {
    pub radial_cutoff: f64,
    pub eta: f64,
    pub shifts: Vec<f64>,
}

/// A loaded ANI-style model: AEV parameters plus one network per species.
#[derive(Debug, Clone)]
pub struct AniModel {
    pub name: String,
    pub units: EnergyUnits,
    pub aev: AevParams,
    species: Vec<Element>,
    networks: HashMap<Element, AtomicNetwork>,
}

impl AniModel {
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let raw: RawModel = toml::from_str(&content).map_err(|e| ModelLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let mut model = Self::from_raw(raw)?;
        if model.name.is_empty() {
            model.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
        }
        Ok(model)
    }

    fn from_raw(raw: RawModel) -> Result<Self, ModelLoadError> {
        let species = raw
            .species
            .iter()
            .map(|s| parse_species(s))
            .collect::<Result<Vec<_>, _>>()?;
        let input_width = species.len() * raw.aev.shifts.len();

        let mut networks = HashMap::new();
        for (symbol, raw_net) in raw.networks {
            let element = parse_species(&symbol)?;
            let mut expected = input_width;
            let mut layers = Vec::with_capacity(raw_net.layers.len());
            for (index, raw_layer) in raw_net.layers.into_iter().enumerate() {
                let rows = raw_layer.weights.len();
                for row in &raw_layer.weights {
                    if row.len() != expected {
                        return Err(ModelLoadError::Shape {
                            element,
                            layer: index,
                            expected,
                            found: row.len(),
                        });
                    }
                }
                if raw_layer.biases.len() != rows {
                    return Err(ModelLoadError::Shape {
                        element,
                        layer: index,
                        expected: rows,
                        found: raw_layer.biases.len(),
                    });
                }
                let flat: Vec<f64> = raw_layer.weights.into_iter().flatten().collect();
                layers.push(Layer {
                    weights: DMatrix::from_row_slice(rows, expected, &flat),
                    biases: DVector::from_vec(raw_layer.biases),
                    activation: match raw_layer.activation {
                        ActivationKind::Celu => Activation::Celu {
                            alpha: raw_layer.alpha,
                        },
                        ActivationKind::Gelu => Activation::Gelu,
                        ActivationKind::Tanh => Activation::Tanh,
                        ActivationKind::Identity => Activation::Identity,
                    },
                });
                expected = rows;
            }
            if layers.is_empty() || expected != 1 {
                return Err(ModelLoadError::OutputWidth(element));
            }
            networks.insert(
                element,
                AtomicNetwork {
                    self_energy: raw_net.self_energy,
                    layers,
                },
            );
        }

        if let Some(&missing) = species.iter().find(|e| !networks.contains_key(e)) {
            return Err(ModelLoadError::MissingNetwork(missing));
        }

        Ok(Self {
            name: raw.name,
            units: raw.units,
            aev: AevParams {
                radial_cutoff: raw.aev.radial_cutoff,
                eta: raw.aev.eta,
                shifts: raw.aev.shifts,
            },
            species,
            networks,
        })
    }

    pub fn species(&self) -> &[Element] {
        &self.species
    }

    pub fn supports(&self, element: Element) -> bool {
        self.networks.contains_key(&element)
    }

    fn aev_width(&self) -> usize {
        self.species.len() * self.aev.shifts.len()
    }
}

fn parse_species(symbol: &str) -> Result<Element, ModelLoadError> {
    let element: Element = symbol
        .parse()
        .map_err(|_| ModelLoadError::UnknownElement(symbol.to_string()))?;
    if !SUPPORTED_ELEMENTS.contains(&element) {
        return Err(ModelLoadError::UnsupportedSpecies(element));
    }
    Ok(element)
}

/// An [`AniModel`] bound to the atoms of one molecule.
#[derive(Debug, Clone)]
pub struct LearnedPotential {
    model: Arc<AniModel>,
    elements: Vec<Element>,
    species_index: Vec<usize>,
}

impl LearnedPotential {
    /// Fails with `UnsupportedElement` for the first atom the model has no
    /// network for.
    pub fn new(model: Arc<AniModel>, molecule: &Molecule) -> Result<Self, EnergyError> {
        let mut elements = Vec::with_capacity(molecule.atom_count());
        let mut species_index = Vec::with_capacity(molecule.atom_count());
        for (atom, a) in molecule.atoms().iter().enumerate() {
            let index = model
                .species
                .iter()
                .position(|&s| s == a.element)
                .filter(|_| model.supports(a.element))
                .ok_or(EnergyError::UnsupportedElement {
                    element: a.element,
                    atom,
                    model: "learned",
                })?;
            elements.push(a.element);
            species_index.push(index);
        }
        Ok(Self {
            model,
            elements,
            species_index,
        })
    }
}

impl EnergyModel for LearnedPotential {
    fn name(&self) -> &'static str {
        "learned"
    }

    fn evaluate(&self, coordinates: &[Point3<f64>]) -> Result<Evaluation, EnergyError> {
        let n = self.elements.len();
        check_len(coordinates, n)?;
        let aev = &self.model.aev;
        let shifts = aev.shifts.len();
        let width = self.model.aev_width();

        let mut neighbors: Vec<Vec<(usize, f64, Vector3<f64>)>> = vec![Vec::new(); n];
        let mut descriptors = vec![DVector::<f64>::zeros(width); n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = coordinates[j] - coordinates[i];
                let r = d.norm();
                if r >= aev.radial_cutoff || r < 1e-12 {
                    continue;
                }
                neighbors[i].push((j, r, d));
                neighbors[j].push((i, r, -d));
                let (fc, _) = cosine_cutoff(r, aev.radial_cutoff);
                for (k, &shift) in aev.shifts.iter().enumerate() {
                    let g = 0.25 * (-aev.eta * (r - shift).powi(2)).exp() * fc;
                    descriptors[i][self.species_index[j] * shifts + k] += g;
                    descriptors[j][self.species_index[i] * shifts + k] += g;
                }
            }
        }

        let scale = self.model.units.to_kcal();
        let mut energy = 0.0;
        let mut gradient = vec![Vector3::zeros(); n];
        for i in 0..n {
            let network = &self.model.networks[&self.elements[i]];
            let (atomic, d_aev) = network.forward_backward(&descriptors[i]);
            energy += atomic;
            for &(j, r, d) in &neighbors[i] {
                let (fc, dfc) = cosine_cutoff(r, aev.radial_cutoff);
                let base = self.species_index[j] * shifts;
                let mut de_dr = 0.0;
                for (k, &shift) in aev.shifts.iter().enumerate() {
                    let gauss = 0.25 * (-aev.eta * (r - shift).powi(2)).exp();
                    let dg = gauss * (dfc - 2.0 * aev.eta * (r - shift) * fc);
                    de_dr += d_aev[base + k] * dg;
                }
                // d points from i to j
                let g = d * (scale * de_dr / r);
                gradient[j] += g;
                gradient[i] -= g;
            }
        }

        Ok(Evaluation {
            terms: EnergyTerm::network_only(energy * scale),
            gradient: Some(gradient),
        })
    }
}
