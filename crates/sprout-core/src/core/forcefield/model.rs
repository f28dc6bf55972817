use super::term::EnergyTerm;
use crate::core::models::element::Element;
use crate::core::utils::minimize::numerical_gradient;
use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnergyError {
    #[error("Element {element} (atom {atom}) is not supported by the {model} model")]
    UnsupportedElement {
        element: Element,
        atom: usize,
        model: &'static str,
    },
    #[error("Expected {expected} coordinates, got {given}")]
    CoordinateMismatch { expected: usize, given: usize },
}

/// Energy (kcal/mol) of one set of ligand coordinates, and optionally its
/// gradient with respect to those coordinates (kcal/mol/Å).
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub terms: EnergyTerm,
    pub gradient: Option<Vec<Vector3<f64>>>,
}

impl Evaluation {
    #[inline]
    pub fn energy(&self) -> f64 {
        self.terms.total()
    }
}

/// A potential over ligand coordinates. The receptor, if any, is part of
/// the model and never moves.
pub trait EnergyModel: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, coordinates: &[Point3<f64>]) -> Result<Evaluation, EnergyError>;

    /// Evaluates and fills in the gradient with central finite differences
    /// for models that do not provide an analytic one.
    fn evaluate_with_gradient(&self, coordinates: &[Point3<f64>]) -> Result<Evaluation, EnergyError> {
        let mut evaluation = self.evaluate(coordinates)?;
        if evaluation.gradient.is_none() {
            let gradient = numerical_gradient(&flatten(coordinates), 1e-5, |x| {
                self.evaluate(&unflatten(x)).map(|e| e.energy())
            })?;
            evaluation.gradient = Some(unflatten_vectors(&gradient));
        }
        Ok(evaluation)
    }

    fn energy_and_gradient(&self, coordinates: &[Point3<f64>]) -> Result<(f64, Vec<Vector3<f64>>), EnergyError> {
        let evaluation = self.evaluate_with_gradient(coordinates)?;
        let energy = evaluation.energy();
        Ok((energy, evaluation.gradient.unwrap_or_default()))
    }
}

pub fn flatten(coordinates: &[Point3<f64>]) -> Vec<f64> {
    coordinates.iter().flat_map(|p| [p.x, p.y, p.z]).collect()
}

pub fn unflatten(values: &[f64]) -> Vec<Point3<f64>> {
    values
        .chunks_exact(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect()
}

pub fn unflatten_vectors(values: &[f64]) -> Vec<Vector3<f64>> {
    values
        .chunks_exact(3)
        .map(|c| Vector3::new(c[0], c[1], c[2]))
        .collect()
}

pub(crate) fn check_len(coordinates: &[Point3<f64>], expected: usize) -> Result<(), EnergyError> {
    if coordinates.len() != expected {
        return Err(EnergyError::CoordinateMismatch {
            expected,
            given: coordinates.len(),
        });
    }
    Ok(())
}
