//! # Force Field Module
//!
//! Energy models used to refine grown ligands inside a rigid receptor.
//!
//! ## Overview
//!
//! Every model implements [`model::EnergyModel`]: ligand coordinates in,
//! energy in kcal/mol and (usually analytic) gradient out. The optimizer
//! combines one intramolecular model with the ligand-receptor interaction
//! through [`hybrid::HybridEnergy`].
//!
//! - **Classical intramolecular** energy with harmonic bonds and angles,
//!   Lennard-Jones, and bond-increment Coulomb terms
//! - **Learned intramolecular** energy from ANI-style atomistic networks
//! - **Ligand-receptor** Lennard-Jones and screened Coulomb with explicit
//!   water models, both shifted to zero at the cutoff
//!
//! ## Key Components
//!
//! - [`params`] - Built-in and file-based classical parameter sets, water models
//! - [`parameterization`] - Per-atom VDW parameters and partial charges
//! - [`classical`] - [`classical::ClassicalLigandModel`]
//! - [`learned`] - [`learned::AniModel`] and [`learned::LearnedPotential`]
//! - [`intermolecular`] - [`intermolecular::LigandReceptorModel`]
//! - [`term`] - Energy breakdown by contribution

pub mod classical;
pub mod hybrid;
pub mod intermolecular;
pub mod learned;
pub mod model;
pub mod parameterization;
pub mod params;
pub(crate) mod potentials;
pub mod term;
