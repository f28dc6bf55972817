//! Provides input/output functionality for molecular file formats.
//!
//! Ligands and fragments are exchanged as MDL SD files, receptors as PDB
//! files, and run results as a CSV summary. Structure formats share the
//! [`traits::MolecularFile`] interface.

pub mod pdb;
pub mod report;
pub mod sdf;
pub mod traits;
