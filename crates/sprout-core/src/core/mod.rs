//! # Core Module
//!
//! Stateless building blocks of the ligand-growing pipeline.
//!
//! ## Overview
//!
//! Nothing in this layer knows about pipeline stages, configuration, or
//! progress reporting. It holds the data models, the file formats they are
//! read from and written to, the energy models, and the numerical routines
//! that the [`crate::engine`] tasks compose.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Molecules, congeners, conformers, and the receptor
//! - **File I/O** ([`io`]) - SDF/MOL, PDB, and the CSV run summary
//! - **Energy Models** ([`forcefield`]) - Classical, learned, and ligand-receptor potentials
//! - **Fragments** ([`fragments`]) - R-group libraries and selection
//! - **Embedding** ([`embedding`]) - Distance-geometry conformer embedding
//! - **Numerics** ([`utils`]) - Superposition, RMSD, and L-BFGS minimization

pub mod embedding;
pub mod forcefield;
pub mod fragments;
pub mod io;
pub mod models;
pub mod utils;
