//! # Sprout Core Library
//!
//! Grows congeneric ligand series from a template molecule inside a rigid
//! receptor binding site: R-group attachment, conformer generation, clash
//! filtering, hybrid-energy refinement, ranking, and external scoring.
//!
//! ## Architectural Philosophy
//!
//! The library keeps a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Molecule`,
//!   `Congener`, `Receptor`), file formats, energy models, fragment
//!   libraries, and distance-geometry embedding.
//!
//! - **[`engine`]: The Logic Core.** Configuration, error taxonomy, progress
//!   reporting, cancellation, and the per-stage tasks that transform a batch
//!   of congeners. The external scorer adapter lives here too.
//!
//! - **[`workflows`]: The Public API.** The end-to-end `grow` pipeline that
//!   ties the stages together and writes the results.

pub mod core;
pub mod engine;
pub mod workflows;
