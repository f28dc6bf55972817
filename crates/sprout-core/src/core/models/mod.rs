//! # Core Models Module
//!
//! Data structures for the molecules handled by the growing pipeline.
//!
//! ## Key Components
//!
//! - [`element`] - Chemical elements with radii, electronegativities, and valence rules
//! - [`atom`] - Atoms of small molecules, with optional coordinates and provenance
//! - [`topology`] - Bonds and bond orders
//! - [`molecule`] - Index-addressed molecular graphs
//! - [`conformer`] - 3D poses with energy, clash, rank, and score state
//! - [`congener`] - Grown molecules that own a conformer ensemble
//! - [`receptor`] - The rigid binding-site structure with a spatial index
//! - [`ids`] - Arena keys for conformers

pub mod atom;
pub mod congener;
pub mod conformer;
pub mod element;
pub mod ids;
pub mod molecule;
pub mod receptor;
pub mod topology;
