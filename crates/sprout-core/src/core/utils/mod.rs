//! Numerical helpers shared by the embedding and optimization code.
//!
//! - [`geometry`] - Superposition (Kabsch), RMSD, and distance utilities
//! - [`minimize`] - L-BFGS minimization with a backtracking line search

pub mod geometry;
pub mod minimize;
