//! R-group fragments and the libraries they are loaded into.
//!
//! - [`fragment`] - A single fragment with its attachment atom
//! - [`library`] - Immutable, name-sorted fragment registries
//! - [`selection`] - Choosing which fragments to grow

pub mod fragment;
pub mod library;
pub mod selection;
