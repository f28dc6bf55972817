//! Distance-geometry embedding of grown molecules.
//!
//! [`bounds::DistanceBounds`] turns connectivity (and optionally a rigid
//! template) into interatomic distance limits; [`embed::Embedder`] samples
//! coordinates from them one attempt at a time.

pub mod bounds;
pub mod embed;
