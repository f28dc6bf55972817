//! # Workflows Module
//!
//! End-to-end pipelines built from the engine tasks.
//!
//! ## Overview
//!
//! [`grow`] takes a template with coordinates, the hydrogens to replace, a
//! fragment selection, and optionally a receptor. It attaches every fragment
//! at every attachment point, embeds conformer ensembles, drops poses that
//! clash with the receptor, minimizes the rest under the hybrid energy,
//! keeps an energy window per congener, and optionally asks an external
//! engine for binding affinities. The [`grow::GrowResult`] writes the
//! ranked poses and a CSV summary.

pub mod grow;
