//! # Engine Module
//!
//! The per-stage algorithms of the growing pipeline and the machinery that
//! drives them.
//!
//! ## Overview
//!
//! Tasks in [`tasks`] each implement one pipeline stage over a batch of
//! congeners: attachment, conformer generation, clash filtering, energy
//! minimization, and ranking. The external affinity scorer in [`scoring`]
//! runs after them on the surviving poses.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Stage settings and the [`config::GrowConfigBuilder`]
//! - **Progress Monitoring** ([`progress`]) - Phase and task events for front ends
//! - **Cancellation** ([`cancel`]) - Cooperative stop flag with optional deadline
//! - **Error Handling** ([`error`]) - [`error::EngineError`] and conversions from lower layers
//! - **External Scoring** ([`scoring`]) - The [`scoring::AffinityScorer`] seam and gnina adapter
//!
//! With the `parallel` feature, per-congener work runs on the rayon pool.

pub mod cancel;
pub mod config;
pub mod error;
pub mod progress;
pub mod scoring;
pub mod tasks;
