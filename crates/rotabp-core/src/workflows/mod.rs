//! # Workflows Module
//!
//! High-level entry points that tie the collaborators, the factor graph and the solver
//! together.
//!
//! - **Rotamer Side Chains** ([`sidechain`]) - Rebuilds, solves and differentiates the
//!   rotamer factor graph once per evaluation of an outer optimizer.

pub mod sidechain;
