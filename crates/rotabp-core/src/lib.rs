//! # rotabp Core Library
//!
//! Approximate marginal inference over discrete side-chain rotamer states. A pairwise
//! interaction graph supplies bead-level potentials; this library folds them into a factor
//! graph with 1-state and 3-state variables, runs damped loopy belief propagation to a fixed
//! point, and turns the converged beliefs into a Bethe free energy and into sensitivities that
//! an outer gradient-based structure optimizer can propagate back to coordinates.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout:
//!
//! - **[`core`]: The Foundation.** Element identity decoding, the traits describing the
//!   external collaborators (interaction graph and unary-energy providers), and the dense
//!   node and edge stores together with the pure numeric kernels they are built from.
//!
//! - **[`engine`]: The Logic Core.** Solver configuration, error types, progress reporting,
//!   the factor-graph registry keyed by cardinality class, the singleton graph-reduction
//!   pass, the belief-propagation solver and Bethe free-energy assembly.
//!
//! - **[`workflows`]: The Public API.** The [`workflows::sidechain::RotamerSidechain`]
//!   evaluator that rebuilds the factor graph from the collaborators on every evaluation,
//!   solves it, and writes energies and derivatives back.

pub mod core;
pub mod engine;
pub mod workflows;
