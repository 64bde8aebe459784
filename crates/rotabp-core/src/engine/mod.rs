//! # Engine Module
//!
//! The inference engine: everything between "a filled set of node and edge stores" and
//! "converged marginals, a free energy and per-edge sensitivities".
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Damping, iteration budget and convergence tolerance
//! - **Error Handling** ([`error`]) - Fatal conditions raised while building or filling a graph
//! - **Progress Monitoring** ([`progress`]) - Callback-based reporting of solver progress
//! - **Factor Graph** ([`graph`]) - The node and edge stores of one evaluator, keyed by class
//! - **Reduction** ([`reduction`]) - Folds single-state variables out of the iteration
//! - **Solver** ([`solver`]) - Damped sum-product iteration to a fixed point
//! - **Energy** ([`energy`]) - Bethe free energy and derivative routing from the marginals
//!
//! A typical evaluation fills a [`graph::FactorGraph`], calls
//! [`reduction::fold_singletons`], standardizes the potentials, runs
//! [`solver::solve_for_marginals`], and reads the results through [`energy`].

pub mod config;
pub mod energy;
pub mod error;
pub mod graph;
pub mod progress;
pub mod reduction;
pub mod solver;
