//! Dense storage for the discrete factor graph and the numeric kernels that update it.
//!
//! Node and edge stores are parameterized by rotamer cardinality at compile time, so every
//! belief vector and potential matrix is a fixed-size `nalgebra` value that lives inline in a
//! contiguous `Vec`. Stores are allocated once for the largest problem they will see and are
//! reused across evaluations through `reset`.
//!
//! - [`kernels`] - Pure functions for the sum-product update and the Bethe energy terms
//! - [`nodes`] - Per-cardinality unary potentials and beliefs
//! - [`edges`] - Per-cardinality-pair potentials, beliefs and joint marginals

pub mod edges;
pub mod kernels;
pub mod nodes;
