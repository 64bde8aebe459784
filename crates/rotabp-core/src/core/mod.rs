//! # Core Module
//!
//! The stateless foundation of the library: how elements are identified, how the external
//! collaborators are described, and how discrete probabilities are stored and manipulated.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Element identity keys, their decoded form, and tabulated
//!   collaborator implementations
//! - **Collaborator Traits** ([`traits`]) - The interaction-graph and unary-energy-provider
//!   boundaries the solver consumes
//! - **Factor Storage** ([`factors`]) - Dense node and edge stores plus the numeric kernels
//!   of the sum-product update

pub mod factors;
pub mod models;
pub mod traits;
