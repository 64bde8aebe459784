//! Data models shared by the engine: element identities and tabulated collaborators.
//!
//! - [`element`] decodes the composite bead keys into explicit [`element::Element`] records
//!   and fixes the per-cardinality node numbering used by every store.
//! - [`table`] provides fixed-potential implementations of the collaborator traits, used by
//!   the command-line driver and throughout the test suites.

pub mod element;
pub mod table;
