use thiserror::Error;

use super::config::ConfigError;
use super::graph::EdgeClass;
use crate::core::models::element::{ElementError, ResidueRef};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Element decoding failed: {source}")]
    Element {
        #[from]
        source: ElementError,
    },

    #[error("Invalid solver configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error(
        "Unary-energy provider {provider} has {found} entries but the interaction graph has {expected} positions"
    )]
    ProviderSizeMismatch {
        provider: usize,
        expected: usize,
        found: usize,
    },

    #[error("Edge class {class} exceeded its capacity of {capacity} slots")]
    EdgeCapacityExceeded { class: EdgeClass, capacity: usize },

    #[error("Edge connects residue {residue:?} to itself")]
    SelfInteraction { residue: ResidueRef },

    #[error("Edge {edge} references element {element}, which does not exist")]
    ElementOutOfRange { edge: usize, element: usize },

    #[error("Sensitivity buffer holds {found} entries but {needed} edges need one")]
    SensitivityBuffer { needed: usize, found: usize },

    #[error("Unary-energy provider index {0} is out of range")]
    ProviderOutOfRange(usize),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
