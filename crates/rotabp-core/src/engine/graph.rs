use super::error::EngineError;
use crate::core::factors::edges::{CapacityExceeded, EdgeStore};
use crate::core::factors::nodes::NodeStore;
use crate::core::models::element::{Cardinality, Element};
use std::fmt;

/// The unordered pairs of cardinalities an edge can connect, with the smaller cardinality
/// always on side 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeClass {
    SingleSingle,
    SingleTriple,
    TripleTriple,
}

impl EdgeClass {
    /// Class of an edge whose endpoints are already in canonical order.
    pub fn between(side1: Cardinality, side2: Cardinality) -> Option<Self> {
        match (side1, side2) {
            (Cardinality::Singleton, Cardinality::Singleton) => Some(Self::SingleSingle),
            (Cardinality::Singleton, Cardinality::Triple) => Some(Self::SingleTriple),
            (Cardinality::Triple, Cardinality::Triple) => Some(Self::TripleTriple),
            (Cardinality::Triple, Cardinality::Singleton) => None,
        }
    }

    /// Most slots the class can need: one per unordered node pair, self pairs included for the
    /// same-class stores.
    pub fn capacity(self, n_single: usize, n_triple: usize) -> usize {
        match self {
            Self::SingleSingle => n_single * (n_single + 1) / 2,
            Self::SingleTriple => n_single * n_triple,
            Self::TripleTriple => n_triple * (n_triple + 1) / 2,
        }
    }
}

impl fmt::Display for EdgeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SingleSingle => "1-1",
            Self::SingleTriple => "1-3",
            Self::TripleTriple => "3-3",
        };
        f.write_str(name)
    }
}

/// Every node and edge store of one evaluator, keyed by cardinality and edge class.
#[derive(Debug, Clone)]
pub struct FactorGraph {
    pub(crate) singles: NodeStore<1>,
    pub(crate) triples: NodeStore<3>,
    pub(crate) edges11: EdgeStore<1, 1>,
    pub(crate) edges13: EdgeStore<1, 3>,
    pub(crate) edges33: EdgeStore<3, 3>,
    reduced: bool,
}

impl FactorGraph {
    pub fn new(n_single: usize, n_triple: usize) -> Self {
        Self {
            singles: NodeStore::new(n_single),
            triples: NodeStore::new(n_triple),
            edges11: EdgeStore::new(EdgeClass::SingleSingle.capacity(n_single, n_triple)),
            edges13: EdgeStore::new(EdgeClass::SingleTriple.capacity(n_single, n_triple)),
            edges33: EdgeStore::new(EdgeClass::TripleTriple.capacity(n_single, n_triple)),
            reduced: false,
        }
    }

    pub fn reset(&mut self) {
        self.singles.reset();
        self.triples.reset();
        self.edges11.reset();
        self.edges13.reset();
        self.edges33.reset();
        self.reduced = false;
    }

    /// Multiplies the unary potential of `element`'s rotamer by `exp(-energy)`.
    pub fn accumulate_unary(&mut self, element: &Element, energy: f64) {
        match element.cardinality {
            Cardinality::Singleton => {
                self.singles
                    .accumulate_energy(element.node, element.rotamer, energy)
            }
            Cardinality::Triple => {
                self.triples
                    .accumulate_energy(element.node, element.rotamer, energy)
            }
        }
    }

    /// Multiplies one pairwise potential entry by `potential`.
    ///
    /// The endpoints are put in canonical order first: smaller cardinality on side 1, and the
    /// smaller node index on side 1 within a class.
    pub fn add_pair(
        &mut self,
        edge_num: usize,
        potential: f64,
        a: &Element,
        b: &Element,
    ) -> Result<(), EngineError> {
        let (first, second) = if (b.cardinality, b.node) < (a.cardinality, a.node) {
            (b, a)
        } else {
            (a, b)
        };

        if first.residue() == second.residue() {
            return Err(EngineError::SelfInteraction {
                residue: first.residue(),
            });
        }

        let class = EdgeClass::between(first.cardinality, second.cardinality).ok_or_else(|| {
            EngineError::Internal(format!(
                "edge {edge_num} was not put in canonical order ({} before {})",
                first.cardinality, second.cardinality
            ))
        })?;

        let (n1, r1, n2, r2) = (first.node, first.rotamer, second.node, second.rotamer);
        let result = match class {
            EdgeClass::SingleSingle => self.edges11.add_to_edge(edge_num, potential, n1, r1, n2, r2),
            EdgeClass::SingleTriple => self.edges13.add_to_edge(edge_num, potential, n1, r1, n2, r2),
            EdgeClass::TripleTriple => self.edges33.add_to_edge(edge_num, potential, n1, r1, n2, r2),
        };
        result.map_err(|CapacityExceeded { capacity }| EngineError::EdgeCapacityExceeded {
            class,
            capacity,
        })
    }

    /// Rescales every potential the solver will read by its maximum and returns the summed
    /// log of the divisors. Folded 1-3 edges are no longer read and are left alone.
    pub fn standardize_probs(&mut self) -> f64 {
        let mut total = self.singles.standardize_probs()
            + self.triples.standardize_probs()
            + self.edges11.standardize_probs()
            + self.edges33.standardize_probs();
        if !self.reduced {
            total += self.edges13.standardize_probs();
        }
        total
    }

    #[inline]
    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    pub(crate) fn mark_reduced(&mut self) {
        self.reduced = true;
    }

    /// Current belief of `element`'s rotamer.
    pub fn belief(&self, element: &Element) -> f64 {
        match element.cardinality {
            Cardinality::Singleton => self.singles.belief(element.node)[element.rotamer],
            Cardinality::Triple => self.triples.belief(element.node)[element.rotamer],
        }
    }

    /// Largest belief change over every class the solver iterates.
    pub fn max_deviation(&self) -> f64 {
        let mut deviation = self
            .triples
            .max_deviation()
            .max(self.edges33.max_deviation());
        if !self.reduced {
            deviation = deviation
                .max(self.singles.max_deviation())
                .max(self.edges11.max_deviation())
                .max(self.edges13.max_deviation());
        }
        deviation
    }

    pub fn singles(&self) -> &NodeStore<1> {
        &self.singles
    }

    pub fn triples(&self) -> &NodeStore<3> {
        &self.triples
    }

    pub fn edges11(&self) -> &EdgeStore<1, 1> {
        &self.edges11
    }

    pub fn edges13(&self) -> &EdgeStore<1, 3> {
        &self.edges13
    }

    pub fn edges33(&self) -> &EdgeStore<3, 3> {
        &self.edges33
    }
}
