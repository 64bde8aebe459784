use crate::core::models::element::ElementKey;

/// One pairwise contribution between two beads, as produced by the interaction graph.
///
/// `value` is a potential energy; the solver uses `exp(-value)` as the multiplicative
/// factor on the corresponding rotamer pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEdge {
    pub elem1: usize,
    pub elem2: usize,
    pub value: f64,
}

/// The external evaluator that turns geometry into pairwise potentials and turns per-edge
/// sensitivities back into position derivatives.
///
/// The element list is fixed for the lifetime of the graph. The edge list is only valid after
/// [`InteractionGraph::compute_edges`] has been called for the current geometry, and may
/// change length between evaluations.
pub trait InteractionGraph {
    /// Number of beads.
    fn n_elem(&self) -> usize;

    /// Composite identity of bead `elem`.
    fn element_key(&self, elem: usize) -> ElementKey;

    /// Index of bead `elem` into the position data that unary-energy providers share.
    fn element_position(&self, elem: usize) -> usize;

    /// Number of entries in the position data.
    fn n_position(&self) -> usize;

    fn compute_edges(&mut self);

    fn edges(&self) -> &[PairEdge];

    /// Sensitivity buffer with at least one entry per current edge. Entry `i` receives the
    /// derivative of the free energy with respect to the value of edge `i`.
    fn edge_sensitivity_mut(&mut self) -> &mut [f64];

    fn propagate_derivatives(&mut self);
}

/// An external source of per-bead unary energies.
///
/// The solver requests one derivative slot per bead at construction time and, after every
/// solve, writes the converged belief of that bead's rotamer into the slot.
pub trait UnaryEnergyProvider {
    /// Number of position entries this provider covers.
    fn n_elem(&self) -> usize;

    fn energy(&self, position: usize) -> f64;

    fn request_slot(&mut self, position: usize) -> usize;

    fn write_deriv(&mut self, slot: usize, value: f64);
}
