use super::element::ElementKey;
use crate::core::traits::{InteractionGraph, PairEdge, UnaryEnergyProvider};

/// An interaction graph whose pairwise potentials are fixed numbers instead of functions of
/// geometry.
///
/// Sensitivities handed to [`InteractionGraph::propagate_derivatives`] are kept so callers can
/// inspect what the solver reported for each edge.
#[derive(Debug, Clone, Default)]
pub struct TabulatedGraph {
    keys: Vec<ElementKey>,
    positions: Vec<usize>,
    edges: Vec<PairEdge>,
    sensitivity: Vec<f64>,
    propagated: Vec<f64>,
    compute_calls: usize,
}

impl TabulatedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bead whose position index equals its element index.
    pub fn add_element(&mut self, key: ElementKey) -> usize {
        let position = self.keys.len();
        self.add_element_at(key, position)
    }

    pub fn add_element_at(&mut self, key: ElementKey, position: usize) -> usize {
        self.keys.push(key);
        self.positions.push(position);
        self.keys.len() - 1
    }

    pub fn add_edge(&mut self, elem1: usize, elem2: usize, value: f64) -> usize {
        self.edges.push(PairEdge {
            elem1,
            elem2,
            value,
        });
        self.edges.len() - 1
    }

    pub fn set_edge_value(&mut self, edge: usize, value: f64) {
        if let Some(e) = self.edges.get_mut(edge) {
            e.value = value;
        }
    }

    /// Sensitivities received by the most recent derivative propagation.
    pub fn sensitivities(&self) -> &[f64] {
        &self.propagated
    }

    pub fn compute_calls(&self) -> usize {
        self.compute_calls
    }
}

impl InteractionGraph for TabulatedGraph {
    fn n_elem(&self) -> usize {
        self.keys.len()
    }

    fn element_key(&self, elem: usize) -> ElementKey {
        self.keys[elem]
    }

    fn element_position(&self, elem: usize) -> usize {
        self.positions[elem]
    }

    fn n_position(&self) -> usize {
        self.positions.iter().max().map_or(0, |&p| p + 1)
    }

    fn compute_edges(&mut self) {
        self.compute_calls += 1;
        self.sensitivity.clear();
        self.sensitivity.resize(self.edges.len(), 0.0);
    }

    fn edges(&self) -> &[PairEdge] {
        &self.edges
    }

    fn edge_sensitivity_mut(&mut self) -> &mut [f64] {
        &mut self.sensitivity
    }

    fn propagate_derivatives(&mut self) {
        self.propagated.clone_from(&self.sensitivity);
    }
}

/// A unary-energy provider backed by a plain table of energies, one per position.
#[derive(Debug, Clone, Default)]
pub struct TabulatedUnaryEnergies {
    energies: Vec<f64>,
    slot_positions: Vec<usize>,
    derivs: Vec<f64>,
}

impl TabulatedUnaryEnergies {
    pub fn new(energies: Vec<f64>) -> Self {
        Self {
            energies,
            ..Self::default()
        }
    }

    pub fn set_energy(&mut self, position: usize, energy: f64) {
        if let Some(e) = self.energies.get_mut(position) {
            *e = energy;
        }
    }

    pub fn deriv(&self, slot: usize) -> Option<f64> {
        self.derivs.get(slot).copied()
    }

    /// Derivative values written into every slot requested for `position`.
    pub fn derivs_at(&self, position: usize) -> Vec<f64> {
        self.slot_positions
            .iter()
            .zip(&self.derivs)
            .filter(|&(&p, _)| p == position)
            .map(|(_, &d)| d)
            .collect()
    }
}

impl UnaryEnergyProvider for TabulatedUnaryEnergies {
    fn n_elem(&self) -> usize {
        self.energies.len()
    }

    fn energy(&self, position: usize) -> f64 {
        self.energies[position]
    }

    fn request_slot(&mut self, position: usize) -> usize {
        self.slot_positions.push(position);
        self.derivs.push(0.0);
        self.slot_positions.len() - 1
    }

    fn write_deriv(&mut self, slot: usize, value: f64) {
        if let Some(d) = self.derivs.get_mut(slot) {
            *d = value;
        }
    }
}
