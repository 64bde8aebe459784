use super::kernels::{
    PROB_FLOOR, cavity, damped_blend, l1_normalize_matrix, max_abs_diff, message_to_side1,
    message_to_side2, relative_entropy_term, rescale_by_max,
};
use super::nodes::NodeStore;
use itertools::iproduct;
use nalgebra::{SMatrix, SVector};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("edge store is full ({capacity} slots)")]
pub struct CapacityExceeded {
    pub capacity: usize,
}

/// The two messages an edge currently sends: `side1` towards its first endpoint and `side2`
/// towards its second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeBelief<const N1: usize, const N2: usize> {
    pub side1: SVector<f64, N1>,
    pub side2: SVector<f64, N2>,
}

impl<const N1: usize, const N2: usize> EdgeBelief<N1, N2> {
    pub fn ones() -> Self {
        Self {
            side1: SVector::repeat(1.0),
            side2: SVector::repeat(1.0),
        }
    }

    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        max_abs_diff(&self.side1, &other.side1).max(max_abs_diff(&self.side2, &other.side2))
    }
}

/// Where one pairwise contribution landed: the interaction-graph edge it came from, the
/// matrix entry it multiplied, and the slot holding that matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeLoc {
    pub edge_num: usize,
    pub row: usize,
    pub col: usize,
    pub slot: usize,
}

/// Access to the beliefs of the two node stores an edge class connects.
///
/// Both endpoints of a same-class edge live in one store, so the update cannot simply take
/// two `&mut NodeStore`. [`SameClass`] and [`CrossClass`] cover the two layouts.
pub trait Endpoints<const N1: usize, const N2: usize> {
    fn old_belief1(&self, node: usize) -> SVector<f64, N1>;
    fn old_belief2(&self, node: usize) -> SVector<f64, N2>;
    fn cur_belief1(&self, node: usize) -> SVector<f64, N1>;
    fn cur_belief2(&self, node: usize) -> SVector<f64, N2>;
    fn set_cur_belief1(&mut self, node: usize, belief: SVector<f64, N1>);
    fn set_cur_belief2(&mut self, node: usize, belief: SVector<f64, N2>);
}

pub struct SameClass<'a, const N: usize>(pub &'a mut NodeStore<N>);

pub struct CrossClass<'a, const N1: usize, const N2: usize>(
    pub &'a mut NodeStore<N1>,
    pub &'a mut NodeStore<N2>,
);

impl<const N: usize> Endpoints<N, N> for SameClass<'_, N> {
    fn old_belief1(&self, node: usize) -> SVector<f64, N> {
        *self.0.old_belief(node)
    }
    fn old_belief2(&self, node: usize) -> SVector<f64, N> {
        *self.0.old_belief(node)
    }
    fn cur_belief1(&self, node: usize) -> SVector<f64, N> {
        *self.0.belief(node)
    }
    fn cur_belief2(&self, node: usize) -> SVector<f64, N> {
        *self.0.belief(node)
    }
    fn set_cur_belief1(&mut self, node: usize, belief: SVector<f64, N>) {
        self.0.set_belief(node, belief);
    }
    fn set_cur_belief2(&mut self, node: usize, belief: SVector<f64, N>) {
        self.0.set_belief(node, belief);
    }
}

impl<const N1: usize, const N2: usize> Endpoints<N1, N2> for CrossClass<'_, N1, N2> {
    fn old_belief1(&self, node: usize) -> SVector<f64, N1> {
        *self.0.old_belief(node)
    }
    fn old_belief2(&self, node: usize) -> SVector<f64, N2> {
        *self.1.old_belief(node)
    }
    fn cur_belief1(&self, node: usize) -> SVector<f64, N1> {
        *self.0.belief(node)
    }
    fn cur_belief2(&self, node: usize) -> SVector<f64, N2> {
        *self.1.belief(node)
    }
    fn set_cur_belief1(&mut self, node: usize, belief: SVector<f64, N1>) {
        self.0.set_belief(node, belief);
    }
    fn set_cur_belief2(&mut self, node: usize, belief: SVector<f64, N2>) {
        self.1.set_belief(node, belief);
    }
}

/// Pairwise potentials, messages and joint marginals for every edge between a node of
/// cardinality `N1` and a node of cardinality `N2`.
///
/// Slots `0..n_edge` are live; the rest of the preallocated capacity is left untouched until
/// a new pair claims it. Several interaction-graph edges between the same pair of nodes
/// multiply into one slot.
#[derive(Debug, Clone)]
pub struct EdgeStore<const N1: usize, const N2: usize> {
    capacity: usize,
    n_edge: usize,
    prob: Vec<SMatrix<f64, N1, N2>>,
    log_scale: Vec<f64>,
    cur_belief: Vec<EdgeBelief<N1, N2>>,
    old_belief: Vec<EdgeBelief<N1, N2>>,
    marginal: Vec<SMatrix<f64, N1, N2>>,
    endpoints: Vec<(usize, usize)>,
    slots: HashMap<(usize, usize), usize>,
    edge_loc: Vec<EdgeLoc>,
}

impl<const N1: usize, const N2: usize> EdgeStore<N1, N2> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            n_edge: 0,
            prob: vec![SMatrix::repeat(1.0); capacity],
            log_scale: vec![0.0; capacity],
            cur_belief: vec![EdgeBelief::ones(); capacity],
            old_belief: vec![EdgeBelief::ones(); capacity],
            marginal: vec![SMatrix::zeros(); capacity],
            endpoints: vec![(0, 0); capacity],
            slots: HashMap::with_capacity(capacity),
            edge_loc: Vec::with_capacity(capacity * N1 * N2),
        }
    }

    #[inline]
    pub fn n_edge(&self) -> usize {
        self.n_edge
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reset(&mut self) {
        self.n_edge = 0;
        self.slots.clear();
        self.edge_loc.clear();
    }

    /// Multiplies the potential of rotamer pair (`rot1`, `rot2`) between nodes `node1` and
    /// `node2` by `prob_val`, claiming a fresh all-ones slot on the first contribution for
    /// that node pair.
    pub fn add_to_edge(
        &mut self,
        edge_num: usize,
        prob_val: f64,
        node1: usize,
        rot1: usize,
        node2: usize,
        rot2: usize,
    ) -> Result<(), CapacityExceeded> {
        debug_assert!(rot1 < N1 && rot2 < N2);

        let slot = match self.slots.entry((node1, node2)) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                if self.n_edge == self.capacity {
                    return Err(CapacityExceeded {
                        capacity: self.capacity,
                    });
                }
                let slot = self.n_edge;
                e.insert(slot);
                self.endpoints[slot] = (node1, node2);
                self.prob[slot] = SMatrix::repeat(1.0);
                self.log_scale[slot] = 0.0;
                self.n_edge += 1;
                slot
            }
        };

        self.prob[slot][(rot1, rot2)] *= prob_val;
        self.edge_loc.push(EdgeLoc {
            edge_num,
            row: rot1,
            col: rot2,
            slot,
        });
        Ok(())
    }

    /// Divides every live slot's potential by its largest entry and returns the summed log of
    /// the divisors.
    pub fn standardize_probs(&mut self) -> f64 {
        let n_edge = self.n_edge;
        let standardize = |(p, scale): (&mut SMatrix<f64, N1, N2>, &mut f64)| {
            let max_prob = p.max().max(PROB_FLOOR);
            *p /= max_prob;
            *scale += max_prob.ln();
            max_prob.ln()
        };

        #[cfg(not(feature = "parallel"))]
        let total = self.prob[..n_edge]
            .iter_mut()
            .zip(self.log_scale[..n_edge].iter_mut())
            .map(standardize)
            .sum::<f64>();

        #[cfg(feature = "parallel")]
        let total = self.prob[..n_edge]
            .par_iter_mut()
            .zip(self.log_scale[..n_edge].par_iter_mut())
            .map(standardize)
            .sum::<f64>();

        total
    }

    /// Sets every live slot's previous messages to the uninformative all-ones vector.
    pub fn reset_old_beliefs(&mut self) {
        self.old_belief[..self.n_edge].fill(EdgeBelief::ones());
    }

    pub fn swap_beliefs(&mut self) {
        std::mem::swap(&mut self.cur_belief, &mut self.old_belief);
    }

    pub fn max_deviation(&self) -> f64 {
        self.cur_belief[..self.n_edge]
            .iter()
            .zip(&self.old_belief[..self.n_edge])
            .map(|(cur, old)| cur.max_abs_diff(old))
            .fold(0.0, f64::max)
    }

    /// One sum-product sweep over every live slot.
    ///
    /// Messages are computed from the endpoints' *old* beliefs and this store's *old*
    /// messages only; the damped result goes to the current messages and the undamped
    /// message is multiplied into each endpoint's *current* belief. The outcome therefore
    /// does not depend on the order of slots.
    pub fn update_beliefs<E>(&mut self, nodes: &mut E, damping: f64)
    where
        E: Endpoints<N1, N2>,
    {
        for slot in 0..self.n_edge {
            let (n1, n2) = self.endpoints[slot];
            let old_edge = self.old_belief[slot];
            let prob = &self.prob[slot];

            let cavity1 = cavity(&nodes.old_belief1(n1), &old_edge.side1);
            let cavity2 = cavity(&nodes.old_belief2(n2), &old_edge.side2);

            let fresh1 = rescale_by_max(&message_to_side1(prob, &cavity2));
            let fresh2 = rescale_by_max(&message_to_side2(prob, &cavity1));

            self.cur_belief[slot] = EdgeBelief {
                side1: damped_blend(&old_edge.side1, &fresh1, damping),
                side2: damped_blend(&old_edge.side2, &fresh2, damping),
            };

            // approximate renormalization, exact L1 happens in calculate_marginals
            let b1 = rescale_by_max(&nodes.cur_belief1(n1).component_mul(&fresh1));
            nodes.set_cur_belief1(n1, b1);
            let b2 = rescale_by_max(&nodes.cur_belief2(n2).component_mul(&fresh2));
            nodes.set_cur_belief2(n2, b2);
        }
    }

    /// Joint marginal of every live slot from converged beliefs.
    ///
    /// Each endpoint belief already contains this edge's message, so it is divided back out
    /// before the outer product is applied to the potential.
    pub fn calculate_marginals(&mut self, nodes1: &NodeStore<N1>, nodes2: &NodeStore<N2>) {
        for slot in 0..self.n_edge {
            let (n1, n2) = self.endpoints[slot];
            let b = &self.cur_belief[slot];
            let bc1 = nodes1
                .belief(n1)
                .component_div(&b.side1.add_scalar(PROB_FLOOR));
            let bc2 = nodes2
                .belief(n2)
                .component_div(&b.side2.add_scalar(PROB_FLOOR));

            let joint = self.prob[slot].component_mul(&(bc1 * bc2.transpose()));
            self.marginal[slot] = l1_normalize_matrix(&joint);
        }
    }

    /// Average pairwise energy plus mutual information of slot `slot`, measured against the
    /// unscaled potential. Node beliefs must already be normalized marginals.
    pub fn edge_free_energy(
        &self,
        slot: usize,
        nodes1: &NodeStore<N1>,
        nodes2: &NodeStore<N2>,
    ) -> f64 {
        let (n1, n2) = self.endpoints[slot];
        let b1 = nodes1.belief(n1);
        let b2 = nodes2.belief(n2);
        let p = &self.marginal[slot];
        let pr = &self.prob[slot];

        let en: f64 = iproduct!(0..N1, 0..N2)
            .map(|(i, j)| relative_entropy_term(p[(i, j)], pr[(i, j)] * b1[i] * b2[j]))
            .sum();
        en - self.log_scale[slot]
    }

    #[inline]
    pub fn prob(&self, slot: usize) -> &SMatrix<f64, N1, N2> {
        &self.prob[slot]
    }

    #[inline]
    pub fn marginal(&self, slot: usize) -> &SMatrix<f64, N1, N2> {
        &self.marginal[slot]
    }

    #[inline]
    pub fn belief(&self, slot: usize) -> &EdgeBelief<N1, N2> {
        &self.cur_belief[slot]
    }

    #[inline]
    pub fn endpoints(&self, slot: usize) -> (usize, usize) {
        self.endpoints[slot]
    }

    #[inline]
    pub fn log_scale(&self, slot: usize) -> f64 {
        self.log_scale[slot]
    }

    /// Routing records of every contribution added since the last reset.
    pub fn edge_locs(&self) -> &[EdgeLoc] {
        &self.edge_loc
    }
}

impl<const N2: usize> EdgeStore<1, N2> {
    /// Folds every live slot into its partner node: the singleton side has no freedom left,
    /// so the slot's single potential row becomes a unary factor on the side-2 node. The
    /// slot's accumulated log scale moves along with it.
    pub fn move_edge_prob_to_node2(&self, nodes2: &mut NodeStore<N2>) {
        for slot in 0..self.n_edge {
            let (_, n2) = self.endpoints[slot];
            nodes2.multiply_prob(n2, &self.prob[slot].row(0).transpose());
            nodes2.add_log_scale(n2, self.log_scale[slot]);
        }
    }
}

impl EdgeStore<1, 1> {
    /// `-ln(potential)` of a pair of singletons, which carries no uncertainty.
    pub fn singleton_pair_energy(&self, slot: usize) -> f64 {
        -self.prob[slot][(0, 0)].ln() - self.log_scale[slot]
    }
}
