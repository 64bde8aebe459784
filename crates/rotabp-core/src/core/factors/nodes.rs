use super::kernels::{
    PROB_FLOOR, damped_blend, l1_normalize, max_abs_diff, relative_entropy_term, rescale_by_max,
};
use nalgebra::SVector;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Unary potentials and beliefs for every node of one rotamer cardinality `N`.
///
/// `prob` holds the (possibly rescaled) unary potential of each node. `log_scale` records the
/// natural log of every factor divided out of `prob` since the last [`NodeStore::reset`], so
/// free energies can be reported against the unscaled potential. `cur_belief` and
/// `old_belief` are the two halves of the solver's double buffer.
#[derive(Debug, Clone)]
pub struct NodeStore<const N: usize> {
    prob: Vec<SVector<f64, N>>,
    log_scale: Vec<f64>,
    cur_belief: Vec<SVector<f64, N>>,
    old_belief: Vec<SVector<f64, N>>,
}

impl<const N: usize> NodeStore<N> {
    pub fn new(n_elem: usize) -> Self {
        let ones = SVector::<f64, N>::repeat(1.0);
        Self {
            prob: vec![ones; n_elem],
            log_scale: vec![0.0; n_elem],
            cur_belief: vec![ones; n_elem],
            old_belief: vec![ones; n_elem],
        }
    }

    #[inline]
    pub fn n_elem(&self) -> usize {
        self.prob.len()
    }

    #[inline]
    pub const fn n_rot(&self) -> usize {
        N
    }

    pub fn reset(&mut self) {
        self.prob.fill(SVector::repeat(1.0));
        self.log_scale.fill(0.0);
    }

    /// Multiplies the potential of rotamer `rot` of node `elem` by `exp(-energy)`.
    #[inline]
    pub fn accumulate_energy(&mut self, elem: usize, rot: usize, energy: f64) {
        self.prob[elem][rot] *= (-energy).exp();
    }

    #[inline]
    pub fn multiply_prob(&mut self, elem: usize, factor: &SVector<f64, N>) {
        self.prob[elem].component_mul_assign(factor);
    }

    #[inline]
    pub(crate) fn add_log_scale(&mut self, elem: usize, log_scale: f64) {
        self.log_scale[elem] += log_scale;
    }

    /// Divides every node's potential by its own maximum and returns the summed log of the
    /// divisors. A second call is a no-op and returns zero.
    pub fn standardize_probs(&mut self) -> f64 {
        let standardize = |(p, scale): (&mut SVector<f64, N>, &mut f64)| {
            let max_prob = p.max().max(PROB_FLOOR);
            *p /= max_prob;
            *scale += max_prob.ln();
            max_prob.ln()
        };

        #[cfg(not(feature = "parallel"))]
        let total = self
            .prob
            .iter_mut()
            .zip(self.log_scale.iter_mut())
            .map(standardize)
            .sum::<f64>();

        #[cfg(feature = "parallel")]
        let total = self
            .prob
            .par_iter_mut()
            .zip(self.log_scale.par_iter_mut())
            .map(standardize)
            .sum::<f64>();

        total
    }

    pub fn seed_old_beliefs_from_probs(&mut self) {
        self.old_belief.copy_from_slice(&self.prob);
    }

    pub fn load_probs_into_beliefs(&mut self) {
        self.cur_belief.copy_from_slice(&self.prob);
    }

    /// `cur = (1 - damping) * cur / max(cur) + damping * old`, node by node.
    pub fn finish_belief_update(&mut self, damping: f64) {
        for (cur, old) in self.cur_belief.iter_mut().zip(&self.old_belief) {
            *cur = damped_blend(old, &rescale_by_max(cur), damping);
        }
    }

    pub fn swap_beliefs(&mut self) {
        std::mem::swap(&mut self.cur_belief, &mut self.old_belief);
    }

    pub fn calculate_marginals(&mut self) {
        #[cfg(not(feature = "parallel"))]
        self.cur_belief
            .iter_mut()
            .for_each(|b| *b = l1_normalize(b));

        #[cfg(feature = "parallel")]
        self.cur_belief
            .par_iter_mut()
            .for_each(|b| *b = l1_normalize(b));
    }

    pub fn max_deviation(&self) -> f64 {
        self.cur_belief
            .iter()
            .zip(&self.old_belief)
            .map(|(cur, old)| max_abs_diff(cur, old))
            .fold(0.0, f64::max)
    }

    /// Average energy minus entropy of node `elem` under its normalized belief, measured
    /// against the unscaled potential.
    pub fn node_free_energy(&self, elem: usize) -> f64 {
        let b = l1_normalize(&self.cur_belief[elem]);
        let pr = &self.prob[elem];
        let en: f64 = b
            .iter()
            .zip(pr.iter())
            .map(|(&b, &pr)| relative_entropy_term(b, pr))
            .sum();
        en - self.log_scale[elem]
    }

    #[inline]
    pub fn prob(&self, elem: usize) -> &SVector<f64, N> {
        &self.prob[elem]
    }

    #[inline]
    pub fn log_scale(&self, elem: usize) -> f64 {
        self.log_scale[elem]
    }

    #[inline]
    pub fn belief(&self, elem: usize) -> &SVector<f64, N> {
        &self.cur_belief[elem]
    }

    #[inline]
    pub fn old_belief(&self, elem: usize) -> &SVector<f64, N> {
        &self.old_belief[elem]
    }

    #[inline]
    pub(crate) fn set_belief(&mut self, elem: usize, belief: SVector<f64, N>) {
        self.cur_belief[elem] = belief;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    const TOLERANCE: f64 = 1e-12;

    fn approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn store_with_probs(probs: &[[f64; 3]]) -> NodeStore<3> {
        let mut store = NodeStore::<3>::new(probs.len());
        for (elem, p) in probs.iter().enumerate() {
            store.multiply_prob(elem, &Vector3::from(*p));
        }
        store
    }

    #[test]
    fn new_store_has_neutral_potentials() {
        let store = NodeStore::<3>::new(2);
        assert_eq!(store.n_elem(), 2);
        assert_eq!(store.n_rot(), 3);
        assert_eq!(*store.prob(1), Vector3::repeat(1.0));
    }

    #[test]
    fn accumulate_energy_multiplies_boltzmann_factors() {
        let mut store = NodeStore::<3>::new(1);
        store.accumulate_energy(0, 1, 0.5);
        store.accumulate_energy(0, 1, 1.5);
        assert!(approx_equal(store.prob(0)[1], (-2.0_f64).exp()));
        assert!(approx_equal(store.prob(0)[0], 1.0));
    }

    #[test]
    fn reset_restores_neutral_potentials_and_scale() {
        let mut store = store_with_probs(&[[2.0, 4.0, 8.0]]);
        store.standardize_probs();
        store.reset();
        assert_eq!(*store.prob(0), Vector3::repeat(1.0));
        assert_eq!(store.log_scale(0), 0.0);
    }

    #[test]
    fn standardize_probs_preserves_ratios_and_records_scale() {
        let mut store = store_with_probs(&[[2.0, 4.0, 8.0], [0.5, 0.25, 0.125]]);
        let total = store.standardize_probs();

        assert_eq!(*store.prob(0), Vector3::new(0.25, 0.5, 1.0));
        assert!(approx_equal(store.prob(1)[1] / store.prob(1)[2], 2.0));
        assert!(approx_equal(store.log_scale(0), 8.0_f64.ln()));
        assert!(approx_equal(total, 8.0_f64.ln() + 0.5_f64.ln()));
    }

    #[test]
    fn standardize_probs_is_idempotent() {
        let mut store = store_with_probs(&[[3.0, 1.0, 2.0]]);
        store.standardize_probs();
        let once = *store.prob(0);
        let second = store.standardize_probs();
        assert_eq!(*store.prob(0), once);
        assert_eq!(second, 0.0);
    }

    #[test]
    fn swapping_twice_restores_both_buffers() {
        let mut store = store_with_probs(&[[1.0, 2.0, 3.0]]);
        store.seed_old_beliefs_from_probs();
        store.set_belief(0, Vector3::new(0.7, 0.2, 0.1));

        store.swap_beliefs();
        assert_eq!(*store.belief(0), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(*store.old_belief(0), Vector3::new(0.7, 0.2, 0.1));

        store.swap_beliefs();
        assert_eq!(*store.belief(0), Vector3::new(0.7, 0.2, 0.1));
        assert_eq!(*store.old_belief(0), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn finish_belief_update_rescales_then_blends_with_old() {
        let mut store = NodeStore::<3>::new(1);
        store.seed_old_beliefs_from_probs();
        store.set_belief(0, Vector3::new(2.0, 1.0, 0.0));
        store.finish_belief_update(0.5);
        assert_eq!(*store.belief(0), Vector3::new(1.0, 0.75, 0.5));
    }

    #[test]
    fn max_deviation_is_largest_absolute_difference() {
        let mut store = NodeStore::<3>::new(2);
        store.seed_old_beliefs_from_probs();
        store.set_belief(0, Vector3::new(1.0, 0.8, 1.0));
        store.set_belief(1, Vector3::new(1.3, 1.0, 1.0));
        assert!((store.max_deviation() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn calculate_marginals_normalizes_each_node() {
        let mut store = NodeStore::<3>::new(1);
        store.set_belief(0, Vector3::new(1.0, 1.0, 2.0));
        store.calculate_marginals();
        assert_eq!(*store.belief(0), Vector3::new(0.25, 0.25, 0.5));
    }

    #[test]
    fn node_free_energy_of_belief_matching_potential_is_minus_log_partition() {
        let mut store = store_with_probs(&[[1.0, 2.0, 1.0]]);
        store.load_probs_into_beliefs();
        store.calculate_marginals();
        assert!((store.node_free_energy(0) + 4.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn node_free_energy_is_unchanged_by_standardization() {
        let mut store = store_with_probs(&[[0.5, 3.0, 1.5]]);
        store.load_probs_into_beliefs();
        store.calculate_marginals();
        let before = store.node_free_energy(0);

        store.standardize_probs();
        assert!((store.node_free_energy(0) - before).abs() < 1e-9);
    }

    #[test]
    fn singleton_store_free_energy_is_unary_energy() {
        let mut store = NodeStore::<1>::new(1);
        store.accumulate_energy(0, 0, 1.25);
        store.load_probs_into_beliefs();
        store.calculate_marginals();
        assert_eq!(store.belief(0)[0], 1.0);
        assert!((store.node_free_energy(0) - 1.25).abs() < 1e-9);
    }
}
