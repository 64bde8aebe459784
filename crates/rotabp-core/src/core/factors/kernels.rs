use nalgebra::{SMatrix, SVector};

/// Floor applied to maxima, denominators and logarithm arguments so that exact zeros never
/// produce NaN.
pub const PROB_FLOOR: f64 = 1e-10;

/// Scales `v` so that its largest entry is 1.
#[inline]
pub fn rescale_by_max<const N: usize>(v: &SVector<f64, N>) -> SVector<f64, N> {
    *v / v.max().max(PROB_FLOOR)
}

#[inline]
pub fn l1_normalize<const N: usize>(v: &SVector<f64, N>) -> SVector<f64, N> {
    *v / v.sum().max(f64::MIN_POSITIVE)
}

#[inline]
pub fn l1_normalize_matrix<const R: usize, const C: usize>(
    m: &SMatrix<f64, R, C>,
) -> SMatrix<f64, R, C> {
    *m / m.sum().max(f64::MIN_POSITIVE)
}

/// `damping * old + (1 - damping) * new`.
#[inline]
pub fn damped_blend<const N: usize>(
    old: &SVector<f64, N>,
    new: &SVector<f64, N>,
    damping: f64,
) -> SVector<f64, N> {
    old * damping + new * (1.0 - damping)
}

/// A node belief with one incoming message divided back out.
#[inline]
pub fn cavity<const N: usize>(
    node_belief: &SVector<f64, N>,
    incoming: &SVector<f64, N>,
) -> SVector<f64, N> {
    node_belief.component_div(&incoming.add_scalar(PROB_FLOOR))
}

/// Message towards side 1 of an edge: the potential matrix applied to side 2's cavity.
#[inline]
pub fn message_to_side1<const N1: usize, const N2: usize>(
    prob: &SMatrix<f64, N1, N2>,
    cavity2: &SVector<f64, N2>,
) -> SVector<f64, N1> {
    prob * cavity2
}

/// Message towards side 2 of an edge: side 1's cavity applied through the transposed matrix.
#[inline]
pub fn message_to_side2<const N1: usize, const N2: usize>(
    prob: &SMatrix<f64, N1, N2>,
    cavity1: &SVector<f64, N1>,
) -> SVector<f64, N2> {
    prob.tr_mul(cavity1)
}

/// One term `p * ln(p / q)` of a relative entropy, floored at both ends.
#[inline]
pub fn relative_entropy_term(p: f64, q: f64) -> f64 {
    p * ((PROB_FLOOR + p) / (PROB_FLOOR + q)).ln()
}

#[inline]
pub fn max_abs_diff<const N: usize>(a: &SVector<f64, N>, b: &SVector<f64, N>) -> f64 {
    (a - b).amax()
}
