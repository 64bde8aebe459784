use super::graph::FactorGraph;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReductionSummary {
    /// 1-3 slots absorbed into the unary potential of their 3-state endpoint.
    pub folded_edges: usize,
    /// 1-1 slots that will be scored in closed form instead of iterated.
    pub closed_form_edges: usize,
}

/// Removes every singleton variable from the iteration.
///
/// A 1-state node has no freedom, so each 1-3 edge reduces to a unary factor on its 3-state
/// endpoint and each 1-1 edge to a constant. After this pass the solver iterates only the
/// 3-state nodes and 3-3 edges. Calling it twice on the same fill is a no-op.
pub fn fold_singletons(graph: &mut FactorGraph) -> ReductionSummary {
    if graph.is_reduced() {
        return ReductionSummary::default();
    }

    graph.edges13.move_edge_prob_to_node2(&mut graph.triples);
    graph.mark_reduced();

    let summary = ReductionSummary {
        folded_edges: graph.edges13.n_edge(),
        closed_form_edges: graph.edges11.n_edge(),
    };
    debug!(
        folded = summary.folded_edges,
        closed_form = summary.closed_form_edges,
        "Folded singleton edges out of the factor graph."
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::element::{Cardinality, Element};
    use nalgebra::Vector3;

    fn element(cardinality: Cardinality, node: usize, rotamer: usize) -> Element {
        Element {
            cardinality,
            node,
            rotamer,
            position: 0,
        }
    }

    #[test]
    fn folding_moves_singleton_rows_into_triple_potentials() {
        let mut graph = FactorGraph::new(2, 1);
        let s0 = element(Cardinality::Singleton, 0, 0);
        let s1 = element(Cardinality::Singleton, 1, 0);
        for (rot, p) in [2.0, 1.0, 0.5].into_iter().enumerate() {
            graph
                .add_pair(rot, p, &element(Cardinality::Triple, 0, rot), &s0)
                .unwrap();
        }
        graph
            .add_pair(3, 4.0, &s1, &element(Cardinality::Triple, 0, 1))
            .unwrap();
        graph.add_pair(4, 0.5, &s0, &s1).unwrap();

        let summary = fold_singletons(&mut graph);

        assert_eq!(
            summary,
            ReductionSummary {
                folded_edges: 2,
                closed_form_edges: 1
            }
        );
        assert!(graph.is_reduced());
        assert_eq!(*graph.triples().prob(0), Vector3::new(2.0, 4.0, 0.5));
    }

    #[test]
    fn folding_twice_is_a_no_op() {
        let mut graph = FactorGraph::new(1, 1);
        graph
            .add_pair(
                0,
                3.0,
                &element(Cardinality::Singleton, 0, 0),
                &element(Cardinality::Triple, 0, 2),
            )
            .unwrap();

        fold_singletons(&mut graph);
        let second = fold_singletons(&mut graph);

        assert_eq!(second, ReductionSummary::default());
        assert_eq!(graph.triples().prob(0)[2], 3.0);
    }
}
