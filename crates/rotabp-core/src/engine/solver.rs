use super::config::SolverConfig;
use super::graph::FactorGraph;
use super::progress::{Progress, ProgressReporter};
use crate::core::factors::edges::{CrossClass, SameClass};
use tracing::{instrument, trace};

/// Damping of the single warm-up update that gives every edge a consistent first message.
pub const WARMUP_DAMPING: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    Converged,
    /// The iteration budget ran out first. The beliefs are still usable.
    MaxIterReached,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOutcome {
    pub iterations: usize,
    pub max_deviation: f64,
    pub status: Convergence,
}

impl SolveOutcome {
    #[inline]
    pub fn converged(&self) -> bool {
        self.status == Convergence::Converged
    }
}

/// Runs damped loopy belief propagation on `graph` and leaves normalized node and edge
/// marginals in it.
///
/// Convergence is checked every `iteration_chunk_size` iterations, so the reported iteration
/// count is always a multiple of the chunk size and at least one chunk always runs.
#[instrument(skip_all, name = "solve_for_marginals")]
pub fn solve_for_marginals(
    graph: &mut FactorGraph,
    config: &SolverConfig,
    reporter: &ProgressReporter,
) -> SolveOutcome {
    let iterate_singles = !graph.is_reduced();

    graph.triples.seed_old_beliefs_from_probs();
    graph.edges33.reset_old_beliefs();
    if iterate_singles {
        graph.singles.seed_old_beliefs_from_probs();
        graph.edges11.reset_old_beliefs();
        graph.edges13.reset_old_beliefs();
    }

    // leaves consistent edge messages in cur_belief; the node swap then puts the warm-up node
    // beliefs where the first iteration's swap expects them
    calculate_new_beliefs(graph, WARMUP_DAMPING);
    swap_node_beliefs(graph);

    let chunk = config.iteration_chunk_size;
    reporter.report(Progress::SolveStart {
        total_chunks: config.max_iter.div_ceil(chunk) as u64,
    });

    let mut iterations = 0;
    let (status, max_deviation) = loop {
        for _ in 0..chunk {
            swap_node_beliefs(graph);
            swap_edge_beliefs(graph);
            calculate_new_beliefs(graph, config.damping);
        }
        iterations += chunk;

        let max_deviation = graph.max_deviation();
        trace!(iterations, max_deviation, "Finished iteration chunk.");
        reporter.report(Progress::ChunkFinished {
            iteration: iterations,
            max_deviation,
        });

        if max_deviation < config.tol {
            break (Convergence::Converged, max_deviation);
        }
        if iterations >= config.max_iter {
            break (Convergence::MaxIterReached, max_deviation);
        }
    };

    calculate_marginals(graph);

    reporter.report(Progress::SolveFinish {
        iterations,
        converged: status == Convergence::Converged,
    });

    SolveOutcome {
        iterations,
        max_deviation,
        status,
    }
}

/// One full update: reset current node beliefs to the potentials, let every iterated edge
/// multiply its message in, then rescale and damp the nodes.
fn calculate_new_beliefs(graph: &mut FactorGraph, damping: f64) {
    let iterate_singles = !graph.is_reduced();
    let FactorGraph {
        singles,
        triples,
        edges11,
        edges13,
        edges33,
        ..
    } = graph;

    triples.load_probs_into_beliefs();
    if iterate_singles {
        singles.load_probs_into_beliefs();
    }

    edges33.update_beliefs(&mut SameClass(&mut *triples), damping);
    if iterate_singles {
        edges11.update_beliefs(&mut SameClass(&mut *singles), damping);
        edges13.update_beliefs(&mut CrossClass(&mut *singles, &mut *triples), damping);
        singles.finish_belief_update(damping);
    }
    triples.finish_belief_update(damping);
}

fn swap_node_beliefs(graph: &mut FactorGraph) {
    graph.triples.swap_beliefs();
    if !graph.is_reduced() {
        graph.singles.swap_beliefs();
    }
}

fn swap_edge_beliefs(graph: &mut FactorGraph) {
    graph.edges33.swap_beliefs();
    if !graph.is_reduced() {
        graph.edges11.swap_beliefs();
        graph.edges13.swap_beliefs();
    }
}

/// Node marginals first; edge marginals divide them back by each edge's own message.
fn calculate_marginals(graph: &mut FactorGraph) {
    if graph.is_reduced() {
        // folded singletons carry no uncertainty
        graph.singles.load_probs_into_beliefs();
    }
    graph.singles.calculate_marginals();
    graph.triples.calculate_marginals();

    graph
        .edges33
        .calculate_marginals(&graph.triples, &graph.triples);
    if !graph.is_reduced() {
        graph
            .edges11
            .calculate_marginals(&graph.singles, &graph.singles);
        graph
            .edges13
            .calculate_marginals(&graph.singles, &graph.triples);
    }
}
