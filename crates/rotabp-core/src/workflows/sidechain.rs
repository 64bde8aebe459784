use crate::core::models::element::{Cardinality, ElementTable, ResidueRef};
use crate::core::traits::{InteractionGraph, UnaryEnergyProvider};
use crate::engine::config::SolverConfig;
use crate::engine::energy::{ResidueEnergies, bethe_free_energy, write_edge_sensitivities};
use crate::engine::error::EngineError;
use crate::engine::graph::FactorGraph;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::reduction::fold_singletons;
use crate::engine::solver::{SolveOutcome, solve_for_marginals};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeMode {
    /// Propagate derivatives only.
    Deriv,
    /// Propagate derivatives and compute the free energy.
    PotentialAndDeriv,
}

/// Side-chain rotamer free energy of a structure, as seen by an outer optimizer.
///
/// Owns the interaction graph and the unary-energy providers. Every call to
/// [`RotamerSidechain::compute_value`] rebuilds the factor graph from their current values,
/// solves it, and writes sensitivities back into both. Nothing but storage carries over from
/// one evaluation to the next.
pub struct RotamerSidechain<'a, G, P> {
    graph: G,
    providers: Vec<P>,
    elements: ElementTable,
    /// `deriv_slots[element * providers.len() + provider]`
    deriv_slots: Vec<usize>,
    factors: FactorGraph,
    config: SolverConfig,
    reporter: ProgressReporter<'a>,
    potential: f64,
    last_outcome: Option<SolveOutcome>,
    energy_fresh: bool,
}

impl<'a, G, P> RotamerSidechain<'a, G, P>
where
    G: InteractionGraph,
    P: UnaryEnergyProvider,
{
    pub fn new(graph: G, mut providers: Vec<P>, config: SolverConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let elements = ElementTable::decode(
            (0..graph.n_elem()).map(|e| (graph.element_key(e), graph.element_position(e))),
        )?;

        let n_position = graph.n_position();
        for (provider, p) in providers.iter().enumerate() {
            if p.n_elem() != n_position {
                return Err(EngineError::ProviderSizeMismatch {
                    provider,
                    expected: n_position,
                    found: p.n_elem(),
                });
            }
        }

        let mut deriv_slots = Vec::with_capacity(elements.len() * providers.len());
        for element in elements.iter() {
            for p in providers.iter_mut() {
                deriv_slots.push(p.request_slot(element.position));
            }
        }

        let n_single = elements.n_nodes(Cardinality::Singleton);
        let n_triple = elements.n_nodes(Cardinality::Triple);
        let factors = FactorGraph::new(n_single, n_triple);

        info!(
            "Rotamer sidechain ready: {} elements, {} single-state and {} 3-state residues, {} unary provider(s).",
            elements.len(),
            n_single,
            n_triple,
            providers.len()
        );
        debug!(
            "Edge capacities: 1-1 = {}, 1-3 = {}, 3-3 = {}.",
            factors.edges11().capacity(),
            factors.edges13().capacity(),
            factors.edges33().capacity()
        );

        Ok(Self {
            graph,
            providers,
            elements,
            deriv_slots,
            factors,
            config,
            reporter: ProgressReporter::new(),
            potential: 0.0,
            last_outcome: None,
            energy_fresh: false,
        })
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter<'a>) -> Self {
        self.reporter = reporter;
        self
    }

    /// One full evaluation: fill, reduce, solve, and propagate derivatives. In
    /// [`ComputeMode::PotentialAndDeriv`] the Bethe free energy is stored as well.
    ///
    /// Running out of iterations is not an error; the returned outcome says whether the solve
    /// converged.
    pub fn compute_value(&mut self, mode: ComputeMode) -> Result<SolveOutcome, EngineError> {
        self.energy_fresh = false;

        self.reporter.report(Progress::PhaseStart {
            name: "Filling factor graph",
        });
        self.fill_factor_graph()?;
        self.reporter.report(Progress::PhaseFinish);

        let outcome = solve_for_marginals(&mut self.factors, &self.config, &self.reporter);
        if outcome.iterations + self.config.iteration_chunk_size + 1 >= self.config.max_iter {
            warn!(
                "Belief propagation used {} of {} iterations (max deviation {:.3e}).",
                outcome.iterations, self.config.max_iter, outcome.max_deviation
            );
            self.reporter.report(Progress::Message(format!(
                "Iteration budget nearly exhausted ({}/{}).",
                outcome.iterations, self.config.max_iter
            )));
        }

        self.propagate_derivatives()?;

        if mode == ComputeMode::PotentialAndDeriv {
            self.potential = bethe_free_energy(&self.factors);
            self.energy_fresh = true;
            debug!(potential = self.potential, "Computed Bethe free energy.");
        }

        self.last_outcome = Some(outcome);
        Ok(outcome)
    }

    /// Recomputes in [`ComputeMode::PotentialAndDeriv`] unless the latest evaluation already
    /// produced the free energy.
    pub fn ensure_fresh_energy(&mut self) -> Result<f64, EngineError> {
        if !self.energy_fresh {
            self.compute_value(ComputeMode::PotentialAndDeriv)?;
        }
        Ok(self.potential)
    }

    #[instrument(skip_all, name = "fill_factor_graph")]
    fn fill_factor_graph(&mut self) -> Result<(), EngineError> {
        self.factors.reset();

        for element in self.elements.iter() {
            let energy: f64 = self
                .providers
                .iter()
                .map(|p| p.energy(element.position))
                .sum();
            self.factors.accumulate_unary(element, energy);
        }

        self.graph.compute_edges();
        for (edge_num, edge) in self.graph.edges().iter().enumerate() {
            let lookup = |element: usize| {
                self.elements
                    .get(element)
                    .ok_or(EngineError::ElementOutOfRange {
                        edge: edge_num,
                        element,
                    })
            };
            let a = lookup(edge.elem1)?;
            let b = lookup(edge.elem2)?;
            self.factors
                .add_pair(edge_num, (-edge.value).exp(), a, b)?;
        }

        if self.config.fold_singletons {
            fold_singletons(&mut self.factors);
        }
        let log_scale = self.factors.standardize_probs();

        debug!(
            edges = self.graph.edges().len(),
            slots_11 = self.factors.edges11().n_edge(),
            slots_13 = self.factors.edges13().n_edge(),
            slots_33 = self.factors.edges33().n_edge(),
            log_scale,
            "Filled factor graph."
        );
        Ok(())
    }

    fn propagate_derivatives(&mut self) -> Result<(), EngineError> {
        let n_edges = self.graph.edges().len();
        let sensitivity = self.graph.edge_sensitivity_mut();
        if sensitivity.len() < n_edges {
            return Err(EngineError::SensitivityBuffer {
                needed: n_edges,
                found: sensitivity.len(),
            });
        }
        write_edge_sensitivities(&self.factors, sensitivity)?;
        self.graph.propagate_derivatives();

        let n_prov = self.providers.len();
        for (elem, element) in self.elements.iter().enumerate() {
            let belief = self.factors.belief(element);
            for (i, provider) in self.providers.iter_mut().enumerate() {
                provider.write_deriv(self.deriv_slots[elem * n_prov + i], belief);
            }
        }
        Ok(())
    }

    /// Per-residue share of the free energy from the latest evaluation, in residue order.
    pub fn residue_free_energies(&self) -> Vec<f64> {
        let split = crate::engine::energy::residue_free_energies(&self.factors);
        self.arrange(&split)
    }

    /// Expected unary energy of each residue under provider `provider`, in residue order.
    pub fn rotamer_1body_energy(&self, provider: usize) -> Result<Vec<f64>, EngineError> {
        let p = self
            .providers
            .get(provider)
            .ok_or(EngineError::ProviderOutOfRange(provider))?;

        let mut split = ResidueEnergies {
            singles: vec![0.0; self.elements.n_nodes(Cardinality::Singleton)],
            triples: vec![0.0; self.elements.n_nodes(Cardinality::Triple)],
        };
        for element in self.elements.iter() {
            let en = self.factors.belief(element) * p.energy(element.position);
            match element.cardinality {
                Cardinality::Singleton => split.singles[element.node] += en,
                Cardinality::Triple => split.triples[element.node] += en,
            }
        }
        Ok(self.arrange(&split))
    }

    fn arrange(&self, split: &ResidueEnergies) -> Vec<f64> {
        self.elements
            .residue_order()
            .iter()
            .map(|&ResidueRef { cardinality, node }| match cardinality {
                Cardinality::Singleton => split.singles[node],
                Cardinality::Triple => split.triples[node],
            })
            .collect()
    }

    /// Free energy from the latest [`ComputeMode::PotentialAndDeriv`] evaluation.
    pub fn potential(&self) -> f64 {
        self.potential
    }

    pub fn last_outcome(&self) -> Option<&SolveOutcome> {
        self.last_outcome.as_ref()
    }

    /// Converged probability of `element`'s rotamer.
    pub fn node_marginal(&self, element: usize) -> Option<f64> {
        self.elements
            .get(element)
            .map(|e| self.factors.belief(e))
    }

    pub fn elements(&self) -> &ElementTable {
        &self.elements
    }

    pub fn factor_graph(&self) -> &FactorGraph {
        &self.factors
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        self.energy_fresh = false;
        &mut self.graph
    }

    pub fn providers(&self) -> &[P] {
        &self.providers
    }

    pub fn providers_mut(&mut self) -> &mut [P] {
        self.energy_fresh = false;
        &mut self.providers
    }
}
