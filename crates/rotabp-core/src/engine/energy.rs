use super::error::EngineError;
use super::graph::FactorGraph;

/// Bethe free energy of a solved factor graph, measured against the unscaled potentials.
///
/// On a tree this is exactly `-ln Z`. Folded 1-3 edges are already part of the 3-state node
/// terms and are not counted again; 1-1 edges contribute `-ln(potential)` in closed form.
pub fn bethe_free_energy(graph: &FactorGraph) -> f64 {
    let ResidueEnergies { singles, triples } = residue_free_energies(graph);
    singles.iter().chain(&triples).sum()
}

/// Bethe free energy split by residue, indexed by node within each cardinality class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResidueEnergies {
    pub singles: Vec<f64>,
    pub triples: Vec<f64>,
}

/// Node terms go to their own residue; every edge term is split evenly between its two
/// endpoints.
pub fn residue_free_energies(graph: &FactorGraph) -> ResidueEnergies {
    let singles_store = graph.singles();
    let triples_store = graph.triples();

    let mut singles: Vec<f64> = (0..singles_store.n_elem())
        .map(|n| singles_store.node_free_energy(n))
        .collect();
    let mut triples: Vec<f64> = (0..triples_store.n_elem())
        .map(|n| triples_store.node_free_energy(n))
        .collect();

    let edges11 = graph.edges11();
    for slot in 0..edges11.n_edge() {
        let en = if graph.is_reduced() {
            edges11.singleton_pair_energy(slot)
        } else {
            edges11.edge_free_energy(slot, singles_store, singles_store)
        };
        let (n1, n2) = edges11.endpoints(slot);
        singles[n1] += 0.5 * en;
        singles[n2] += 0.5 * en;
    }

    if !graph.is_reduced() {
        let edges13 = graph.edges13();
        for slot in 0..edges13.n_edge() {
            let en = edges13.edge_free_energy(slot, singles_store, triples_store);
            let (n1, n2) = edges13.endpoints(slot);
            singles[n1] += 0.5 * en;
            triples[n2] += 0.5 * en;
        }
    }

    let edges33 = graph.edges33();
    for slot in 0..edges33.n_edge() {
        let en = edges33.edge_free_energy(slot, triples_store, triples_store);
        let (n1, n2) = edges33.endpoints(slot);
        triples[n1] += 0.5 * en;
        triples[n2] += 0.5 * en;
    }

    ResidueEnergies { singles, triples }
}

/// Writes `d(free energy) / d(edge value)` for every interaction-graph edge.
///
/// A 1-1 contribution always fires, a folded 1-3 contribution fires with the probability of
/// its 3-state endpoint's rotamer, and any iterated contribution fires with the joint
/// marginal of its rotamer pair. Entries of edges that were never routed are left untouched.
pub fn write_edge_sensitivities(
    graph: &FactorGraph,
    sensitivity: &mut [f64],
) -> Result<(), EngineError> {
    let found = sensitivity.len();
    let mut write = |edge_num: usize, value: f64| match sensitivity.get_mut(edge_num) {
        Some(s) => {
            *s = value;
            Ok(())
        }
        None => Err(EngineError::SensitivityBuffer {
            needed: edge_num + 1,
            found,
        }),
    };

    if graph.is_reduced() {
        for loc in graph.edges11().edge_locs() {
            write(loc.edge_num, 1.0)?;
        }
        for loc in graph.edges13().edge_locs() {
            let (_, partner) = graph.edges13().endpoints(loc.slot);
            write(loc.edge_num, graph.triples().belief(partner)[loc.col])?;
        }
    } else {
        for loc in graph.edges11().edge_locs() {
            write(loc.edge_num, graph.edges11().marginal(loc.slot)[(loc.row, loc.col)])?;
        }
        for loc in graph.edges13().edge_locs() {
            write(loc.edge_num, graph.edges13().marginal(loc.slot)[(loc.row, loc.col)])?;
        }
    }
    for loc in graph.edges33().edge_locs() {
        write(loc.edge_num, graph.edges33().marginal(loc.slot)[(loc.row, loc.col)])?;
    }
    Ok(())
}
