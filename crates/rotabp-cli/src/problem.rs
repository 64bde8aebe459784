use crate::error::{CliError, Result};
use rotabp::core::models::element::{DEFAULT_ROTAMER_BITS, ElementKey};
use rotabp::core::models::table::{TabulatedGraph, TabulatedUnaryEnergies};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// One bead. Either the explicit `residue`/`n-rot`/`rotamer` triple or a `packed` key must be
/// given; `position` defaults to the bead's index.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileElement {
    pub residue: Option<u32>,
    pub n_rot: Option<u32>,
    pub rotamer: Option<u32>,
    pub packed: Option<u32>,
    pub position: Option<usize>,
}

impl FileElement {
    fn key(&self, index: usize, rotamer_bits: u32) -> Result<ElementKey> {
        match (self.packed, self.residue, self.n_rot, self.rotamer) {
            (Some(packed), None, None, None) => Ok(ElementKey::unpack(packed, rotamer_bits)),
            (None, Some(residue), Some(n_rot), Some(rotamer)) => {
                Ok(ElementKey::new(residue, n_rot, rotamer))
            }
            _ => Err(CliError::Problem(format!(
                "element {index} must give either 'packed' or all of 'residue', 'n-rot' and 'rotamer'"
            ))),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileEdge {
    pub elements: [usize; 2],
    /// Pairwise potential energy; the solver uses `exp(-value)`.
    pub value: f64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileUnary {
    pub name: Option<String>,
    pub energies: Vec<f64>,
}

/// A tabulated rotamer problem: beads, pairwise energies and any number of unary-energy
/// tables indexed by position.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProblemFile {
    pub rotamer_bits: Option<u32>,
    #[serde(default)]
    pub elements: Vec<FileElement>,
    #[serde(default)]
    pub edges: Vec<FileEdge>,
    #[serde(default)]
    pub unary: Vec<FileUnary>,
}

/// The collaborators built from a [`ProblemFile`], plus the original residue id of every
/// element for reporting.
pub struct Problem {
    pub graph: TabulatedGraph,
    pub providers: Vec<TabulatedUnaryEnergies>,
    pub provider_names: Vec<String>,
    pub keys: Vec<ElementKey>,
}

impl ProblemFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading problem definition from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|source| CliError::FileParsing {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn build(self) -> Result<Problem> {
        let rotamer_bits = self.rotamer_bits.unwrap_or(DEFAULT_ROTAMER_BITS);
        if rotamer_bits == 0 || rotamer_bits > 15 {
            return Err(CliError::Problem(format!(
                "rotamer-bits must be between 1 and 15, got {rotamer_bits}"
            )));
        }

        let mut graph = TabulatedGraph::new();
        let mut keys = Vec::with_capacity(self.elements.len());
        for (index, element) in self.elements.iter().enumerate() {
            let key = element.key(index, rotamer_bits)?;
            graph.add_element_at(key, element.position.unwrap_or(index));
            keys.push(key);
        }

        for (index, edge) in self.edges.iter().enumerate() {
            let [a, b] = edge.elements;
            if a >= keys.len() || b >= keys.len() {
                return Err(CliError::Problem(format!(
                    "edge {index} references element {} but only {} elements are defined",
                    a.max(b),
                    keys.len()
                )));
            }
            graph.add_edge(a, b, edge.value);
        }

        let provider_names = self
            .unary
            .iter()
            .enumerate()
            .map(|(i, u)| u.name.clone().unwrap_or_else(|| format!("unary_{i}")))
            .collect();
        let providers = self
            .unary
            .into_iter()
            .map(|u| TabulatedUnaryEnergies::new(u.energies))
            .collect();

        debug!(
            "Problem has {} elements, {} edges.",
            keys.len(),
            self.edges.len()
        );
        Ok(Problem {
            graph,
            providers,
            provider_names,
            keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotabp::core::traits::InteractionGraph;

    const TWO_RESIDUES: &str = r#"
[[elements]]
residue = 0
n-rot = 3
rotamer = 0

[[elements]]
residue = 0
n-rot = 3
rotamer = 1

[[elements]]
packed = 0x110

[[edges]]
elements = [0, 2]
value = 0.5

[[unary]]
name = "rotamer-bias"
energies = [0.0, 1.0, 2.0]
"#;

    #[test]
    fn builds_graph_from_explicit_and_packed_keys() {
        let problem = ProblemFile::from_toml_str(TWO_RESIDUES)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(problem.keys[0], ElementKey::new(0, 3, 0));
        assert_eq!(problem.keys[2], ElementKey::new(1, 1, 0));
        assert_eq!(problem.graph.n_elem(), 3);
        assert_eq!(problem.graph.n_position(), 3);
        assert_eq!(problem.graph.edges().len(), 1);
        assert_eq!(problem.provider_names, vec!["rotamer-bias".to_string()]);
    }

    #[test]
    fn unnamed_unary_tables_get_indexed_names() {
        let problem = ProblemFile::from_toml_str("[[unary]]\nenergies = []\n")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(problem.provider_names, vec!["unary_0".to_string()]);
    }

    #[test]
    fn element_with_mixed_key_forms_is_rejected() {
        let result = ProblemFile::from_toml_str("[[elements]]\npacked = 1\nresidue = 2\n")
            .unwrap()
            .build();
        assert!(matches!(result, Err(CliError::Problem(_))));
    }

    #[test]
    fn edge_to_missing_element_is_rejected() {
        let file = ProblemFile::from_toml_str(
            "[[elements]]\nresidue = 0\nn-rot = 1\nrotamer = 0\n\n[[edges]]\nelements = [0, 3]\nvalue = 1.0\n",
        )
        .unwrap();
        assert!(matches!(file.build(), Err(CliError::Problem(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ProblemFile::from_toml_str("[[elements]]\nchain = 'A'\n").is_err());
    }
}
