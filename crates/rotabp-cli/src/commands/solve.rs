use crate::cli::SolveArgs;
use crate::config::PartialSolverConfig;
use crate::error::{CliError, Result};
use crate::problem::ProblemFile;
use crate::utils::progress::CliProgressHandler;
use rotabp::core::models::element::{ElementKey, ElementTable, ResidueRef};
use rotabp::engine::progress::ProgressReporter;
use rotabp::workflows::sidechain::{ComputeMode, RotamerSidechain};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// One line of the per-residue report.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidueReport {
    pub residue: u32,
    pub n_rot: usize,
    pub free_energy: f64,
    pub unary: Vec<f64>,
}

pub fn run(args: SolveArgs) -> Result<()> {
    let problem = ProblemFile::from_file(&args.problem)?.build()?;

    let partial = match &args.config {
        Some(path) => PartialSolverConfig::from_file(path)?,
        None => PartialSolverConfig::default(),
    };
    let config = partial.merge_with_cli(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let mut sidechain = RotamerSidechain::new(problem.graph, problem.providers, config)?
        .with_reporter(reporter);

    info!("Solving for rotamer marginals...");
    let outcome = sidechain.compute_value(ComputeMode::PotentialAndDeriv)?;
    if !outcome.converged() {
        warn!(
            "Solver stopped at the iteration limit with max deviation {:.3e}.",
            outcome.max_deviation
        );
    }

    println!(
        "Free energy: {:.6} ({} after {} iterations, max deviation {:.3e})",
        sidechain.potential(),
        if outcome.converged() {
            "converged"
        } else {
            "not converged"
        },
        outcome.iterations,
        outcome.max_deviation
    );

    let rows = residue_reports(&sidechain, &problem.keys)?;
    match &args.output {
        Some(path) => {
            write_csv(path, &problem.provider_names, &rows)?;
            println!("✓ Per-residue energies written to: {}", path.display());
        }
        None => {
            for row in &rows {
                println!(
                    "  residue {:>5} ({}-state): {:>12.6}",
                    row.residue, row.n_rot, row.free_energy
                );
            }
        }
    }

    Ok(())
}

fn residue_ids(elements: &ElementTable, keys: &[ElementKey]) -> HashMap<ResidueRef, u32> {
    elements
        .iter()
        .zip(keys)
        .map(|(element, key)| (element.residue(), key.residue))
        .collect()
}

pub fn residue_reports<G, P>(
    sidechain: &RotamerSidechain<'_, G, P>,
    keys: &[ElementKey],
) -> Result<Vec<ResidueReport>>
where
    G: rotabp::core::traits::InteractionGraph,
    P: rotabp::core::traits::UnaryEnergyProvider,
{
    let ids = residue_ids(sidechain.elements(), keys);
    let free = sidechain.residue_free_energies();
    let unary = (0..sidechain.providers().len())
        .map(|p| sidechain.rotamer_1body_energy(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    sidechain
        .elements()
        .residue_order()
        .iter()
        .enumerate()
        .map(|(i, residue)| -> Result<ResidueReport> {
            let id = ids.get(residue).copied().ok_or_else(|| {
                CliError::Problem(format!("no element found for residue {residue:?}"))
            })?;
            Ok(ResidueReport {
                residue: id,
                n_rot: residue.cardinality.n_rot(),
                free_energy: free[i],
                unary: unary.iter().map(|per_provider| per_provider[i]).collect(),
            })
        })
        .collect()
}

pub fn write_csv(path: &Path, provider_names: &[String], rows: &[ResidueReport]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["residue".to_string(), "n_rot".to_string(), "free_energy".to_string()];
    header.extend(provider_names.iter().cloned());
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.residue.to_string(),
            row.n_rot.to_string(),
            row.free_energy.to_string(),
        ];
        record.extend(row.unary.iter().map(f64::to_string));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SYMMETRIC_PAIR: &str = r#"
[[elements]]
residue = 4
n-rot = 3
rotamer = 0
[[elements]]
residue = 4
n-rot = 3
rotamer = 1
[[elements]]
residue = 4
n-rot = 3
rotamer = 2
[[elements]]
residue = 9
n-rot = 3
rotamer = 0
[[elements]]
residue = 9
n-rot = 3
rotamer = 1
[[elements]]
residue = 9
n-rot = 3
rotamer = 2
[[elements]]
residue = 2
n-rot = 1
rotamer = 0

[[edges]]
elements = [0, 3]
value = -0.6931471805599453
[[edges]]
elements = [1, 4]
value = -0.6931471805599453
[[edges]]
elements = [2, 5]
value = -0.6931471805599453

[[unary]]
name = "bias"
energies = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.5]
"#;

    fn write_problem(dir: &Path) -> PathBuf {
        let path = dir.join("problem.toml");
        std::fs::write(&path, SYMMETRIC_PAIR).unwrap();
        path
    }

    #[test]
    fn solve_writes_per_residue_csv() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("energies.csv");
        let args = SolveArgs {
            problem: write_problem(dir.path()),
            output: Some(output.clone()),
            tol: Some(1e-10),
            max_iter: Some(10_000),
            chunk_size: Some(1),
            damping: Some(0.1),
            ..SolveArgs::default()
        };

        run(args).unwrap();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["residue", "n_rot", "free_energy", "bias"]
        );

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "4");
        assert_eq!(&rows[1][0], "9");
        assert_eq!(&rows[2][0], "2");
        assert_eq!(&rows[2][1], "1");

        let total: f64 = rows.iter().map(|r| r[2].parse::<f64>().unwrap()).sum();
        assert!((total - (1.5 - 12.0_f64.ln())).abs() < 1e-6);
        assert!((rows[2][3].parse::<f64>().unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn solve_reports_missing_problem_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = SolveArgs {
            problem: dir.path().join("absent.toml"),
            ..SolveArgs::default()
        };
        assert!(matches!(run(args), Err(CliError::Io(_))));
    }

    #[test]
    fn solve_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("solver.toml");
        std::fs::write(&config, "damping = 1.5\n").unwrap();
        let args = SolveArgs {
            problem: write_problem(dir.path()),
            config: Some(config),
            ..SolveArgs::default()
        };
        assert!(matches!(run(args), Err(CliError::Config(_))));
    }
}
