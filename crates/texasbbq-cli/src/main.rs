//! texasbbq - smoke out the bugs that break dependent projects.
//!
//! Installs the configured source project into one conda environment per
//! target and runs each target's test suite against it.
//!
//! ## Stages
//!
//! - `miniconda`: install a private Miniconda if there is none
//! - `environment`: create or reuse each target's environment
//! - `install_source`: install the source into each environment
//! - `install_target`: install each target into its environment
//! - `tests`: run each target's tests
//!
//! Exits 0 when every target passed, 23 when some target failed and 1 on
//! errors that stop the run.

use anyhow::{Context, Result};
use clap::Parser;
use conda_env_manager::{HttpFetcher, MinicondaBootstrapper};
use std::path::PathBuf;
use texasbbq_core::config::DEFAULT_CONFIG_FILE;
use texasbbq_core::{Configuration, Installable, RunRequest, Stage, StageOrchestrator};
use texasbbq_process::SystemExecutor;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "texasbbq")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run downstream test suites against a source project", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "TEXASBBQ_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Stages to run (default: all). Always executed in canonical order.
    #[arg(short, long, value_delimiter = ',')]
    stages: Option<Vec<Stage>>,

    /// Targets to run (default: all)
    #[arg(short, long, value_delimiter = ',')]
    targets: Option<Vec<String>>,

    /// Print the configured targets and exit
    #[arg(long)]
    list_targets: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    texasbbq_core::init_tracing(cli.json, level);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = Configuration::load(&cli.config)
        .with_context(|| format!("load configuration {:?}", cli.config))?;
    let registry = config.target_registry()?;

    if cli.list_targets {
        for target in registry.iter() {
            println!("{}", target.name());
        }
        return Ok(0);
    }

    let request = RunRequest::new(cli.stages.as_deref(), cli.targets.as_deref(), &registry)?;
    let settings = config.settings.clone().with_env_overrides();
    config.check_target_names(&settings)?;
    let run = settings.run_context();
    std::fs::create_dir_all(run.work_dir())
        .with_context(|| format!("create work dir {:?}", run.work_dir()))?;

    let executor = SystemExecutor::new();
    let fetcher = HttpFetcher::new()?;
    let bootstrapper = MinicondaBootstrapper::new(
        run.conda_root(),
        settings.bootstrap_config(),
        &executor,
        &fetcher,
    );

    let result = StageOrchestrator::new(&run, &executor, &bootstrapper).run(
        &config.source,
        &registry,
        &request,
    )?;

    if let Some(path) = &cli.report {
        result.write_json(path)?;
        info!(run_id = %result.run_id, "Report written to {:?}", path);
    }

    Ok(result.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["texasbbq"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(cli.stages.is_none());
        assert!(cli.targets.is_none());
        assert!(!cli.list_targets);
    }

    #[test]
    fn test_stage_list() {
        let cli = Cli::try_parse_from(["texasbbq", "-s", "tests,miniconda", "-s", "environment"])
            .unwrap();
        assert_eq!(
            cli.stages,
            Some(vec![Stage::Tests, Stage::Miniconda, Stage::Environment])
        );
    }

    #[test]
    fn test_unknown_stage_rejected() {
        assert!(Cli::try_parse_from(["texasbbq", "--stages", "deploy"]).is_err());
    }

    #[test]
    fn test_targets_and_report() {
        let cli = Cli::try_parse_from([
            "texasbbq",
            "-t",
            "umap,awkward",
            "--report",
            "out/report.json",
            "--config",
            "ci.toml",
        ])
        .unwrap();
        assert_eq!(
            cli.targets,
            Some(vec!["umap".to_string(), "awkward".to_string()])
        );
        assert_eq!(cli.report, Some(PathBuf::from("out/report.json")));
        assert_eq!(cli.config, PathBuf::from("ci.toml"));
    }
}
