//! AlphaGate CLI — run candidates through the acceptance gate.
//!
//! Commands:
//! - `validate` — gate a single factor file against an optional corpus
//! - `batch` — gate a JSON array of candidates in parallel

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use alphagate_core::{
    BaselineMetrics, Candidate, CorpusEntry, CorpusSnapshot, MarketFrame, SecurityPolicy,
};
use alphagate_runner::{validate_batch, GateConfig, ValidationOrchestrator, ValidationResult};

#[derive(Parser)]
#[command(
    name = "alphagate",
    about = "AlphaGate CLI — seven-layer acceptance gate for generated trading factors"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a single factor file.
    Validate {
        /// Path to the candidate factor source.
        code_file: PathBuf,

        /// Rationale text for the factor.
        #[arg(long)]
        rationale: Option<String>,

        /// Read the rationale from a file instead.
        #[arg(long, conflicts_with = "rationale")]
        rationale_file: Option<PathBuf>,

        /// Gate configuration (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Security policy (TOML). Defaults apply when omitted.
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Directory of previously accepted factor files.
        #[arg(long)]
        corpus_dir: Option<PathBuf>,

        /// Baseline metrics (JSON). Defaults apply when omitted.
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Seed for the synthetic market frame.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Bars in the synthetic market frame.
        #[arg(long, default_value_t = 504)]
        bars: usize,

        /// Emit the verdict as JSON instead of a text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Validate a JSON array of {code, rationale} candidates in parallel.
    Batch {
        /// Path to the candidates JSON file.
        input: PathBuf,

        /// Gate configuration (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Security policy (TOML). Defaults apply when omitted.
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Directory of previously accepted factor files.
        #[arg(long)]
        corpus_dir: Option<PathBuf>,

        /// Baseline metrics (JSON). Defaults apply when omitted.
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Seed for the synthetic market frame.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Bars in the synthetic market frame.
        #[arg(long, default_value_t = 504)]
        bars: usize,

        /// Emit all verdicts as JSON instead of a text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            code_file,
            rationale,
            rationale_file,
            config,
            policy,
            corpus_dir,
            baseline,
            seed,
            bars,
            json,
        } => {
            let code = std::fs::read_to_string(&code_file)
                .with_context(|| format!("reading {}", code_file.display()))?;
            let rationale = match (rationale, rationale_file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => bail!("one of --rationale or --rationale-file is required"),
            };
            let gate = build_gate(config.as_deref(), policy.as_deref())?;
            let corpus = load_corpus(corpus_dir.as_deref())?;
            let baseline = load_baseline(baseline.as_deref())?;
            let frame = MarketFrame::synthetic(seed, bars);

            let candidate = Candidate::new(code, rationale);
            let result = gate.validate(&candidate, &baseline, &corpus, &frame);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_verdict(&code_file.display().to_string(), &result);
            }
            if !result.passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Batch {
            input,
            config,
            policy,
            corpus_dir,
            baseline,
            seed,
            bars,
            json,
        } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let candidates: Vec<Candidate> =
                serde_json::from_str(&text).context("parsing candidates JSON")?;
            if candidates.is_empty() {
                bail!("no candidates in {}", input.display());
            }
            let gate = build_gate(config.as_deref(), policy.as_deref())?;
            let corpus = load_corpus(corpus_dir.as_deref())?;
            let baseline = load_baseline(baseline.as_deref())?;
            let frame = MarketFrame::synthetic(seed, bars);

            let results = validate_batch(&gate, &candidates, &baseline, &corpus, &frame);
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                let mut accepted = 0usize;
                for (idx, result) in results.iter().enumerate() {
                    print_verdict(&format!("candidate {}", idx + 1), result);
                    if result.passed {
                        accepted += 1;
                    }
                }
                println!("\n{} of {} candidates accepted", accepted, results.len());
            }
            if results.iter().any(|r| !r.passed) {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn build_gate(config: Option<&Path>, policy: Option<&Path>) -> Result<ValidationOrchestrator> {
    let config = match config {
        Some(path) => GateConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GateConfig::default(),
    };
    let policy = match policy {
        Some(path) => SecurityPolicy::from_toml_file(path)
            .with_context(|| format!("loading policy {}", path.display()))?,
        None => SecurityPolicy::default(),
    };
    Ok(ValidationOrchestrator::new(policy, config))
}

/// Each file in the corpus directory is one accepted factor; the file stem is
/// its entry id.
fn load_corpus(dir: Option<&Path>) -> Result<CorpusSnapshot> {
    let Some(dir) = dir else {
        return Ok(CorpusSnapshot::default());
    };
    let mut entries = Vec::new();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading corpus directory {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    for path in paths {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let code = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        entries.push(CorpusEntry::new(id, code));
    }
    Ok(CorpusSnapshot::new(entries))
}

fn load_baseline(path: Option<&Path>) -> Result<BaselineMetrics> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).context("parsing baseline JSON")
        }
        None => Ok(BaselineMetrics::default()),
    }
}

fn print_verdict(label: &str, result: &ValidationResult) {
    if result.passed {
        println!("ACCEPTED  {}", label);
    } else {
        let layer = result.layer_name.as_deref().unwrap_or("?");
        let detail = result
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        println!("REJECTED  {} [{}] {}", label, layer, detail);
    }
    for warning in &result.warnings {
        println!("  warning: {}", warning);
    }
}
