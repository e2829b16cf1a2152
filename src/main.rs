use amend::batch::{self, JAVA_SOURCE_DIR};
use amend::config::{self, Config};
use amend::correction::{
    run_correction_with_progress, CorrectionConfig, CorrectionEvent, CorrectionOutcome,
};
use amend::llm::{self, ModelChoice};
use amend::target::TargetDescriptor;
use amend::tools::{CheckerFrameworkVerifier, SpeciminMinimizer};
use amend::workspace;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "amend",
    about = "Repair Java methods flagged by the Checker Framework with a language model",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Repair a single method
    Run(RunArgs),
    /// Repair every public method of every public type under a directory
    Batch(BatchArgs),
    /// Store the model API key in the system keychain
    Setup,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Root of the source tree the file path is relative to
    root: PathBuf,

    /// Source file relative to the root, e.g. com/example/Foo.java
    file: String,

    /// Method reference, e.g. com.example.Foo#bar(int, String)
    method: String,

    /// Override the configured model
    #[arg(long, value_enum)]
    model: Option<ModelChoice>,

    /// Override the configured iteration limit
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Directory to scan for .java files
    dir: PathBuf,

    /// Project root; files under <root>/src/main/java are addressed relative to it
    root: PathBuf,

    /// Override the configured model
    #[arg(long, value_enum)]
    model: Option<ModelChoice>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Batch(args) => run_batch(args).await,
        Commands::Setup => setup(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("amend=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(root: &Path, model: Option<ModelChoice>) -> Result<Config> {
    let mut config = Config::load()
        .with_project_overrides(root)
        .map_err(|e| anyhow!(e))?;
    if let Some(model) = model {
        config.model = model;
    }
    Ok(config)
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(&args.root, args.model)?;
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }

    let target = TargetDescriptor::parse(&args.root, &args.file, &args.method)
        .context("Invalid target")?;
    workspace::install_cleanup_handler().map_err(|e| anyhow!(e))?;

    let minimizer = SpeciminMinimizer::from_config(&config);
    let verifier = CheckerFrameworkVerifier::from_config(&config);
    let model = llm::model_for(&config).context("Failed to configure the model")?;
    let correction = CorrectionConfig::from_config(&config);

    eprintln!("  Repairing {} ({})", target, config.model);
    let finished = run_correction_with_progress(
        &target,
        &minimizer,
        &verifier,
        model.as_ref(),
        &correction,
        print_progress,
    )
    .await;

    if let Some(path) = &args.report {
        finished.report.write_to(path).map_err(|e| anyhow!(e))?;
        eprintln!("  Report written to {}", path.display());
    }

    match finished.result {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(err) => Err(anyhow::Error::new(err))
            .with_context(|| format!("Failed to repair {}", target.method_reference())),
    }
}

async fn run_batch(args: BatchArgs) -> Result<()> {
    let config = load_config(&args.root, args.model)?;
    let targets = batch::discover_targets(&args.dir, &args.root)?;
    if targets.is_empty() {
        eprintln!(
            "  No public methods found under {} (sources are expected in {})",
            args.dir.display(),
            JAVA_SOURCE_DIR
        );
        return Ok(());
    }
    workspace::install_cleanup_handler().map_err(|e| anyhow!(e))?;

    let minimizer = SpeciminMinimizer::from_config(&config);
    let verifier = CheckerFrameworkVerifier::from_config(&config);
    let model = llm::model_for(&config).context("Failed to configure the model")?;
    let correction = CorrectionConfig::from_config(&config);

    eprintln!("  Repairing {} method(s) ({})", targets.len(), config.model);
    let summary = batch::run_batch(&targets, &minimizer, &verifier, model.as_ref(), &correction).await;

    for result in &summary.results {
        match &result.outcome {
            Ok(outcome) => eprintln!("  + {} {}", result.target, outcome_label(outcome)),
            Err(err) => eprintln!("  x {} {}", result.target, err),
        }
    }
    eprintln!(
        "  {} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );

    if summary.failed() > 0 {
        bail!("{} of {} target(s) failed", summary.failed(), summary.results.len());
    }
    Ok(())
}

fn setup() -> Result<()> {
    config::setup_api_key_interactive().map_err(|e| anyhow!(e))?;
    Ok(())
}

fn print_progress(event: &CorrectionEvent) {
    match event {
        CorrectionEvent::Minimized { .. } => eprintln!("  Minimized"),
        CorrectionEvent::Verified {
            iteration,
            diagnostics: None,
        } => eprintln!("  [{}] Clean", iteration),
        CorrectionEvent::Verified {
            iteration,
            diagnostics: Some(diagnostics),
        } => eprintln!(
            "  [{}] {} diagnostic line(s)",
            iteration,
            diagnostics.lines().count()
        ),
        CorrectionEvent::Prompting { iteration } => eprintln!("  [{}] Asking the model...", iteration),
        CorrectionEvent::SuggestionReceived { iteration, chars } => {
            eprintln!("  [{}] Suggestion received ({} chars)", iteration, chars)
        }
        CorrectionEvent::Spliced { iteration } => eprintln!("  [{}] Suggestion spliced", iteration),
        CorrectionEvent::Promoting { file } => eprintln!("  Updating {}", file.display()),
        CorrectionEvent::Promoted { .. } => {}
    }
}

fn outcome_label(outcome: &CorrectionOutcome) -> String {
    match outcome {
        CorrectionOutcome::AlreadyClean => "already clean".to_string(),
        CorrectionOutcome::Corrected { iterations } => {
            format!("corrected in {} iteration(s)", iterations)
        }
        CorrectionOutcome::DryRun { diagnostics: None } => "dry run: clean".to_string(),
        CorrectionOutcome::DryRun {
            diagnostics: Some(_),
        } => "dry run: diagnostics reported".to_string(),
    }
}

fn print_outcome(outcome: &CorrectionOutcome) {
    eprintln!("  + {}", outcome_label(outcome));
    if let CorrectionOutcome::DryRun {
        diagnostics: Some(diagnostics),
    } = outcome
    {
        println!("{}", diagnostics);
    }
}
