mod config;
mod ledger;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use autocritic_core::{Correction, ReflectionInput, ReflectionRunner};
use autocritic_critic::{ActionCode, CritiqueExchange};
use autocritic_gateway::create_gateway;
use autocritic_ledger::LedgerStore;
use autocritic_logging::{init_tracing, LogFormat, Logger};

use config::ProjectConfig;
use ledger::{handle_ledger_command, LedgerAction};

#[derive(Parser, Debug)]
#[command(
    name = "autocritic",
    about = "Critique and correct a driving agent's decisions",
    version,
    author
)]
struct Cli {
    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Ledger file (default: reflection.json in the working directory)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Critique one decision and record the result
    Reflect(ReflectArgs),

    /// Inspect the critique ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Args, Debug)]
struct ReflectArgs {
    /// Scenario description file ("-" reads stdin)
    #[arg(long)]
    scenario: PathBuf,

    /// File holding the driver's decision text
    #[arg(long)]
    response: PathBuf,

    /// File holding the evaluation of the decision
    #[arg(long)]
    evaluation: PathBuf,

    /// Action the driver took (code or name)
    #[arg(short, long)]
    action: ActionCode,

    /// Model provider (openai or azure)
    #[arg(long)]
    provider: Option<String>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Tracing level for diagnostics (RUST_LOG overrides)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Dry run: print the composed prompts without calling the model
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let working_dir = match cli.working_dir {
        Some(ref dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = ProjectConfig::load(&working_dir)?.unwrap_or_default();
    let ledger_path = config.ledger_path(&working_dir, cli.ledger.as_deref());

    match cli.command {
        Commands::Reflect(args) => {
            let correction = run_reflect(args, &config, &working_dir, ledger_path).await?;
            if let Some(correction) = correction {
                std::process::exit(correction.exit_code());
            }
        }
        Commands::Ledger { action } => {
            let store = LedgerStore::new(ledger_path);
            handle_ledger_command(action, &store)?;
        }
    }

    Ok(())
}

/// Run one invocation. Returns `None` for a dry run.
async fn run_reflect(
    args: ReflectArgs,
    config: &ProjectConfig,
    working_dir: &Path,
    ledger_path: PathBuf,
) -> Result<Option<Correction>> {
    let input = read_inputs(&args, working_dir)?;
    let gateway_config = config.gateway_config(args.provider.as_deref(), args.model.as_deref())?;

    if args.dry_run {
        println!("=== Dry Run ===");
        println!("Provider: {}", gateway_config.provider);
        println!("Model: {}", gateway_config.model);
        println!(
            "Prior action: {} ({})",
            input.prior_action,
            input.prior_action.name()
        );
        println!("Ledger: {}", ledger_path.display());
        for message in CritiqueExchange::build_messages(input.critique_input()) {
            println!();
            println!("--- {} ---", message.role.as_wire());
            println!("{}", message.content);
        }
        return Ok(None);
    }

    let log_format: LogFormat = args.log_format.into();
    init_tracing(&args.log_level, log_format);

    let log_path = config.log_path(working_dir, &ledger_path);
    let logger = Logger::with_file(log_format, &log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let gateway = create_gateway(gateway_config).context("Failed to create model gateway")?;
    let ledger = LedgerStore::open(&ledger_path)
        .with_context(|| format!("Failed to open ledger {}", ledger_path.display()))?;

    let runner = ReflectionRunner::new(Arc::from(gateway), Arc::new(ledger), Arc::new(logger))
        .with_repair_policy(config.repair_policy());

    let correction = runner.reflect(&input).await?;

    if args.json_output {
        let json = serde_json::to_string_pretty(&correction)?;
        println!("{}", json);
    } else {
        print_outcome(&correction, input.prior_action);
    }

    Ok(Some(correction))
}

fn read_inputs(args: &ReflectArgs, working_dir: &Path) -> Result<ReflectionInput> {
    let stdin_sources = [&args.scenario, &args.response, &args.evaluation]
        .into_iter()
        .filter(|p| p.as_os_str() == "-")
        .count();
    if stdin_sources > 1 {
        anyhow::bail!("Only one input can be read from stdin");
    }

    Ok(ReflectionInput::new(
        read_input(&args.scenario, working_dir, "scenario")?,
        read_input(&args.response, working_dir, "response")?,
        read_input(&args.evaluation, working_dir, "evaluation")?,
        args.action,
    ))
}

fn read_input(path: &Path, working_dir: &Path, what: &str) -> Result<String> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .with_context(|| format!("Failed to read {} from stdin", what))?;
        buf
    } else {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            working_dir.join(path)
        };
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {} file {}", what, path.display()))?
    };

    let content = content.trim().to_string();
    if content.is_empty() {
        anyhow::bail!("The {} input is empty", what);
    }
    Ok(content)
}

fn print_outcome(correction: &Correction, prior: ActionCode) {
    match correction {
        Correction::Corrected {
            critique,
            action,
            repaired,
        } => {
            eprintln!();
            eprintln!("=== CORRECTED ===");
            eprintln!("Driver action: {} ({})", prior, prior.name());
            eprintln!("Corrected action: {} ({})", action, action.name());
            if *repaired {
                eprintln!("Action recovered by output checking");
            }
            eprintln!();
            println!("{}", critique);
        }
        Correction::Unchanged { action } => {
            eprintln!();
            eprintln!("=== UNCHANGED ===");
            eprintln!("The critic kept action {} ({})", action, action.name());
        }
        Correction::Unrecoverable { attempts } => {
            eprintln!();
            eprintln!("=== UNRECOVERABLE ===");
            eprintln!("No valid action after {} output check(s)", attempts);
        }
    }
}
