use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use mule_analysis::{
    analyze, pattern_breakdown, risk_distribution, validate_result, AnalysisConfig, DetectorError,
    EngineError, RiskBand, RiskThresholds,
};
use mule_data::ingest::read_transactions_csv;
use mule_data::remote::{RemoteAnalyzer, REMOTE_URL_ENV};
use mule_data::{AnalysisResult, Transaction};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct AppContext {
    remote_url: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "muleguard")]
#[command(about = "Graph-based money-mule detection for transaction exports")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Base URL of a remote analysis service (overrides MULE_REMOTE_URL).
    #[arg(long, global = true)]
    remote_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a transaction CSV for cycles, smurfing, and shell accounts.
    Analyze(AnalyzeArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    /// In-process engine only.
    Local,
    /// Remote service only; never falls back.
    Remote,
    /// Remote service first, local engine on any failure.
    Auto,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Transaction CSV with transaction_id, sender_id, receiver_id, amount, timestamp.
    #[arg(long)]
    input: PathBuf,

    #[arg(long, value_enum, default_value = "local")]
    backend: Backend,

    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Also write the JSON result document to this file.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Fail if any detector did not complete.
    #[arg(long)]
    strict: bool,

    /// Seed for the score jitter.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long)]
    no_cycles: bool,

    #[arg(long)]
    no_smurfing: bool,

    #[arg(long)]
    no_shells: bool,

    /// Wall-clock bound on cycle enumeration in milliseconds; 0 disables it.
    #[arg(long, default_value_t = 30_000)]
    cycle_timeout_ms: u64,

    /// DFS expansion budget for cycle enumeration; 0 disables it.
    #[arg(long, default_value_t = 5_000_000)]
    max_expansions: u64,

    /// Run detectors one after another instead of concurrently.
    #[arg(long)]
    sequential: bool,

    #[arg(long, default_value_t = 85.0)]
    critical_threshold: f64,

    #[arg(long, default_value_t = 65.0)]
    high_threshold: f64,
}

impl AnalyzeArgs {
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        if self.high_threshold > self.critical_threshold {
            return Err(eyre!(
                "invalid thresholds: high {} is greater than critical {}",
                self.high_threshold,
                self.critical_threshold
            ));
        }

        Ok(AnalysisConfig {
            seed: self.seed,
            detect_cycles: !self.no_cycles,
            detect_smurfing: !self.no_smurfing,
            detect_shells: !self.no_shells,
            cycle_deadline: (self.cycle_timeout_ms > 0)
                .then(|| Duration::from_millis(self.cycle_timeout_ms)),
            max_cycle_expansions: (self.max_expansions > 0).then_some(self.max_expansions),
            parallel_detectors: !self.sequential,
            risk_thresholds: RiskThresholds {
                critical: self.critical_threshold,
                high: self.high_threshold,
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext {
        remote_url: cli.remote_url,
    };

    match cli.command {
        Commands::Analyze(args) => handle_analyze(&ctx, args).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Which engine produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Local,
    Remote,
}

impl Source {
    fn label(self) -> &'static str {
        match self {
            Source::Local => "local",
            Source::Remote => "remote",
        }
    }
}

struct Outcome {
    result: AnalysisResult,
    failures: Vec<DetectorError>,
    source: Source,
}

async fn handle_analyze(ctx: &AppContext, args: AnalyzeArgs) -> Result<()> {
    let config = args.analysis_config()?;
    let transactions = read_transactions_csv(&args.input)
        .wrap_err_with(|| format!("failed to load transactions from {}", args.input.display()))?;
    info!(
        transactions = transactions.len(),
        input = %args.input.display(),
        "loaded transactions"
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .wrap_err("failed to create progress style")?,
    );
    pb.set_message(format!("Analyzing {} transactions", transactions.len()));
    pb.enable_steady_tick(Duration::from_millis(120));

    let outcome = match args.backend {
        Backend::Local => run_local(transactions, config.clone()).await,
        Backend::Remote => run_remote(ctx, &transactions).await,
        Backend::Auto => match run_remote(ctx, &transactions).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                pb.suspend(|| {
                    warn!(error = %err, "remote analysis failed; falling back to local engine")
                });
                run_local(transactions, config.clone()).await
            }
        },
    };
    pb.finish_and_clear();
    let outcome = outcome?;

    for failure in &outcome.failures {
        warn!(detector = %failure.detector(), error = %failure, "result is partial");
    }
    if args.strict && !outcome.failures.is_empty() {
        return Err(EngineError::Incomplete {
            failures: outcome.failures,
        })
        .wrap_err("strict mode: analysis did not complete");
    }

    if let Some(path) = &args.out {
        let json = serde_json::to_string_pretty(&outcome.result)
            .wrap_err("failed to serialize result to JSON")?;
        tokio::fs::write(path, json)
            .await
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote result document");
    }

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&outcome.result)
                .wrap_err("failed to serialize result to JSON")?;
            println!("{json}");
        }
        OutputFormat::Table => print_report(&outcome, &config.risk_thresholds),
    }

    Ok(())
}

async fn run_local(transactions: Vec<Transaction>, config: AnalysisConfig) -> Result<Outcome> {
    let report = tokio::task::spawn_blocking(move || analyze(&transactions, &config))
        .await
        .wrap_err("local analysis task failed")?
        .wrap_err("local analysis failed")?;

    let failures = report.failures().to_vec();
    Ok(Outcome {
        result: report.result,
        failures,
        source: Source::Local,
    })
}

async fn run_remote(ctx: &AppContext, transactions: &[Transaction]) -> Result<Outcome> {
    let remote = match ctx.remote_url.as_deref() {
        Some(url) => RemoteAnalyzer::new(url)?,
        None => RemoteAnalyzer::from_env().ok_or_else(|| {
            eyre!("{REMOTE_URL_ENV} or --remote-url is required for the remote backend")
        })??,
    };
    let result = remote.analyze(transactions).await?;
    validate_result(&result).wrap_err("remote service returned an invalid result")?;

    Ok(Outcome {
        result,
        failures: Vec::new(),
        source: Source::Remote,
    })
}

fn print_report(outcome: &Outcome, thresholds: &RiskThresholds) {
    let result = &outcome.result;

    if result.suspicious_accounts.is_empty() {
        println!("No suspicious accounts detected.");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Account", "Score", "Band", "Patterns", "Ring"]);
        for account in &result.suspicious_accounts {
            table.add_row(vec![
                account.account_id.clone(),
                format!("{:.1}", account.suspicion_score),
                RiskBand::classify(account.suspicion_score, thresholds).to_string(),
                account.detected_patterns.join(", "),
                account.ring_id.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        println!("{table}");
    }

    if !result.fraud_rings.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Ring", "Pattern", "Risk", "Size", "Members"]);
        for ring in &result.fraud_rings {
            table.add_row(vec![
                ring.ring_id.clone(),
                ring.pattern_type.clone(),
                format!("{:.1}", ring.risk_score),
                ring.member_accounts.len().to_string(),
                ring.member_accounts.join(" -> "),
            ]);
        }
        println!("{table}");
    }

    let dist = risk_distribution(result, thresholds);
    let patterns = pattern_breakdown(result);
    let summary = &result.summary;
    let completeness = if outcome.failures.is_empty() {
        "complete".to_string()
    } else {
        format!("partial ({} detector failure(s))", outcome.failures.len())
    };

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Backend", outcome.source.label()]);
    table.add_row(vec!["Completeness", &completeness]);
    table.add_row(vec![
        "Accounts Analyzed",
        &summary.total_accounts_analyzed.to_string(),
    ]);
    table.add_row(vec![
        "Suspicious Accounts",
        &summary.suspicious_accounts_flagged.to_string(),
    ]);
    table.add_row(vec![
        "Fraud Rings",
        &summary.fraud_rings_detected.to_string(),
    ]);
    table.add_row(vec![
        "Processing Time",
        &format!("{:.2}s", summary.processing_time_seconds),
    ]);
    table.add_row(vec![
        "Risk Bands (critical / high / medium)",
        &format!("{} / {} / {}", dist.critical, dist.high, dist.medium),
    ]);
    table.add_row(vec![
        "Pattern Tags (cycle / smurfing / shell / other)",
        &format!(
            "{} / {} / {} / {}",
            patterns.cycles, patterns.smurfing, patterns.shell, patterns.other
        ),
    ]);
    println!("{table}");
}
