//! scope-harness CLI
//!
//! Release gate for the analysis service:
//! 1. Health check (aborts with exit code 2 if the service is down)
//! 2. Submit, poll and verify every configured case
//! 3. Optionally probe the API contract
//! 4. Write `report.json` + `summary.md` and exit 0 for GO, 1 for NO-GO
//!
//! Usage:
//!   scope-harness run --base-url http://localhost:8000/api --probes
//!   scope-harness run --config harness.yaml --case-file cases.yaml --json
//!   scope-harness probe --job-id 5f0c...
//!   scope-harness list --case-file cases.yaml

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::watch;

use scope_harness::api::{HttpAnalysisClient, JobHandle};
use scope_harness::checks::CheckRegistry;
use scope_harness::harness::runner::preflight;
use scope_harness::harness::{
    load_suite, run_contract_probes, HarnessRunner, ProbeResult, TerminalJob, TestCase, TestResult,
    TestStatus,
};
use scope_harness::report::{BatchReport, Recommendation};
use scope_harness::sink::JsonlFileSink;
use scope_harness::HarnessConfig;

const EXIT_PREFLIGHT: i32 = 2;

/// Job verification harness for the analysis service
#[derive(Parser, Debug)]
#[command(name = "scope-harness")]
#[command(about = "Submit, poll and verify analysis jobs; gate releases on the success rate")]
struct Cli {
    /// Harness configuration file (YAML)
    #[arg(long, short = 'c', global = true, env = "SCOPE_HARNESS_CONFIG")]
    config: Option<PathBuf>,

    /// Service base URL (overrides config and SCOPE_HARNESS_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every case and write the readiness report
    Run {
        /// Suite file with cases (replaces the configured cases)
        #[arg(long)]
        case_file: Option<PathBuf>,

        /// Success-rate percentage required for GO
        #[arg(long)]
        threshold: Option<f64>,

        /// Directory for report.json, summary.md and logs
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,

        /// Also run the contract probes
        #[arg(long)]
        probes: bool,

        /// Print the machine-readable report instead of progress
        #[arg(long)]
        json: bool,
    },

    /// Run only the contract probes
    Probe {
        /// Terminal job id for the status-stability probe
        #[arg(long)]
        job_id: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the cases a run would execute
    List {
        #[arg(long)]
        case_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "ERROR:".red().bold(), e);
            EXIT_PREFLIGHT
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let mut config = HarnessConfig::resolve(cli.config.as_deref())
        .context("Failed to load harness configuration")?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }

    match cli.command {
        Command::Run {
            case_file,
            threshold,
            output_dir,
            probes,
            json,
        } => {
            if let Some(t) = threshold {
                config.pass_threshold = t;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            config.contract_probes |= probes;
            let cases = select_cases(&config, case_file.as_deref())?;
            config.validate()?;
            run(config, cases, json).await
        }
        Command::Probe { job_id, json } => {
            config.validate()?;
            probe(config, job_id, json).await
        }
        Command::List { case_file } => {
            let cases = select_cases(&config, case_file.as_deref())?;
            for case in &cases {
                println!(
                    "{:<32} {:<10} {:<24} {}",
                    case.label().cyan(),
                    case.platform,
                    if case.handle.is_empty() { "(empty)" } else { case.handle.as_str() },
                    case.expected.as_str()
                );
            }
            Ok(0)
        }
    }
}

fn select_cases(config: &HarnessConfig, case_file: Option<&std::path::Path>) -> Result<Vec<TestCase>> {
    match case_file {
        Some(path) => Ok(load_suite(path)
            .with_context(|| format!("Failed to load cases from {}", path.display()))?
            .cases),
        None => Ok(config.cases.clone()),
    }
}

fn client(config: &HarnessConfig) -> Result<HttpAnalysisClient> {
    HttpAnalysisClient::new(&config.base_url, config.request_timeout())
        .context("Failed to create HTTP client")
}

/// Ctrl-C flips the returned receiver to `true`.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} finishing current case, skipping the rest", "Interrupted:".yellow().bold());
            let _ = tx.send(true);
        }
    });
    rx
}

async fn run(config: HarnessConfig, cases: Vec<TestCase>, json: bool) -> Result<i32> {
    let api = Arc::new(client(&config)?);

    if let Err(e) = preflight(api.as_ref(), &config.base_url).await {
        eprintln!("{} {}", "PRE-FLIGHT FAILED:".red().bold(), e);
        return Ok(EXIT_PREFLIGHT);
    }

    let results_log = JsonlFileSink::new(config.results_log_path());
    let failure_log = JsonlFileSink::new(config.failure_log_path());
    let runner = HarnessRunner::new(
        api.clone(),
        config.poll.clone(),
        CheckRegistry::standard(config.checks.clone()),
    )
    .with_sinks(Arc::new(results_log), Arc::new(failure_log))
    .with_shutdown(shutdown_signal());

    if !json {
        println!(
            "\n{} {} case(s) against {}",
            "Running".cyan().bold(),
            cases.len(),
            config.base_url
        );
    }

    let total = cases.len();
    let results = runner
        .run_batch_with(&cases, |idx, result| {
            if !json {
                print_case(idx, total, result);
            }
        })
        .await;

    let probes = if config.contract_probes {
        let terminal_job = stable_probe_job(&results);
        run_contract_probes(api.as_ref(), terminal_job.as_ref(), config.probe_repeats).await
    } else {
        Vec::new()
    };

    let report = BatchReport::build(
        runner.run_id(),
        &config.base_url,
        results,
        probes,
        config.pass_threshold,
    );
    let written = report
        .persist(&config.output_dir)
        .with_context(|| format!("Failed to write report to {}", config.output_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_probes(&report.probes);
        print_summary(&report);
        println!("\n{} {}", "Report:".cyan(), written.report.display());
        println!("{} {}", "Summary:".cyan(), written.summary.display());
        println!("{} {}", "Failure log:".cyan(), config.failure_log_path().display());
    }

    Ok(report.exit_code())
}

/// A job from this batch that reached a terminal state, with that state.
fn stable_probe_job(results: &[TestResult]) -> Option<TerminalJob> {
    results
        .iter()
        .filter(|r| matches!(r.status, TestStatus::Passed | TestStatus::Failed))
        .find_map(|r| {
            let job = JobHandle::new(r.job_id.as_deref()?);
            Some(TerminalJob::new(job, r.terminal_state?))
        })
}

async fn probe(config: HarnessConfig, job_id: Option<String>, json: bool) -> Result<i32> {
    let api = client(&config)?;
    if let Err(e) = preflight(&api, &config.base_url).await {
        eprintln!("{} {}", "PRE-FLIGHT FAILED:".red().bold(), e);
        return Ok(EXIT_PREFLIGHT);
    }

    let job = job_id.map(|id| TerminalJob::unobserved(JobHandle::new(id)));
    let probes = run_contract_probes(&api, job.as_ref(), config.probe_repeats).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&probes)?);
    } else {
        print_probes(&probes);
    }
    Ok(if probes.iter().all(|p| p.passed) { 0 } else { 1 })
}

fn print_case(idx: usize, total: usize, result: &TestResult) {
    let status = match result.status {
        TestStatus::Passed => "PASS".green().bold(),
        TestStatus::Failed => "FAIL".red().bold(),
        TestStatus::Timeout => "TIMEOUT".yellow().bold(),
        TestStatus::CriticalError => "ERROR".red().bold(),
        TestStatus::Cancelled => "CANCELLED".yellow(),
    };
    println!(
        "[{}/{}] {} {} ({}, {}ms)",
        idx + 1,
        total,
        status,
        result.case.label(),
        result.data_completeness.as_deref().unwrap_or("-"),
        result.duration_ms
    );
    for outcome in result.failed_checks() {
        println!("    {} {}: {}", "✗".red(), outcome.check, outcome.detail);
    }
    if let Some(error) = result.error.as_ref().filter(|_| !result.passed()) {
        println!("    {} {}", "↳".dimmed(), error);
    }
}

fn print_probes(probes: &[ProbeResult]) {
    if probes.is_empty() {
        return;
    }
    println!("\n{}", "Contract probes".cyan().bold());
    for p in probes {
        let mark = if p.skipped {
            "SKIP".yellow()
        } else if p.passed {
            "PASS".green()
        } else {
            "FAIL".red()
        };
        println!("  {} {}: {}", mark, p.probe, p.detail);
    }
}

fn print_summary(report: &BatchReport) {
    let t = &report.totals;
    println!("\n{}", "═".repeat(60));
    println!("{}", "LAUNCH READINESS".bold());
    println!("{}", "═".repeat(60));
    println!(
        "  Passed {}  Failed {}  Timeout {}  Critical {}  Cancelled {}",
        t.passed.to_string().green(),
        t.failed.to_string().red(),
        t.timeout.to_string().yellow(),
        t.critical_error.to_string().red(),
        t.cancelled
    );
    println!(
        "  Success rate: {:.1}% (threshold {:.1}%)",
        report.success_rate, report.pass_threshold
    );
    let c = &report.calibration;
    println!(
        "  Calibration: {} compliant / {} non-compliant / {} not evaluated",
        c.compliant, c.non_compliant, c.not_evaluated
    );
    println!(
        "  Confidence recalibrated: {}/{}",
        report.confidence_recalibrated, t.total
    );
    if !report.epistemic_distribution.is_empty() {
        let states: Vec<String> = report
            .epistemic_distribution
            .iter()
            .map(|(state, count)| format!("{} {}", state, count))
            .collect();
        println!("  Epistemic state: {}", states.join(", "));
    }
    println!("  PII-safe: {}/{}", report.pii_safe, t.total);

    let recommendation = match report.recommendation {
        Recommendation::Go => report.recommendation.as_str().green().bold(),
        Recommendation::NoGo => report.recommendation.as_str().red().bold(),
    };
    println!("\n  RECOMMENDATION: {}", recommendation);
    if !report.probes_passed() {
        println!("  {}", "Contract probes failed".red());
    }
}
