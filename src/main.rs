//! PhishGuard - Main Entry Point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use phishguard_core::constants::{APP_NAME, APP_VERSION};
use phishguard_core::logic::maintenance::MaintenanceReport;
use phishguard_core::{Correctness, EngineConfig, EngineState, ScanResult, Verdict};

#[derive(Parser)]
#[command(name = "phishguard")]
#[command(about = "Hybrid continual-learning phishing detector", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file (missing keys take defaults)
    #[arg(short, long, env = "PHISHGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a URL and explain the verdict
    Scan {
        url: String,
    },
    /// Report whether a shown verdict was right
    Feedback {
        url: String,
        /// Verdict that was shown (threat | benign | -1 | 1)
        #[arg(long, allow_hyphen_values = true)]
        shown: Verdict,
        /// correct | incorrect
        #[arg(long)]
        tag: Correctness,
    },
    /// Run the maintenance pipeline now
    Maintain,
    /// Show engine status
    Status,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let mut config = EngineConfig::resolve(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let engine = EngineState::init(config);

    let outcome = run(&engine, cli.command, cli.json);

    // A run started by feedback must finish before the process exits
    if let Some(report) = engine.shutdown() {
        print_report(&report, cli.json)?;
    }

    outcome
}

fn run(engine: &EngineState, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Scan { url } => {
            let result = engine.scan(&url)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_scan(&result);
            }
        }
        Commands::Feedback { url, shown, tag } => {
            let receipt = engine.feedback(&url, shown, tag)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                println!("Recorded: {} is {}", url, receipt.true_label);
                println!(
                    "Pending feedback: {}/{}",
                    receipt.pending,
                    engine.config().feedback_threshold
                );
                if receipt.maintenance_started {
                    println!("Threshold reached, maintenance running...");
                }
            }
        }
        Commands::Maintain => {
            let report = engine.maintain()?;
            print_report(&report, json)?;
        }
        Commands::Status => {
            let status = engine.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{} v{}", APP_NAME, APP_VERSION);
                println!("Feature layout: v{} ({:08x}), {} features", status.feature_version, status.layout_hash, status.feature_count);
                println!(
                    "Agent: {} (safe {}, phish {}, {} updates)",
                    if status.agent.fitted { "trained" } else { "cold" },
                    status.agent.safe_memory,
                    status.agent.phish_memory,
                    status.agent.updates
                );
                match status.model.version {
                    Some(v) => println!("Batch model: {}", v),
                    None => println!("Batch model: none"),
                }
                println!("Feedback: {}/{}", status.feedback.pending, status.feedback.threshold);
            }
        }
    }
    Ok(())
}

fn print_scan(result: &ScanResult) {
    let c = &result.classification;
    match &result.final_url {
        Some(landed) if landed != &result.url => println!("{} -> {}", result.url, landed),
        _ => println!("{}", result.url),
    }
    println!("  Verdict: {} ({:?}, confidence {:.0}%)", c.verdict, c.source, c.confidence * 100.0);
    println!("  Features: {}", result.features);
    for risk in result.explanation.risk_messages() {
        println!("  [risk] {}", risk);
    }
    for safe in result.explanation.safeguard_messages() {
        println!("  [safe] {}", safe);
    }
}

fn print_report(report: &MaintenanceReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Maintenance: {}", report.final_state);
    println!(
        "  Feedback: {} read, {} used, {} unreachable",
        report.records_read, report.extracted, report.defaulted
    );
    println!("  Previous accuracy: {:.2}%", report.baseline_accuracy * 100.0);
    if let Some(new) = report.new_accuracy {
        println!("  New accuracy:      {:.2}%", new * 100.0);
    }
    if let Some(reason) = report.rejection_reason() {
        println!("  Reason: {}", reason);
    }
    Ok(())
}
