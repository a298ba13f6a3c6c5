//! `claimdesk`: analyze warranty claim documents from the command line.
//!
//! ```text
//! claimdesk analyze claim.txt --rules rules.yaml --config claimdesk.yaml
//! claimdesk prompt claim.txt --rules rules.yaml --level 1
//! claimdesk providers
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); results go to stdout.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use claimdesk_core::{AnalysisResult, EmailLanguage, RuleBook};
use claimdesk_runtime::{
    level_prompt, AnalysisReport, DocumentAnalyzer, LlmUsage, ProviderRegistry, RuntimeConfig,
};

#[derive(Debug, Parser)]
#[command(name = "claimdesk", version, about = "Warranty claim document analysis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a claim document with the configured model providers
    Analyze {
        /// Extracted claim text (UTF-8)
        document: PathBuf,

        /// Rule book (YAML, or JSON by extension)
        #[arg(long, value_name = "FILE")]
        rules: PathBuf,

        /// Runtime config (YAML, or JSON by extension)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Override the email language from the config
        #[arg(long, value_enum)]
        language: Option<Language>,
    },

    /// Print the prompt for one budget level without calling any provider
    Prompt {
        document: PathBuf,

        #[arg(long, value_name = "FILE")]
        rules: PathBuf,

        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Budget level index (0 = most generous)
        #[arg(long, default_value_t = 0)]
        level: usize,
    },

    /// List the provider types compiled into this build
    Providers,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Full report as pretty JSON
    Json,
    /// Full report as YAML
    Yaml,
    /// Human-readable decision summary
    Summary,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Language {
    Tr,
    En,
}

impl From<Language> for EmailLanguage {
    fn from(language: Language) -> Self {
        match language {
            Language::Tr => EmailLanguage::Turkish,
            Language::En => EmailLanguage::English,
        }
    }
}

/// Serialized shape of a finished analysis.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportOutput<'a> {
    result: &'a AnalysisResult,
    budget_level: usize,
    provider: &'a str,
    attempts: u32,
    usage: &'a LlmUsage,
}

impl<'a> From<&'a AnalysisReport> for ReportOutput<'a> {
    fn from(report: &'a AnalysisReport) -> Self {
        Self {
            result: &report.result,
            budget_level: report.level,
            provider: &report.provider,
            attempts: report.attempts,
            usage: &report.usage,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            document,
            rules,
            config,
            format,
            language,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(language) = language {
                config.email_language = language.into();
            }
            let text = read_document(&document)?;
            let book = load_rules(&rules)?;

            let analyzer = DocumentAnalyzer::from_config(config, &ProviderRegistry::with_defaults())
                .context("Failed to configure model providers")?;
            let report = analyzer
                .analyze_with_report(&text, &book)
                .await
                .with_context(|| format!("Analysis of {} failed", document.display()))?;

            print_report(&report, format)?;
        }

        Command::Prompt {
            document,
            rules,
            config,
            level,
        } => {
            let config = load_config(config.as_deref())?;
            let text = read_document(&document)?;
            let book = load_rules(&rules)?;

            let Some(budget) = config.budgets.get(level) else {
                bail!(
                    "Budget level {} does not exist; the schedule has {} levels",
                    level,
                    config.budgets.len()
                );
            };

            let prompt = level_prompt(&config, &text, &book, budget);
            println!("===== SYSTEM =====\n{}", prompt.system_instruction);
            println!("===== USER =====\n{}", prompt.user_prompt);
            tracing::info!(
                level,
                chars = prompt.total_chars(),
                max_output_tokens = budget.max_output_tokens,
                "Prompt rendered"
            );
        }

        Command::Providers => {
            let registry = ProviderRegistry::with_defaults();
            for factory in registry.factories() {
                println!(
                    "{:<12} {:<20} {}",
                    factory.provider_type(),
                    factory.default_model(),
                    factory.description()
                );
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn load_rules(path: &Path) -> Result<RuleBook> {
    let book = RuleBook::from_path(path)
        .with_context(|| format!("Failed to load rules {}", path.display()))?
        .or_default_warranty();
    tracing::info!(
        binder = book.binder_version(),
        warranty_rules = book.warranty.len(),
        contract_packages = book.contracts.len(),
        "Rules loaded"
    );
    Ok(book)
}

fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))
}

fn print_report(report: &AnalysisReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&ReportOutput::from(report))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&ReportOutput::from(report))?;
            print!("{yaml}");
        }
        OutputFormat::Summary => print_summary(report),
    }
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    let result = &report.result;
    println!("{}", result.case_title());
    println!("  VIN:                {}", result.vin);
    println!("  Vehicle age:        {} months", result.vehicle_age_months);
    println!("  Repair km:          {}", result.repair_km);
    println!(
        "  Base warranty:      {} ({})",
        result.warranty_decision.as_str(),
        if result.is_within_base_warranty { "within" } else { "outside" }
    );
    println!(
        "  Contract:           {} [{}]",
        result.contract_decision.as_str(),
        result.contract_package_name.as_deref().unwrap_or("none")
    );
    if !result.contract_covered_parts.is_empty() {
        println!("  Covered parts:      {}", result.contract_covered_parts.join(", "));
    }
    println!("  Failure cause:      {}", result.failure_cause.preferred());
    println!(
        "  Answered by:        {} at level {} after {} attempt(s)",
        report.provider, report.level, report.attempts
    );
    println!(
        "  Usage:              {} tokens, ~${:.4}",
        report.usage.total_tokens, report.usage.estimated_cost
    );
    println!();
    println!("Subject: {}", result.email_subject);
    println!();
    println!("{}", result.email_body);
}
