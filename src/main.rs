//! Document anonymization CLI.
//!
//! This binary provides a command-line interface for the anonymiseur
//! library: batch anonymization by default, plus `extract` and `classify`
//! subcommands for inspecting a single document.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use anonymiseur::{load_config, AccountMaskPolicy, Anonymizer, Document};

/// Document anonymizer
///
/// Anonymize ledger exports (FEC), payroll declarations (DSN), PDF and DOCX
/// files. Each input is written to the output directory under a prefixed
/// name; inputs are never modified.
#[derive(Parser)]
#[command(name = "anonymiseur")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// Ledger account masking: prefix, prefix:N or full
    #[arg(long, value_name = "POLICY")]
    account_mask: Option<AccountMaskPolicy>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Documents to anonymize
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the text of a document (for debugging and verification)
    Extract {
        /// Input file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output text file (optional, defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print the document type and detected categories without writing output
    Classify {
        /// Input file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}

/// Command handler owning the configured pipeline.
struct AnonymizeHandler {
    anonymizer: Anonymizer,
    verbose: bool,
}

impl AnonymizeHandler {
    fn new(config: Option<&Path>, account_mask: Option<AccountMaskPolicy>, verbose: bool) -> Result<Self> {
        let config = load_config(config).context("Failed to load configuration")?;
        let mut anonymizer =
            Anonymizer::from_config(&config).context("Failed to set up the anonymizer")?;
        if let Some(policy) = account_mask {
            anonymizer = anonymizer.with_account_mask(policy);
        }
        Ok(Self {
            anonymizer,
            verbose,
        })
    }

    /// Anonymizes every file; returns false if any of them failed.
    fn anonymize(&self, files: &[PathBuf], output_dir: &Path) -> Result<bool> {
        if files.is_empty() {
            anyhow::bail!("No input files. Pass one or more FILES, or use a subcommand.");
        }

        if self.verbose {
            println!("Output directory: {}", output_dir.display());
            println!("Files: {}", files.len());
        }

        let report = self.anonymizer.anonymize_batch(files, output_dir);
        for outcome in &report.outcomes {
            if outcome.is_failure() {
                println!("✗ {}", outcome);
            } else {
                println!("✓ {}", outcome);
            }
        }

        if self.verbose {
            println!("\nSummary:");
            println!("  Written: {}", report.written());
            println!("  Failed:  {}", report.failed());
            println!("  Redactions: {}", report.total_redactions());
        }

        Ok(report.is_success())
    }

    /// Extracts the text of a document.
    fn extract(&self, input: &Path, output: Option<&Path>) -> Result<()> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }

        let document = Document::from_path(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let text = self
            .anonymizer
            .extract_text(&document)
            .with_context(|| "Text extraction failed")?;

        if let Some(output_path) = output {
            std::fs::write(output_path, &text)
                .with_context(|| format!("Failed to write to {}", output_path.display()))?;
            println!(
                "✓ Extracted {} characters → {}",
                text.chars().count(),
                output_path.display()
            );
        } else {
            println!("{}", text);
        }

        Ok(())
    }

    /// Prints what the pipeline would detect in a document.
    fn classify(&self, input: &Path) -> Result<()> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }

        let document = Document::from_path(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let classification = self
            .anonymizer
            .classify(&document)
            .with_context(|| "Classification failed")?;

        println!("Format: {}", classification.format);
        match classification.document_type {
            Some(document_type) => println!("Document type: {}", document_type),
            None => println!("Document type: structured export"),
        }
        if classification.categories.is_empty() {
            println!("⚠ Nothing to anonymize");
        }
        for (category, count) in &classification.categories {
            println!("  {}: {}", category, count);
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    anonymiseur::logging::init_logging(cli.verbose, cli.json_logs)
        .context("Failed to initialize logging")?;

    let handler = AnonymizeHandler::new(cli.config.as_deref(), cli.account_mask, cli.verbose)?;

    match &cli.command {
        Some(Commands::Extract { input, output }) => {
            handler.extract(input, output.as_deref())?;
        }
        Some(Commands::Classify { input }) => {
            handler.classify(input)?;
        }
        None => {
            if !handler.anonymize(&cli.files, &cli.output)? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
