use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use patchbench::config::{BatchConfig, LlmConfig};
use patchbench::llm::{ChatClient, Invoker, RetryPolicy};
use patchbench::pipeline::{annotate_records, generate_variants, patch_insecure_records};
use patchbench::record::{patched_to_inputs, read_records_file, write_records_file};
use patchbench::stats::{coverage_of_records, ratio_of_records};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "patchbench",
    about = "Batch security annotation and vulnerability-preserving patch variants",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// Base URL of the completion service, e.g. https://api.deepseek.com/
    #[arg(long)]
    base_url: String,

    /// Bearer token; falls back to $PATCHBENCH_API_KEY
    #[arg(long)]
    api_key: Option<String>,

    /// Model identifier forwarded to the service
    #[arg(long)]
    model: String,

    /// Token budget per completion
    #[arg(long, default_value_t = 2048)]
    max_tokens: u32,

    /// Ceiling on in-flight requests
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Attempts per request, first call included
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Whole-request timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

impl LlmArgs {
    fn build(&self) -> Result<(Invoker<ChatClient>, BatchConfig)> {
        let api_key = match &self.api_key {
            Some(key) => key.clone(),
            None => std::env::var("PATCHBENCH_API_KEY")
                .context("no API key: pass --api-key or set PATCHBENCH_API_KEY")?,
        };
        let mut config = LlmConfig::new(self.base_url.clone(), api_key, self.model.clone());
        config.max_tokens = self.max_tokens;
        config.request_timeout = Duration::from_secs(self.timeout_secs);

        let client = ChatClient::new(config).context("failed to build HTTP client")?;
        let policy = RetryPolicy {
            max_attempts: self.max_attempts,
            ..RetryPolicy::default()
        };
        Ok((
            Invoker::new(client, policy),
            BatchConfig::with_concurrency(self.concurrency),
        ))
    }
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Input JSON file (array of records, or a wrapper object)
    #[arg(long)]
    input: PathBuf,

    /// Output JSON file
    #[arg(long)]
    output: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate records with a security verdict under `answer`
    Annotate {
        #[command(flatten)]
        llm: LlmArgs,
        #[command(flatten)]
        io: IoArgs,
        /// Record field holding the code to analyze
        #[arg(long, default_value = "input")]
        source_field: String,
    },
    /// Generate one full patch per insecure record
    Patch {
        #[command(flatten)]
        llm: LlmArgs,
        #[command(flatten)]
        io: IoArgs,
    },
    /// Expand insecure records into vulnerability-preserving variants
    Variants {
        #[command(flatten)]
        llm: LlmArgs,
        #[command(flatten)]
        io: IoArgs,
    },
    /// Turn `patched_code` fields into second-pass annotation inputs
    RescorePrep {
        #[command(flatten)]
        io: IoArgs,
    },
    /// Report the insecure ratio over annotated records
    Ratio {
        #[arg(long)]
        input: PathBuf,
    },
    /// Report per-index secure coverage over re-scored variants
    Coverage {
        #[arg(long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Command::Annotate {
            llm,
            io,
            source_field,
        } => {
            let (invoker, batch) = llm.build()?;
            let records = read_records_file(&io.input)?;
            info!(count = records.len(), input = %io.input.display(), "loaded records");
            let outcome = annotate_records(records, &invoker, &batch, &source_field).await;
            write_records_file(&io.output, &outcome.records)?;
            info!(
                written = outcome.records.len(),
                coerced = outcome.coerced,
                failed = outcome.failed,
                output = %io.output.display(),
                elapsed_secs = start.elapsed().as_secs_f64(),
                "annotation run complete"
            );
        }
        Command::Patch { llm, io } => {
            let (invoker, batch) = llm.build()?;
            let records = read_records_file(&io.input)?;
            info!(count = records.len(), input = %io.input.display(), "loaded records");
            let outcome = patch_insecure_records(records, &invoker, &batch).await;
            write_records_file(&io.output, &outcome.records)?;
            info!(
                written = outcome.records.len(),
                skipped = outcome.skipped,
                failed = outcome.failed,
                output = %io.output.display(),
                elapsed_secs = start.elapsed().as_secs_f64(),
                "patch run complete"
            );
        }
        Command::Variants { llm, io } => {
            let (invoker, batch) = llm.build()?;
            let records = read_records_file(&io.input)?;
            info!(count = records.len(), input = %io.input.display(), "loaded records");
            let summary = generate_variants(records, &invoker, &batch).await;
            write_records_file(&io.output, &summary.records)?;
            info!(
                written = summary.records.len(),
                expanded = summary.expanded,
                no_vulns_found = summary.no_vulns_found,
                failed = summary.failed,
                output = %io.output.display(),
                elapsed_secs = start.elapsed().as_secs_f64(),
                "variant run complete"
            );
        }
        Command::RescorePrep { io } => {
            let records = read_records_file(&io.input)?;
            let inputs = patched_to_inputs(&records);
            if inputs.is_empty() {
                anyhow::bail!("no 'patched_code' fields found in {}", io.input.display());
            }
            write_records_file(&io.output, &inputs)?;
            info!(
                written = inputs.len(),
                output = %io.output.display(),
                "rescore inputs generated"
            );
        }
        Command::Ratio { input } => {
            let records = read_records_file(&input)?;
            let stats = ratio_of_records(&records);
            println!("Insecure (a/num)\tPercent");
            println!("{}/{}\t{:.2}%", stats.a, stats.num, stats.pct());
        }
        Command::Coverage { input } => {
            let records = read_records_file(&input)?;
            let coverage = coverage_of_records(&records);
            println!("Coverage (a/num)\tPercent");
            println!("{}/{}\t{:.2}%", coverage.a(), coverage.num(), coverage.pct());
        }
    }

    Ok(())
}
