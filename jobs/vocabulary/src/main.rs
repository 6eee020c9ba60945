use anyhow::{Context, Result};
use clap::Parser;
use glossa::constants::DEFAULT_MAX_TOKEN_LEN;
use glossa::{ExecutionContext, JobConfig, RuntimeOptions, VocabularyJob, WordTokenizer};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Build the distinct word vocabulary of a line-oriented text corpus.
#[derive(Parser, Debug)]
#[command(name = "vocabulary", version)]
struct Args {
    /// Input file or directory (path or file:// URI)
    #[arg(long)]
    input: String,
    /// Output directory; replaced on every run
    #[arg(long)]
    output: String,
    /// Longer words are cut into chunks of this many characters
    #[arg(long, default_value_t = DEFAULT_MAX_TOKEN_LEN)]
    max_token_len: usize,
    /// Print the job report as JSON on stdout
    #[arg(long)]
    report: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config = JobConfig::new(&args.input, &args.output).context("invalid job configuration")?;
    let ctx = ExecutionContext::start(RuntimeOptions::from_env()).context("starting execution context")?;
    let job = VocabularyJob::with_tokenizer(config, WordTokenizer::new(args.max_token_len));
    let result = job.run(&ctx);
    ctx.stop();
    let report = result.with_context(|| format!("vocabulary job {} -> {}", args.input, args.output))?;

    info!(distinct = report.distinct_tokens(), wall_ms = report.wall_ms, output = %report.output, "Vocabulary written");
    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
