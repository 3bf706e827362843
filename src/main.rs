use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use reviewlens::config::Config;
use reviewlens::error::ReviewError;
use reviewlens::inference::adapter::{topic_labels, InferenceAdapter};
use reviewlens::output::terminal;
use reviewlens::pipeline::evaluate::{run_evaluation, EvaluationOptions};
use reviewlens::reviews::loader::{load_reviews, ReviewSource};
use reviewlens::reviews::normalize::{clean_comment, preprocess_reviews};

/// reviewlens: sentiment and topic analysis for student course reviews.
///
/// Reads a JSON corpus of reviews grouped by professor, cleans each
/// comment, and classifies it by sentiment and teaching topic.
#[derive(Parser)]
#[command(name = "reviewlens", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and clean a review file, then show the first rows
    Preview {
        /// Review JSON file ("-" for stdin; default: REVIEWLENS_INPUT or all_reviews.json)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Number of rows to show
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Analyze a single review for sentiment and topic
    Analyze {
        /// Review JSON file ("-" for stdin)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Row of the cleaned table to analyze
        #[arg(long, default_value = "0", conflicts_with = "text")]
        index: usize,

        /// Analyze this text instead of a row from the input file
        #[arg(long)]
        text: Option<String>,
    },

    /// Run sentiment and topic analysis on every review and export a table
    Evaluate {
        /// Review JSON file ("-" for stdin)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Destination file (default: REVIEWLENS_OUTPUT or evaluated_reviews.csv)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also export one score column per topic
        #[arg(long)]
        topic_scores: bool,

        /// Rows to preview after the run
        #[arg(long, default_value = "5")]
        preview: usize,
    },

    /// Download the ONNX sentiment and zero-shot models (~480 MB)
    DownloadModel,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("reviewlens=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Preview { input, limit } => {
            let source = resolve_source(input, &config)?;
            let raw = load_reviews(&source).map_err(report)?;
            let cleaned = preprocess_reviews(&raw);

            println!(
                "Loaded {} reviews from {} ({} with comments).",
                raw.len(),
                source,
                cleaned.len()
            );
            terminal::display_preview(&cleaned, limit);
        }

        Commands::Analyze { input, index, text } => {
            let comment = match text {
                Some(text) => clean_comment(&text),
                None => {
                    let source = resolve_source(input, &config)?;
                    let cleaned = preprocess_reviews(&load_reviews(&source).map_err(report)?);
                    let record = cleaned.get(index).with_context(|| {
                        format!(
                            "Row {index} out of range: {} has {} reviews with comments",
                            source,
                            cleaned.len()
                        )
                    })?;
                    record.cleaned_comment.clone().unwrap_or_default()
                }
            };

            let adapter = InferenceAdapter::from_config(&config)?;
            let sentiment = adapter.analyze_sentiment(&comment).await;
            let topics = adapter.classify_topics(&comment, &topic_labels()).await;

            terminal::display_analysis(&comment, &sentiment, &topics);
        }

        Commands::Evaluate {
            input,
            output,
            topic_scores,
            preview,
        } => {
            let source = resolve_source(input, &config)?;
            let output = output.unwrap_or_else(|| config.output_path.clone());

            let adapter = InferenceAdapter::from_config(&config)?;
            let options = EvaluationOptions {
                include_topic_scores: topic_scores,
                show_progress: true,
                ..Default::default()
            };

            println!("Running analysis on {}...", source);
            let evaluated = run_evaluation(&source, &output, &adapter, &options)
                .await
                .map_err(report)?;

            terminal::display_evaluation_summary(&evaluated, &output, preview);
        }

        Commands::DownloadModel => {
            let model_dir = &config.model_dir;

            println!("Downloading ONNX models...");
            println!("  Destination: {}", model_dir.display());

            reviewlens::inference::download::download_models(model_dir).await?;

            println!("\n{}", "Models downloaded successfully.".bold());
            println!("You can now run `reviewlens analyze` or `reviewlens evaluate`.");
        }
    }

    Ok(())
}

/// Pick the input file (CLI flag, then config default). "-" reads stdin.
fn resolve_source(input: Option<PathBuf>, config: &Config) -> Result<ReviewSource> {
    let path = input.unwrap_or_else(|| config.input_path.clone());
    if path == Path::new("-") {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read reviews from stdin")?;
        info!(bytes = bytes.len(), "Read reviews from stdin");
        return Ok(ReviewSource::from_bytes("<stdin>", bytes));
    }
    Ok(ReviewSource::from_path(path))
}

/// Prefix pipeline errors with their kind for the user.
fn report(err: ReviewError) -> anyhow::Error {
    anyhow::anyhow!("{}: {}", err.kind(), err)
}
