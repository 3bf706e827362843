// Batch evaluation: score every review in a dataset and export the results.
//
// load → clean → sentiment + topic per row → write table. Rows are processed
// one at a time in source order so the output lines up with the input. A
// failed model call only empties that row's predictions; bad input or a
// failed write aborts the run before anything is written.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::error::ReviewError;
use crate::inference::adapter::{topic_labels, InferenceAdapter};
use crate::output::table::write_table;
use crate::reviews::loader::{load_reviews, ReviewSource};
use crate::reviews::normalize::preprocess_reviews;
use crate::reviews::record::{ReviewTable, DERIVED_COLUMNS, TOPIC_SCORE_PREFIX};

/// Knobs for a batch run.
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Candidate topics (defaults to the fixed six-label set)
    pub labels: Vec<String>,
    /// Keep the full per-topic score map and export one column per topic
    pub include_topic_scores: bool,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            labels: topic_labels(),
            include_topic_scores: false,
            show_progress: false,
        }
    }
}

/// Run the full pipeline and write the augmented table to `output`.
///
/// An empty dataset is not an error here: the run continues with zero rows
/// and writes a header-only table.
pub async fn run_evaluation(
    source: &ReviewSource,
    output: &Path,
    adapter: &InferenceAdapter,
    options: &EvaluationOptions,
) -> Result<ReviewTable, ReviewError> {
    let loaded = match load_reviews(source) {
        Ok(table) => table,
        Err(e) if e.is_recoverable() => {
            warn!(source = %source, "No reviews in source, writing an empty table");
            ReviewTable::default()
        }
        Err(e) => return Err(e),
    };

    let cleaned = preprocess_reviews(&loaded);
    let evaluated = evaluate_table(&cleaned, adapter, options).await;

    let columns = output_columns(&evaluated, options);
    write_table(output, &columns, &evaluated)?;

    info!(
        rows = evaluated.len(),
        inference_failures = evaluated.inference_failures(),
        output = %output.display(),
        "Evaluation finished"
    );

    Ok(evaluated)
}

/// Attach sentiment and topic predictions to every row of a cleaned table.
///
/// Expects the output of `preprocess_reviews`; rows without a cleaned
/// comment are treated as empty text. Never drops a row.
pub async fn evaluate_table(
    table: &ReviewTable,
    adapter: &InferenceAdapter,
    options: &EvaluationOptions,
) -> ReviewTable {
    let pb = if options.show_progress {
        let pb = ProgressBar::new(table.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Analyzing [{bar:30}] {pos}/{len} ({eta})")
                .expect("valid template"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut records = Vec::with_capacity(table.len());

    for (row, record) in table.iter().enumerate() {
        let mut record = record.clone();
        let text = record.cleaned_comment.clone().unwrap_or_default();

        match adapter.analyze_sentiment(&text).await {
            Ok(sentiment) => {
                record.predicted_sentiment = Some(sentiment.label);
                record.sentiment_score = Some(sentiment.score);
            }
            Err(e) => warn!(row, error = %e, "Sentiment inference failed, leaving row empty"),
        }

        match adapter.classify_topics(&text, &options.labels).await {
            Ok(prediction) => {
                record.predicted_topic = Some(prediction.predicted_label);
                if options.include_topic_scores {
                    record.topic_scores = Some(prediction.scores);
                }
            }
            Err(e) => warn!(row, error = %e, "Topic inference failed, leaving row empty"),
        }

        records.push(record);
        pb.inc(1);
    }
    pb.finish_and_clear();

    table.with_records(records)
}

/// Source columns, then the derived columns, then optional topic scores.
///
/// Source columns whose names collide with a derived or topic score column
/// are left out; the derived value is exported under that name.
pub fn output_columns(table: &ReviewTable, options: &EvaluationOptions) -> Vec<String> {
    let score_columns: Vec<String> = if options.include_topic_scores {
        options
            .labels
            .iter()
            .map(|label| format!("{TOPIC_SCORE_PREFIX}{label}"))
            .collect()
    } else {
        Vec::new()
    };

    let mut columns: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| !DERIVED_COLUMNS.contains(&c.as_str()) && !score_columns.contains(*c))
        .cloned()
        .collect();
    columns.extend(DERIVED_COLUMNS.iter().map(|c| c.to_string()));
    columns.extend(score_columns);
    columns
}
