// Colored terminal output for previews, single-review analysis, and
// evaluation summaries.
//
// main.rs display paths delegate here.

use std::path::Path;

use colored::Colorize;

use crate::error::InferenceError;
use crate::inference::traits::{SentimentResult, TopicPrediction};
use crate::reviews::record::ReviewTable;

/// Show the first `limit` reviews of a loaded table.
pub fn display_preview(table: &ReviewTable, limit: usize) {
    if table.is_empty() {
        println!("No reviews with comments found.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Reviews (showing {} of {}) ===", limit.min(table.len()), table.len()).bold()
    );
    println!();
    println!(
        "  {:>4}  {:<24} {:<10} {}",
        "#".dimmed(),
        "Professor".dimmed(),
        "Course".dimmed(),
        "Comment".dimmed(),
    );
    println!("  {}", "-".repeat(78).dimmed());

    for (i, record) in table.iter().take(limit).enumerate() {
        println!(
            "  {:>4}  {:<24} {:<10} {}",
            i,
            super::truncate_chars(record.professor.as_deref().unwrap_or("?"), 24),
            record.course_id.as_deref().unwrap_or("?"),
            super::truncate_chars(record.comment.as_deref().unwrap_or(""), 60).dimmed(),
        );
    }
    println!();
}

/// Show sentiment and topic results for a single review.
pub fn display_analysis(
    comment: &str,
    sentiment: &Result<SentimentResult, InferenceError>,
    topics: &Result<TopicPrediction, InferenceError>,
) {
    println!("\n{}", "=== Analysis ===".bold());
    println!("  Comment: {}", super::truncate_chars(comment, 200).italic());
    println!();

    match sentiment {
        Ok(s) => println!(
            "  Sentiment: {} (confidence: {:.2})",
            colorize_sentiment(&s.label),
            s.score
        ),
        Err(e) => println!("  Sentiment: {} {}", "unavailable".red(), e.to_string().dimmed()),
    }

    match topics {
        Ok(prediction) => {
            println!("  Predicted topic: {}", prediction.predicted_label.cyan().bold());
            println!("\n  Topic scores:");
            for (label, score) in prediction.scores.ranked() {
                let bar = "#".repeat((score * 30.0).round() as usize);
                println!("    {:<24} {:>5.2}  {}", label, score, bar.cyan());
            }
        }
        Err(e) => println!("  Topic: {} {}", "unavailable".red(), e.to_string().dimmed()),
    }
    println!();
}

/// Summarize a finished batch evaluation and preview its first rows.
pub fn display_evaluation_summary(table: &ReviewTable, output: &Path, preview_rows: usize) {
    println!("\n{}", "Evaluation complete.".bold());
    println!("  Reviews evaluated: {}", table.len());

    let failures = table.inference_failures();
    if failures > 0 {
        println!(
            "  {} {} rows have missing predictions",
            "!".yellow(),
            failures
        );
    }
    println!("  Results written to: {}", output.display());

    if table.is_empty() {
        return;
    }

    println!();
    println!(
        "  {:<50} {:<10} {}",
        "Cleaned comment".dimmed(),
        "Sentiment".dimmed(),
        "Topic".dimmed(),
    );
    println!("  {}", "-".repeat(78).dimmed());
    for record in table.iter().take(preview_rows) {
        let sentiment = record.predicted_sentiment.as_deref().unwrap_or("-");
        println!(
            "  {:<50} {:<10} {}",
            super::truncate_chars(record.cleaned_comment.as_deref().unwrap_or(""), 47),
            colorize_sentiment(sentiment),
            record.predicted_topic.as_deref().unwrap_or("-"),
        );
    }
    println!();
}

/// Colorize a sentiment label.
fn colorize_sentiment(label: &str) -> colored::ColoredString {
    match label.to_ascii_uppercase().as_str() {
        "POSITIVE" => label.green().bold(),
        "NEGATIVE" => label.red().bold(),
        _ => label.dimmed(),
    }
}
