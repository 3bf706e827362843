// Composition tests: the load → clean → infer → export chain end to end.
//
// Models are replaced by small deterministic stubs, so these tests run
// without model files or network access. Output goes to a temp directory.

use std::path::Path;

use async_trait::async_trait;

use reviewlens::error::ReviewError;
use reviewlens::inference::adapter::InferenceAdapter;
use reviewlens::inference::traits::{SentimentModel, SentimentResult, TopicModel};
use reviewlens::pipeline::evaluate::{evaluate_table, run_evaluation, EvaluationOptions};
use reviewlens::reviews::loader::{load_reviews, ReviewSource};
use reviewlens::reviews::normalize::preprocess_reviews;

// ============================================================
// Stub models
// ============================================================

/// NEGATIVE if the text mentions "boring", POSITIVE otherwise.
/// Errors on text containing "explode" to simulate a backend failure.
struct KeywordSentiment;

#[async_trait]
impl SentimentModel for KeywordSentiment {
    async fn score_sentiment(&self, text: &str) -> anyhow::Result<SentimentResult> {
        if text.contains("explode") {
            anyhow::bail!("backend crashed");
        }
        let label = if text.contains("boring") {
            "NEGATIVE"
        } else {
            "POSITIVE"
        };
        Ok(SentimentResult {
            label: label.to_string(),
            score: 0.9,
        })
    }
}

/// Puts most weight on "Workload" when the text mentions homework, and
/// spreads weight evenly otherwise (so the first label wins the tie).
struct KeywordTopics;

#[async_trait]
impl TopicModel for KeywordTopics {
    async fn score_topics(&self, text: &str, labels: &[String]) -> anyhow::Result<Vec<f64>> {
        if text.contains("explode") {
            anyhow::bail!("backend crashed");
        }
        let n = labels.len() as f64;
        if text.contains("homework") {
            let rest = 0.3 / (n - 1.0).max(1.0);
            return Ok(labels
                .iter()
                .map(|l| if l == "Workload" { 0.7 } else { rest })
                .collect());
        }
        Ok(vec![1.0 / n; labels.len()])
    }
}

fn stub_adapter() -> InferenceAdapter {
    InferenceAdapter::new(Box::new(KeywordSentiment), Box::new(KeywordTopics))
}

fn source(json: &str) -> ReviewSource {
    ReviewSource::from_bytes("test.json", json.as_bytes().to_vec())
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// ============================================================
// End-to-end scenarios
// ============================================================

#[tokio::test]
async fn single_review_flows_through_to_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("evaluated.csv");
    let src = source(r#"[[{"professor":"A","course_id":"C1","Comment":"GREAT   class!!"}]]"#);

    let loaded = load_reviews(&src).unwrap();
    assert_eq!(loaded.len(), 1);
    let cleaned = preprocess_reviews(&loaded);
    assert_eq!(
        cleaned.records()[0].cleaned_comment.as_deref(),
        Some("great class!!")
    );

    let table = run_evaluation(&src, &output, &stub_adapter(), &EvaluationOptions::default())
        .await
        .unwrap();

    assert_eq!(table.len(), 1);
    let row = &table.records()[0];
    assert_eq!(row.cleaned_comment.as_deref(), Some("great class!!"));
    assert_eq!(row.predicted_sentiment.as_deref(), Some("POSITIVE"));
    assert!(row.predicted_topic.is_some());
    assert_eq!(table.inference_failures(), 0);

    let lines = read_lines(&output);
    assert_eq!(
        lines[0],
        "professor,course_id,Comment,cleaned_comment,predicted_sentiment,sentiment_score,predicted_topic"
    );
    assert_eq!(
        lines[1],
        "A,C1,GREAT   class!!,great class!!,POSITIVE,0.9,Teaching Quality"
    );
    assert_eq!(lines.len(), 2);
}

#[tokio::test]
async fn null_comment_produces_header_only_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("evaluated.csv");
    let src = source(r#"[[{"professor":"A","course_id":"C1","Comment":null}]]"#);

    assert_eq!(load_reviews(&src).unwrap().len(), 1);

    let table = run_evaluation(&src, &output, &stub_adapter(), &EvaluationOptions::default())
        .await
        .unwrap();

    assert!(table.is_empty());
    let lines = read_lines(&output);
    assert_eq!(lines.len(), 1, "expected header only, got {lines:?}");
    assert!(lines[0].ends_with("cleaned_comment,predicted_sentiment,sentiment_score,predicted_topic"));
}

#[tokio::test]
async fn empty_corpus_is_recovered_with_header_only_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("evaluated.csv");

    let table = run_evaluation(&source("[[], []]"), &output, &stub_adapter(), &EvaluationOptions::default())
        .await
        .unwrap();

    assert!(table.is_empty());
    assert_eq!(
        read_lines(&output),
        vec!["cleaned_comment,predicted_sentiment,sentiment_score,predicted_topic"]
    );
}

#[tokio::test]
async fn malformed_input_aborts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("evaluated.csv");

    let err = run_evaluation(
        &source(r#"{"not":"an array"}"#),
        &output,
        &stub_adapter(),
        &EvaluationOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ReviewError::MalformedInput { .. }), "got {err:?}");
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn unwritable_destination_is_output_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("missing").join("evaluated.csv");
    let src = source(r#"[[{"Comment":"fine"}]]"#);

    let err = run_evaluation(&src, &output, &stub_adapter(), &EvaluationOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::OutputWrite { .. }), "got {err:?}");
}

// ============================================================
// Row-level failure policy
// ============================================================

#[tokio::test]
async fn row_failures_keep_row_count_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("evaluated.csv");
    let src = source(
        r#"[
            [{"professor":"A","Comment":"Too much homework"},
             {"professor":"A","Comment":"this will explode"}],
            [{"professor":"B","Comment":"@@@"},
             {"professor":"B","Comment":"Boring lectures"}]
        ]"#,
    );

    let table = run_evaluation(&src, &output, &stub_adapter(), &EvaluationOptions::default())
        .await
        .unwrap();

    assert_eq!(table.len(), 4);
    let professors: Vec<_> = table.iter().map(|r| r.professor.as_deref().unwrap()).collect();
    assert_eq!(professors, vec!["A", "A", "B", "B"]);

    let rows = table.records();
    assert_eq!(rows[0].predicted_topic.as_deref(), Some("Workload"));

    // Backend failure: row kept, predictions empty
    assert_eq!(rows[1].predicted_sentiment, None);
    assert_eq!(rows[1].predicted_topic, None);

    // Symbol-only comment cleans to "" and is rejected as empty text
    assert_eq!(rows[2].cleaned_comment.as_deref(), Some(""));
    assert_eq!(rows[2].predicted_sentiment, None);

    assert_eq!(rows[3].predicted_sentiment.as_deref(), Some("NEGATIVE"));
    assert_eq!(table.inference_failures(), 2);

    // Failed rows are exported with empty prediction fields
    let lines = read_lines(&output);
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[2], "A,this will explode,this will explode,,,");
}

#[tokio::test]
async fn evaluation_is_deterministic() {
    let json = r#"[[{"Comment":"homework heavy"},{"Comment":"nice"}],[{"Comment":"boring"}]]"#;
    let cleaned = preprocess_reviews(&load_reviews(&source(json)).unwrap());
    let adapter = stub_adapter();
    let options = EvaluationOptions::default();

    let first = evaluate_table(&cleaned, &adapter, &options).await;
    let second = evaluate_table(&cleaned, &adapter, &options).await;

    assert_eq!(first, second);
    assert_eq!(first.len(), cleaned.len());
    // The input table is not touched by evaluation
    assert!(cleaned.iter().all(|r| r.predicted_topic.is_none()));
}

// ============================================================
// Output shape
// ============================================================

#[tokio::test]
async fn topic_score_columns_are_exported_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("evaluated.csv");
    let src = source(r#"[[{"Comment":"so much homework"}]]"#);
    let options = EvaluationOptions {
        include_topic_scores: true,
        ..Default::default()
    };

    let table = run_evaluation(&src, &output, &stub_adapter(), &options)
        .await
        .unwrap();

    let scores = table.records()[0].topic_scores.as_ref().unwrap();
    assert_eq!(scores.len(), 6);
    assert_eq!(scores.get("Workload"), Some(0.7));

    let lines = read_lines(&output);
    let header: Vec<_> = lines[0].split(',').collect();
    assert_eq!(header.len(), 1 + 4 + 6);
    assert!(header.contains(&"score: Workload"));
}

#[tokio::test]
async fn passthrough_columns_are_quoted_and_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("evaluated.csv");
    let src = source(
        r#"[[{"professor":"Smith, J","Comment":"She said \"read it\"","Quality":5,"Tags":["Caring"],"Note":null}]]"#,
    );

    run_evaluation(&src, &output, &stub_adapter(), &EvaluationOptions::default())
        .await
        .unwrap();

    let lines = read_lines(&output);
    assert_eq!(
        lines[0],
        "professor,Comment,Quality,Tags,Note,cleaned_comment,predicted_sentiment,sentiment_score,predicted_topic"
    );
    assert!(
        lines[1].starts_with(r#""Smith, J","She said ""read it""",5,"[""Caring""]",,she said read it,"#),
        "got {}",
        lines[1]
    );
}

#[tokio::test]
async fn unconvertible_rating_is_exported_raw_not_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("evaluated.csv");
    let src = source(
        r#"[[{"professor":"A","Comment":"fine","Quality":"N/A"},
             {"professor":"B","Comment":"ok","Quality":4}]]"#,
    );

    let table = run_evaluation(&src, &output, &stub_adapter(), &EvaluationOptions::default())
        .await
        .unwrap();

    assert_eq!(table.len(), 2);
    let lines = read_lines(&output);
    assert_eq!(
        lines[0],
        "professor,Comment,Quality,cleaned_comment,predicted_sentiment,sentiment_score,predicted_topic"
    );
    assert!(lines[1].starts_with("A,fine,N/A,fine,POSITIVE,"), "got {}", lines[1]);
    assert!(lines[2].starts_with("B,ok,4,ok,POSITIVE,"), "got {}", lines[2]);
}

#[tokio::test]
async fn score_named_source_column_is_not_duplicated() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("evaluated.csv");
    let src = source(r#"[[{"Comment":"so much homework","score: Workload":"high"}]]"#);
    let options = EvaluationOptions {
        include_topic_scores: true,
        ..Default::default()
    };

    run_evaluation(&src, &output, &stub_adapter(), &options)
        .await
        .unwrap();

    let lines = read_lines(&output);
    let header: Vec<_> = lines[0].split(',').collect();
    assert_eq!(header.iter().filter(|c| **c == "score: Workload").count(), 1);
    assert_eq!(header.len(), lines[1].split(',').count());

    let workload = header.iter().position(|c| *c == "score: Workload").unwrap();
    assert_eq!(lines[1].split(',').nth(workload), Some("0.7"));
}
