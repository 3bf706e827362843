// Review records and the table that carries them between pipeline stages.
//
// A record keeps the handful of fields the pipeline understands as typed
// values and everything else as an ordered passthrough map, so unknown
// source columns survive all the way to the exported table.

use serde_json::{Map, Value};

use crate::inference::traits::TopicScoreMap;

/// Source key for the professor name.
pub const FIELD_PROFESSOR: &str = "professor";
/// Source key for the course identifier.
pub const FIELD_COURSE_ID: &str = "course_id";
/// Source key for the raw review text (capitalized in the corpus).
pub const FIELD_COMMENT: &str = "Comment";
/// Source key for the quality rating.
pub const FIELD_QUALITY: &str = "Quality";
/// Source key for the difficulty rating.
pub const FIELD_DIFFICULTY: &str = "Difficulty";

pub const COL_CLEANED_COMMENT: &str = "cleaned_comment";
pub const COL_PREDICTED_SENTIMENT: &str = "predicted_sentiment";
pub const COL_SENTIMENT_SCORE: &str = "sentiment_score";
pub const COL_PREDICTED_TOPIC: &str = "predicted_topic";

/// Prefix for the optional per-topic score columns, e.g. `score: Grading`.
pub const TOPIC_SCORE_PREFIX: &str = "score: ";

/// Columns appended by normalization and inference, in export order.
pub const DERIVED_COLUMNS: [&str; 4] = [
    COL_CLEANED_COMMENT,
    COL_PREDICTED_SENTIMENT,
    COL_SENTIMENT_SCORE,
    COL_PREDICTED_TOPIC,
];

/// One student review.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewRecord {
    pub professor: Option<String>,
    pub course_id: Option<String>,
    /// Raw comment text. `None` when the key is missing or null.
    pub comment: Option<String>,
    pub quality: Option<f64>,
    pub difficulty: Option<f64>,
    /// Every other source key, in source order.
    pub extra: Map<String, Value>,

    /// Set by `preprocess_reviews`.
    pub cleaned_comment: Option<String>,

    // Set by the batch evaluator. Left empty when the model call failed.
    pub predicted_sentiment: Option<String>,
    pub sentiment_score: Option<f64>,
    pub predicted_topic: Option<String>,
    pub topic_scores: Option<TopicScoreMap>,
}

impl ReviewRecord {
    /// Render the value of `column` as a flat-table cell.
    ///
    /// Returns `None` for absent or null values; the table writer turns
    /// that into an empty field.
    pub fn cell(&self, column: &str) -> Option<String> {
        match column {
            // Typed source fields fall back to the raw value the loader
            // could not convert
            FIELD_PROFESSOR => self.professor.clone().or_else(|| self.raw(column)),
            FIELD_COURSE_ID => self.course_id.clone().or_else(|| self.raw(column)),
            FIELD_COMMENT => self.comment.clone(),
            FIELD_QUALITY => self.quality.map(format_number).or_else(|| self.raw(column)),
            FIELD_DIFFICULTY => self
                .difficulty
                .map(format_number)
                .or_else(|| self.raw(column)),
            COL_CLEANED_COMMENT => self.cleaned_comment.clone(),
            COL_PREDICTED_SENTIMENT => self.predicted_sentiment.clone(),
            COL_SENTIMENT_SCORE => self.sentiment_score.map(format_number),
            COL_PREDICTED_TOPIC => self.predicted_topic.clone(),
            other => other
                .strip_prefix(TOPIC_SCORE_PREFIX)
                .zip(self.topic_scores.as_ref())
                .and_then(|(label, scores)| scores.get(label))
                .map(format_number)
                .or_else(|| self.raw(other)),
        }
    }

    fn raw(&self, column: &str) -> Option<String> {
        self.extra.get(column).and_then(render_value)
    }

    /// True once inference has run and at least one prediction is missing.
    pub fn has_inference_failure(&self) -> bool {
        self.cleaned_comment.is_some()
            && (self.predicted_sentiment.is_none() || self.predicted_topic.is_none())
    }
}

/// An ordered set of reviews sharing one column set.
///
/// `columns` holds the source columns in first-seen order. Derived columns
/// are added at export time. Stages take a table by reference and return a
/// new one, so a caller's table is never changed behind its back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewTable {
    columns: Vec<String>,
    records: Vec<ReviewRecord>,
}

impl ReviewTable {
    pub fn new(columns: Vec<String>, records: Vec<ReviewRecord>) -> Self {
        Self { columns, records }
    }

    /// Source columns, in the order they were first seen.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[ReviewRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReviewRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ReviewRecord> {
        self.records.get(index)
    }

    /// Build a new table with the same columns and a replacement record set.
    pub fn with_records(&self, records: Vec<ReviewRecord>) -> Self {
        Self {
            columns: self.columns.clone(),
            records,
        }
    }

    /// Number of rows where sentiment or topic inference failed.
    pub fn inference_failures(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.has_inference_failure())
            .count()
    }
}

impl<'a> IntoIterator for &'a ReviewTable {
    type Item = &'a ReviewRecord;
    type IntoIter = std::slice::Iter<'a, ReviewRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Format a number without a trailing `.0` on whole values.
fn format_number(value: f64) -> String {
    value.to_string()
}

/// Render a passthrough JSON value. Strings are written raw, nested
/// values as compact JSON, null as absent.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
