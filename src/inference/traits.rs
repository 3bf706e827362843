// Model traits and result types shared by every backend.
//
// Backends implement SentimentModel and TopicModel. The default
// implementations run local ONNX models; the Hugging Face Inference API is
// available as a hosted alternative. Backends report failures with anyhow;
// InferenceAdapter turns those into InferenceError so no backend error type
// leaks into the pipeline.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Sentiment polarity plus the model's confidence in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentResult {
    /// Model label, `POSITIVE` or `NEGATIVE` for the default models.
    pub label: String,
    /// Confidence in `label`, 0.0 to 1.0.
    pub score: f64,
}

impl SentimentResult {
    pub fn is_positive(&self) -> bool {
        self.label.eq_ignore_ascii_case("positive")
    }
}

/// Confidence per topic label, in the order the labels were asked for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopicScoreMap(Vec<(String, f64)>);

impl TopicScoreMap {
    pub fn from_pairs(pairs: Vec<(String, f64)>) -> Self {
        Self(pairs)
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, score)| *score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(label, score)| (label.as_str(), *score))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest-scoring label. On equal scores the earlier label wins.
    pub fn top(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (label, score) in self.iter() {
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((label, score)),
            }
        }
        best
    }

    /// Labels sorted by descending score, ties kept in label order.
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<_> = self.iter().collect();
        // sort_by is stable, so equal scores keep their original order
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// Best topic for a text plus the full score map it was picked from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicPrediction {
    pub predicted_label: String,
    pub scores: TopicScoreMap,
}

/// Trait for binary sentiment classification.
#[async_trait]
pub trait SentimentModel: Send + Sync {
    /// Classify a single text.
    async fn score_sentiment(&self, text: &str) -> Result<SentimentResult>;
}

/// Trait for zero-shot topic classification against caller-supplied labels.
#[async_trait]
pub trait TopicModel: Send + Sync {
    /// Score `text` against every label. The returned vector is aligned
    /// with `labels`: one score per label, same order.
    async fn score_topics(&self, text: &str, labels: &[String]) -> Result<Vec<f64>>;
}
