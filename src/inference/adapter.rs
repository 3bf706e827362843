// Inference adapter: one entry point for sentiment and topic calls.
//
// Holds one SentimentModel and one TopicModel, loaded once and reused for
// every call. Each call is bounded by a timeout and its output is checked
// before it reaches the pipeline. Everything that goes wrong comes back as
// an InferenceError.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use super::hosted::{HostedClient, HostedSentimentModel, HostedZeroShotModel};
use super::onnx::{OnnxSentimentModel, OnnxZeroShotModel};
use super::traits::{
    SentimentModel, SentimentResult, TopicModel, TopicPrediction, TopicScoreMap,
};
use super::download;
use crate::config::{Config, InferenceBackend};
use crate::error::InferenceError;
use crate::output::truncate_chars;

/// The fixed topic categories every review is classified against.
pub const TOPIC_LABELS: [&str; 6] = [
    "Teaching Quality",
    "Grading",
    "Workload",
    "Class Engagement",
    "Lecture Clarity",
    "Professor Personality",
];

/// Default upper bound on a single model call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Owned copy of `TOPIC_LABELS`.
pub fn topic_labels() -> Vec<String> {
    TOPIC_LABELS.iter().map(|l| l.to_string()).collect()
}

pub struct InferenceAdapter {
    sentiment: Box<dyn SentimentModel>,
    topics: Box<dyn TopicModel>,
    timeout: Duration,
}

impl InferenceAdapter {
    /// Wrap two already-initialized models.
    pub fn new(sentiment: Box<dyn SentimentModel>, topics: Box<dyn TopicModel>) -> Self {
        Self {
            sentiment,
            topics,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the adapter for the configured backend.
    ///
    /// This is the cold-start step: ONNX sessions are created here, once.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.require_backend()?;

        let adapter = match config.backend {
            InferenceBackend::Onnx => {
                info!("Using local ONNX models from {}", config.model_dir.display());
                let sentiment =
                    OnnxSentimentModel::load(&download::sentiment_model_dir(&config.model_dir))?;
                let topics =
                    OnnxZeroShotModel::load(&download::topic_model_dir(&config.model_dir))?;
                Self::new(Box::new(sentiment), Box::new(topics))
            }
            InferenceBackend::Hosted => {
                info!("Using Hugging Face Inference API at {}", config.hf_api_url);
                let client = HostedClient::new(
                    &config.hf_api_url,
                    config.hf_api_token.clone(),
                    config.hosted_rps,
                )?;
                let sentiment =
                    HostedSentimentModel::new(client.clone(), config.sentiment_model_id.clone());
                let topics = HostedZeroShotModel::new(client, config.topic_model_id.clone());
                Self::new(Box::new(sentiment), Box::new(topics))
            }
        };

        Ok(adapter.with_timeout(config.inference_timeout))
    }

    /// Sentiment label and confidence for one text.
    ///
    /// Empty (or whitespace-only) text is rejected with
    /// `InferenceError::EmptyText` without calling the model.
    pub async fn analyze_sentiment(&self, text: &str) -> Result<SentimentResult, InferenceError> {
        if text.trim().is_empty() {
            return Err(InferenceError::EmptyText);
        }

        let result = tokio::time::timeout(self.timeout, self.sentiment.score_sentiment(text))
            .await
            .map_err(|_| InferenceError::Timeout(self.timeout))?
            .map_err(InferenceError::backend)?;

        if result.label.trim().is_empty() {
            return Err(InferenceError::Unparseable(
                "sentiment model returned an empty label".to_string(),
            ));
        }
        check_probability("sentiment score", result.score)?;

        debug!(
            label = %result.label,
            score = result.score,
            text_preview = %truncate_chars(text, 50),
            "Scored sentiment"
        );

        Ok(result)
    }

    /// Best-matching topic among `labels`, plus the score for every label.
    ///
    /// `labels` must be non-empty and free of duplicates. Ties on the top
    /// score go to the label listed first.
    pub async fn classify_topics(
        &self,
        text: &str,
        labels: &[String],
    ) -> Result<TopicPrediction, InferenceError> {
        validate_labels(labels)?;
        if text.trim().is_empty() {
            return Err(InferenceError::EmptyText);
        }

        let scores = tokio::time::timeout(self.timeout, self.topics.score_topics(text, labels))
            .await
            .map_err(|_| InferenceError::Timeout(self.timeout))?
            .map_err(InferenceError::backend)?;

        if scores.len() != labels.len() {
            return Err(InferenceError::Unparseable(format!(
                "expected {} topic scores, got {}",
                labels.len(),
                scores.len()
            )));
        }
        for (label, score) in labels.iter().zip(&scores) {
            check_probability(label, *score)?;
        }

        let scores = TopicScoreMap::from_pairs(labels.iter().cloned().zip(scores).collect());
        let predicted_label = scores
            .top()
            .map(|(label, _)| label.to_string())
            .ok_or_else(|| InferenceError::Unparseable("no topic scores".to_string()))?;

        debug!(
            topic = %predicted_label,
            text_preview = %truncate_chars(text, 50),
            "Classified topic"
        );

        Ok(TopicPrediction {
            predicted_label,
            scores,
        })
    }
}

fn validate_labels(labels: &[String]) -> Result<(), InferenceError> {
    if labels.is_empty() {
        return Err(InferenceError::InvalidLabels(
            "at least one candidate label is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for label in labels {
        if !seen.insert(label.as_str()) {
            return Err(InferenceError::InvalidLabels(format!(
                "duplicate label '{label}'"
            )));
        }
    }
    Ok(())
}

fn check_probability(what: &str, value: f64) -> Result<(), InferenceError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(InferenceError::Unparseable(format!(
            "{what} out of range: {value}"
        )))
    }
}
