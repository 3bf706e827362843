// Hugging Face Inference API backend.
//
// Runs the same two models as the local backend, hosted by Hugging Face.
// Needs an API token (HF_API_TOKEN) and is rate-limited client-side.
//
// API docs: https://huggingface.co/docs/api-inference/tasks/text-classification
//           https://huggingface.co/docs/api-inference/tasks/zero-shot-classification

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rate_limiter::RateLimiter;
use super::traits::{SentimentModel, SentimentResult, TopicModel};

pub const DEFAULT_HF_API_URL: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_SENTIMENT_MODEL_ID: &str = "distilbert-base-uncased-finetuned-sst-2-english";
pub const DEFAULT_TOPIC_MODEL_ID: &str = "facebook/bart-large-mnli";

/// Shared HTTP plumbing for both hosted models.
#[derive(Clone)]
pub struct HostedClient {
    client: Client,
    base_url: String,
    token: String,
    rate_limiter: RateLimiter,
}

impl HostedClient {
    pub fn new(base_url: &str, token: String, requests_per_second: f64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("reviewlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            rate_limiter: RateLimiter::new(requests_per_second),
        })
    }

    fn model_url(&self, model_id: &str) -> String {
        format!("{}/{}", self.base_url, model_id)
    }

    async fn post<B, R>(&self, model_id: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.rate_limiter.acquire().await;

        let url = self.model_url(model_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            // Block until a cold model is loaded instead of returning 503
            .header("x-wait-for-model", "true")
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to call Inference API at {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Inference API returned {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse Inference API response")
    }
}

/// Hosted text-classification model used for sentiment.
pub struct HostedSentimentModel {
    client: HostedClient,
    model_id: String,
}

impl HostedSentimentModel {
    pub fn new(client: HostedClient, model_id: String) -> Self {
        Self { client, model_id }
    }
}

#[async_trait]
impl SentimentModel for HostedSentimentModel {
    async fn score_sentiment(&self, text: &str) -> Result<SentimentResult> {
        let request = ClassificationRequest { inputs: text };
        let response: ClassificationResponse = self.client.post(&self.model_id, &request).await?;
        let result = best_label(response)?;

        debug!(
            model = %self.model_id,
            label = %result.label,
            score = result.score,
            "Hosted sentiment"
        );

        Ok(result)
    }
}

/// Hosted zero-shot-classification model used for topics.
pub struct HostedZeroShotModel {
    client: HostedClient,
    model_id: String,
}

impl HostedZeroShotModel {
    pub fn new(client: HostedClient, model_id: String) -> Self {
        Self { client, model_id }
    }
}

#[async_trait]
impl TopicModel for HostedZeroShotModel {
    async fn score_topics(&self, text: &str, labels: &[String]) -> Result<Vec<f64>> {
        let request = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters {
                candidate_labels: labels,
                multi_label: false,
            },
        };
        let response: ZeroShotResponse = self.client.post(&self.model_id, &request).await?;
        align_scores(response, labels)
    }
}

/// Highest-scoring label from a text-classification response.
fn best_label(response: ClassificationResponse) -> Result<SentimentResult> {
    let candidates = match response {
        ClassificationResponse::Nested(mut rows) => {
            if rows.is_empty() {
                anyhow::bail!("Empty classification response");
            }
            rows.swap_remove(0)
        }
        ClassificationResponse::Flat(row) => row,
    };

    candidates
        .into_iter()
        .fold(None::<LabelScore>, |best, c| match best {
            Some(b) if b.score >= c.score => Some(b),
            _ => Some(c),
        })
        .map(|c| SentimentResult {
            label: c.label,
            score: c.score,
        })
        .context("Classification response had no labels")
}

/// Reorder zero-shot scores (returned sorted by score) back into the
/// caller's label order.
fn align_scores(response: ZeroShotResponse, labels: &[String]) -> Result<Vec<f64>> {
    let result = match response {
        ZeroShotResponse::Single(r) => r,
        ZeroShotResponse::List(mut list) => {
            if list.is_empty() {
                anyhow::bail!("Empty zero-shot response");
            }
            list.swap_remove(0)
        }
    };

    if result.labels.len() != result.scores.len() {
        anyhow::bail!(
            "Zero-shot response has {} labels but {} scores",
            result.labels.len(),
            result.scores.len()
        );
    }

    labels
        .iter()
        .map(|label| {
            result
                .labels
                .iter()
                .position(|l| l == label)
                .map(|i| result.scores[i])
                .with_context(|| format!("Zero-shot response is missing label '{label}'"))
        })
        .collect()
}

// --- Inference API request/response types ---

#[derive(Serialize)]
struct ClassificationRequest<'a> {
    inputs: &'a str,
}

#[derive(Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
    multi_label: bool,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Text classification comes back as `[[{label, score}, ...]]` for a
/// single input on most deployments, `[{label, score}, ...]` on some.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
struct ZeroShotResult {
    labels: Vec<String>,
    scores: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Single(ZeroShotResult),
    List(Vec<ZeroShotResult>),
}
