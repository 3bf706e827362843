// Local ONNX sentiment and zero-shot topic models.
//
// Both models run on the local CPU without API calls or rate limits.
//
// Sentiment: DistilBERT fine-tuned on SST-2. Two logits per text,
// [NEGATIVE, POSITIVE], turned into a probability with softmax.
//
// Topics: BART-large-MNLI used as a zero-shot classifier. Each candidate
// label becomes an NLI hypothesis ("This example is {label}.") paired with
// the review as premise. The entailment logits of all pairs are softmaxed
// against each other, so the label scores sum to 1.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{EncodeInput, Encoding, Tokenizer, TruncationParams};
use tracing::debug;

use super::download::{MODEL_FILE, TOKENIZER_FILE};
use super::traits::{SentimentModel, SentimentResult, TopicModel};

/// Sentiment labels in the order the model emits logits.
const SENTIMENT_LABELS: [&str; 2] = ["NEGATIVE", "POSITIVE"];

/// NLI output order for bart-large-mnli: contradiction, neutral, entailment.
const NLI_CLASSES: usize = 3;
const ENTAILMENT_INDEX: usize = 2;

/// Hypothesis template used for every candidate label.
const HYPOTHESIS_TEMPLATE: &str = "This example is {}.";

/// Pad token ids (DistilBERT uses 0, BART/RoBERTa vocab uses 1).
const DISTILBERT_PAD_ID: i64 = 0;
const BART_PAD_ID: i64 = 1;

/// Longest token sequence fed to either model.
const MAX_SEQ_LEN: usize = 512;

/// A loaded ONNX session plus its tokenizer, shared with spawn_blocking.
///
/// ort::Session::run takes &mut self, hence the Mutex. Calls are already
/// serialized by the sequential pipeline, so contention is minimal.
#[derive(Clone)]
struct OnnxClassifier {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    pad_id: i64,
}

impl OnnxClassifier {
    fn load(model_dir: &Path, pad_id: i64) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);

        if !model_path.exists() {
            anyhow::bail!(
                "Model file not found: {}\nRun `reviewlens download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Tokenizer file not found: {}\nRun `reviewlens download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

        debug!("Loaded ONNX model from {}", model_dir.display());

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            pad_id,
        })
    }

    /// Tokenize the inputs, run one padded forward pass, and return one
    /// row of `classes` logits per input. Runs on a blocking thread.
    async fn logits<I>(&self, inputs: Vec<I>, classes: usize) -> Result<Vec<Vec<f32>>>
    where
        I: Into<EncodeInput<'static>> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            let encodings = inputs
                .into_iter()
                .map(|input| {
                    this.tokenizer
                        .encode(input, true)
                        .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
                })
                .collect::<Result<Vec<_>>>()?;
            this.run_sync(&encodings, classes)
        })
        .await
        .context("spawn_blocking panicked")?
    }

    fn run_sync(&self, encodings: &[Encoding], classes: usize) -> Result<Vec<Vec<f32>>> {
        let batch_size = encodings.len();
        if batch_size == 0 {
            return Ok(Vec::new());
        }
        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

        // Right-pad every sequence to max_len. Shape: [batch_size, max_len]
        let mut input_ids_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);

        for enc in encodings {
            let seq_len = enc.get_ids().len();
            input_ids_flat.extend(enc.get_ids().iter().map(|&id| id as i64));
            attention_mask_flat.extend(enc.get_attention_mask().iter().map(|&m| m as i64));

            let pad_len = max_len - seq_len;
            input_ids_flat.extend(std::iter::repeat_n(self.pad_id, pad_len));
            attention_mask_flat.extend(std::iter::repeat_n(0i64, pad_len));
        }

        let shape = [batch_size as i64, max_len as i64];
        let input_ids_tensor = Tensor::from_array((shape, input_ids_flat))
            .context("Failed to create input_ids tensor")?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask_flat))
            .context("Failed to create attention_mask tensor")?;

        let logits = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

            let outputs = session
                .run(ort::inputs! {
                    "input_ids" => input_ids_tensor,
                    "attention_mask" => attention_mask_tensor
                })
                .context("ONNX inference failed")?;

            // Output shape: [batch_size, classes], raw logits
            let (_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .context("Failed to extract output tensor")?;

            data.to_vec()
        };

        split_rows(&logits, batch_size, classes)
    }
}

/// Local DistilBERT SST-2 sentiment model.
pub struct OnnxSentimentModel {
    classifier: OnnxClassifier,
}

impl OnnxSentimentModel {
    /// Load the model from a directory holding `model_quantized.onnx` and
    /// `tokenizer.json`. Call `download::download_models()` first if needed.
    pub fn load(model_dir: &Path) -> Result<Self> {
        Ok(Self {
            classifier: OnnxClassifier::load(model_dir, DISTILBERT_PAD_ID)?,
        })
    }
}

#[async_trait]
impl SentimentModel for OnnxSentimentModel {
    async fn score_sentiment(&self, text: &str) -> Result<SentimentResult> {
        let rows = self
            .classifier
            .logits(vec![text.to_string()], SENTIMENT_LABELS.len())
            .await?;
        let row = rows
            .first()
            .context("Sentiment model returned no output rows")?;
        Ok(sentiment_from_logits(row))
    }
}

/// Local BART-large-MNLI zero-shot topic model.
pub struct OnnxZeroShotModel {
    classifier: OnnxClassifier,
}

impl OnnxZeroShotModel {
    pub fn load(model_dir: &Path) -> Result<Self> {
        Ok(Self {
            classifier: OnnxClassifier::load(model_dir, BART_PAD_ID)?,
        })
    }
}

#[async_trait]
impl TopicModel for OnnxZeroShotModel {
    async fn score_topics(&self, text: &str, labels: &[String]) -> Result<Vec<f64>> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }

        // One (premise, hypothesis) pair per label, in label order
        let pairs: Vec<(String, String)> = labels
            .iter()
            .map(|label| (text.to_string(), hypothesis(label)))
            .collect();

        let rows = self.classifier.logits(pairs, NLI_CLASSES).await?;
        let entailment: Vec<f64> = rows
            .iter()
            .map(|row| row[ENTAILMENT_INDEX] as f64)
            .collect();

        Ok(softmax(&entailment))
    }
}

fn hypothesis(label: &str) -> String {
    HYPOTHESIS_TEMPLATE.replace("{}", label)
}

/// Reshape flat logits into `batch_size` rows of `classes` values.
fn split_rows(flat: &[f32], batch_size: usize, classes: usize) -> Result<Vec<Vec<f32>>> {
    if flat.len() != batch_size * classes {
        anyhow::bail!(
            "Unexpected output size: got {} values, expected {} x {}",
            flat.len(),
            batch_size,
            classes
        );
    }
    Ok(flat.chunks(classes).map(|row| row.to_vec()).collect())
}

/// Numerically stable softmax.
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Pick the winning sentiment label and its softmax probability.
fn sentiment_from_logits(row: &[f32]) -> SentimentResult {
    let logits: Vec<f64> = row.iter().map(|&x| x as f64).collect();
    let probs = softmax(&logits);
    let (idx, score) = probs
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, p)| {
            if p > best.1 {
                (i, p)
            } else {
                best
            }
        });
    SentimentResult {
        label: SENTIMENT_LABELS[idx].to_string(),
        score,
    }
}
