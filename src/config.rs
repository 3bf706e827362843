use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::inference::download;
use crate::inference::hosted::{
    DEFAULT_HF_API_URL, DEFAULT_SENTIMENT_MODEL_ID, DEFAULT_TOPIC_MODEL_ID,
};

/// Default request rate for the hosted backend.
const DEFAULT_HOSTED_RPS: f64 = 5.0;

/// Default per-call inference timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which inference backend to use.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceBackend {
    /// Local ONNX models (default), no API token needed
    Onnx,
    /// Hugging Face Inference API, requires HF_API_TOKEN
    Hosted,
}

/// Central configuration loaded from environment variables.
///
/// Secrets come from env vars only. The .env file is loaded automatically
/// at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Which inference backend to use (default: Onnx)
    pub backend: InferenceBackend,
    /// Directory containing the ONNX model files
    pub model_dir: PathBuf,
    /// Hugging Face Inference API base URL
    pub hf_api_url: String,
    pub hf_api_token: String,
    /// Hosted model ids (only used by the hosted backend)
    pub sentiment_model_id: String,
    pub topic_model_id: String,
    /// Max hosted API requests per second
    pub hosted_rps: f64,
    /// Upper bound on a single inference call
    pub inference_timeout: Duration,
    /// Default review JSON for CLI commands
    pub input_path: PathBuf,
    /// Default destination for batch evaluation
    pub output_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables, with defaults for
    /// everything except the hosted API token.
    pub fn load() -> Result<Self> {
        let backend = match env::var("REVIEWLENS_BACKEND").as_deref() {
            Ok("hosted") => InferenceBackend::Hosted,
            Ok("onnx") | Err(_) => InferenceBackend::Onnx,
            Ok(other) => anyhow::bail!(
                "Unknown REVIEWLENS_BACKEND '{other}'. Use 'onnx' or 'hosted'."
            ),
        };

        let model_dir = env::var("REVIEWLENS_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| download::default_model_dir());

        let inference_timeout = match env::var("REVIEWLENS_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("REVIEWLENS_TIMEOUT_SECS is not a number: {raw}"))?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let hosted_rps = match env::var("REVIEWLENS_HOSTED_RPS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("REVIEWLENS_HOSTED_RPS is not a number: {raw}"))?,
            Err(_) => DEFAULT_HOSTED_RPS,
        };

        Ok(Self {
            backend,
            model_dir,
            hf_api_url: env::var("HF_API_URL").unwrap_or_else(|_| DEFAULT_HF_API_URL.to_string()),
            hf_api_token: env::var("HF_API_TOKEN").unwrap_or_default(),
            sentiment_model_id: env::var("REVIEWLENS_SENTIMENT_MODEL")
                .unwrap_or_else(|_| DEFAULT_SENTIMENT_MODEL_ID.to_string()),
            topic_model_id: env::var("REVIEWLENS_TOPIC_MODEL")
                .unwrap_or_else(|_| DEFAULT_TOPIC_MODEL_ID.to_string()),
            hosted_rps,
            inference_timeout,
            input_path: env::var("REVIEWLENS_INPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("all_reviews.json")),
            output_path: env::var("REVIEWLENS_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("evaluated_reviews.csv")),
        })
    }

    /// Validate that the chosen backend has what it needs.
    /// For ONNX: model files must exist (or user should run download-model).
    /// For hosted: the API token must be set.
    pub fn require_backend(&self) -> Result<()> {
        match self.backend {
            InferenceBackend::Onnx => {
                if !download::model_files_present(&self.model_dir) {
                    anyhow::bail!(
                        "ONNX model files not found in {}\n\
                         Run `reviewlens download-model` to download them.\n\
                         Or set REVIEWLENS_BACKEND=hosted to use the Hugging Face Inference API.",
                        self.model_dir.display()
                    );
                }
                Ok(())
            }
            InferenceBackend::Hosted => {
                if self.hf_api_token.is_empty() {
                    anyhow::bail!(
                        "HF_API_TOKEN not set. Add it to your .env file to use the hosted backend."
                    );
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: InferenceBackend, model_dir: PathBuf, token: &str) -> Config {
        Config {
            backend,
            model_dir,
            hf_api_url: DEFAULT_HF_API_URL.to_string(),
            hf_api_token: token.to_string(),
            sentiment_model_id: DEFAULT_SENTIMENT_MODEL_ID.to_string(),
            topic_model_id: DEFAULT_TOPIC_MODEL_ID.to_string(),
            hosted_rps: DEFAULT_HOSTED_RPS,
            inference_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            input_path: PathBuf::from("all_reviews.json"),
            output_path: PathBuf::from("evaluated_reviews.csv"),
        }
    }

    #[test]
    fn test_hosted_requires_token() {
        let missing = config(InferenceBackend::Hosted, PathBuf::new(), "");
        let err = missing.require_backend().unwrap_err();
        assert!(err.to_string().contains("HF_API_TOKEN"));

        let present = config(InferenceBackend::Hosted, PathBuf::new(), "hf_test");
        assert!(present.require_backend().is_ok());
    }

    #[test]
    fn test_onnx_requires_model_files() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(InferenceBackend::Onnx, dir.path().to_path_buf(), "");
        let err = cfg.require_backend().unwrap_err();
        assert!(err.to_string().contains("download-model"));

        for sub in [
            download::sentiment_model_dir(dir.path()),
            download::topic_model_dir(dir.path()),
        ] {
            std::fs::create_dir_all(&sub).unwrap();
            std::fs::write(sub.join(download::MODEL_FILE), b"fake").unwrap();
            std::fs::write(sub.join(download::TOKENIZER_FILE), b"fake").unwrap();
        }
        assert!(cfg.require_backend().is_ok());
    }
}
