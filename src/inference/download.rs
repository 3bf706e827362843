// Model download helper for the local ONNX backend.
//
// Downloads two quantized ONNX exports from HuggingFace:
// 1. distilbert-base-uncased-finetuned-sst-2-english, sentiment (~67MB)
// 2. bart-large-mnli, zero-shot topic classification (~410MB)
//
// Files are stored in a platform-appropriate directory
// (~/.local/share/reviewlens/models/ on Linux) so they persist across runs.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::NamedTempFile;
use tracing::info;

/// Model file name inside each model directory.
pub const MODEL_FILE: &str = "model_quantized.onnx";
/// Tokenizer file name inside each model directory.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// One downloadable model: where it lives locally and where it comes from.
struct ModelSpec {
    name: &'static str,
    subdir: &'static str,
    hf_url: &'static str,
    approx_size: &'static str,
}

const SENTIMENT_MODEL: ModelSpec = ModelSpec {
    name: "distilbert-base-uncased-finetuned-sst-2-english",
    subdir: "distilbert-sst2",
    hf_url: "https://huggingface.co/Xenova/distilbert-base-uncased-finetuned-sst-2-english/resolve/main",
    approx_size: "~67 MB",
};

const TOPIC_MODEL: ModelSpec = ModelSpec {
    name: "bart-large-mnli",
    subdir: "bart-large-mnli",
    hf_url: "https://huggingface.co/Xenova/bart-large-mnli/resolve/main",
    approx_size: "~410 MB",
};

/// Returns the default directory for storing model files.
/// Uses the platform data directory: ~/.local/share/reviewlens/models/ on Linux.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reviewlens")
        .join("models")
}

/// Subdirectory within model_dir for the sentiment model.
pub fn sentiment_model_dir(base: &Path) -> PathBuf {
    base.join(SENTIMENT_MODEL.subdir)
}

/// Subdirectory within model_dir for the zero-shot topic model.
pub fn topic_model_dir(base: &Path) -> PathBuf {
    base.join(TOPIC_MODEL.subdir)
}

fn files_present(dir: &Path) -> bool {
    dir.join(MODEL_FILE).exists() && dir.join(TOKENIZER_FILE).exists()
}

/// Check whether both models have their model and tokenizer files.
pub fn model_files_present(base: &Path) -> bool {
    files_present(&sentiment_model_dir(base)) && files_present(&topic_model_dir(base))
}

/// Download both ONNX models.
///
/// Shows progress bars for the large files. Skips files that already exist.
/// Creates directories as needed.
pub async fn download_models(base: &Path) -> Result<()> {
    for spec in [&SENTIMENT_MODEL, &TOPIC_MODEL] {
        download_one(base, spec).await?;
    }
    Ok(())
}

async fn download_one(base: &Path, spec: &ModelSpec) -> Result<()> {
    let dir = base.join(spec.subdir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    println!("\n{}:", spec.name);

    let tokenizer_path = dir.join(TOKENIZER_FILE);
    if tokenizer_path.exists() {
        info!(model = spec.name, "Tokenizer already exists, skipping");
        println!("  {} (already exists)", TOKENIZER_FILE);
    } else {
        println!("  Downloading {}...", TOKENIZER_FILE);
        download_file(
            &format!("{}/{}", spec.hf_url, TOKENIZER_FILE),
            &tokenizer_path,
            false,
        )
        .await?;
    }

    let model_path = dir.join(MODEL_FILE);
    if model_path.exists() {
        info!(model = spec.name, "Model already exists, skipping");
        println!("  {} (already exists)", MODEL_FILE);
    } else {
        println!("  Downloading {} ({})...", MODEL_FILE, spec.approx_size);
        download_file(
            &format!("{}/onnx/{}", spec.hf_url, MODEL_FILE),
            &model_path,
            true,
        )
        .await?;
    }

    Ok(())
}

/// Download a single file from a URL to a local path.
/// If `show_progress` is true, display a progress bar.
async fn download_file(url: &str, dest: &Path, show_progress: bool) -> Result<()> {
    let client = reqwest::Client::new();
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let pb = if show_progress {
        let pb = match response.content_length() {
            Some(size) => {
                let pb = ProgressBar::new(size);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                        .expect("valid template")
                        .progress_chars("=> "),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("    {spinner} {bytes}")
                        .expect("valid template"),
                );
                pb
            }
        };
        Some(pb)
    } else {
        None
    };

    // Stream into a temp file next to `dest`; a failed or interrupted
    // download drops it, so no partial file is left for later runs to skip
    let mut tmp = temp_file_beside(dest)?;

    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read response body")?
    {
        tmp.write_all(&chunk)
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        written += chunk.len() as u64;
        if let Some(ref pb) = pb {
            pb.set_position(written);
        }
    }

    finish_download(tmp, dest)?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!("Downloaded {} to {}", url, dest.display());
    Ok(())
}

fn temp_file_beside(dest: &Path) -> Result<NamedTempFile> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))
}

/// Flush a fully written download and move it into place.
fn finish_download(tmp: NamedTempFile, dest: &Path) -> Result<()> {
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to flush {}", dest.display()))?;
    tmp.persist(dest)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;
    Ok(())
}
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir_is_under_reviewlens() {
        let dir = default_model_dir();
        let path_str = dir.to_string_lossy();
        assert!(
            path_str.contains("reviewlens") && path_str.contains("models"),
            "Expected path containing reviewlens/models, got: {path_str}"
        );
    }

    #[test]
    fn test_model_dirs_are_distinct_subdirectories() {
        let base = PathBuf::from("/tmp/test-models");
        assert_eq!(sentiment_model_dir(&base), base.join("distilbert-sst2"));
        assert_eq!(topic_model_dir(&base), base.join("bart-large-mnli"));
    }

    #[test]
    fn test_model_files_present_false_when_empty() {
        let dir = std::env::temp_dir().join("reviewlens-test-nonexistent");
        assert!(!model_files_present(&dir));
    }

    #[test]
    fn test_model_files_present_requires_both_models() {
        let base = tempfile::tempdir().unwrap();
        let sentiment = sentiment_model_dir(base.path());
        std::fs::create_dir_all(&sentiment).unwrap();
        std::fs::write(sentiment.join(MODEL_FILE), b"fake").unwrap();
        std::fs::write(sentiment.join(TOKENIZER_FILE), b"fake").unwrap();
        assert!(!model_files_present(base.path()), "topic model still missing");

        let topic = topic_model_dir(base.path());
        std::fs::create_dir_all(&topic).unwrap();
        std::fs::write(topic.join(MODEL_FILE), b"fake").unwrap();
        std::fs::write(topic.join(TOKENIZER_FILE), b"fake").unwrap();
        assert!(model_files_present(base.path()));
    }

    #[test]
    fn test_interrupted_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(MODEL_FILE);

        let mut tmp = temp_file_beside(&dest).unwrap();
        tmp.write_all(b"partial").unwrap();
        drop(tmp);

        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(!files_present(dir.path()));
    }

    #[test]
    fn test_finished_download_is_moved_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(TOKENIZER_FILE);

        let mut tmp = temp_file_beside(&dest).unwrap();
        tmp.write_all(b"{}").unwrap();
        finish_download(tmp, &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"{}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
