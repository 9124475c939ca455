//! Hugging Face Hub file loading.
//!
//! Files are fetched with the blocking `hf-hub` API since model construction
//! runs inside the synchronous loader handed to the model cache. Local paths
//! given in model options bypass the Hub entirely.

use anyhow::Context;
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokenizers::Tokenizer;

#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub revision: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, revision: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            revision: revision.into(),
            filename: filename.into(),
        }
    }

    pub fn load(&self) -> anyhow::Result<PathBuf> {
        let api = ApiBuilder::new().with_progress(false).build()?;
        let repo = api.repo(Repo::with_revision(
            self.repo.clone(),
            RepoType::Model,
            self.revision.clone(),
        ));

        // Concurrent downloads of one repo contend for the same lock file.
        let max_retries = 3;
        let mut attempt = 0;
        loop {
            match repo.get(&self.filename) {
                Ok(path) => return Ok(path),
                Err(e)
                    if e.to_string().contains("Lock acquisition failed")
                        && attempt < max_retries - 1 =>
                {
                    let wait = Duration::from_millis(100 * (1 << attempt));
                    tracing::debug!(repo = %self.repo, file = %self.filename, ?wait, "hub lock busy, retrying");
                    std::thread::sleep(wait);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("failed to fetch `{}` from `{}`", self.filename, self.repo)
                    })
                }
            }
        }
    }
}

/// A local override, or the named file from the Hub.
pub fn resolve_file(
    local: Option<&Path>,
    repo: &str,
    revision: &str,
    filename: &str,
) -> anyhow::Result<PathBuf> {
    match local {
        Some(path) => {
            anyhow::ensure!(path.exists(), "file {path:?} does not exist");
            Ok(path.to_path_buf())
        }
        None => HfLoader::new(repo, revision, filename).load(),
    }
}

/// A local weight file, or `model.safetensors` / `pytorch_model.bin` from the Hub.
pub fn resolve_weights(local: Option<&Path>, repo: &str, revision: &str) -> anyhow::Result<PathBuf> {
    if let Some(path) = local {
        anyhow::ensure!(path.exists(), "weight file {path:?} does not exist");
        return Ok(path.to_path_buf());
    }
    HfLoader::new(repo, revision, "model.safetensors")
        .load()
        .or_else(|_| HfLoader::new(repo, revision, "pytorch_model.bin").load())
        .with_context(|| {
            format!(
                "model weights not found in repo {repo}; expected `model.safetensors` or `pytorch_model.bin`"
            )
        })
}

pub fn load_tokenizer(path: &Path) -> anyhow::Result<Tokenizer> {
    Tokenizer::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {e}"))
}
