//! Persistence of search history and per-trial results.

use super::space::Params;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    Ok,
    Fail,
}

/// One evaluated point of the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub tid: usize,
    pub params: Params,
    /// `-accuracy`; absent when the objective failed.
    pub loss: Option<f64>,
    pub status: TrialStatus,
}

/// The full search history, saved as JSON so a later search can resume it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trials {
    pub trials: Vec<Trial>,
}

impl Trials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a saved history, or starts a fresh one when `path` does not exist.
    pub fn load_or_new(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(?path, "starting from scratch: new trials");
            return Ok(Self::new());
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read trials {path:?}"))?;
        let trials: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse trials {path:?}"))?;
        tracing::info!(?path, existing = trials.len(), "resuming saved trials");
        Ok(trials)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write trials {path:?}"))
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn push(&mut self, params: Params, loss: Option<f64>) -> &Trial {
        let status = if loss.is_some() {
            TrialStatus::Ok
        } else {
            TrialStatus::Fail
        };
        self.trials.push(Trial {
            tid: self.trials.len(),
            params,
            loss,
            status,
        });
        &self.trials[self.trials.len() - 1]
    }

    /// Successful trials with their losses.
    pub fn completed(&self) -> impl Iterator<Item = (&Params, f64)> {
        self.trials
            .iter()
            .filter_map(|t| t.loss.map(|loss| (&t.params, loss)))
    }

    pub fn best(&self) -> Option<&Trial> {
        self.trials
            .iter()
            .filter(|t| t.loss.is_some())
            .min_by(|a, b| a.loss.partial_cmp(&b.loss).unwrap_or(std::cmp::Ordering::Equal))
    }
}

/// What is written for each successful trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub loss: f64,
    pub status: TrialStatus,
    pub space: Params,
}

/// A directory of `<accuracy>.txt.json` result files.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

const RESULT_SUFFIX: &str = ".txt.json";

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves one result under a file named after its accuracy.
    pub fn save(&self, result: &TrialResult) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create results directory {:?}", self.dir))?;
        let path = self.dir.join(format!("{}{RESULT_SUFFIX}", -result.loss));
        fs::write(&path, serde_json::to_string_pretty(result)?)
            .with_context(|| format!("failed to write result {path:?}"))?;
        Ok(path)
    }

    fn result_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_result = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(RESULT_SUFFIX));
            if is_result {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// The saved result with the lowest loss.
    pub fn best(&self) -> anyhow::Result<Option<TrialResult>> {
        let mut best: Option<TrialResult> = None;
        for path in self.result_files()? {
            let content = fs::read_to_string(&path)?;
            let result: TrialResult = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse result {path:?}"))?;
            if best.as_ref().is_none_or(|b| result.loss < b.loss) {
                best = Some(result);
            }
        }
        Ok(best)
    }

    /// Writes the best parameters found so far to `path`. Returns `false` when
    /// there is nothing to write.
    pub fn write_best(&self, path: impl AsRef<Path>) -> anyhow::Result<bool> {
        let Some(best) = self.best()? else {
            return Ok(false);
        };
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&best.space)?)
            .with_context(|| format!("failed to write best parameters {path:?}"))?;
        Ok(true)
    }

    /// Deletes every result file, returning how many were removed.
    pub fn clear(&self) -> anyhow::Result<usize> {
        let mut removed = 0;
        for path in self.result_files()? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(?path, error = %e, "failed to delete result file"),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(lr: f64) -> Params {
        Params::from([("learning_rate".to_string(), lr)])
    }

    #[test]
    fn trials_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trials.json");
        assert!(Trials::load_or_new(&path).unwrap().is_empty());

        let mut trials = Trials::new();
        trials.push(params(0.01), Some(-0.8));
        trials.push(params(0.05), None);
        trials.save(&path).unwrap();

        let loaded = Trials::load_or_new(&path).unwrap();
        assert_eq!(loaded, trials);
        assert_eq!(loaded.trials[1].status, TrialStatus::Fail);
        assert_eq!(loaded.best().unwrap().tid, 0);
    }

    #[test]
    fn store_finds_best_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results"));
        assert!(store.best().unwrap().is_none());

        for (loss, lr) in [(-0.81, 0.01), (-0.86, 0.02), (-0.79, 0.03)] {
            store
                .save(&TrialResult {
                    loss,
                    status: TrialStatus::Ok,
                    space: params(lr),
                })
                .unwrap();
        }
        let best = store.best().unwrap().unwrap();
        assert_eq!(best.loss, -0.86);

        let best_file = dir.path().join("best/params.json");
        assert!(store.write_best(&best_file).unwrap());
        let written: Params =
            serde_json::from_str(&fs::read_to_string(&best_file).unwrap()).unwrap();
        assert_eq!(written, params(0.02));

        assert_eq!(store.clear().unwrap(), 3);
        assert!(store.best().unwrap().is_none());
    }
}
