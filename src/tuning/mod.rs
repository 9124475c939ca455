//! Hyperparameter search for the downstream sentiment classifier.
//!
//! The classifier itself lives outside this crate; an [`Objective`] trains it
//! with one parameter assignment and reports the accuracy. The [`Tuner`]
//! minimises `-accuracy` with [`Tpe`], persisting the history so a later
//! search can resume it.

pub mod space;
pub mod tpe;
pub mod trials;

pub use space::{Dimension, Params, SearchSpace};
pub use tpe::Tpe;
pub use trials::{ResultStore, Trial, TrialResult, TrialStatus, Trials};

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process::Command;

/// Trains and evaluates a model for one parameter assignment.
pub trait Objective {
    /// Returns the accuracy reached with `params`.
    fn evaluate(&mut self, params: &Params) -> anyhow::Result<f64>;
}

impl<F> Objective for F
where
    F: FnMut(&Params) -> anyhow::Result<f64>,
{
    fn evaluate(&mut self, params: &Params) -> anyhow::Result<f64> {
        self(params)
    }
}

/// Runs an external program with `--name=value` arguments and reads the
/// accuracy from the last non-empty line of its standard output.
#[derive(Debug, Clone)]
pub struct CommandObjective {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandObjective {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Fixed arguments passed before the parameters.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn parse_accuracy(stdout: &str) -> anyhow::Result<f64> {
        let line = stdout
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .ok_or_else(|| anyhow::anyhow!("objective printed nothing"))?;
        line.parse()
            .with_context(|| format!("last output line `{line}` is not an accuracy"))
    }
}

impl Objective for CommandObjective {
    fn evaluate(&mut self, params: &Params) -> anyhow::Result<f64> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .args(params.iter().map(|(name, value)| format!("--{name}={value}")))
            .output()
            .with_context(|| format!("failed to run {:?}", self.program))?;
        if !output.status.success() {
            anyhow::bail!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Self::parse_accuracy(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Outcome of one [`Tuner::run`].
#[derive(Debug, Clone)]
pub struct TuneOutcome {
    pub evaluated: usize,
    pub total: usize,
    pub best: Option<Trial>,
}

/// Drives a resumable TPE search.
pub struct Tuner {
    space: SearchSpace,
    tpe: Tpe,
    seed: u64,
    trials_path: Option<PathBuf>,
    store: Option<ResultStore>,
}

impl Tuner {
    pub fn new(space: SearchSpace) -> Self {
        Self {
            space,
            tpe: Tpe::default(),
            seed: 546297,
            trials_path: None,
            store: None,
        }
    }

    pub fn tpe(mut self, tpe: Tpe) -> Self {
        self.tpe = tpe;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Resume from, and save to, this trials file.
    pub fn trials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trials_path = Some(path.into());
        self
    }

    /// Also write one result file per successful trial.
    pub fn result_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Evaluates `n_evals` new points on top of any saved history, so the
    /// search ends with `existing + n_evals` trials.
    pub fn run<O: Objective>(&self, objective: &mut O, n_evals: usize) -> anyhow::Result<TuneOutcome> {
        self.space.validate()?;
        let mut trials = match &self.trials_path {
            Some(path) => Trials::load_or_new(path)?,
            None => Trials::new(),
        };
        let max_evals = trials.len() + n_evals;
        // offset by the history so a resumed search does not replay its draws
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(trials.len() as u64));

        while trials.len() < max_evals {
            let params = self.tpe.suggest(&self.space, &trials, &mut rng)?;
            let loss = match objective.evaluate(&params) {
                Ok(accuracy) => {
                    tracing::info!(trial = trials.len(), accuracy, ?params, "trial finished");
                    if let Some(store) = &self.store {
                        store.save(&TrialResult {
                            loss: -accuracy,
                            status: TrialStatus::Ok,
                            space: params.clone(),
                        })?;
                    }
                    Some(-accuracy)
                }
                Err(err) => {
                    tracing::warn!(trial = trials.len(), ?params, error = %err, "trial failed");
                    None
                }
            };
            trials.push(params, loss);
            if let Some(path) = &self.trials_path {
                trials.save(path)?;
            }
        }

        let best = trials.best().cloned();
        if let Some(best) = &best {
            tracing::info!(loss = ?best.loss, params = ?best.params, "best trial so far");
        }
        Ok(TuneOutcome {
            evaluated: n_evals,
            total: trials.len(),
            best,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_last_non_empty_line() {
        let out = "epoch 1\nepoch 2\n0.8731\n\n";
        assert_eq!(CommandObjective::parse_accuracy(out).unwrap(), 0.8731);
        assert!(CommandObjective::parse_accuracy("done\n").is_err());
        assert!(CommandObjective::parse_accuracy("").is_err());
    }
}
