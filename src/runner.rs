//! Batch augmentation of corpus files.

use crate::augment::{Augmenter, Policy};
use crate::core::{AugmentError, ErrorMode};
use crate::corpus::{read_records, write_record};
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub augmented: usize,
    pub skipped: usize,
}

/// Applies one policy to every record of a corpus, writing each original
/// record followed by its augmented copy.
pub struct BatchRunner<'a> {
    augmenter: &'a Augmenter<'a>,
    policy: Policy,
    error_mode: ErrorMode,
    seed: u64,
    show_progress: bool,
}

impl<'a> BatchRunner<'a> {
    pub fn new(augmenter: &'a Augmenter<'a>, policy: Policy) -> Self {
        let config = augmenter.config();
        Self {
            augmenter,
            policy,
            error_mode: config.error_mode,
            seed: config.seed,
            show_progress: false,
        }
    }

    /// Parses `policy` before anything is read or written.
    pub fn for_policy_name(
        augmenter: &'a Augmenter<'a>,
        policy: &str,
    ) -> Result<Self, AugmentError> {
        Ok(Self::new(augmenter, policy.parse()?))
    }

    pub fn error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Augments every record read from `reader` into `writer`.
    ///
    /// The sampling RNG is seeded afresh on every call, so two runs over the
    /// same input with the same oracle produce the same output.
    pub fn run<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> anyhow::Result<RunSummary> {
        let records = read_records(reader)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut summary = RunSummary {
            records: records.len(),
            ..Default::default()
        };

        tracing::info!(
            policy = %self.policy,
            records = records.len(),
            seed = self.seed,
            "starting augmentation run"
        );
        let progress = self.progress_bar(records.len());

        for (index, record) in records.iter().enumerate() {
            write_record(&mut writer, record)?;
            match self.augmenter.augment(self.policy, record, &mut rng) {
                Ok(augmented) => {
                    write_record(&mut writer, &augmented)?;
                    summary.augmented += 1;
                }
                Err(err) if self.error_mode == ErrorMode::Skip => {
                    tracing::warn!(
                        index,
                        sentence = %record.sentence,
                        target = %record.target,
                        error = %err,
                        "skipping record"
                    );
                    summary.skipped += 1;
                }
                Err(err) => {
                    if let Some(pb) = &progress {
                        pb.abandon();
                    }
                    return Err(err.context(format!(
                        "failed to augment record {index} (`{}`)",
                        record.sentence
                    )));
                }
            }
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        writer.flush()?;
        if let Some(pb) = progress {
            pb.finish_with_message("done");
        }
        tracing::info!(
            augmented = summary.augmented,
            skipped = summary.skipped,
            "augmentation run finished"
        );
        Ok(summary)
    }

    /// Augments the corpus at `input` into a new file at `output`.
    pub fn run_files(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> anyhow::Result<RunSummary> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let reader = BufReader::new(
            File::open(input).with_context(|| format!("failed to open corpus {input:?}"))?,
        );
        let writer = BufWriter::new(
            File::create(output).with_context(|| format!("failed to create {output:?}"))?,
        );
        self.run(reader, writer)
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("augmenting with {}", self.policy));
        Some(pb)
    }
}
