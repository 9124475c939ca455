//! Builds the unique-token corpus consumed by the downstream embedding and
//! classification stage.
//!
//! Every sub-word token `w` is renamed `w_<n>`, where `n` counts the earlier
//! occurrences of `w` across the whole corpus, so each token instance can be
//! paired with its own contextual embedding. `$T$` stays as is.

use crate::core::{Record, PLACEHOLDER};
use crate::corpus::read_records;
use anyhow::Context;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Occurrence counter shared by every line of a corpus.
#[derive(Debug, Default)]
pub struct UniqueTokens {
    counts: HashMap<String, usize>,
}

impl UniqueTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numbers one token, advancing its counter.
    pub fn number(&mut self, token: &str) -> String {
        let count = self.counts.entry(token.to_string()).or_insert(0);
        let numbered = format!("{token}_{count}");
        *count += 1;
        numbered
    }

    /// Tokenizes `text` segment by segment around placeholders and numbers
    /// every token.
    pub fn line<F>(&mut self, text: &str, tokenize: &mut F) -> anyhow::Result<String>
    where
        F: FnMut(&str) -> anyhow::Result<Vec<String>>,
    {
        let mut out = Vec::new();
        for (i, segment) in text.split(PLACEHOLDER).enumerate() {
            if i > 0 {
                out.push(PLACEHOLDER.to_string());
            }
            for token in tokenize(segment)? {
                out.push(self.number(&token));
            }
        }
        Ok(out.join(" "))
    }

    /// Number of distinct tokens seen so far.
    pub fn vocabulary_size(&self) -> usize {
        self.counts.len()
    }
}

/// Converts records into numbered corpus lines, three per record.
pub fn unique_lines<F>(records: &[Record], mut tokenize: F) -> anyhow::Result<Vec<String>>
where
    F: FnMut(&str) -> anyhow::Result<Vec<String>>,
{
    let mut unique = UniqueTokens::new();
    let mut lines = Vec::with_capacity(records.len() * 3);
    for record in records {
        lines.push(unique.line(&record.sentence, &mut tokenize)?);
        lines.push(unique.line(&record.target, &mut tokenize)?);
        lines.push(record.sentiment.code().to_string());
    }
    tracing::debug!(vocabulary = unique.vocabulary_size(), "numbered corpus");
    Ok(lines)
}

/// Lines of the train part: the original train file's line count, doubled
/// when every train record was followed by an augmented copy.
pub fn train_line_count(original_train_lines: usize, augmented: bool) -> usize {
    if augmented {
        original_train_lines * 2
    } else {
        original_train_lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareSummary {
    pub train_lines: usize,
    pub test_lines: usize,
}

/// Writes the first `train_lines` lines of `lines` to `train` and the rest to
/// `test`.
pub fn write_split<W1: Write, W2: Write>(
    lines: &[String],
    train_lines: usize,
    mut train: W1,
    mut test: W2,
) -> anyhow::Result<PrepareSummary> {
    let split = train_lines.min(lines.len());
    if split < train_lines {
        tracing::warn!(
            requested = train_lines,
            available = lines.len(),
            "corpus shorter than the train part"
        );
    }
    for line in &lines[..split] {
        writeln!(train, "{line}")?;
    }
    for line in &lines[split..] {
        writeln!(test, "{line}")?;
    }
    train.flush()?;
    test.flush()?;
    Ok(PrepareSummary {
        train_lines: split,
        test_lines: lines.len() - split,
    })
}

/// Counts the lines of a file.
pub fn count_lines(path: impl AsRef<Path>) -> anyhow::Result<usize> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open {path:?}"))?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

/// Reads a complete corpus, numbers it and splits it into train and test files.
pub fn prepare_files<F>(
    corpus: impl AsRef<Path>,
    train_out: impl AsRef<Path>,
    test_out: impl AsRef<Path>,
    train_lines: usize,
    tokenize: F,
) -> anyhow::Result<PrepareSummary>
where
    F: FnMut(&str) -> anyhow::Result<Vec<String>>,
{
    let corpus = corpus.as_ref();
    let reader =
        BufReader::new(File::open(corpus).with_context(|| format!("failed to open {corpus:?}"))?);
    let records = read_records(reader)?;
    let lines = unique_lines(&records, tokenize)?;

    let create = |path: &Path| {
        File::create(path)
            .map(BufWriter::new)
            .with_context(|| format!("failed to create {path:?}"))
    };
    let summary = write_split(
        &lines,
        train_lines,
        create(train_out.as_ref())?,
        create(test_out.as_ref())?,
    )?;
    tracing::info!(
        train = summary.train_lines,
        test = summary.test_lines,
        "wrote unique-token corpus"
    );
    Ok(summary)
}
