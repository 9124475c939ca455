//! Three-line ABSA corpus files: sentence with `$T$`, target, sentiment code.

use crate::core::{AugmentError, Record, Sentiment};
use std::io::{BufRead, Write};

/// Reads every record from `reader`.
///
/// Lines are trimmed and trailing blank lines are ignored. A trailing record
/// with fewer than three lines is a [`AugmentError::MalformedCorpus`].
pub fn read_records<R: BufRead>(reader: R) -> anyhow::Result<Vec<Record>> {
    let mut lines = reader
        .lines()
        .map(|line| line.map(|l| l.trim().to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    if lines.len() % 3 != 0 {
        return Err(AugmentError::MalformedCorpus(format!(
            "{} lines do not form whole 3-line records",
            lines.len()
        ))
        .into());
    }

    lines
        .chunks_exact(3)
        .enumerate()
        .map(|(i, chunk)| {
            let sentiment: Sentiment = chunk[2].parse().map_err(|e| {
                AugmentError::MalformedCorpus(format!("record {} (line {}): {e}", i, i * 3 + 3))
            })?;
            Ok(Record::new(chunk[0].clone(), chunk[1].clone(), sentiment))
        })
        .collect()
}

/// Writes one record as three lines.
pub fn write_record<W: Write>(writer: &mut W, record: &Record) -> std::io::Result<()> {
    writeln!(writer, "{}", record.sentence)?;
    writeln!(writer, "{}", record.target)?;
    writeln!(writer, "{}", record.sentiment.code())
}
