//! Re-identification of the aspect target inside a re-tokenized sentence.
//!
//! Tokenizers do not always split the target the way it was written in the
//! corpus, so windows are compared fuzzily rather than token by token.

use super::similarity::similar;
use super::span::{LocatedTarget, Span};
use crate::core::AugmentError;

/// Finds the primary occurrence of a target and, optionally, one duplicate.
pub trait SpanLocator {
    fn locate(&self, doc: &[String], target: &[String]) -> Result<LocatedTarget, AugmentError>;
}

/// Slides a window of the target's length over the sentence.
///
/// The first window whose joined text is similar enough to the joined target is
/// the primary span. Later matches overlapping the primary span are ignored;
/// every other later match overwrites the duplicate, so only the last survives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingWindowLocator {
    pub threshold: f64,
}

impl SlidingWindowLocator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl SpanLocator for SlidingWindowLocator {
    fn locate(&self, doc: &[String], target: &[String]) -> Result<LocatedTarget, AugmentError> {
        let not_found = || AugmentError::TargetNotFound {
            target: join(target),
            sentence: join(doc),
        };

        let width = target.len();
        if width == 0 || width > doc.len() {
            return Err(not_found());
        }

        let wanted = join(target);
        let mut primary: Option<Span> = None;
        let mut duplicate: Option<Span> = None;

        for start in 0..=doc.len() - width {
            let window = Span::new(start, start + width);
            if !similar(&join(&doc[window.indices()]), &wanted, self.threshold) {
                continue;
            }
            match primary {
                None => primary = Some(window),
                Some(first) if !window.overlaps(&first) => duplicate = Some(window),
                Some(_) => {}
            }
        }

        let primary = primary.ok_or_else(not_found)?;
        Ok(LocatedTarget { primary, duplicate })
    }
}

fn join(tokens: &[String]) -> String {
    tokens.join(" ")
}
