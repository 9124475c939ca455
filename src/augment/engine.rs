//! Executes substitution plans against the masked language model and puts the
//! placeholder back into the result.

use super::oracle::{join_tokens, MaskOracle, MaskRequest};
use super::selector::{Action, SubstitutionPlan};
use super::span::LocatedTarget;
use crate::core::{AugmentError, Sentiment, PLACEHOLDER};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([,.:;!])").expect("static regex is valid"));

pub struct SubstitutionEngine<'a, O: ?Sized> {
    oracle: &'a O,
}

impl<'a, O: MaskOracle + ?Sized> SubstitutionEngine<'a, O> {
    pub fn new(oracle: &'a O) -> Self {
        Self { oracle }
    }

    /// Masks `span` of `snapshot` and returns the resolved replacement for
    /// `original`.
    pub fn fill(
        &self,
        snapshot: &[String],
        span: Range<usize>,
        original: &str,
        sentiment: Sentiment,
    ) -> anyhow::Result<String> {
        let request =
            MaskRequest::from_tokens(snapshot, span, self.oracle.mask_token(), sentiment);
        self.fill_request(&request, original)
    }

    pub fn fill_request(&self, request: &MaskRequest, original: &str) -> anyhow::Result<String> {
        let prediction = self.oracle.predict(request)?;
        tracing::debug!(
            text = %request.text,
            top1 = %prediction.top1,
            top2 = %prediction.top2,
            original,
            "mask filled"
        );
        Ok(prediction.resolve(original))
    }

    /// Runs `plan` over `snapshot`, one output token per input token.
    ///
    /// Every mask request is built from the untouched snapshot, never from
    /// earlier substitutions. `Mirror` positions copy the output of the primary
    /// span, cycling through it when the duplicate is longer.
    pub fn apply(
        &self,
        snapshot: &[String],
        plan: &SubstitutionPlan,
        located: Option<&LocatedTarget>,
        sentiment: Sentiment,
    ) -> anyhow::Result<Vec<String>> {
        anyhow::ensure!(
            snapshot.len() == plan.len(),
            "plan covers {} tokens but the sentence has {}",
            plan.len(),
            snapshot.len()
        );

        let mut out: Vec<String> = Vec::with_capacity(snapshot.len());
        for (i, action) in plan.actions.iter().enumerate() {
            let token = match action {
                Action::Keep => snapshot[i].clone(),
                Action::Replace(token) => token.clone(),
                Action::Predict => self.fill(snapshot, i..i + 1, &snapshot[i], sentiment)?,
                Action::Mirror => {
                    let located = located.ok_or_else(|| {
                        anyhow::anyhow!("mirror action at {i} without a located target")
                    })?;
                    let duplicate = located
                        .duplicate
                        .filter(|d| d.contains(i))
                        .ok_or_else(|| anyhow::anyhow!("mirror action at {i} outside duplicate"))?;
                    let primary = located.primary;
                    let source = primary.start + (i - duplicate.start) % primary.len();
                    anyhow::ensure!(
                        source < out.len(),
                        "duplicate span at {i} precedes its primary span"
                    );
                    out[source].clone()
                }
            };
            out.push(token);
        }
        Ok(out)
    }
}

/// Collapses the target spans of `out` back into placeholders.
///
/// Returns the sentence and the target text now occupying the primary span.
/// Spans keep their indices because plans map tokens one to one; the duplicate
/// is spliced first since it lies to the right of the primary span.
pub fn restore_placeholders(
    mut out: Vec<String>,
    located: &LocatedTarget,
) -> Result<(String, String), AugmentError> {
    let primary = located.primary;
    let target = join_tokens(&out[primary.indices()]);

    if let Some(duplicate) = located.duplicate {
        out.splice(duplicate.indices(), [PLACEHOLDER.to_string()]);
    }
    out.splice(primary.indices(), [PLACEHOLDER.to_string()]);

    let sentence = reassemble(&out);
    ensure_placeholder(&sentence)?;
    Ok((sentence, target))
}

/// Joins tokens into text: single spaces, `##` pieces glued, and no space
/// before `,` `.` `:` `;` `!`.
pub fn reassemble<S: AsRef<str>>(tokens: &[S]) -> String {
    SPACE_BEFORE_PUNCT
        .replace_all(&join_tokens(tokens), "$1")
        .into_owned()
}

pub fn ensure_placeholder(sentence: &str) -> Result<(), AugmentError> {
    if sentence.contains(PLACEHOLDER) {
        Ok(())
    } else {
        Err(AugmentError::PlaceholderMissing(sentence.to_string()))
    }
}
