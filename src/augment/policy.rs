//! The augmentation policies and the `Augmenter` that runs them.

use super::engine::{ensure_placeholder, reassemble, restore_placeholders, SubstitutionEngine};
use super::locator::{SlidingWindowLocator, SpanLocator};
use super::oracle::{join_tokens, MaskOracle, MaskRequest};
use super::selector::{
    plan_adjectives_adverbs, plan_nouns, plan_random, Piece, RandomMasking, SubstitutionPlan,
};
use super::span::{LocatedTarget, Span};
use super::tagger::{PosTagger, Token};
use crate::core::{AugmentConfig, AugmentError, Record, PLACEHOLDER};
use rand::rngs::StdRng;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// A named combination of eligibility rule and masking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    Random,
    Nouns,
    AdjectivesAdverbs,
    Aspect,
    AspectThenAdjectivesAdverbs,
    NounsAndAdjectivesAdverbs,
}

impl Policy {
    pub const ALL: [Policy; 6] = [
        Policy::Random,
        Policy::Nouns,
        Policy::AdjectivesAdverbs,
        Policy::Aspect,
        Policy::AspectThenAdjectivesAdverbs,
        Policy::NounsAndAdjectivesAdverbs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Policy::Random => "random",
            Policy::Nouns => "nouns",
            Policy::AdjectivesAdverbs => "adjectives_adverbs",
            Policy::Aspect => "aspect",
            Policy::AspectThenAdjectivesAdverbs => "aspect_then_adjectives_adverbs",
            Policy::NounsAndAdjectivesAdverbs => "nouns_and_adjectives_adverbs",
        }
    }

    /// Whether the target is re-located with the strict similarity threshold
    /// (random and aspect workflows) rather than the loose one.
    pub fn uses_strict_matching(&self) -> bool {
        matches!(
            self,
            Policy::Random | Policy::Aspect | Policy::AspectThenAdjectivesAdverbs
        )
    }

    /// Whether the policy needs part-of-speech tags.
    pub fn needs_tagger(&self) -> bool {
        !matches!(self, Policy::Random | Policy::Aspect)
    }
}

impl FromStr for Policy {
    type Err = AugmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Policy::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| AugmentError::UnsupportedPolicy(s.to_string()))
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Applies policies to records.
///
/// Holds the model service and the POS capability by reference; both are
/// built once per process.
pub struct Augmenter<'a> {
    oracle: &'a dyn MaskOracle,
    tagger: Option<&'a dyn PosTagger>,
    strict: Box<dyn SpanLocator + 'a>,
    loose: Box<dyn SpanLocator + 'a>,
    config: AugmentConfig,
}

impl<'a> Augmenter<'a> {
    /// An augmenter for the policies that need no POS tags (`random`, `aspect`).
    pub fn new(oracle: &'a dyn MaskOracle, config: AugmentConfig) -> Self {
        Self {
            oracle,
            tagger: None,
            strict: Box::new(SlidingWindowLocator::new(config.similarity.strict)),
            loose: Box::new(SlidingWindowLocator::new(config.similarity.loose)),
            config,
        }
    }

    pub fn with_tagger(mut self, tagger: &'a dyn PosTagger) -> Self {
        self.tagger = Some(tagger);
        self
    }

    /// Replaces the target locators used by the strict and loose regimes.
    pub fn with_locators(
        mut self,
        strict: impl SpanLocator + 'a,
        loose: impl SpanLocator + 'a,
    ) -> Self {
        self.strict = Box::new(strict);
        self.loose = Box::new(loose);
        self
    }

    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    /// Augments one record. The sentiment is carried over unchanged.
    pub fn augment(
        &self,
        policy: Policy,
        record: &Record,
        rng: &mut StdRng,
    ) -> anyhow::Result<Record> {
        let strict = policy.uses_strict_matching();
        match policy {
            Policy::Random => self.random(record, rng),
            Policy::Nouns => self.nouns(record, strict),
            Policy::AdjectivesAdverbs => self.adjectives_adverbs(record, strict, rng),
            Policy::Aspect => self.aspect(record),
            Policy::AspectThenAdjectivesAdverbs => {
                let first = self.aspect(record)?;
                self.adjectives_adverbs(&first, strict, rng)
            }
            Policy::NounsAndAdjectivesAdverbs => {
                let first = self.adjectives_adverbs(record, strict, rng)?;
                self.nouns(&first, strict)
            }
        }
    }

    fn engine(&self) -> SubstitutionEngine<'_, dyn MaskOracle + 'a> {
        SubstitutionEngine::new(self.oracle)
    }

    fn locator(&self, strict: bool) -> &dyn SpanLocator {
        if strict {
            self.strict.as_ref()
        } else {
            self.loose.as_ref()
        }
    }

    fn tagger(&self) -> anyhow::Result<&'a dyn PosTagger> {
        self.tagger
            .ok_or_else(|| anyhow::anyhow!("this policy needs a part-of-speech tagger"))
    }

    /// Masks the whole target at once. The sentence keeps its placeholder; only
    /// the target text changes.
    fn aspect(&self, record: &Record) -> anyhow::Result<Record> {
        ensure_marked(record)?;
        let text = record
            .sentence
            .replacen(PLACEHOLDER, self.oracle.mask_token(), 1)
            .replace(PLACEHOLDER, &record.target);
        let request = MaskRequest::new(text, record.sentiment);
        let target = self.engine().fill_request(&request, &record.target)?;
        Ok(record.with_text(record.sentence.clone(), target))
    }

    /// BERT-style noising over sub-word tokens; the target is left as is.
    fn random(&self, record: &Record, rng: &mut StdRng) -> anyhow::Result<Record> {
        ensure_marked(record)?;
        let mut pieces = Vec::new();
        for (i, segment) in record.sentence.split(PLACEHOLDER).enumerate() {
            if i > 0 {
                pieces.push(Piece::Placeholder);
            }
            pieces.extend(self.oracle.tokenize(segment)?.into_iter().map(Piece::Word));
        }

        let masking = RandomMasking {
            mask_probability: self.config.mask_probability,
            predict_share: self.config.predict_share,
            keep_share: self.config.keep_share,
        };
        let plan = plan_random(&pieces, masking, rng, |rng| self.oracle.random_token(rng))?;

        // Requests see the target text where the placeholder stands.
        let target_text = join_tokens(&self.oracle.tokenize(&record.target)?);
        let snapshot: Vec<String> = pieces
            .iter()
            .map(|p| match p {
                Piece::Word(w) => w.clone(),
                Piece::Placeholder => target_text.clone(),
            })
            .collect();

        let mut out = self
            .engine()
            .apply(&snapshot, &plan, None, record.sentiment)?;
        for (token, piece) in out.iter_mut().zip(&pieces) {
            if *piece == Piece::Placeholder {
                *token = PLACEHOLDER.to_string();
            }
        }

        let sentence = reassemble(&out);
        ensure_placeholder(&sentence)?;
        Ok(record.with_text(sentence, record.target.clone()))
    }

    fn nouns(&self, record: &Record, strict: bool) -> anyhow::Result<Record> {
        self.substitute_tagged(
            record,
            strict,
            |token| token.pos.is_nominal(),
            |tokens, located| Some(plan_nouns(tokens, located)),
        )
    }

    fn adjectives_adverbs(
        &self,
        record: &Record,
        strict: bool,
        rng: &mut StdRng,
    ) -> anyhow::Result<Record> {
        let fraction = self.config.adj_adv_fraction;
        self.substitute_tagged(
            record,
            strict,
            |token| token.pos.is_modifier(),
            |tokens, located| plan_adjectives_adverbs(tokens, located, fraction, rng),
        )
    }

    /// Shared path of the tag-driven policies: literalise, tag, locate, plan,
    /// substitute, restore placeholders. A sentence without an `eligible` word
    /// or a `None` plan returns the record unchanged.
    fn substitute_tagged<E, F>(
        &self,
        record: &Record,
        strict: bool,
        eligible: E,
        plan: F,
    ) -> anyhow::Result<Record>
    where
        E: Fn(&Token) -> bool,
        F: FnOnce(&[Token], &LocatedTarget) -> Option<SubstitutionPlan>,
    {
        ensure_marked(record)?;
        let tagger = self.tagger()?;
        let (literal, targets) = record.literal_sentence_with_targets();
        let tokens = tagger.tag(&literal)?;
        if !tokens.iter().any(|t| !t.is_punct && eligible(t)) {
            tracing::debug!(sentence = %record.sentence, "no eligible words");
            return Ok(record.clone());
        }

        let target: Vec<String> = tagger
            .tag(&record.target)?
            .into_iter()
            .map(|t| t.text)
            .collect();
        let snapshot: Vec<String> = tokens.iter().map(|t| t.text.clone()).collect();
        let offsets = word_offsets(&literal, &tokens)?;
        let located = self.locate_placeholders(&snapshot, &offsets, &targets, &target, strict)?;

        let Some(plan) = plan(&tokens, &located) else {
            tracing::debug!(sentence = %record.sentence, "nothing to substitute");
            return Ok(record.clone());
        };

        let out = self
            .engine()
            .apply(&snapshot, &plan, Some(&located), record.sentiment)?;
        let (sentence, target) = restore_placeholders(out, &located)?;
        Ok(record.with_text(sentence, target))
    }

    /// Finds the target inside the words each placeholder was literalised
    /// into. The first placeholder gives the primary span and the second the
    /// duplicate; literal mentions elsewhere in the sentence are never matched.
    fn locate_placeholders(
        &self,
        snapshot: &[String],
        offsets: &[Range<usize>],
        targets: &[Range<usize>],
        target: &[String],
        strict: bool,
    ) -> anyhow::Result<LocatedTarget> {
        let locator = self.locator(strict);
        let mut spans = Vec::with_capacity(targets.len());
        for bytes in targets {
            let region = covering_words(offsets, bytes).ok_or_else(|| {
                AugmentError::TargetNotFound {
                    target: target.join(" "),
                    sentence: snapshot.join(" "),
                }
            })?;
            let found = locator.locate(&snapshot[region.indices()], target)?.primary;
            anyhow::ensure!(
                found.end <= region.len(),
                "located span {}..{} lies outside its {} words",
                found.start,
                found.end,
                region.len()
            );
            spans.push(Span::new(region.start + found.start, region.start + found.end));
        }

        match spans[..] {
            [primary] => Ok(LocatedTarget {
                primary,
                duplicate: None,
            }),
            [primary, duplicate] if !duplicate.overlaps(&primary) => Ok(LocatedTarget {
                primary,
                duplicate: Some(duplicate),
            }),
            [_, _] => Err(AugmentError::MalformedCorpus(format!(
                "both placeholders of `{}` fall in the same word",
                snapshot.join(" ")
            ))
            .into()),
            _ => Err(AugmentError::MalformedCorpus(format!(
                "{} placeholders in one sentence, expected one or two",
                spans.len()
            ))
            .into()),
        }
    }
}

/// Rejects input sentences that carry no placeholder at all.
fn ensure_marked(record: &Record) -> Result<(), AugmentError> {
    if record.placeholder_count() == 0 {
        return Err(AugmentError::MalformedCorpus(format!(
            "sentence `{}` has no `{PLACEHOLDER}` placeholder",
            record.sentence
        )));
    }
    Ok(())
}

/// Byte range of every tagged word inside `text`, searched left to right.
fn word_offsets(text: &str, tokens: &[Token]) -> anyhow::Result<Vec<Range<usize>>> {
    let mut cursor = 0;
    tokens
        .iter()
        .map(|token| {
            let start = text[cursor..]
                .find(token.text.as_str())
                .map(|at| cursor + at)
                .ok_or_else(|| {
                    anyhow::anyhow!("tagged word `{}` not found in `{text}`", token.text)
                })?;
            cursor = start + token.text.len();
            Ok(start..cursor)
        })
        .collect()
}

/// The words overlapping `bytes`.
fn covering_words(offsets: &[Range<usize>], bytes: &Range<usize>) -> Option<Span> {
    let overlaps = |word: &Range<usize>| word.start < bytes.end && bytes.start < word.end;
    let first = offsets.iter().position(overlaps)?;
    let last = offsets.iter().rposition(overlaps)?;
    Some(Span::new(first, last + 1))
}
