//! Decides, per policy, what happens to every token of a sentence.
//!
//! Plans are computed over an immutable snapshot before the model is queried,
//! so the substitution pass never has to mutate the sequence it is reading.

use super::span::LocatedTarget;
use super::tagger::{is_punctuation, Token};
use rand::rngs::StdRng;
use rand::Rng;

/// What the substitution pass does with one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Emit the original token.
    Keep,
    /// Mask the token and emit the model's resolved prediction.
    Predict,
    /// Emit this token instead of the original.
    Replace(String),
    /// Copy the token already emitted at the matching primary-span position.
    Mirror,
}

/// One action per token, in sentence order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubstitutionPlan {
    pub actions: Vec<Action>,
}

impl SubstitutionPlan {
    pub fn keep_all(len: usize) -> Self {
        Self {
            actions: vec![Action::Keep; len],
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of model queries the plan will make.
    pub fn predictions(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::Predict))
            .count()
    }

    pub fn predicted_positions(&self) -> Vec<usize> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| matches!(a, Action::Predict))
            .map(|(i, _)| i)
            .collect()
    }

    fn mirror_duplicate(&mut self, located: &LocatedTarget) {
        if let Some(duplicate) = located.duplicate {
            for i in duplicate.indices() {
                self.actions[i] = Action::Mirror;
            }
        }
    }
}

/// A sub-word token of the `random` policy. Placeholders are split off before
/// tokenization so they can never be selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Word(String),
    Placeholder,
}

/// Shares of the three outcomes of a `random` visit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomMasking {
    pub mask_probability: f64,
    pub predict_share: f64,
    pub keep_share: f64,
}

/// Plan for the `random` policy.
///
/// At most `ceil(mask_probability * eligible)` tokens are altered. Eligible
/// tokens are visited left to right while budget remains; each visit draws
/// once: below `predict_share` the token is predicted, below
/// `predict_share + keep_share` it is kept, otherwise it is swapped for a
/// random vocabulary token drawn through `random_token`. Predicted and swapped
/// tokens spend one unit of budget each; kept ones are free.
pub fn plan_random<F>(
    pieces: &[Piece],
    masking: RandomMasking,
    rng: &mut StdRng,
    mut random_token: F,
) -> anyhow::Result<SubstitutionPlan>
where
    F: FnMut(&mut StdRng) -> anyhow::Result<String>,
{
    let eligible = |p: &Piece| matches!(p, Piece::Word(w) if !is_punctuation(w));
    let eligible_count = pieces.iter().filter(|p| eligible(p)).count();
    let budget = (masking.mask_probability * eligible_count as f64).ceil() as usize;

    let mut plan = SubstitutionPlan::keep_all(pieces.len());
    let mut spent = 0;
    for (i, piece) in pieces.iter().enumerate() {
        if spent >= budget {
            break;
        }
        if !eligible(piece) {
            continue;
        }
        let draw: f64 = rng.random();
        plan.actions[i] = if draw < masking.predict_share {
            spent += 1;
            Action::Predict
        } else if draw < masking.predict_share + masking.keep_share {
            Action::Keep
        } else {
            spent += 1;
            Action::Replace(random_token(rng)?)
        };
    }
    tracing::debug!(eligible_count, budget, spent, "random plan");
    Ok(plan)
}

/// Plan for the `nouns` policy: every noun and pronoun outside the duplicate
/// span is predicted.
pub fn plan_nouns(tokens: &[Token], located: &LocatedTarget) -> SubstitutionPlan {
    let mut plan = SubstitutionPlan::keep_all(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        if !token.is_punct && token.pos.is_nominal() && !located.in_duplicate(i) {
            plan.actions[i] = Action::Predict;
        }
    }
    plan.mirror_duplicate(located);
    plan
}

/// Plan for the `adjectives_adverbs` policy.
///
/// `max(1, round(fraction * count))` adjectives and adverbs are sampled
/// without replacement. Returns `None` when the sentence has none, in which
/// case the record passes through untouched.
pub fn plan_adjectives_adverbs(
    tokens: &[Token],
    located: &LocatedTarget,
    fraction: f64,
    rng: &mut StdRng,
) -> Option<SubstitutionPlan> {
    let candidates: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| !t.is_punct && t.pos.is_modifier() && !located.in_duplicate(*i))
        .map(|(i, _)| i)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let amount = ((fraction * candidates.len() as f64).round() as usize)
        .max(1)
        .min(candidates.len());
    let mut plan = SubstitutionPlan::keep_all(tokens.len());
    for k in rand::seq::index::sample(rng, candidates.len(), amount) {
        plan.actions[candidates[k]] = Action::Predict;
    }
    plan.mirror_duplicate(located);
    Some(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::span::Span;
    use crate::augment::tagger::Pos;
    use rand::SeedableRng;

    fn tagged(entries: &[(&str, Pos)]) -> Vec<Token> {
        entries.iter().map(|(t, p)| Token::new(*t, *p)).collect()
    }

    fn words(s: &str) -> Vec<Piece> {
        s.split_whitespace()
            .map(|w| {
                if w == "$T$" {
                    Piece::Placeholder
                } else {
                    Piece::Word(w.to_string())
                }
            })
            .collect()
    }

    const MASKING: RandomMasking = RandomMasking {
        mask_probability: 0.15,
        predict_share: 0.8,
        keep_share: 0.1,
    };

    #[test]
    fn random_never_touches_placeholders_or_punctuation() {
        let pieces = words("the $T$ is too dirty , but the salmon compensates it all .");
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = plan_random(&pieces, MASKING, &mut rng, |_| Ok("zebra".into())).unwrap();
            for (piece, action) in pieces.iter().zip(&plan.actions) {
                let eligible = matches!(piece, Piece::Word(w) if !is_punctuation(w));
                if !eligible {
                    assert_eq!(action, &Action::Keep);
                }
            }
            // 11 eligible words -> budget ceil(1.65) = 2
            assert!(plan.predictions() <= 2);
        }
    }

    #[test]
    fn random_swaps_share_the_budget_with_predictions() {
        let pieces = words("the food was great and the staff was friendly and quick too");
        // 12 eligible words -> budget ceil(1.8) = 2
        for seed in 0..2000 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = plan_random(&pieces, MASKING, &mut rng, |_| Ok("zebra".into())).unwrap();
            let altered = plan.actions.iter().filter(|a| **a != Action::Keep).count();
            assert!(altered <= 2, "seed {seed} altered {altered} tokens");
        }

        let swap_only = RandomMasking {
            mask_probability: 0.15,
            predict_share: 0.0,
            keep_share: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let plan = plan_random(&pieces, swap_only, &mut rng, |_| Ok("zebra".into())).unwrap();
        assert_eq!(plan.actions[0], Action::Replace("zebra".into()));
        assert_eq!(plan.actions[1], Action::Replace("zebra".into()));
        assert!(plan.actions[2..].iter().all(|a| *a == Action::Keep));
        assert_eq!(plan.predictions(), 0);
    }

    #[test]
    fn random_with_full_predict_share_spends_whole_budget_left_to_right() {
        let pieces = words("one two three four five six seven");
        let masking = RandomMasking {
            mask_probability: 0.3,
            predict_share: 1.0,
            keep_share: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let plan = plan_random(&pieces, masking, &mut rng, |_| Ok("x".into())).unwrap();
        // ceil(0.3 * 7) = 3
        assert_eq!(plan.predicted_positions(), vec![0, 1, 2]);
    }

    #[test]
    fn random_is_deterministic_for_a_seed() {
        let pieces = words("the food was great and the staff was friendly and quick");
        let run = || {
            let mut rng = StdRng::seed_from_u64(546297);
            plan_random(&pieces, MASKING, &mut rng, |r| {
                Ok(format!("tok{}", r.random_range(0..100)))
            })
            .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn nouns_skip_duplicate_span() {
        let tokens = tagged(&[
            ("fish", Pos::Noun),
            ("and", Pos::Other),
            ("fish", Pos::Noun),
            (".", Pos::Other),
        ]);
        let located = LocatedTarget {
            primary: Span::new(0, 1),
            duplicate: Some(Span::new(2, 3)),
        };
        let plan = plan_nouns(&tokens, &located);
        assert_eq!(
            plan.actions,
            vec![Action::Predict, Action::Keep, Action::Mirror, Action::Keep]
        );
    }

    #[test]
    fn adjectives_adverbs_absent_means_no_plan() {
        let tokens = tagged(&[("staff", Pos::Noun), ("left", Pos::Other)]);
        let located = LocatedTarget {
            primary: Span::new(0, 1),
            duplicate: None,
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert!(plan_adjectives_adverbs(&tokens, &located, 0.15, &mut rng).is_none());
    }

    #[test]
    fn adjectives_adverbs_masks_at_least_one() {
        let tokens = tagged(&[
            ("very", Pos::Adv),
            ("good", Pos::Adj),
            ("food", Pos::Noun),
        ]);
        let located = LocatedTarget {
            primary: Span::new(2, 3),
            duplicate: None,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let plan = plan_adjectives_adverbs(&tokens, &located, 0.15, &mut rng).unwrap();
        assert_eq!(plan.predictions(), 1);
        assert_eq!(plan.actions[2], Action::Keep);
    }
}
