use crate::core::Sentiment;
use rand::rngs::StdRng;

/// WordPiece marks word-internal pieces with this prefix.
pub const CONTINUATION_PREFIX: &str = "##";

/// A sentence with exactly one masked position, plus the label the model is
/// conditioned on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskRequest {
    pub text: String,
    pub sentiment: Sentiment,
}

impl MaskRequest {
    pub fn new(text: impl Into<String>, sentiment: Sentiment) -> Self {
        Self {
            text: text.into(),
            sentiment,
        }
    }

    /// Joins `tokens` with `mask` in place of the given range.
    pub fn from_tokens<S: AsRef<str>>(
        tokens: &[S],
        masked: std::ops::Range<usize>,
        mask: &str,
        sentiment: Sentiment,
    ) -> Self {
        let mut pieces: Vec<&str> = Vec::with_capacity(tokens.len() + 1 - masked.len());
        pieces.extend(tokens[..masked.start].iter().map(AsRef::as_ref));
        pieces.push(mask);
        pieces.extend(tokens[masked.end..].iter().map(AsRef::as_ref));
        Self::new(join_tokens(&pieces), sentiment)
    }
}

/// The model's two preferred fillers for a mask, best first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub top1: String,
    pub top2: String,
}

impl Prediction {
    pub fn new(top1: impl Into<String>, top2: impl Into<String>) -> Self {
        Self {
            top1: top1.into(),
            top2: top2.into(),
        }
    }

    /// The replacement for `original`: the first candidate unless it merely
    /// reproduces the original, in which case the second. There is no further
    /// fallback when the second candidate also equals the original.
    pub fn resolve(self, original: &str) -> String {
        if self.top1 == original {
            self.top2
        } else {
            self.top1
        }
    }
}

/// Sentiment-conditioned masked language model.
pub trait MaskOracle {
    /// The reserved token marking the position to fill.
    fn mask_token(&self) -> &str;

    /// Two candidates for the single mask in `request.text`.
    fn predict(&self, request: &MaskRequest) -> anyhow::Result<Prediction>;

    /// Sub-word tokens of `text` as the model's tokenizer sees them.
    fn tokenize(&self, text: &str) -> anyhow::Result<Vec<String>>;

    /// A vocabulary token drawn uniformly, special tokens excluded.
    fn random_token(&self, rng: &mut StdRng) -> anyhow::Result<String>;
}

impl<T: MaskOracle + ?Sized> MaskOracle for &T {
    fn mask_token(&self) -> &str {
        (**self).mask_token()
    }

    fn predict(&self, request: &MaskRequest) -> anyhow::Result<Prediction> {
        (**self).predict(request)
    }

    fn tokenize(&self, text: &str) -> anyhow::Result<Vec<String>> {
        (**self).tokenize(text)
    }

    fn random_token(&self, rng: &mut StdRng) -> anyhow::Result<String> {
        (**self).random_token(rng)
    }
}

/// Joins tokens with single spaces and glues `##` pieces to the previous token.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut out = String::new();
    for token in tokens {
        let token = token.as_ref();
        match token.strip_prefix(CONTINUATION_PREFIX) {
            Some(piece) if !out.is_empty() && !piece.is_empty() => out.push_str(piece),
            _ => {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(token);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_only_when_first_choice_is_a_no_op() {
        assert_eq!(Prediction::new("food", "meal").resolve("food"), "meal");
        assert_eq!(Prediction::new("dish", "meal").resolve("food"), "dish");
        // single fallback: no retry past the second candidate
        assert_eq!(Prediction::new("food", "food").resolve("food"), "food");
    }

    #[test]
    fn request_masks_a_whole_span() {
        let tokens = ["the", "mens", "bathroom", "is", "dirty"];
        let request = MaskRequest::from_tokens(&tokens, 1..3, "[MASK]", Sentiment::Negative);
        assert_eq!(request.text, "the [MASK] is dirty");
    }

    #[test]
    fn word_pieces_are_glued() {
        assert_eq!(join_tokens(&["play", "##ing", "games", "."]), "playing games .");
        assert_eq!(join_tokens(&["##", "x"]), "## x");
    }
}
