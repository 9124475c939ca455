use super::error::AugmentError;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// In-text marker standing for the aspect target.
pub const PLACEHOLDER: &str = "$T$";

/// Polarity attached to an aspect target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    /// The corpus code: `-1`, `0` or `1`.
    pub fn code(&self) -> &'static str {
        match self {
            Sentiment::Negative => "-1",
            Sentiment::Neutral => "0",
            Sentiment::Positive => "1",
        }
    }

    /// The word prepended to the input of prepend-conditioned models.
    pub fn word(&self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
        }
    }

    /// Label index used as token-type id by conditional models.
    pub fn index(&self) -> u32 {
        match self {
            Sentiment::Negative => 0,
            Sentiment::Neutral => 1,
            Sentiment::Positive => 2,
        }
    }
}

impl FromStr for Sentiment {
    type Err = AugmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "-1" => Ok(Sentiment::Negative),
            "0" => Ok(Sentiment::Neutral),
            "1" => Ok(Sentiment::Positive),
            other => Err(AugmentError::InvalidSentiment(other.to_string())),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One labelled example: a sentence containing `$T$`, the target it stands for,
/// and the sentiment towards that target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub sentence: String,
    pub target: String,
    pub sentiment: Sentiment,
}

impl Record {
    pub fn new(
        sentence: impl Into<String>,
        target: impl Into<String>,
        sentiment: Sentiment,
    ) -> Self {
        Self {
            sentence: sentence.into(),
            target: target.into(),
            sentiment,
        }
    }

    /// Number of `$T$` markers in the sentence.
    pub fn placeholder_count(&self) -> usize {
        self.sentence.matches(PLACEHOLDER).count()
    }

    /// The sentence with every placeholder replaced by the target text.
    pub fn literal_sentence(&self) -> String {
        self.sentence.replace(PLACEHOLDER, &self.target)
    }

    /// Like [`literal_sentence`](Self::literal_sentence), also returning the
    /// byte range each placeholder's target text occupies, in order.
    pub fn literal_sentence_with_targets(&self) -> (String, Vec<Range<usize>>) {
        let mut text = String::with_capacity(self.sentence.len());
        let mut targets = Vec::new();
        for (i, segment) in self.sentence.split(PLACEHOLDER).enumerate() {
            if i > 0 {
                let start = text.len();
                text.push_str(&self.target);
                targets.push(start..text.len());
            }
            text.push_str(segment);
        }
        (text, targets)
    }

    /// A copy with a new sentence and target; the sentiment never changes.
    pub fn with_text(&self, sentence: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(sentence, target, self.sentiment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_codes_round_trip() {
        for code in ["-1", "0", "1"] {
            let sentiment: Sentiment = code.parse().unwrap();
            assert_eq!(sentiment.code(), code);
        }
        assert!(matches!(
            "2".parse::<Sentiment>(),
            Err(AugmentError::InvalidSentiment(_))
        ));
    }

    #[test]
    fn literal_sentence_fills_every_placeholder() {
        let record = Record::new("The $T$ and the $T$.", "fish", Sentiment::Positive);
        assert_eq!(record.placeholder_count(), 2);
        assert_eq!(record.literal_sentence(), "The fish and the fish.");
    }

    #[test]
    fn literal_targets_point_at_the_filled_placeholders() {
        let record = Record::new("$T$ and the $T$.", "red fish", Sentiment::Positive);
        let (text, targets) = record.literal_sentence_with_targets();
        assert_eq!(text, record.literal_sentence());
        assert_eq!(targets, vec![0..8, 17..25]);
        assert!(targets.iter().all(|r| &text[r.clone()] == "red fish"));

        let unmarked = Record::new("No marker here.", "fish", Sentiment::Neutral);
        assert!(unmarked.literal_sentence_with_targets().1.is_empty());
    }
}
