#![allow(dead_code)]

use absa_augment::augment::{MaskOracle, MaskRequest, Pos, PosTagger, Prediction, Token};
use rand::rngs::StdRng;
use rand::Rng;
use std::cell::RefCell;
use std::collections::HashMap;

/// Whitespace words with trailing punctuation split off: `dirty,` -> `dirty` `,`.
pub fn simple_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split_whitespace() {
        let stem = word.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '$');
        if !stem.is_empty() {
            tokens.push(stem.to_string());
        }
        tokens.extend(word[stem.len()..].chars().map(String::from));
    }
    tokens
}

type Rule = Box<dyn Fn(&MaskRequest) -> Prediction>;

/// A masked language model whose answers are scripted by the test.
pub struct ScriptedOracle {
    rule: Rule,
    vocabulary: Vec<String>,
    pub requests: RefCell<Vec<MaskRequest>>,
}

impl ScriptedOracle {
    /// Always answers `top1`, then `top2`.
    pub fn constant(top1: &str, top2: &str) -> Self {
        let prediction = Prediction::new(top1, top2);
        Self::from_fn(move |_| prediction.clone())
    }

    pub fn from_fn(rule: impl Fn(&MaskRequest) -> Prediction + 'static) -> Self {
        Self {
            rule: Box::new(rule),
            vocabulary: ["apple", "river", "quick", "seven", "blue"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl MaskOracle for ScriptedOracle {
    fn mask_token(&self) -> &str {
        "[MASK]"
    }

    fn predict(&self, request: &MaskRequest) -> anyhow::Result<Prediction> {
        anyhow::ensure!(
            request.text.matches("[MASK]").count() == 1,
            "request must hold exactly one mask: {}",
            request.text
        );
        self.requests.borrow_mut().push(request.clone());
        Ok((self.rule)(request))
    }

    fn tokenize(&self, text: &str) -> anyhow::Result<Vec<String>> {
        Ok(simple_tokens(text))
    }

    fn random_token(&self, rng: &mut StdRng) -> anyhow::Result<String> {
        Ok(self.vocabulary[rng.random_range(0..self.vocabulary.len())].clone())
    }
}

/// Tags words from a fixed lexicon; everything else is `Other`.
pub struct LexiconTagger {
    lexicon: HashMap<String, Pos>,
}

impl LexiconTagger {
    pub fn new(entries: &[(&str, Pos)]) -> Self {
        Self {
            lexicon: entries
                .iter()
                .map(|(w, p)| (w.to_lowercase(), *p))
                .collect(),
        }
    }

    /// A small restaurant-review lexicon.
    pub fn restaurant() -> Self {
        Self::new(&[
            ("mens", Pos::Noun),
            ("bathroom", Pos::Noun),
            ("salmon", Pos::Noun),
            ("fish", Pos::Noun),
            ("staff", Pos::Noun),
            ("food", Pos::Noun),
            ("prices", Pos::Noun),
            ("it", Pos::Pron),
            ("dirty", Pos::Adj),
            ("great", Pos::Adj),
            ("cheap", Pos::Adj),
            ("friendly", Pos::Adj),
            ("too", Pos::Adv),
            ("very", Pos::Adv),
        ])
    }
}

impl PosTagger for LexiconTagger {
    fn tag(&self, text: &str) -> anyhow::Result<Vec<Token>> {
        Ok(simple_tokens(text)
            .into_iter()
            .map(|word| {
                let pos = self
                    .lexicon
                    .get(&word.to_lowercase())
                    .copied()
                    .unwrap_or(Pos::Other);
                Token::new(word, pos)
            })
            .collect())
    }
}

pub const BATHROOM: &str = "The $T$ is too dirty, but the salmon compensates it all.";

/// A small corpus in the 3-line format.
pub fn sample_corpus() -> String {
    [
        BATHROOM,
        "mens bathroom",
        "-1",
        "The $T$ was great and the $T$ was cheap.",
        "fish",
        "1",
        "Our waiter was very friendly but the $T$ left early.",
        "staff",
        "0",
        "The $T$ were fair.",
        "prices",
        "0",
    ]
    .join("\n")
        + "\n"
}
