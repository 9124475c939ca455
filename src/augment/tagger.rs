/// Coarse grammatical category of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pos {
    Noun,
    Pron,
    Adj,
    Adv,
    Other,
}

impl Pos {
    /// Maps a Universal Dependencies tag (`NOUN`, `ADJ`, ...) onto the coarse set.
    pub fn from_upos(tag: &str) -> Self {
        match tag.trim_start_matches("B-").trim_start_matches("I-") {
            "NOUN" => Pos::Noun,
            "PRON" => Pos::Pron,
            "ADJ" => Pos::Adj,
            "ADV" => Pos::Adv,
            _ => Pos::Other,
        }
    }

    pub fn is_nominal(&self) -> bool {
        matches!(self, Pos::Noun | Pos::Pron)
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self, Pos::Adj | Pos::Adv)
    }
}

/// A word of a tagged sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub pos: Pos,
    pub is_punct: bool,
}

impl Token {
    /// A token whose punctuation flag is derived from its text.
    pub fn new(text: impl Into<String>, pos: Pos) -> Self {
        let text = text.into();
        let is_punct = is_punctuation(&text);
        Self { text, pos, is_punct }
    }
}

/// True for non-empty strings made only of ASCII punctuation.
pub fn is_punctuation(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_punctuation())
}

/// Splits text into words and tags each one.
///
/// Implementations must be deterministic: tagging the same text twice yields
/// the same tokens. Words are returned in order and spelled exactly as they
/// appear in the text.
pub trait PosTagger {
    fn tag(&self, text: &str) -> anyhow::Result<Vec<Token>>;
}

impl<T: PosTagger + ?Sized> PosTagger for &T {
    fn tag(&self, text: &str) -> anyhow::Result<Vec<Token>> {
        (**self).tag(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_flag() {
        assert!(Token::new(",", Pos::Other).is_punct);
        assert!(Token::new("...", Pos::Other).is_punct);
        assert!(!Token::new("n't", Pos::Other).is_punct);
        assert!(!Token::new("", Pos::Other).is_punct);
    }

    #[test]
    fn upos_mapping_keeps_proper_nouns_apart() {
        assert_eq!(Pos::from_upos("NOUN"), Pos::Noun);
        assert_eq!(Pos::from_upos("PROPN"), Pos::Other);
        assert_eq!(Pos::from_upos("ADV"), Pos::Adv);
    }
}
