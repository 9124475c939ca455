use super::model::PosTaggingModel;
use crate::augment::tagger::is_punctuation;
use crate::augment::{Pos, PosTagger, Token};
use tokenizers::Tokenizer;

/// Universal POS label of punctuation.
const PUNCT: &str = "PUNCT";

pub struct PosTaggingPipeline<M: PosTaggingModel> {
    pub(crate) model: M,
    pub(crate) tokenizer: Tokenizer,
}

impl<M: PosTaggingModel> PosTaggingPipeline<M> {
    pub fn device(&self) -> &candle_core::Device {
        self.model.device()
    }
}

impl<M: PosTaggingModel> PosTagger for PosTaggingPipeline<M> {
    fn tag(&self, text: &str) -> anyhow::Result<Vec<Token>> {
        let words = self.model.predict(&self.tokenizer, text)?;
        Ok(words
            .into_iter()
            .map(|w| Token {
                is_punct: w.label == PUNCT || is_punctuation(&w.word),
                pos: Pos::from_upos(&w.label),
                text: w.word,
            })
            .collect())
    }
}
