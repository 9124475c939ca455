use super::model::FillMaskModel;
use super::FillMaskPrediction;
use crate::augment::{MaskOracle, MaskRequest, Prediction};
use crate::core::Sentiment;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Mutex;
use tokenizers::Tokenizer;

pub const MASK_TOKEN: &str = "[MASK]";

/// A loaded fill-mask model with its tokenizer.
///
/// Long-lived: build it once and share it by reference across every record of
/// a run.
pub struct FillMaskPipeline<M: FillMaskModel> {
    pub(crate) model: M,
    pub(crate) tokenizer: Tokenizer,
    /// Ordinary vocabulary tokens, by id. Bracketed specials are left out.
    pub(crate) vocabulary: Vec<String>,
    pub(crate) rng: Mutex<StdRng>,
}

impl<M: FillMaskModel> FillMaskPipeline<M> {
    pub(crate) fn new(model: M, tokenizer: Tokenizer, rng: StdRng) -> Self {
        let mut vocab: Vec<(String, u32)> = tokenizer
            .get_vocab(false)
            .into_iter()
            .filter(|(token, _)| !(token.starts_with('[') && token.ends_with(']')))
            .collect();
        vocab.sort_by_key(|(_, id)| *id);
        Self {
            model,
            tokenizer,
            vocabulary: vocab.into_iter().map(|(token, _)| token).collect(),
            rng: Mutex::new(rng),
        }
    }

    /// Both candidates for the `[MASK]` in `text`, best first.
    pub fn predict_top2(
        &self,
        text: &str,
        sentiment: Sentiment,
    ) -> anyhow::Result<Vec<FillMaskPrediction>> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow::anyhow!("fill-mask sampling state poisoned"))?;
        self.model
            .predict(&self.tokenizer, text, MASK_TOKEN, sentiment, &mut rng)
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn device(&self) -> &candle_core::Device {
        self.model.device()
    }
}

impl<M: FillMaskModel> MaskOracle for FillMaskPipeline<M> {
    fn mask_token(&self) -> &str {
        MASK_TOKEN
    }

    fn predict(&self, request: &MaskRequest) -> anyhow::Result<Prediction> {
        let mut candidates = self
            .predict_top2(&request.text, request.sentiment)?
            .into_iter();
        match (candidates.next(), candidates.next()) {
            (Some(first), Some(second)) => Ok(Prediction::new(first.word, second.word)),
            _ => anyhow::bail!("model returned fewer than two candidates"),
        }
    }

    fn tokenize(&self, text: &str) -> anyhow::Result<Vec<String>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenization error: {e}"))?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn random_token(&self, rng: &mut StdRng) -> anyhow::Result<String> {
        if self.vocabulary.is_empty() {
            anyhow::bail!("tokenizer vocabulary has no ordinary tokens");
        }
        Ok(self.vocabulary[rng.random_range(0..self.vocabulary.len())].clone())
    }
}
