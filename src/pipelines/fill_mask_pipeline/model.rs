use super::FillMaskPrediction;
use crate::core::Sentiment;
use rand::rngs::StdRng;
use tokenizers::Tokenizer;

pub trait FillMaskModel {
    type Options: std::fmt::Debug + Clone;

    fn new(options: Self::Options, device: candle_core::Device) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Two candidates for the single `mask_token` in `text`, conditioned on
    /// `sentiment`. `rng` drives sampled candidate strategies.
    fn predict(
        &self,
        tokenizer: &Tokenizer,
        text: &str,
        mask_token: &str,
        sentiment: Sentiment,
        rng: &mut StdRng,
    ) -> anyhow::Result<Vec<FillMaskPrediction>>;

    fn get_tokenizer(options: Self::Options) -> anyhow::Result<Tokenizer>;

    fn device(&self) -> &candle_core::Device;
}
