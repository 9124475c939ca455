use super::TaggedWord;
use tokenizers::Tokenizer;

pub trait PosTaggingModel {
    type Options: std::fmt::Debug + Clone;

    fn new(options: Self::Options, device: candle_core::Device) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Words of `text` with one UPOS label each.
    fn predict(&self, tokenizer: &Tokenizer, text: &str) -> anyhow::Result<Vec<TaggedWord>>;

    fn get_tokenizer(options: Self::Options) -> anyhow::Result<Tokenizer>;

    fn device(&self) -> &candle_core::Device;
}
