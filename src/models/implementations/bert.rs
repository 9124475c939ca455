//! Sentiment-conditioned fill-mask and POS tagging models built on BERT.

use crate::core::{ModelOptions, Sentiment};
use crate::loaders::{load_tokenizer, resolve_file, resolve_weights};
use crate::models::bert::{BertForMaskedLM, BertForTokenClassification, Config};
use anyhow::{Error as E, Result as AnyhowResult};
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{ops::softmax, VarBuilder};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

/// How the sentiment label reaches the masked language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conditioning {
    /// The sentiment word (`negative`, `neutral`, `positive`) is prepended to
    /// the text.
    #[default]
    Prepend,
    /// Every token carries the label index as its token-type id.
    TokenType,
}

impl std::fmt::Display for Conditioning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conditioning::Prepend => write!(f, "prepend"),
            Conditioning::TokenType => write!(f, "token_type"),
        }
    }
}

/// How the two candidates for a mask are chosen from the model's distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStrategy {
    /// The two most probable tokens.
    #[default]
    Greedy,
    /// Two tokens drawn without replacement, proportionally to probability.
    Sampled,
}

/// Where the BERT files come from. Any local path overrides the Hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BertFiles {
    pub model_id: String,
    pub revision: String,
    pub tokenizer_file: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub weights_file: Option<PathBuf>,
}

impl BertFiles {
    pub fn hub(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            revision: "main".into(),
            tokenizer_file: None,
            config_file: None,
            weights_file: None,
        }
    }

    fn cache_key(&self) -> String {
        let local = |p: &Option<PathBuf>| {
            p.as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        format!(
            "{}@{}[{}|{}|{}]",
            self.model_id,
            self.revision,
            local(&self.tokenizer_file),
            local(&self.config_file),
            local(&self.weights_file)
        )
    }

    pub fn tokenizer(&self) -> AnyhowResult<Tokenizer> {
        let path = resolve_file(
            self.tokenizer_file.as_deref(),
            &self.model_id,
            &self.revision,
            "tokenizer.json",
        )?;
        load_tokenizer(&path)
    }

    fn config(&self) -> AnyhowResult<Config> {
        let path = resolve_file(
            self.config_file.as_deref(),
            &self.model_id,
            &self.revision,
            "config.json",
        )?;
        let content = std::fs::read_to_string(&path)
            .map_err(|e| E::msg(format!("Failed to read config file {path:?}: {e}")))?;
        serde_json::from_str(&content)
            .map_err(|e| E::msg(format!("Failed to parse model config: {e}")))
    }

    fn var_builder(&self, device: &Device) -> AnyhowResult<VarBuilder<'static>> {
        let weights = resolve_weights(
            self.weights_file.as_deref(),
            &self.model_id,
            &self.revision,
        )?;
        var_builder(&weights, device)
    }
}

fn var_builder(weights: &Path, device: &Device) -> AnyhowResult<VarBuilder<'static>> {
    let dtype = DType::F32;
    if weights.extension().is_some_and(|ext| ext == "safetensors") {
        Ok(unsafe { VarBuilder::from_mmaped_safetensors(&[weights], dtype, device)? })
    } else if weights.extension().is_some_and(|ext| ext == "bin") {
        Ok(VarBuilder::from_pth(weights, dtype, device)?)
    } else {
        anyhow::bail!("Unsupported weight file format: {:?}", weights);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BertFillMaskOptions {
    pub files: BertFiles,
    pub conditioning: Conditioning,
    pub candidates: CandidateStrategy,
    /// Longest encoded input, special tokens included.
    pub max_length: usize,
    /// Rows of the token-type embedding, when the checkpoint differs from its
    /// config. Token-type conditioning needs at least three.
    pub type_vocab_size: Option<usize>,
}

impl Default for BertFillMaskOptions {
    fn default() -> Self {
        Self {
            files: BertFiles::hub("bert-base-uncased"),
            conditioning: Conditioning::default(),
            candidates: CandidateStrategy::default(),
            max_length: 512,
            type_vocab_size: None,
        }
    }
}

impl ModelOptions for BertFillMaskOptions {
    fn cache_key(&self) -> String {
        format!(
            "fill-mask:{}:{}:{}",
            self.files.cache_key(),
            self.conditioning,
            self.type_vocab_size.unwrap_or_default()
        )
    }
}

/// One candidate filler for a mask.
#[derive(Debug, Clone)]
pub struct FillMaskPrediction {
    pub word: String,
    pub score: f32,
}

/// Masked language model conditioned on a sentiment label.
#[derive(Clone)]
pub struct BertFillMaskModel {
    model: BertForMaskedLM,
    conditioning: Conditioning,
    candidates: CandidateStrategy,
    max_length: usize,
    device: Device,
}

impl BertFillMaskModel {
    pub fn new(options: BertFillMaskOptions, device: Device) -> AnyhowResult<Self> {
        let mut config = options.files.config()?;
        match (options.type_vocab_size, options.conditioning) {
            (Some(rows), _) => config.type_vocab_size = rows,
            (None, Conditioning::TokenType) => {
                config.type_vocab_size = config.type_vocab_size.max(3)
            }
            (None, Conditioning::Prepend) => {}
        }

        let vb = options.files.var_builder(&device)?;
        let model = BertForMaskedLM::load(vb, &config)?;
        tracing::info!(
            model = %options.files.model_id,
            conditioning = %options.conditioning,
            "loaded fill-mask model"
        );

        Ok(Self {
            model,
            conditioning: options.conditioning,
            candidates: options.candidates,
            max_length: options.max_length,
            device,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Two candidates for the single `mask_token` in `text`.
    pub fn predict(
        &self,
        tokenizer: &Tokenizer,
        text: &str,
        mask_token: &str,
        sentiment: Sentiment,
        rng: &mut StdRng,
    ) -> AnyhowResult<Vec<FillMaskPrediction>> {
        let text = match self.conditioning {
            Conditioning::Prepend => format!("{} {text}", sentiment.word()),
            Conditioning::TokenType => text.to_string(),
        };
        let encoding = tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| E::msg(format!("Tokenization error: {e}")))?;
        let ids = encoding.get_ids();
        if ids.len() > self.max_length {
            anyhow::bail!(
                "input of {} tokens exceeds the maximum of {}",
                ids.len(),
                self.max_length
            );
        }

        let mask_id = tokenizer
            .token_to_id(mask_token)
            .ok_or_else(|| E::msg(format!("tokenizer has no `{mask_token}` token")))?;
        let mask_index = ids
            .iter()
            .position(|&id| id == mask_id)
            .ok_or_else(|| E::msg(format!("No {mask_token} token found in input")))?;

        let type_id = match self.conditioning {
            Conditioning::Prepend => 0,
            Conditioning::TokenType => sentiment.index(),
        };
        let token_type_ids = vec![type_id; ids.len()];

        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(token_type_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let logits = self
            .model
            .forward(&input_ids, &token_type_ids, &attention_mask)?;
        let logits = logits.squeeze(0)?.i((mask_index, ..))?;
        let probs: Vec<f32> = softmax(&logits, D::Minus1)?.to_vec1()?;

        let picked = match self.candidates {
            CandidateStrategy::Greedy => top_k(&probs, 2),
            CandidateStrategy::Sampled => sample_without_replacement(&probs, 2, rng)?,
        };
        picked
            .into_iter()
            .map(|id| {
                let word = tokenizer
                    .id_to_token(id as u32)
                    .ok_or_else(|| E::msg(format!("token id {id} outside the vocabulary")))?;
                Ok(FillMaskPrediction {
                    word,
                    score: probs[id],
                })
            })
            .collect()
    }
}

/// Indices of the `k` largest values, largest first.
fn top_k(probs: &[f32], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..probs.len()).collect();
    indices.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
    indices.truncate(k);
    indices
}

/// `k` draws without replacement. Once no probability mass is left the most
/// probable token fills the remaining draws, so exactly `k` indices come back.
fn sample_without_replacement(
    probs: &[f32],
    k: usize,
    rng: &mut StdRng,
) -> AnyhowResult<Vec<usize>> {
    let most_probable = top_k(probs, 1)
        .first()
        .copied()
        .ok_or_else(|| E::msg("cannot sample from an empty distribution"))?;
    let mut weights = probs.to_vec();
    let mut picked = Vec::with_capacity(k);
    while picked.len() < k {
        let index = match WeightedIndex::new(&weights) {
            Ok(distribution) => distribution.sample(rng),
            Err(_) => most_probable,
        };
        weights[index] = 0.0;
        picked.push(index);
    }
    Ok(picked)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BertPosOptions {
    pub files: BertFiles,
    pub max_length: usize,
}

impl Default for BertPosOptions {
    fn default() -> Self {
        Self {
            files: BertFiles::hub("vblagoje/bert-english-uncased-finetuned-pos"),
            max_length: 512,
        }
    }
}

impl ModelOptions for BertPosOptions {
    fn cache_key(&self) -> String {
        format!("pos:{}", self.files.cache_key())
    }
}

/// A word of the input and the UPOS label of its first sub-token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedWord {
    pub word: String,
    pub label: String,
}

/// Universal POS tagger.
#[derive(Clone)]
pub struct BertPosTaggingModel {
    model: BertForTokenClassification,
    labels: Vec<String>,
    max_length: usize,
    device: Device,
}

impl BertPosTaggingModel {
    pub fn new(options: BertPosOptions, device: Device) -> AnyhowResult<Self> {
        let config = options.files.config()?;
        let labels = config.labels();
        let vb = options.files.var_builder(&device)?;
        let model = BertForTokenClassification::load(vb, &config)?;
        tracing::info!(model = %options.files.model_id, labels = labels.len(), "loaded POS model");
        Ok(Self {
            model,
            labels,
            max_length: options.max_length,
            device,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn predict(&self, tokenizer: &Tokenizer, text: &str) -> AnyhowResult<Vec<TaggedWord>> {
        let encoding = tokenizer
            .encode(text, true)
            .map_err(|e| E::msg(format!("Tokenization error: {e}")))?;
        let ids = encoding.get_ids();
        if ids.len() > self.max_length {
            anyhow::bail!(
                "input of {} tokens exceeds the maximum of {}",
                ids.len(),
                self.max_length
            );
        }

        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;
        let attention_mask =
            Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;
        let predicted: Vec<u32> = self
            .model
            .forward(&input_ids, &token_type_ids, &attention_mask)?
            .squeeze(0)?
            .argmax(D::Minus1)?
            .to_vec1()?;

        let mut words: Vec<TaggedWord> = Vec::new();
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut current: Option<u32> = None;
        for (i, word_id) in encoding.get_word_ids().iter().enumerate() {
            let Some(word_id) = *word_id else {
                continue;
            };
            let (start, end) = encoding.get_offsets()[i];
            if current == Some(word_id) {
                if let Some(span) = spans.last_mut() {
                    span.1 = end;
                }
                continue;
            }
            current = Some(word_id);
            let label = self
                .labels
                .get(predicted[i] as usize)
                .cloned()
                .ok_or_else(|| E::msg(format!("label id {} out of range", predicted[i])))?;
            words.push(TaggedWord {
                word: String::new(),
                label,
            });
            spans.push((start, end));
        }

        for (word, (start, end)) in words.iter_mut().zip(spans) {
            word.word = text
                .get(start..end)
                .map(str::to_string)
                .ok_or_else(|| E::msg(format!("offsets {start}..{end} do not slice the input")))?;
        }
        Ok(words)
    }
}

impl crate::pipelines::fill_mask_pipeline::FillMaskModel for BertFillMaskModel {
    type Options = BertFillMaskOptions;

    fn new(options: Self::Options, device: Device) -> anyhow::Result<Self> {
        BertFillMaskModel::new(options, device)
    }

    fn predict(
        &self,
        tokenizer: &Tokenizer,
        text: &str,
        mask_token: &str,
        sentiment: Sentiment,
        rng: &mut StdRng,
    ) -> AnyhowResult<Vec<FillMaskPrediction>> {
        self.predict(tokenizer, text, mask_token, sentiment, rng)
    }

    fn get_tokenizer(options: Self::Options) -> AnyhowResult<Tokenizer> {
        options.files.tokenizer()
    }

    fn device(&self) -> &Device {
        self.device()
    }
}

impl crate::pipelines::pos_tagging_pipeline::PosTaggingModel for BertPosTaggingModel {
    type Options = BertPosOptions;

    fn new(options: Self::Options, device: Device) -> anyhow::Result<Self> {
        BertPosTaggingModel::new(options, device)
    }

    fn predict(&self, tokenizer: &Tokenizer, text: &str) -> AnyhowResult<Vec<TaggedWord>> {
        self.predict(tokenizer, text)
    }

    fn get_tokenizer(options: Self::Options) -> AnyhowResult<Tokenizer> {
        options.files.tokenizer()
    }

    fn device(&self) -> &Device {
        self.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn greedy_takes_the_two_most_probable() {
        assert_eq!(top_k(&[0.1, 0.5, 0.05, 0.35], 2), vec![1, 3]);
    }

    #[test]
    fn sampling_never_repeats_a_token() {
        let probs = [0.7, 0.2, 0.1, 0.0];
        let mut rng = StdRng::seed_from_u64(546297);
        for _ in 0..50 {
            let picked = sample_without_replacement(&probs, 2, &mut rng).unwrap();
            assert_eq!(picked.len(), 2);
            assert_ne!(picked[0], picked[1]);
            assert!(!picked.contains(&3));
        }
    }

    #[test]
    fn sampling_a_degenerate_distribution_still_yields_two() {
        let mut rng = StdRng::seed_from_u64(546297);
        let picked = sample_without_replacement(&[1.0, 0.0, 0.0], 2, &mut rng).unwrap();
        assert_eq!(picked, vec![0, 0]);

        let picked = sample_without_replacement(&[0.0, 1.0], 3, &mut rng).unwrap();
        assert_eq!(picked, vec![1, 1, 1]);
        assert!(sample_without_replacement(&[], 2, &mut rng).is_err());
    }

    #[test]
    fn cache_keys_separate_conditioning() {
        let prepend = BertFillMaskOptions::default();
        let token_type = BertFillMaskOptions {
            conditioning: Conditioning::TokenType,
            ..Default::default()
        };
        assert_ne!(prepend.cache_key(), token_type.cache_key());
    }
}
