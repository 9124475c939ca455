//! BERT encoder with masked-LM and token-classification heads.
//!
//! Weights follow the Hugging Face layout (`bert.embeddings.*`,
//! `bert.encoder.layer.N.*`, `cls.predictions.*`, `classifier.*`). Checkpoints
//! saved without the `bert.` prefix and older ones using `gamma`/`beta` for
//! LayerNorm parameters load as well.

use candle_core::{DType, Device, Module, Result, Tensor, D};
use candle_nn::{embedding, linear, ops::softmax, Embedding, LayerNorm, Linear, VarBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

const MIN_VALUE_F64: f64 = f32::MIN as f64;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub max_position_embeddings: usize,
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default)]
    pub id2label: Option<HashMap<String, String>>,
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

impl Config {
    /// Labels ordered by id. Empty when the checkpoint has no classifier.
    pub fn labels(&self) -> Vec<String> {
        let Some(id2label) = &self.id2label else {
            return Vec::new();
        };
        let mut labels: Vec<(usize, &String)> = id2label
            .iter()
            .filter_map(|(id, label)| id.parse().ok().map(|id| (id, label)))
            .collect();
        labels.sort_by_key(|(id, _)| *id);
        labels.into_iter().map(|(_, l)| l.clone()).collect()
    }
}

/// LayerNorm accepting both `weight`/`bias` and `gamma`/`beta`.
fn layer_norm(size: usize, eps: f64, vb: VarBuilder) -> Result<LayerNorm> {
    let (weight, bias) = match (vb.get(size, "weight"), vb.get(size, "bias")) {
        (Ok(w), Ok(b)) => (w, b),
        _ => (vb.get(size, "gamma")?, vb.get(size, "beta")?),
    };
    Ok(LayerNorm::new(weight, bias, eps))
}

#[derive(Debug, Clone)]
struct Embeddings {
    word: Embedding,
    position: Embedding,
    token_type: Embedding,
    norm: LayerNorm,
}

impl Embeddings {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        Ok(Self {
            word: embedding(config.vocab_size, config.hidden_size, vb.pp("word_embeddings"))?,
            position: embedding(
                config.max_position_embeddings,
                config.hidden_size,
                vb.pp("position_embeddings"),
            )?,
            token_type: embedding(
                config.type_vocab_size,
                config.hidden_size,
                vb.pp("token_type_embeddings"),
            )?,
            norm: layer_norm(config.hidden_size, config.layer_norm_eps, vb.pp("LayerNorm"))?,
        })
    }

    fn forward(&self, input_ids: &Tensor, token_type_ids: &Tensor) -> Result<Tensor> {
        let seq_len = input_ids.dim(1)?;
        let positions = Tensor::arange(0u32, seq_len as u32, input_ids.device())?.unsqueeze(0)?;
        let embeddings = input_ids
            .apply(&self.word)?
            .broadcast_add(&positions.apply(&self.position)?)?
            .add(&token_type_ids.apply(&self.token_type)?)?;
        embeddings.apply(&self.norm)
    }
}

/// Multi-head self-attention followed by its output projection.
#[derive(Debug, Clone)]
struct Attention {
    query: Linear,
    key: Linear,
    value: Linear,
    output: Linear,
    norm: LayerNorm,
    num_attention_heads: usize,
    attention_head_size: usize,
}

impl Attention {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let hidden = config.hidden_size;
        Ok(Self {
            query: linear(hidden, hidden, vb.pp("self.query"))?,
            key: linear(hidden, hidden, vb.pp("self.key"))?,
            value: linear(hidden, hidden, vb.pp("self.value"))?,
            output: linear(hidden, hidden, vb.pp("output.dense"))?,
            norm: layer_norm(hidden, config.layer_norm_eps, vb.pp("output.LayerNorm"))?,
            num_attention_heads: config.num_attention_heads,
            attention_head_size: hidden / config.num_attention_heads,
        })
    }

    fn split_heads(&self, xs: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, _) = xs.dims3()?;
        xs.reshape((
            batch,
            seq_len,
            self.num_attention_heads,
            self.attention_head_size,
        ))?
        .transpose(1, 2)?
        .contiguous()
    }

    fn forward(&self, hidden_states: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, hidden_size) = hidden_states.dims3()?;

        let q = self.split_heads(&hidden_states.apply(&self.query)?)?;
        let k = self.split_heads(&hidden_states.apply(&self.key)?)?;
        let v = self.split_heads(&hidden_states.apply(&self.value)?)?;

        let scale = (self.attention_head_size as f64).powf(-0.5);
        let scores = (q.matmul(&k.transpose(D::Minus2, D::Minus1)?)? * scale)?;
        let probs = softmax(&scores.broadcast_add(attention_mask)?, D::Minus1)?;

        let context = probs
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((batch, seq_len, hidden_size))?;
        (context.apply(&self.output)? + hidden_states)?.apply(&self.norm)
    }
}

#[derive(Debug, Clone)]
struct FeedForward {
    intermediate: Linear,
    output: Linear,
    norm: LayerNorm,
}

impl FeedForward {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        Ok(Self {
            intermediate: linear(
                config.hidden_size,
                config.intermediate_size,
                vb.pp("intermediate.dense"),
            )?,
            output: linear(
                config.intermediate_size,
                config.hidden_size,
                vb.pp("output.dense"),
            )?,
            norm: layer_norm(config.hidden_size, config.layer_norm_eps, vb.pp("output.LayerNorm"))?,
        })
    }
}

impl Module for FeedForward {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let ys = xs.apply(&self.intermediate)?.gelu_erf()?.apply(&self.output)?;
        (ys + xs)?.apply(&self.norm)
    }
}

#[derive(Debug, Clone)]
struct TransformerLayer {
    attention: Attention,
    feed_forward: FeedForward,
}

impl TransformerLayer {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        Ok(Self {
            attention: Attention::load(vb.pp("attention"), config)?,
            feed_forward: FeedForward::load(vb, config)?,
        })
    }

    fn forward(&self, hidden_states: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        self.attention
            .forward(hidden_states, attention_mask)?
            .apply(&self.feed_forward)
    }
}

/// Encoder weights shared by both heads.
#[derive(Debug, Clone)]
pub struct ModelWeights {
    embeddings: Embeddings,
    layers: Vec<TransformerLayer>,
    device: Device,
    dtype: DType,
}

impl ModelWeights {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let embeddings = Embeddings::load(vb.pp("embeddings"), config)?;
        let layers = (0..config.num_hidden_layers)
            .map(|i| TransformerLayer::load(vb.pp(format!("encoder.layer.{i}")), config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            embeddings,
            layers,
            device: vb.device().clone(),
            dtype: vb.dtype(),
        })
    }

    /// `(batch, seq)` padding mask to an additive `(batch, 1, 1, seq)` mask.
    fn extended_attention_mask(&self, mask: &Tensor) -> Result<Tensor> {
        let mask = mask.unsqueeze(1)?.unsqueeze(2)?.to_dtype(self.dtype)?;
        ((1.0 - mask)? * MIN_VALUE_F64)?.to_dtype(self.dtype)
    }

    fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        let mask = self.extended_attention_mask(attention_mask)?;
        let mut hidden_states = self.embeddings.forward(input_ids, token_type_ids)?;
        for layer in &self.layers {
            hidden_states = layer.forward(&hidden_states, &mask)?;
        }
        Ok(hidden_states)
    }
}

/// `bert.` prefixed checkpoints (task models) versus bare encoders.
fn encoder_root<'a>(vb: &VarBuilder<'a>) -> VarBuilder<'a> {
    if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
        vb.pp("bert")
    } else {
        vb.clone()
    }
}

#[derive(Debug, Clone)]
struct MaskedLMHead {
    dense: Linear,
    norm: LayerNorm,
    decoder: Linear,
}

impl MaskedLMHead {
    fn load(vb: VarBuilder, encoder: VarBuilder, config: &Config) -> Result<Self> {
        let transform = vb.pp("cls.predictions.transform");
        let dense = linear(config.hidden_size, config.hidden_size, transform.pp("dense"))?;
        let norm = layer_norm(
            config.hidden_size,
            config.layer_norm_eps,
            transform.pp("LayerNorm"),
        )?;

        let decoder_weights = encoder.get(
            (config.vocab_size, config.hidden_size),
            "embeddings.word_embeddings.weight",
        )?;
        let decoder_bias = vb
            .get(config.vocab_size, "cls.predictions.bias")
            .or_else(|_| vb.get(config.vocab_size, "cls.predictions.decoder.bias"))?;
        let decoder = Linear::new(decoder_weights, Some(decoder_bias));

        Ok(Self {
            dense,
            norm,
            decoder,
        })
    }

    fn forward(&self, hidden_states: &Tensor) -> Result<Tensor> {
        hidden_states
            .apply(&self.dense)?
            .gelu_erf()?
            .apply(&self.norm)?
            .apply(&self.decoder)
    }
}

/// BERT for masked language modelling.
#[derive(Debug, Clone)]
pub struct BertForMaskedLM {
    weights: Arc<ModelWeights>,
    head: MaskedLMHead,
}

impl BertForMaskedLM {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let encoder = encoder_root(&vb);
        let weights = Arc::new(ModelWeights::load(encoder.clone(), config)?);
        let head = MaskedLMHead::load(vb, encoder, config)?;
        Ok(Self { weights, head })
    }

    /// Logits over the vocabulary, `(batch, seq, vocab_size)`.
    pub fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        let hidden_states = self
            .weights
            .forward(input_ids, token_type_ids, attention_mask)?;
        self.head.forward(&hidden_states)
    }

    pub fn device(&self) -> &Device {
        &self.weights.device
    }
}

/// BERT with a per-token linear classifier.
#[derive(Debug, Clone)]
pub struct BertForTokenClassification {
    weights: Arc<ModelWeights>,
    classifier: Linear,
}

impl BertForTokenClassification {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let num_labels = config.labels().len();
        if num_labels == 0 {
            candle_core::bail!("token classification config has no `id2label`");
        }
        let weights = Arc::new(ModelWeights::load(encoder_root(&vb), config)?);
        let classifier = linear(config.hidden_size, num_labels, vb.pp("classifier"))?;
        Ok(Self {
            weights,
            classifier,
        })
    }

    /// Label logits, `(batch, seq, num_labels)`.
    pub fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        self.weights
            .forward(input_ids, token_type_ids, attention_mask)?
            .apply(&self.classifier)
    }

    pub fn device(&self) -> &Device {
        &self.weights.device
    }
}
