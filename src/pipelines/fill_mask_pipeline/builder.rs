use super::model::FillMaskModel;
use super::pipeline::FillMaskPipeline;
use super::{BertFillMaskModel, BertFillMaskOptions, CandidateStrategy, Conditioning};
use crate::models::BertFiles;
use crate::core::{global_cache, AugmentError, ModelOptions};
use crate::pipelines::utils::{build_cache_key, DeviceRequest, DeviceSelectable};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub struct FillMaskPipelineBuilder<M: FillMaskModel> {
    options: M::Options,
    device_request: DeviceRequest,
    seed: u64,
}

impl<M: FillMaskModel> FillMaskPipelineBuilder<M> {
    pub fn new(options: M::Options) -> Self {
        Self {
            options,
            device_request: DeviceRequest::Default,
            seed: 546297,
        }
    }

    /// Seed of the candidate sampling RNG.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Loads the model (or reuses a cached one) and its tokenizer.
    ///
    /// Any failure is reported as [`AugmentError::OracleUnavailable`].
    pub async fn build(self) -> anyhow::Result<FillMaskPipeline<M>>
    where
        M: Clone + Send + Sync + 'static,
        M::Options: ModelOptions + Clone,
    {
        let unavailable = |e: anyhow::Error| AugmentError::OracleUnavailable(format!("{e:#}"));

        let device = self.device_request.resolve().map_err(unavailable)?;
        let key = build_cache_key(&self.options, &device);
        let model = global_cache()
            .get_or_create(&key, || M::new(self.options.clone(), device.clone()))
            .await
            .map_err(unavailable)?;
        let tokenizer = M::get_tokenizer(self.options).map_err(unavailable)?;
        Ok(FillMaskPipeline::new(
            model,
            tokenizer,
            StdRng::seed_from_u64(self.seed),
        ))
    }
}

impl<M: FillMaskModel> DeviceSelectable for FillMaskPipelineBuilder<M> {
    fn device_request_mut(&mut self) -> &mut DeviceRequest {
        &mut self.device_request
    }
}

impl FillMaskPipelineBuilder<BertFillMaskModel> {
    /// A BERT fill-mask pipeline with default options.
    pub fn bert() -> Self {
        Self::new(BertFillMaskOptions::default())
    }

    pub fn conditioning(mut self, conditioning: Conditioning) -> Self {
        self.options.conditioning = conditioning;
        self
    }

    pub fn candidates(mut self, candidates: CandidateStrategy) -> Self {
        self.options.candidates = candidates;
        self
    }

    pub fn files(mut self, files: BertFiles) -> Self {
        self.options.files = files;
        self
    }

    pub fn type_vocab_size(mut self, rows: Option<usize>) -> Self {
        self.options.type_vocab_size = rows;
        self
    }
}
