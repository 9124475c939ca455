use super::model::PosTaggingModel;
use super::pipeline::PosTaggingPipeline;
use super::{BertPosOptions, BertPosTaggingModel};
use crate::core::{global_cache, ModelOptions};
use crate::pipelines::utils::{build_cache_key, DeviceRequest, DeviceSelectable};

pub struct PosTaggingPipelineBuilder<M: PosTaggingModel> {
    options: M::Options,
    device_request: DeviceRequest,
}

impl<M: PosTaggingModel> PosTaggingPipelineBuilder<M> {
    pub fn new(options: M::Options) -> Self {
        Self {
            options,
            device_request: DeviceRequest::Default,
        }
    }

    pub async fn build(self) -> anyhow::Result<PosTaggingPipeline<M>>
    where
        M: Clone + Send + Sync + 'static,
        M::Options: ModelOptions + Clone,
    {
        let device = self.device_request.resolve()?;
        let key = build_cache_key(&self.options, &device);
        let model = global_cache()
            .get_or_create(&key, || M::new(self.options.clone(), device.clone()))
            .await?;
        let tokenizer = M::get_tokenizer(self.options)?;
        Ok(PosTaggingPipeline { model, tokenizer })
    }
}

impl<M: PosTaggingModel> DeviceSelectable for PosTaggingPipelineBuilder<M> {
    fn device_request_mut(&mut self) -> &mut DeviceRequest {
        &mut self.device_request
    }
}

impl PosTaggingPipelineBuilder<BertPosTaggingModel> {
    pub fn bert() -> Self {
        Self::new(BertPosOptions::default())
    }

    /// A different UPOS-labelled checkpoint from the Hub.
    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.options.files = crate::models::BertFiles::hub(model_id);
        self
    }
}
