pub mod builder;
pub mod model;
pub mod pipeline;

pub use builder::FillMaskPipelineBuilder;
pub use model::FillMaskModel;
pub use pipeline::FillMaskPipeline;

pub use crate::models::implementations::bert::{
    BertFillMaskModel, BertFillMaskOptions, CandidateStrategy, Conditioning, FillMaskPrediction,
};
