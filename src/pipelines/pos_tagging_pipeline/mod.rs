pub mod builder;
pub mod model;
pub mod pipeline;

pub use builder::PosTaggingPipelineBuilder;
pub use model::PosTaggingModel;
pub use pipeline::PosTaggingPipeline;

pub use crate::models::implementations::bert::{BertPosOptions, BertPosTaggingModel, TaggedWord};
