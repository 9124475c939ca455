pub mod bert;
pub mod implementations;

pub use implementations::{
    BertFillMaskModel, BertFillMaskOptions, BertFiles, BertPosOptions, BertPosTaggingModel,
    CandidateStrategy, Conditioning,
};
