pub mod bert;

pub use bert::{
    BertFillMaskModel, BertFillMaskOptions, BertFiles, BertPosOptions, BertPosTaggingModel,
    CandidateStrategy, Conditioning,
};
