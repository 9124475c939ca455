pub mod cache;
pub mod config;
pub mod error;
pub mod record;

pub use cache::{global_cache, ModelCache, ModelOptions};
pub use config::{AugmentConfig, ErrorMode, SimilarityThresholds};
pub use error::AugmentError;
pub use record::{Record, Sentiment, PLACEHOLDER};
