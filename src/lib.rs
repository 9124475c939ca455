//! Label-preserving data augmentation for aspect-based sentiment analysis.
//!
//! Records are `(sentence with $T$, target, sentiment)` triples. A policy picks
//! words of the sentence (or the target itself), a sentiment-conditioned BERT
//! fill-mask model proposes replacements, and the augmented record is written
//! after the original. The crate also prepares the unique-token corpus used by
//! the downstream classifier and tunes that classifier's hyperparameters.

pub mod augment;
pub mod core;
pub mod corpus;
mod loaders;
pub mod models;
pub mod pipelines;
pub mod prepare;
pub mod runner;
pub mod tuning;

pub use augment::{Augmenter, MaskOracle, Policy, PosTagger};
pub use crate::core::{AugmentConfig, AugmentError, ErrorMode, Record, Sentiment, PLACEHOLDER};
pub use runner::{BatchRunner, RunSummary};
