use thiserror::Error;

/// Failures of the augmentation core.
///
/// Model and I/O code propagates `anyhow::Error`; these variants travel inside it
/// and can be recovered with `err.downcast_ref::<AugmentError>()`.
#[derive(Debug, Error)]
pub enum AugmentError {
    /// No window of the re-tokenized sentence was similar enough to the target.
    #[error("target `{target}` not found in `{sentence}`")]
    TargetNotFound { target: String, sentence: String },

    /// Reassembly lost the `$T$` marker. Always a bookkeeping bug.
    #[error("placeholder `$T$` missing from augmented sentence `{0}`")]
    PlaceholderMissing(String),

    /// The policy name is not one of the supported augmentation policies.
    #[error("unsupported augmentation policy `{0}`")]
    UnsupportedPolicy(String),

    /// The masked language model or its tokenizer could not be loaded.
    #[error("masked language model unavailable: {0}")]
    OracleUnavailable(String),

    /// A sentiment line was not `-1`, `0` or `1`.
    #[error("invalid sentiment code `{0}`")]
    InvalidSentiment(String),

    /// The corpus is not made of complete three-line records, or a sentence
    /// does not carry one or two `$T$` markers.
    #[error("malformed corpus: {0}")]
    MalformedCorpus(String),
}
