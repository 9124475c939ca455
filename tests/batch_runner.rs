// Integration tests for batch runs over corpus files.

mod common;

use absa_augment::corpus::read_records;
use absa_augment::{
    AugmentConfig, AugmentError, Augmenter, BatchRunner, ErrorMode, Policy, RunSummary,
};
use common::{sample_corpus, LexiconTagger, ScriptedOracle};
use std::fs;

const BROKEN_RECORD: &str = "The food was great.\nfood\n1\n";

#[test]
fn every_record_is_followed_by_its_augmented_copy() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("train.txt");
    let output = dir.path().join("train_aug.txt");
    fs::write(&input, sample_corpus())?;

    let oracle = ScriptedOracle::constant("alpha", "beta");
    let tagger = LexiconTagger::restaurant();
    let augmenter = Augmenter::new(&oracle, AugmentConfig::default()).with_tagger(&tagger);
    let summary = BatchRunner::new(&augmenter, Policy::Nouns).run_files(&input, &output)?;

    assert_eq!(
        summary,
        RunSummary {
            records: 4,
            augmented: 4,
            skipped: 0
        }
    );
    let written = fs::read_to_string(&output)?;
    assert_eq!(written.lines().count(), 4 * 6);

    let originals = read_records(sample_corpus().as_bytes())?;
    let records = read_records(written.as_bytes())?;
    for (i, original) in originals.iter().enumerate() {
        assert_eq!(&records[2 * i], original);
        assert_eq!(records[2 * i + 1].sentiment, original.sentiment);
        assert!(records[2 * i + 1].sentence.contains("$T$"));
    }
    Ok(())
}

#[test]
fn unsupported_policy_fails_before_any_io() {
    let oracle = ScriptedOracle::constant("alpha", "beta");
    let augmenter = Augmenter::new(&oracle, AugmentConfig::default());
    let err = BatchRunner::for_policy_name(&augmenter, "verbs")
        .err()
        .expect("`verbs` is not a policy");
    assert!(matches!(err, AugmentError::UnsupportedPolicy(name) if name == "verbs"));
    assert_eq!(oracle.request_count(), 0);
}

#[test]
fn halt_mode_stops_at_the_broken_record() {
    let oracle = ScriptedOracle::constant("alpha", "beta");
    let augmenter = Augmenter::new(&oracle, AugmentConfig::default());
    let input = format!("{}{BROKEN_RECORD}", sample_corpus());

    let mut out = Vec::new();
    let err = BatchRunner::new(&augmenter, Policy::Aspect)
        .run(input.as_bytes(), &mut out)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AugmentError>(),
        Some(AugmentError::MalformedCorpus(_))
    ));
    // four complete pairs, then the original of the broken record
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 4 * 6 + 3);
}

#[test]
fn skip_mode_keeps_only_the_original_of_a_failing_record() -> anyhow::Result<()> {
    let oracle = ScriptedOracle::constant("alpha", "beta");
    let augmenter = Augmenter::new(&oracle, AugmentConfig::default());
    let input = format!("{BROKEN_RECORD}{}", sample_corpus());

    let mut out = Vec::new();
    let summary = BatchRunner::new(&augmenter, Policy::Aspect)
        .error_mode(ErrorMode::Skip)
        .run(input.as_bytes(), &mut out)?;

    assert_eq!(summary.records, 5);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.augmented, 4);
    let written = String::from_utf8(out)?;
    assert_eq!(written.lines().count(), 5 * 6 - 3);
    assert!(written.starts_with(BROKEN_RECORD));
    Ok(())
}

#[test]
fn skip_mode_can_come_from_the_config() -> anyhow::Result<()> {
    let oracle = ScriptedOracle::constant("alpha", "beta");
    let config = AugmentConfig {
        error_mode: ErrorMode::Skip,
        ..Default::default()
    };
    let augmenter = Augmenter::new(&oracle, config);

    let mut out = Vec::new();
    let summary = BatchRunner::new(&augmenter, Policy::Random).run(BROKEN_RECORD.as_bytes(), &mut out)?;
    assert_eq!(summary.skipped, 1);
    assert_eq!(String::from_utf8(out)?, BROKEN_RECORD);
    Ok(())
}

#[test]
fn malformed_corpus_is_rejected() {
    let oracle = ScriptedOracle::constant("alpha", "beta");
    let augmenter = Augmenter::new(&oracle, AugmentConfig::default());
    let mut out = Vec::new();
    let err = BatchRunner::new(&augmenter, Policy::Aspect)
        .run("The $T$ is fine.\nfood\n".as_bytes(), &mut out)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AugmentError>(),
        Some(AugmentError::MalformedCorpus(_))
    ));
    assert!(out.is_empty());
}

#[test]
fn runs_with_the_same_seed_write_the_same_output() -> anyhow::Result<()> {
    let oracle = ScriptedOracle::constant("alpha", "beta");
    let tagger = LexiconTagger::restaurant();
    let augmenter = Augmenter::new(&oracle, AugmentConfig::default()).with_tagger(&tagger);
    let runner = BatchRunner::new(&augmenter, Policy::NounsAndAdjectivesAdverbs).seed(11);

    let (mut first, mut second) = (Vec::new(), Vec::new());
    runner.run(sample_corpus().as_bytes(), &mut first)?;
    runner.run(sample_corpus().as_bytes(), &mut second)?;
    assert_eq!(first, second);
    Ok(())
}
