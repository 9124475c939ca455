// Integration tests for building the unique-token corpus.

mod common;

use absa_augment::prepare::{count_lines, prepare_files, train_line_count, PrepareSummary};
use common::{sample_corpus, simple_tokens};
use std::fs;

fn lowercase_tokens(text: &str) -> anyhow::Result<Vec<String>> {
    Ok(simple_tokens(&text.to_lowercase()))
}

#[test]
fn splits_numbered_corpus_into_train_and_test() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let corpus = dir.path().join("all.txt");
    let train_original = dir.path().join("train.txt");
    let (train_out, test_out) = (dir.path().join("train_u.txt"), dir.path().join("test_u.txt"));

    fs::write(&corpus, sample_corpus())?;
    // the first two records were the train part
    let train_text: String = sample_corpus().lines().take(6).map(|l| format!("{l}\n")).collect();
    fs::write(&train_original, train_text)?;

    let train_lines = train_line_count(count_lines(&train_original)?, false);
    let summary = prepare_files(&corpus, &train_out, &test_out, train_lines, lowercase_tokens)?;
    assert_eq!(
        summary,
        PrepareSummary {
            train_lines: 6,
            test_lines: 6
        }
    );

    let train = fs::read_to_string(&train_out)?;
    let test = fs::read_to_string(&test_out)?;
    let train: Vec<&str> = train.lines().collect();
    let test: Vec<&str> = test.lines().collect();

    assert_eq!(
        train[0],
        "the_0 $T$ is_0 too_0 dirty_0 ,_0 but_0 the_1 salmon_0 compensates_0 it_0 all_0 ._0"
    );
    assert_eq!(train[1], "mens_0 bathroom_0");
    assert_eq!(train[2], "-1");
    assert_eq!(
        train[3],
        "the_2 $T$ was_0 great_0 and_0 the_3 $T$ was_1 cheap_0 ._1"
    );
    // counters keep running into the test part
    assert_eq!(test[1], "staff_0");
    assert_eq!(test[3], "the_5 $T$ were_0 fair_0 ._3");
    Ok(())
}

#[test]
fn augmented_train_part_takes_twice_the_lines() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let corpus = dir.path().join("all.txt");
    let (train_out, test_out) = (dir.path().join("train_u.txt"), dir.path().join("test_u.txt"));
    fs::write(&corpus, sample_corpus())?;

    let summary = prepare_files(
        &corpus,
        &train_out,
        &test_out,
        train_line_count(3, true),
        lowercase_tokens,
    )?;
    assert_eq!(summary.train_lines, 6);
    assert_eq!(fs::read_to_string(&test_out)?.lines().count(), 6);
    Ok(())
}
