use absa_augment::augment::{Augmenter, Policy};
use absa_augment::core::{AugmentConfig, ErrorMode};
use absa_augment::models::{BertFiles, CandidateStrategy, Conditioning};
use absa_augment::pipelines::fill_mask_pipeline::FillMaskPipelineBuilder;
use absa_augment::pipelines::pos_tagging_pipeline::PosTaggingPipelineBuilder;
use absa_augment::pipelines::DeviceSelectable;
use absa_augment::prepare;
use absa_augment::runner::BatchRunner;
use absa_augment::tuning::{CommandObjective, ResultStore, SearchSpace, Tuner};
use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "absa-augment",
    version,
    about = "Sentiment-conditioned BERT augmentation for aspect-based sentiment corpora."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write every record followed by an augmented copy.
    Augment(AugmentArgs),
    /// Build the unique-token train and test files.
    Prepare(PrepareArgs),
    /// Search classifier hyperparameters with TPE.
    Tune(TuneArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ConditioningArg {
    Prepend,
    TokenType,
}

impl From<ConditioningArg> for Conditioning {
    fn from(arg: ConditioningArg) -> Self {
        match arg {
            ConditioningArg::Prepend => Conditioning::Prepend,
            ConditioningArg::TokenType => Conditioning::TokenType,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CandidatesArg {
    Greedy,
    Sampled,
}

impl From<CandidatesArg> for CandidateStrategy {
    fn from(arg: CandidatesArg) -> Self {
        match arg {
            CandidatesArg::Greedy => CandidateStrategy::Greedy,
            CandidatesArg::Sampled => CandidateStrategy::Sampled,
        }
    }
}

#[derive(Args, Debug)]
struct AugmentArgs {
    /// Corpus of 3-line records.
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    output: PathBuf,
    /// random, nouns, adjectives_adverbs, aspect,
    /// aspect_then_adjectives_adverbs or nouns_and_adjectives_adverbs.
    #[arg(long)]
    policy: String,
    /// JSON file overriding augmentation defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "prepend")]
    conditioning: ConditioningArg,
    #[arg(long, value_enum, default_value = "greedy")]
    candidates: CandidatesArg,
    #[arg(long, default_value = "bert-base-uncased")]
    model_id: String,
    #[arg(long, default_value = "main")]
    revision: String,
    /// Fine-tuned weights (`.safetensors` or `.bin`).
    #[arg(long)]
    weights: Option<PathBuf>,
    #[arg(long)]
    tokenizer: Option<PathBuf>,
    #[arg(long)]
    model_config: Option<PathBuf>,
    /// Token-type rows of the checkpoint, when its config says otherwise.
    #[arg(long)]
    type_vocab_size: Option<usize>,
    #[arg(long, default_value = "vblagoje/bert-english-uncased-finetuned-pos")]
    pos_model_id: String,
    #[arg(long)]
    seed: Option<u64>,
    /// Keep going past records that fail to augment.
    #[arg(long)]
    skip_errors: bool,
    #[arg(long)]
    cpu: bool,
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Complete corpus: train records first, then test records.
    #[arg(long)]
    corpus: PathBuf,
    /// Original train file; its line count sets the size of the train part.
    #[arg(long)]
    train_corpus: PathBuf,
    /// The train part holds an augmented copy after every record.
    #[arg(long)]
    augmented: bool,
    #[arg(long)]
    train_out: PathBuf,
    #[arg(long)]
    test_out: PathBuf,
    #[arg(long, default_value = "bert-base-uncased")]
    tokenizer_model: String,
    #[arg(long)]
    tokenizer: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TuneArgs {
    /// Program that trains the classifier and prints its accuracy last.
    #[arg(long)]
    program: PathBuf,
    /// Extra argument passed before the hyperparameters (repeatable).
    #[arg(long = "arg")]
    args: Vec<String>,
    #[arg(long, default_value_t = 10)]
    evals: usize,
    #[arg(long, default_value = "results.json")]
    trials: PathBuf,
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,
    /// Where the best parameters are written after the search.
    #[arg(long)]
    best_out: Option<PathBuf>,
    #[arg(long, default_value_t = 546297)]
    seed: u64,
    /// Delete the per-trial result files once the best one is reported.
    #[arg(long)]
    clear_results: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("absa_augment=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Augment(args) => augment(args).await,
        Command::Prepare(args) => prepare_corpus(args),
        Command::Tune(args) => tune(args),
    }
}

async fn augment(args: AugmentArgs) -> Result<()> {
    let policy: Policy = args.policy.parse()?;

    let mut config = match &args.config {
        Some(path) => AugmentConfig::from_file(path)?,
        None => AugmentConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.skip_errors {
        config.error_mode = ErrorMode::Skip;
    }

    let mut fill_mask = FillMaskPipelineBuilder::bert()
        .conditioning(args.conditioning.into())
        .candidates(args.candidates.into())
        .files(BertFiles {
            model_id: args.model_id,
            revision: args.revision,
            tokenizer_file: args.tokenizer,
            config_file: args.model_config,
            weights_file: args.weights,
        })
        .type_vocab_size(args.type_vocab_size)
        .seed(config.seed);
    if args.cpu {
        fill_mask = fill_mask.cpu();
    }
    let oracle = fill_mask.build().await?;

    let tagger = if policy.needs_tagger() {
        let mut pos = PosTaggingPipelineBuilder::bert().model_id(args.pos_model_id);
        if args.cpu {
            pos = pos.cpu();
        }
        Some(pos.build().await?)
    } else {
        None
    };

    let mut augmenter = Augmenter::new(&oracle, config);
    if let Some(tagger) = &tagger {
        augmenter = augmenter.with_tagger(tagger);
    }

    let summary = BatchRunner::new(&augmenter, policy)
        .show_progress(!args.no_progress)
        .run_files(&args.input, &args.output)?;
    tracing::info!(
        records = summary.records,
        augmented = summary.augmented,
        skipped = summary.skipped,
        output = ?args.output,
        "augmentation complete"
    );
    Ok(())
}

fn prepare_corpus(args: PrepareArgs) -> Result<()> {
    let files = BertFiles {
        tokenizer_file: args.tokenizer,
        ..BertFiles::hub(args.tokenizer_model)
    };
    let tokenizer = files.tokenizer()?;
    let train_lines =
        prepare::train_line_count(prepare::count_lines(&args.train_corpus)?, args.augmented);

    prepare::prepare_files(
        &args.corpus,
        &args.train_out,
        &args.test_out,
        train_lines,
        |text: &str| -> Result<Vec<String>> {
            let encoding = tokenizer
                .encode(text, false)
                .map_err(|e| anyhow::anyhow!("Tokenization error: {e}"))?;
            Ok(encoding.get_tokens().to_vec())
        },
    )?;
    Ok(())
}

fn tune(args: TuneArgs) -> Result<()> {
    let store = ResultStore::new(&args.results_dir);
    let mut objective = CommandObjective::new(&args.program).args(args.args);
    let outcome = Tuner::new(SearchSpace::lcr_rot_hop())
        .seed(args.seed)
        .trials_path(&args.trials)
        .result_store(store.clone())
        .run(&mut objective, args.evals)?;

    match &outcome.best {
        Some(best) => tracing::info!(
            total = outcome.total,
            loss = ?best.loss,
            params = ?best.params,
            "optimization step complete"
        ),
        None => tracing::warn!(total = outcome.total, "no trial succeeded"),
    }
    if let Some(path) = &args.best_out {
        if !store.write_best(path)? {
            tracing::warn!("no result files to take the best parameters from");
        }
    }
    if args.clear_results {
        let removed = store.clear()?;
        tracing::info!(removed, "deleted result files");
    }
    Ok(())
}
