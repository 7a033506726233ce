// For initializing random feature vectors
use rand::{rngs::SmallRng, SeedableRng};

// Needed to write partial lines to the console
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;

use digit_recognizer::mnist::{
    load_digits, split_train_validation, to_samples, write_submission, CsvLayout,
};
use digit_recognizer::preprocess::{normalize_path, predict_grid_path, render_digit};
use digit_recognizer::{
    evaluate, Classifier, GridSpec, IntegerHDModel, ModelConfig, TrainingConfig, IMAGE_AREA,
};

const SUBMISSION_FILE: &str = "submission.csv";
const MODEL_FILE: &str = "model.json";
const TOPOLOGY_FILE: &str = "topology.json";
const DIAGNOSTIC_FILE: &str = "MNIST_IMAGE_TEST.png";
// How many of the most confident validation mistakes to report
const ERRORS_SHOWN: usize = 6;

/// Train a handwritten digit classifier and apply it to CSV rows, single
/// digit images and grids of digits.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Labelled training CSV (label followed by 784 pixels)
    #[arg(long, required_unless_present = "model")]
    train: Option<PathBuf>,

    /// Unlabelled CSV to predict into a submission file
    #[arg(long)]
    test: Option<PathBuf>,

    /// The CSV files have no header row
    #[arg(long)]
    no_headers: bool,

    /// Maximum number of training rows to read
    #[arg(long, default_value_t = usize::MAX)]
    limit: usize,

    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Single digit image to classify (repeatable)
    #[arg(long = "image")]
    images: Vec<PathBuf>,

    /// Grid image to classify tile by tile, as PATH:N (repeatable)
    #[arg(long = "grid")]
    grids: Vec<GridSpec>,

    /// Load a saved model instead of training one
    #[arg(long)]
    model: Option<PathBuf>,

    #[arg(long, default_value_t = 0.1)]
    holdout: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Hypervector length in 32-bit chunks
    #[arg(long, default_value_t = 156)]
    dimension_chunks: usize,

    #[arg(long, default_value_t = 16)]
    quanta: usize,

    #[arg(long, default_value_t = 20)]
    max_epochs: usize,

    #[arg(long, default_value_t = 3)]
    patience: usize,
}

impl Args {
    fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            holdout: self.holdout,
            seed: self.seed,
            max_epochs: self.max_epochs,
            patience: self.patience,
            model: ModelConfig {
                dimension_chunks: self.dimension_chunks,
                quanta: self.quanta,
                ..ModelConfig::default()
            },
        }
    }
}

fn start(message: &str) -> Instant {
    print!("{}... ", message);
    let _ = io::stdout().flush();
    Instant::now()
}

fn train_model(args: &Args, train_path: &Path) -> anyhow::Result<IntegerHDModel> {
    let config = args.training_config();
    config.validate()?;

    // Load the dataset - raw pixels and labels, no normalization yet
    let now = start("Loading data");
    let raw = load_digits(train_path, CsvLayout::train(!args.no_headers), args.limit)
        .with_context(|| format!("Failed to load {}", train_path.display()))?;
    println!(
        "Loaded {} examples from {} [{}ms]",
        raw.len(),
        train_path.display(),
        now.elapsed().as_millis()
    );
    if raw.is_empty() {
        bail!("No training images found in {}", train_path.display());
    }

    let samples = to_samples(&raw)?;
    let split = split_train_validation(samples, config.holdout, config.seed)?;
    println!(
        "Split into {} training and {} validation examples",
        split.train.len(),
        split.validation.len()
    );

    let now = start("Initializing model");
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let mut model = IntegerHDModel::new(&config.model, IMAGE_AREA, &mut rng);
    println!(
        "Done - {} dimensions [{}ms]",
        model.dimensionality(),
        now.elapsed().as_millis()
    );

    println!("=== Training model ===");
    let now = Instant::now();
    let history = model.train(
        &split.train,
        &split.validation,
        config.max_epochs,
        config.patience,
    )?;
    println!(
        "=== Done after {} epochs, kept epoch {} [{}ms] ===",
        history.epochs.len(),
        history.best_epoch,
        now.elapsed().as_millis()
    );

    let now = start("Evaluating on validation data");
    let evaluation = evaluate(&model, &split.validation);
    println!(
        "Done - Accuracy = {:.6} [{}ms]",
        evaluation.accuracy(),
        now.elapsed().as_millis()
    );
    for error in evaluation.worst_errors(ERRORS_SHOWN) {
        println!(
            "  validation #{}: predicted {}, true {} (score gap {:.4})",
            error.index, error.predicted, error.actual, error.gap
        );
    }

    let model_path = args.output_dir.join(MODEL_FILE);
    let topology_path = args.output_dir.join(TOPOLOGY_FILE);
    model
        .save(&model_path)
        .with_context(|| format!("Failed to save model to {}", model_path.display()))?;
    model.save_topology(&topology_path)?;
    log::info!(
        "Saved model to {} and topology to {}",
        model_path.display(),
        topology_path.display()
    );

    Ok(model)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    let model = match (&args.model, &args.train) {
        (Some(path), _) => {
            let now = start("Loading model");
            let model = IntegerHDModel::load(path)
                .with_context(|| format!("Failed to load model from {}", path.display()))?;
            println!("Done [{}ms]", now.elapsed().as_millis());
            model
        }
        (None, Some(train_path)) => train_model(&args, train_path)?,
        (None, None) => bail!("Either --train or --model is required"),
    };

    if let Some(test_path) = &args.test {
        let now = start("Predicting test data");
        let raw = load_digits(test_path, CsvLayout::test(!args.no_headers), usize::MAX)
            .with_context(|| format!("Failed to load {}", test_path.display()))?;
        let predictions = model.classify_batch(&to_samples(&raw)?);
        let submission_path = args.output_dir.join(SUBMISSION_FILE);
        write_submission(&submission_path, &predictions)?;
        println!(
            "Wrote {} predictions to {} [{}ms]",
            predictions.len(),
            submission_path.display(),
            now.elapsed().as_millis()
        );
    }

    for (i, path) in args.images.iter().enumerate() {
        let sample = normalize_path(path)?;
        println!("{}: {}", path.display(), model.classify(&sample));
        if i == 0 {
            render_digit(&sample, args.output_dir.join(DIAGNOSTIC_FILE))?;
        }
    }

    for grid in &args.grids {
        let prediction = predict_grid_path(&model, &grid.path, grid.size)?;
        println!("{} ({}x{}):", grid.path.display(), grid.size, grid.size);
        print!("{}", prediction);
    }

    Ok(())
}
