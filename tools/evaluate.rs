//! Offline Evaluation
//!
//! Scores a classifier artifact against the labelled credit card dataset.

use anyhow::{Context, Result};
use clap::Parser;
use fraud_detection_api::{
    config::{LogFormat, LoggingConfig, ModelConfig, ModelFormat},
    dataset,
    evaluation,
    models::FraudDetector,
    telemetry,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "evaluate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate a fraud classifier against labelled data", long_about = None)]
struct Args {
    /// Labelled CSV (30 feature columns plus Class)
    #[arg(short, long, default_value = "data/raw/creditcard.csv")]
    data: PathBuf,

    /// Classifier artifact
    #[arg(short, long, default_value = "models/model.json")]
    model: PathBuf,

    /// Fraud probability above which a record is labelled 1
    #[arg(short, long, default_value_t = 0.5)]
    threshold: f64,

    /// Fraction of rows held out for scoring
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,

    /// Shuffle seed for the split
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Score the whole dataset instead of the held-out split
    #[arg(long)]
    full: bool,

    /// Warn instead of failing when the artifact's feature names disagree
    #[arg(long)]
    lenient_feature_names: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    telemetry::init(&LoggingConfig {
        level: args.log_level.clone(),
        format: LogFormat::Pretty,
    })?;

    let model_config = model_config(&args)?;

    info!("Loading data...");
    let data = dataset::load_csv(&args.data)
        .with_context(|| format!("Failed to load dataset from {}", args.data.display()))?;

    let scored = if args.full {
        println!("Dataset shape: ({}, {})", data.len(), fraud_detection_api::FEATURE_COUNT);
        println!("Fraud cases: {}", data.class_counts().fraud);
        data
    } else {
        let split = data
            .train_test_split(args.test_size, args.seed)
            .context("Failed to split dataset")?;
        let features = fraud_detection_api::FEATURE_COUNT;
        println!("Training set shape: ({}, {})", split.train.len(), features);
        println!("Testing set shape: ({}, {})", split.test.len(), features);
        println!("Fraud cases in training set: {}", split.train.class_counts().fraud);
        println!("Fraud cases in testing set: {}", split.test.class_counts().fraud);
        split.test
    };

    let detector = FraudDetector::load(&model_config)
        .with_context(|| format!("Failed to load model from {}", args.model.display()))?;

    let report = evaluation::evaluate(&detector, &scored).context("Inference failed")?;

    println!("\nModel Performance ({}):", detector.model_name());
    println!("{}", report);
    Ok(())
}

/// Model settings from the command line, checked before any data is read.
fn model_config(args: &Args) -> Result<ModelConfig> {
    let config = ModelConfig {
        path: args.model.clone(),
        format: ModelFormat::Auto,
        threshold: args.threshold,
        strict_feature_names: !args.lenient_feature_names,
        ..ModelConfig::default()
    };
    config.validate()?;
    Ok(config)
}
