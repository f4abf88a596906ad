//! Model Trainer
//!
//! Trains the conversion classifier on synthetic or JSON Lines data, prints
//! an evaluation report and writes the model artifact.

use anyhow::{Context, Result};
use clap::Parser;
use crm_scoring::{
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    dataset::LabeledDataset,
    service::ScoringService,
    telemetry,
    training::{EvaluationReport, SyntheticGenerator, TrainingOutcome},
};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train the CRM conversion classifier", long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Labeled JSON Lines dataset; synthetic data is generated when omitted
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Number of synthetic customers to generate
    #[arg(short = 'n', long)]
    samples: Option<usize>,

    /// Seed for synthetic data and the train/test split
    #[arg(long)]
    seed: Option<u64>,

    /// Fraction of the dataset held out for evaluation
    #[arg(long)]
    test_ratio: Option<f64>,

    /// Number of trees in the forest
    #[arg(long)]
    trees: Option<usize>,

    /// Where to write the trained model (defaults to model.artifact_path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the evaluation report as JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(samples) = self.samples {
            config.training.samples = samples;
        }
        if let Some(seed) = self.seed {
            config.training.seed = seed;
        }
        if let Some(test_ratio) = self.test_ratio {
            config.training.test_ratio = test_ratio;
        }
        if let Some(trees) = self.trees {
            config.model.n_estimators = trees;
        }
        if let Some(output) = &self.output {
            config.model.artifact_path = output.clone();
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_from_path(&args.config)?;
    args.apply(&mut config);
    config.validate()?;

    telemetry::init_tracing(&config.logging)?;

    let dataset = match &args.data {
        Some(path) => LabeledDataset::from_jsonl(path)
            .with_context(|| format!("Failed to read training data from {}", path.display()))?,
        None => {
            info!(
                samples = config.training.samples,
                seed = config.training.seed,
                "Generating synthetic CRM data"
            );
            SyntheticGenerator::new(config.training.seed).generate(config.training.samples)
        }
    };

    let service = ScoringService::from_config(&config);
    let outcome = service.train(&dataset).context("Training failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    } else {
        print_report(&outcome, dataset.len());
        print_samples(&outcome, config.training.seed);
    }

    let path = service.save_model(None).context("Failed to save model")?;
    println!("Model saved to {}", path.display());

    Ok(())
}

fn print_report(outcome: &TrainingOutcome, total: usize) {
    let report: &EvaluationReport = &outcome.report;

    println!("{}", "=".repeat(70));
    println!("CRM CONVERSION SCORING - TRAINING REPORT");
    println!("{}", "=".repeat(70));
    println!(
        "Customers: {} (train {}, test {})",
        total, report.train_samples, report.test_samples
    );
    println!("Training time: {:.2}s", report.training_secs);
    println!();

    println!(
        "Accuracy (score >= {}): {:.2}%",
        report.decision_threshold,
        report.accuracy * 100.0
    );
    match report.roc_auc {
        Some(auc) => println!("ROC AUC: {:.4}", auc),
        None => println!("ROC AUC: n/a (single class in test set)"),
    }
    println!();

    println!("Segment distribution:");
    for summary in &report.segments {
        let conversion = summary
            .conversion_rate
            .map(|rate| format!("{:5.1}% converted", rate * 100.0))
            .unwrap_or_else(|| "no customers".to_string());
        println!(
            "  {:6}: {:4} customers ({:5.1}%)  {}",
            summary.segment.as_str(),
            summary.count,
            summary.share * 100.0,
            conversion
        );
    }
    println!();

    println!("Feature importance:");
    for feature in &report.feature_importance {
        println!("  {:25}: {:.3}", feature.name, feature.weight);
    }
    println!();
}

/// Five random test customers with their score and actual outcome
fn print_samples(outcome: &TrainingOutcome, seed: u64) {
    let count = outcome.test_results.len().min(5);
    if count == 0 {
        return;
    }

    println!("Sample scored customers:");
    println!("{}", "-".repeat(70));

    let mut rng = StdRng::seed_from_u64(seed);
    for i in index::sample(&mut rng, outcome.test_results.len(), count) {
        let result = &outcome.test_results[i];
        let actual = if outcome.test_set.labels[i] == 1 {
            "converted"
        } else {
            "not converted"
        };
        println!(
            "  Customer #{:<6} score {:>3}/100 | {:6} | {} | {}",
            result.customer_id,
            result.score,
            result.segment.as_str(),
            actual,
            result.segment.recommendation()
        );
    }
    println!("{}", "=".repeat(70));
}
