//! Training harness: synthetic data, train/test split, fit and evaluation

use crate::config::TrainingConfig;
use crate::dataset::LabeledDataset;
use crate::error::{Result, ScoringError};
use crate::feature_extractor::{FeatureExtractor, FEATURE_NAMES};
use crate::models::classifier::{ConversionClassifier, TrainedModel};
use crate::scorer::Scorer;
use crate::types::customer::CustomerRecord;
use crate::types::score::{ScoreResult, Segment};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// Seeded generator of plausible CRM customers with conversion labels.
///
/// Conversion odds grow with recency, contact count, spend and email
/// engagement, so a classifier has real signal to learn.
pub struct SyntheticGenerator {
    rng: StdRng,
}

impl SyntheticGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate `n` customers with ids `1..=n`
    pub fn generate(&mut self, n: usize) -> LabeledDataset {
        let mut dataset = LabeledDataset {
            records: Vec::with_capacity(n),
            labels: Vec::with_capacity(n),
        };

        for id in 1..=n {
            let record = CustomerRecord {
                customer_id: id as i64,
                days_since_last_contact: self.rng.gen_range(1..365),
                total_contacts: self.rng.gen_range(1..50),
                total_spent: self.rng.gen_range(0.0..10_000.0),
                emails_sent: self.rng.gen_range(5..100),
                emails_opened: self.rng.gen_range(0..80),
                website_visits: self.rng.gen_range(0..200),
                customer_age_days: self.rng.gen_range(30..1825),
            };

            let probability = Self::conversion_probability(&record);
            let converted = u8::from(self.rng.gen::<f64>() < probability);

            dataset.records.push(record);
            dataset.labels.push(converted);
        }

        dataset
    }

    /// Ground-truth conversion odds used to draw labels
    pub fn conversion_probability(record: &CustomerRecord) -> f64 {
        let recency = (365 - record.days_since_last_contact) as f64 / 365.0 * 0.3;
        let contacts = (record.total_contacts as f64 / 50.0).min(1.0) * 0.25;
        let spend = (record.total_spent / 10_000.0).min(1.0) * 0.25;
        let engagement = if record.emails_sent > 0 {
            record.emails_opened as f64 / record.emails_sent as f64 * 0.2
        } else {
            0.0
        };
        recency + contacts + spend + engagement
    }
}

/// Shuffle with `seed` and hold out `ceil(n * test_ratio)` rows for testing
pub fn train_test_split(
    dataset: &LabeledDataset,
    test_ratio: f64,
    seed: u64,
) -> Result<(LabeledDataset, LabeledDataset)> {
    let n = dataset.len();
    if n < 2 {
        return Err(ScoringError::InvalidInput(format!(
            "need at least 2 records to split, got {}",
            n
        )));
    }
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(ScoringError::InvalidInput(format!(
            "test ratio must be in (0, 1), got {}",
            test_ratio
        )));
    }

    let n_test = ((n as f64 * test_ratio).ceil() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test, train) = indices.split_at(n_test);

    Ok((dataset.select(train), dataset.select(test)))
}

/// Share and observed conversion rate of one segment in the test set
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub count: usize,
    /// Fraction of the test set in this segment
    pub share: f64,
    /// Fraction of this segment that actually converted
    pub conversion_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureWeight {
    pub name: String,
    pub weight: f64,
}

/// Held-out evaluation of a trained classifier
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub train_samples: usize,
    pub test_samples: usize,
    pub decision_threshold: u8,
    /// Fraction of test customers where `score >= decision_threshold` matches the label
    pub accuracy: f64,
    /// Undefined when the test set holds a single class
    pub roc_auc: Option<f64>,
    pub segments: Vec<SegmentSummary>,
    /// Highest weight first
    pub feature_importance: Vec<FeatureWeight>,
    pub training_secs: f64,
}

/// Everything produced by one training run
pub struct TrainingOutcome {
    pub report: EvaluationReport,
    pub test_set: LabeledDataset,
    /// Scores of `test_set`, in the same order
    pub test_results: Vec<ScoreResult>,
}

/// Split, fit and evaluate
pub struct TrainingHarness {
    config: TrainingConfig,
    extractor: FeatureExtractor,
    scorer: Scorer,
}

impl TrainingHarness {
    pub fn new(config: TrainingConfig, scorer: Scorer) -> Self {
        Self {
            config,
            extractor: FeatureExtractor::new(),
            scorer,
        }
    }

    /// Synthetic dataset sized and seeded by the training config
    pub fn synthetic_dataset(&self) -> LabeledDataset {
        SyntheticGenerator::new(self.config.seed).generate(self.config.samples)
    }

    /// Train `classifier` on the training split of `dataset` and evaluate it
    /// on the held-out split. The classifier is replaced only if fitting succeeds.
    pub fn run(
        &self,
        classifier: &ConversionClassifier,
        dataset: &LabeledDataset,
    ) -> Result<TrainingOutcome> {
        let (train, test) = train_test_split(dataset, self.config.test_ratio, self.config.seed)?;

        info!(
            train = train.len(),
            test = test.len(),
            positive_rate = format!("{:.3}", dataset.positive_rate()),
            "Dataset split"
        );

        let started = Instant::now();
        let train_features = self.extractor.extract_batch(&train.records);
        let model = classifier.fit(&train_features, &train.labels)?;
        let training_secs = started.elapsed().as_secs_f64();

        let (report, test_results) = self.evaluate(&model, &test, train.len(), training_secs)?;

        info!(
            accuracy = format!("{:.4}", report.accuracy),
            roc_auc = ?report.roc_auc,
            training_secs = format!("{:.2}", training_secs),
            "Model evaluated"
        );

        Ok(TrainingOutcome {
            report,
            test_set: test,
            test_results,
        })
    }

    fn evaluate(
        &self,
        model: &TrainedModel,
        test: &LabeledDataset,
        train_samples: usize,
        training_secs: f64,
    ) -> Result<(EvaluationReport, Vec<ScoreResult>)> {
        let features = self.extractor.extract_batch(&test.records);
        let matrix = self.extractor.to_matrix(&features);
        let probabilities = model.forest.predict_proba(matrix.view())?;

        let results: Vec<ScoreResult> = test
            .records
            .iter()
            .zip(&probabilities)
            .map(|(record, &p)| self.scorer.score(record.customer_id, p))
            .collect();

        let threshold = self.config.decision_threshold;
        let correct = results
            .iter()
            .zip(&test.labels)
            .filter(|(result, &label)| u8::from(result.score >= threshold) == label)
            .count();
        let accuracy = correct as f64 / results.len().max(1) as f64;

        let segments = Segment::ALL
            .iter()
            .map(|&segment| {
                let labels: Vec<u8> = results
                    .iter()
                    .zip(&test.labels)
                    .filter(|(result, _)| result.segment == segment)
                    .map(|(_, &label)| label)
                    .collect();
                let converted = labels.iter().filter(|&&label| label == 1).count();
                SegmentSummary {
                    segment,
                    count: labels.len(),
                    share: labels.len() as f64 / results.len().max(1) as f64,
                    conversion_rate: (!labels.is_empty())
                        .then(|| converted as f64 / labels.len() as f64),
                }
            })
            .collect();

        let mut feature_importance: Vec<FeatureWeight> = FEATURE_NAMES
            .iter()
            .zip(model.forest.feature_importances())
            .map(|(name, &weight)| FeatureWeight {
                name: name.to_string(),
                weight,
            })
            .collect();
        feature_importance.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let report = EvaluationReport {
            train_samples,
            test_samples: test.len(),
            decision_threshold: threshold,
            accuracy,
            roc_auc: roc_auc(&probabilities, &test.labels),
            segments,
            feature_importance,
            training_secs,
        };

        Ok((report, results))
    }
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged
pub fn roc_auc(probabilities: &[f64], labels: &[u8]) -> Option<f64> {
    let positives = labels.iter().filter(|&&label| label == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 || probabilities.len() != labels.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && probabilities[order[end + 1]] == probabilities[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; tied values share the mean rank
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &index in &order[start..=end] {
            if labels[index] == 1 {
                positive_rank_sum += rank;
            }
        }
        start = end + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}
