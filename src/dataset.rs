//! Labeled training data

use crate::error::{Result, ScoringError};
use crate::types::customer::CustomerRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;
use validator::Validate;

/// One JSON Lines row: a customer record plus its conversion outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledRecord {
    #[serde(flatten)]
    pub record: CustomerRecord,
    /// 1 if the customer converted, 0 otherwise
    pub converted: u8,
}

/// Customer records with parallel 0/1 conversion labels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledDataset {
    pub records: Vec<CustomerRecord>,
    pub labels: Vec<u8>,
}

impl LabeledDataset {
    pub fn new(records: Vec<CustomerRecord>, labels: Vec<u8>) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(ScoringError::DimensionMismatch {
                features: records.len(),
                labels: labels.len(),
            });
        }
        Ok(Self { records, labels })
    }

    /// Read a JSON Lines file, one [`LabeledRecord`] per line
    pub fn from_jsonl<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ScoringError::persistence(path, e))?;
        let dataset = Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            ScoringError::Persistence { source, .. } => ScoringError::persistence(path, source),
            other => other,
        })?;

        info!(
            path = %path.display(),
            records = dataset.len(),
            positive_rate = dataset.positive_rate(),
            "Training data loaded"
        );
        Ok(dataset)
    }

    /// Parse JSON Lines from any reader. Blank lines are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut dataset = Self::default();

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.map_err(|e| ScoringError::persistence("<reader>", e))?;
            if line.trim().is_empty() {
                continue;
            }

            let row: LabeledRecord = serde_json::from_str(&line).map_err(|e| {
                ScoringError::InvalidInput(format!("line {}: {}", line_number, e))
            })?;
            row.record.validate().map_err(|e| {
                ScoringError::InvalidInput(format!("line {}: {}", line_number, e))
            })?;
            if row.converted > 1 {
                return Err(ScoringError::InvalidInput(format!(
                    "line {}: converted must be 0 or 1, got {}",
                    line_number, row.converted
                )));
            }

            dataset.records.push(row.record);
            dataset.labels.push(row.converted);
        }

        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fraction of records labeled as converted
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        let positives = self.labels.iter().filter(|&&label| label == 1).count();
        positives as f64 / self.labels.len() as f64
    }

    /// Rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;

    const ROWS: &str = r#"{"customer_id": 1, "days_since_last_contact": 15, "total_contacts": 25, "total_spent": 5000, "emails_sent": 50, "emails_opened": 35, "website_visits": 120, "customer_age_days": 365, "converted": 1}

{"customer_id": 2, "days_since_last_contact": 200, "total_contacts": 2, "total_spent": 10.5, "emails_sent": 10, "emails_opened": 0, "website_visits": 1, "customer_age_days": 40, "converted": 0}
"#;

    #[test]
    fn test_reads_jsonl() {
        let dataset = LabeledDataset::from_reader(Cursor::new(ROWS)).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.labels, vec![1, 0]);
        assert_eq!(dataset.records[0].total_spent, 5000.0);
        assert_eq!(dataset.records[1].customer_id, 2);
        assert!((dataset.positive_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_line_names_line_number() {
        let input = format!("{}not json\n", ROWS);
        let err = LabeledDataset::from_reader(Cursor::new(input)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("line 4"), "{}", err);
    }

    #[test]
    fn test_rejects_missing_label_and_negative_values() {
        let missing = r#"{"customer_id": 1, "days_since_last_contact": 1, "total_contacts": 1, "total_spent": 1, "emails_sent": 1, "emails_opened": 1, "website_visits": 1, "customer_age_days": 1}"#;
        assert!(LabeledDataset::from_reader(Cursor::new(missing)).is_err());

        let negative = r#"{"customer_id": 1, "days_since_last_contact": -1, "total_contacts": 1, "total_spent": 1, "emails_sent": 1, "emails_opened": 1, "website_visits": 1, "customer_age_days": 1, "converted": 0}"#;
        let err = LabeledDataset::from_reader(Cursor::new(negative)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let bad_label = r#"{"customer_id": 1, "days_since_last_contact": 1, "total_contacts": 1, "total_spent": 1, "emails_sent": 1, "emails_opened": 1, "website_visits": 1, "customer_age_days": 1, "converted": 3}"#;
        assert!(LabeledDataset::from_reader(Cursor::new(bad_label)).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LabeledDataset::from_jsonl(dir.path().join("absent.jsonl")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_new_checks_lengths() {
        let err = LabeledDataset::new(vec![CustomerRecord::new(1)], vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn test_select() {
        let dataset = LabeledDataset::from_reader(Cursor::new(ROWS)).unwrap();
        let picked = dataset.select(&[1, 1, 0]);
        assert_eq!(picked.labels, vec![0, 0, 1]);
        assert_eq!(picked.records[2].customer_id, 1);
    }
}
