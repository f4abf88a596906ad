//! Performance metrics and statistics tracking for the scoring service.

use crate::error::ErrorKind;
use crate::types::score::{ScoreResult, Segment};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for scoring traffic
pub struct ScoringMetrics {
    /// Total customers scored
    pub customers_scored: AtomicU64,
    /// Scoring requests served (single and batch)
    pub requests: AtomicU64,
    /// Models trained or loaded into the service
    pub models_installed: AtomicU64,
    /// Scored customers by segment
    leads_by_segment: RwLock<BTreeMap<Segment, u64>>,
    /// Failures by error kind
    errors_by_kind: RwLock<BTreeMap<String, u64>>,
    /// Request processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Score distribution buckets of width 10
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            customers_scored: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            models_installed: AtomicU64::new(0),
            leads_by_segment: RwLock::new(BTreeMap::new()),
            errors_by_kind: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record one served scoring request and the results it produced
    pub fn record_request(&self, processing_time: Duration, results: &[ScoreResult]) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.customers_scored
            .fetch_add(results.len() as u64, Ordering::Relaxed);

        {
            let mut times = self.processing_times.write();
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let mut buckets = self.score_buckets.write();
        let mut by_segment = self.leads_by_segment.write();
        for result in results {
            let bucket = usize::from(result.score / 10).min(9);
            buckets[bucket] += 1;
            *by_segment.entry(result.segment).or_insert(0) += 1;
        }
    }

    pub fn record_error(&self, kind: ErrorKind) {
        let key = format!("{:?}", kind);
        *self.errors_by_kind.write().entry(key).or_insert(0) += 1;
    }

    pub fn record_model_installed(&self) {
        self.models_installed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = self.processing_times.read().clone();
        if sorted.is_empty() {
            return ProcessingStats::default();
        }
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }

    /// Customers scored per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.customers_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        *self.score_buckets.read()
    }

    pub fn get_leads_by_segment(&self) -> BTreeMap<Segment, u64> {
        self.leads_by_segment.read().clone()
    }

    pub fn get_errors_by_kind(&self) -> BTreeMap<String, u64> {
        self.errors_by_kind.read().clone()
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_segment = self.get_leads_by_segment();
        let leads_by_segment = Segment::ALL
            .iter()
            .map(|segment| {
                (
                    segment.to_string(),
                    by_segment.get(segment).copied().unwrap_or(0),
                )
            })
            .collect();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            customers_scored: self.customers_scored.load(Ordering::Relaxed),
            models_installed: self.models_installed.load(Ordering::Relaxed),
            throughput: self.get_throughput(),
            leads_by_segment,
            score_distribution: self.get_score_distribution(),
            processing: self.get_processing_stats(),
            errors: self.get_errors_by_kind(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let scored = self.customers_scored.load(Ordering::Relaxed);
        let requests = self.requests.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let by_segment = self.get_leads_by_segment();
        let score_dist = self.get_score_distribution();
        let errors = self.get_errors_by_kind();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             CRM SCORING SERVICE - METRICS SUMMARY            ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Customers Scored: {:>8}  │  Throughput: {:>8.1} cust/s   ║",
            scored, throughput
        );
        info!(
            "║ Requests:         {:>8}  │  Models Installed: {:>6}      ║",
            requests,
            self.models_installed.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Request Time (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Leads by Segment:                                            ║");
        for segment in Segment::ALL {
            let count = by_segment.get(&segment).copied().unwrap_or(0);
            let pct = if scored > 0 {
                (count as f64 / scored as f64) * 100.0
            } else {
                0.0
            };
            info!(
                "║   {:6}: {:>8} ({:>5.1}%)  {:<34}║",
                segment.as_str(),
                count,
                pct,
                segment.recommendation()
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Score Distribution:                                          ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:>3}-{:<3}: {:>6} ({:>5.1}%) {}",
                i * 10,
                if i == 9 { 100 } else { i * 10 + 9 },
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");

        if !errors.is_empty() {
            info!("Errors by kind:");
            for (kind, count) in &errors {
                info!("  {}: {}", kind, count);
            }
        }
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable view of [`ScoringMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub customers_scored: u64,
    pub models_installed: u64,
    /// Customers per second since startup
    pub throughput: f64,
    pub leads_by_segment: BTreeMap<String, u64>,
    /// Counts for scores 0-9, 10-19, ..., 90-100
    pub score_distribution: [u64; 10],
    pub processing: ProcessingStats,
    pub errors: BTreeMap<String, u64>,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(customer_id: i64, score: u8, segment: Segment) -> ScoreResult {
        ScoreResult {
            customer_id,
            score,
            segment,
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = ScoringMetrics::new();

        metrics.record_request(
            Duration::from_micros(100),
            &[result(1, 85, Segment::Hot), result(2, 12, Segment::Cold)],
        );
        metrics.record_request(Duration::from_micros(300), &[result(3, 100, Segment::Hot)]);

        assert_eq!(metrics.requests.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.customers_scored.load(Ordering::Relaxed), 3);

        let by_segment = metrics.get_leads_by_segment();
        assert_eq!(by_segment.get(&Segment::Hot), Some(&2));
        assert_eq!(by_segment.get(&Segment::Cold), Some(&1));
        assert_eq!(by_segment.get(&Segment::Warm), None);

        let buckets = metrics.get_score_distribution();
        assert_eq!(buckets[1], 1);
        assert_eq!(buckets[8], 1);
        assert_eq!(buckets[9], 1);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = ScoringMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);

        for micros in [100, 200, 300, 400] {
            metrics.record_request(Duration::from_micros(micros), &[]);
        }

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.max_us, 400);
    }

    #[test]
    fn test_snapshot() {
        let metrics = ScoringMetrics::new();
        metrics.record_request(Duration::from_micros(50), &[result(1, 55, Segment::Warm)]);
        metrics.record_error(ErrorKind::ModelNotTrained);
        metrics.record_error(ErrorKind::ModelNotTrained);
        metrics.record_model_installed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.customers_scored, 1);
        assert_eq!(snapshot.models_installed, 1);
        assert_eq!(snapshot.leads_by_segment.get("Warm"), Some(&1));
        assert_eq!(snapshot.leads_by_segment.get("Hot"), Some(&0));
        assert_eq!(snapshot.errors.get("ModelNotTrained"), Some(&2));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["score_distribution"][5], 1);
    }
}
