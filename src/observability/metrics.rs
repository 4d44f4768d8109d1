use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static MONITOR_METRICS: OnceLock<MonitorMetrics> = OnceLock::new();

/// Installs the Prometheus recorder. Safe to call more than once; later calls
/// return the existing handle.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Some(handle.clone());
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_metrics();
            let _ = METRICS_HANDLE.set(handle.clone());
            Some(handle)
        }
        Err(e) => {
            tracing::warn!("failed to install metrics recorder: {}", e);
            None
        }
    }
}

fn describe_metrics() {
    describe_counter!("monitor_cycles_total", "Statement fetch cycles executed");
    describe_counter!("monitor_fetch_failures_total", "Transient statement fetch failures");
    describe_counter!("monitor_transactions_ingested_total", "Statement lines persisted");
    describe_counter!("monitor_duplicates_total", "Statement lines skipped as duplicates");
    describe_counter!("monitor_auto_matches_total", "Automatic allocations created");
    describe_counter!("monitor_manual_allocations_total", "Manual allocation links written");
    describe_counter!("monitor_notifications_total", "Credit notifications dispatched");
    describe_histogram!(
        "monitor_fetch_duration_ms",
        Unit::Milliseconds,
        "Latency of a single statement fetch"
    );
}

/// Metric recording points for the monitoring core. The macros are no-ops
/// until a recorder is installed, so library users and tests pay nothing.
pub struct MonitorMetrics;

pub fn monitor_metrics() -> &'static MonitorMetrics {
    MONITOR_METRICS.get_or_init(|| MonitorMetrics)
}

impl MonitorMetrics {
    pub fn record_cycle(&self, fetch_failed: bool) {
        counter!("monitor_cycles_total", "outcome" => if fetch_failed { "fetch_failed" } else { "ok" })
            .increment(1);
        if fetch_failed {
            counter!("monitor_fetch_failures_total").increment(1);
        }
    }

    pub fn record_fetch_latency(&self, duration_ms: f64) {
        histogram!("monitor_fetch_duration_ms").record(duration_ms);
    }

    pub fn record_ingest(&self, saved: usize, duplicates: usize) {
        if saved > 0 {
            counter!("monitor_transactions_ingested_total").increment(saved as u64);
        }
        if duplicates > 0 {
            counter!("monitor_duplicates_total").increment(duplicates as u64);
        }
    }

    pub fn record_auto_match(&self) {
        counter!("monitor_auto_matches_total").increment(1);
    }

    pub fn record_manual_allocation(&self, links: usize) {
        counter!("monitor_manual_allocations_total").increment(links as u64);
    }

    pub fn record_notifications(&self, count: usize) {
        if count > 0 {
            counter!("monitor_notifications_total").increment(count as u64);
        }
    }
}
