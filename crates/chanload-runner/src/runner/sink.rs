use super::config::RunnerConfig;
use super::stats_log::SubscriptionLog;
use super::statsd::StatsdSink;
use super::telemetry;
use chanload::{FetchSample, MetricsSink};

/// Fans traffic metrics out to StatsD, the optional subscription stats log
/// and, with the `metrics` feature, OpenTelemetry.
pub struct RunnerSink {
    statsd: StatsdSink,
    stats_log: Option<SubscriptionLog>,
}

impl RunnerSink {
    pub fn new(config: &RunnerConfig) -> anyhow::Result<Self> {
        let statsd = StatsdSink::connect(&config.statsd_addr, config.metrics_prefix.clone())?;
        let stats_log = config
            .subscription_stats_log
            .as_deref()
            .map(SubscriptionLog::open)
            .transpose()?;
        Ok(Self { statsd, stats_log })
    }
}

impl MetricsSink for RunnerSink {
    fn increment(&self, name: &str) {
        self.statsd.count(name, 1);
        telemetry::increment_traffic(name);
    }

    fn timing(&self, name: &str, millis: u64) {
        self.statsd.timing(name, millis);
        telemetry::record_traffic_timing(name, millis);
    }

    fn fetch_sample(&self, sample: &FetchSample) {
        if let Some(log) = &self.stats_log {
            log.record(sample);
        }
    }
}
