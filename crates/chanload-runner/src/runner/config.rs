use anyhow::{Context, bail};
use chanload::{Dispatch, SchedulerConfig, Throttle};
use clap::Parser;
use core::time::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime configuration for the `chanload-runner` binary.
///
/// These settings control which hosts receive traffic, how aggressively the
/// identifier pools are thinned, and how fast each worker cycles. Values are
/// parsed from CLI arguments or environment variables. A JSON file given with
/// `--config` overrides any key it sets.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "chanload-runner",
    version,
    about = "Generates synthetic channel, subscription and listing traffic"
)]
pub struct CliArgs {
    /// JSON configuration file.
    ///
    /// Recognized keys: `api_hosts`, `sample_rate`, `num_workers`,
    /// `create_channel_throttle`, `subscribe_channel_throttle`,
    /// `get_subscription_throttle` (milliseconds) and
    /// `subscriptionStatsLogfile`.
    ///
    /// Environment variable: `CHANLOAD_CONFIG`
    #[arg(short, long, env = "CHANLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Hosts of the channel API, comma separated. `http://` is assumed when no
    /// scheme is given. Requests are spread round-robin.
    ///
    /// Environment variable: `API_HOSTS`
    #[arg(long, env = "API_HOSTS", value_delimiter = ',')]
    pub api_hosts: Vec<String>,

    /// Fraction of a closed minute's identifiers kept by thinning, in `(0, 1]`.
    ///
    /// Environment variable: `SAMPLE_RATE`
    #[arg(long, env = "SAMPLE_RATE", default_value_t = 0.1, allow_negative_numbers = true)]
    pub sample_rate: f64,

    /// Number of concurrent workers.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 1)]
    pub num_workers: usize,

    /// Delay after each channel creation in milliseconds.
    ///
    /// Environment variable: `CREATE_CHANNEL_THROTTLE_MS`
    #[arg(long, env = "CREATE_CHANNEL_THROTTLE_MS", default_value_t = 1_000)]
    pub create_channel_throttle_ms: u64,

    /// Delay after each subscription creation in milliseconds.
    ///
    /// Environment variable: `CREATE_SUBSCRIPTION_THROTTLE_MS`
    #[arg(long, env = "CREATE_SUBSCRIPTION_THROTTLE_MS", default_value_t = 1_000)]
    pub create_subscription_throttle_ms: u64,

    /// Delay after each subscription listing in milliseconds.
    ///
    /// Environment variable: `FETCH_SUBSCRIPTIONS_THROTTLE_MS`
    #[arg(long, env = "FETCH_SUBSCRIPTIONS_THROTTLE_MS", default_value_t = 1_000)]
    pub fetch_subscriptions_throttle_ms: u64,

    /// Upper bound of the random delay before each worker's first cycle, in
    /// milliseconds.
    ///
    /// Environment variable: `START_JITTER_MS`
    #[arg(long, env = "START_JITTER_MS", default_value_t = 1_000)]
    pub start_jitter_ms: u64,

    /// Await each action before the throttle sleep instead of spawning it.
    /// Caps in-flight requests at one per worker.
    #[arg(long, default_value_t = false)]
    pub inline_dispatch: bool,

    /// StatsD daemon address.
    ///
    /// Environment variable: `STATSD_ADDR`
    #[arg(long, env = "STATSD_ADDR", default_value_t = String::from("127.0.0.1:8125"))]
    pub statsd_addr: String,

    /// Prefix for every StatsD metric. Defaults to `$HOSTNAME`. Dots are
    /// replaced with dashes.
    ///
    /// Environment variable: `METRICS_PREFIX`
    #[arg(long, env = "METRICS_PREFIX")]
    pub metrics_prefix: Option<String>,

    /// File that receives one `<unix_nanos> <entries> <latency_ms>` line per
    /// successful subscription listing.
    ///
    /// Environment variable: `SUBSCRIPTION_STATS_LOG`
    #[arg(long, env = "SUBSCRIPTION_STATS_LOG")]
    pub subscription_stats_log: Option<PathBuf>,

    /// Per-request timeout in milliseconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    /// Seconds to wait for in-flight requests on shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 3)]
    pub shutdown_timeout_secs: u64,
}

/// Keys accepted in the `--config` JSON file. Absent keys fall back to the
/// CLI/environment value.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub api_hosts: Option<Vec<String>>,
    pub sample_rate: Option<f64>,
    pub num_workers: Option<usize>,
    pub create_channel_throttle: Option<u64>,
    pub subscribe_channel_throttle: Option<u64>,
    pub get_subscription_throttle: Option<u64>,
    #[serde(rename = "subscriptionStatsLogfile")]
    pub subscription_stats_log: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let buf = std::fs::read(path)
            .with_context(|| format!("failed to read configuration file `{}`", path.display()))?;
        serde_json::from_slice(&buf)
            .with_context(|| format!("invalid JSON in configuration file `{}`", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub api_hosts: Vec<String>,
    pub sample_rate: f64,
    pub num_workers: usize,
    pub scheduler: SchedulerConfig,
    pub statsd_addr: String,
    pub metrics_prefix: String,
    pub subscription_stats_log: Option<PathBuf>,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl RunnerConfig {
    /// Combines CLI/environment values with a configuration file and
    /// validates the result.
    pub fn merge(args: CliArgs, file: FileConfig) -> anyhow::Result<Self> {
        let api_hosts: Vec<String> = file
            .api_hosts
            .unwrap_or(args.api_hosts)
            .into_iter()
            .map(|host| host.trim().to_owned())
            .filter(|host| !host.is_empty())
            .collect();
        let sample_rate = file.sample_rate.unwrap_or(args.sample_rate);
        let num_workers = file.num_workers.unwrap_or(args.num_workers);

        if api_hosts.is_empty() {
            bail!("API_HOSTS must name at least one host");
        }

        if sample_rate.is_nan() || sample_rate <= 0.0 || sample_rate > 1.0 {
            bail!("SAMPLE_RATE ({sample_rate}) must be greater than 0 and at most 1");
        }

        if num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.request_timeout_ms == 0 {
            bail!("REQUEST_TIMEOUT_MS must be greater than 0");
        }

        let throttle = Throttle {
            create_channel: Duration::from_millis(
                file.create_channel_throttle
                    .unwrap_or(args.create_channel_throttle_ms),
            ),
            create_subscription: Duration::from_millis(
                file.subscribe_channel_throttle
                    .unwrap_or(args.create_subscription_throttle_ms),
            ),
            fetch_subscriptions: Duration::from_millis(
                file.get_subscription_throttle
                    .unwrap_or(args.fetch_subscriptions_throttle_ms),
            ),
        };

        let dispatch = if args.inline_dispatch {
            Dispatch::Inline
        } else {
            Dispatch::Detached
        };

        let metrics_prefix = args
            .metrics_prefix
            .or_else(|| std::env::var("HOSTNAME").ok())
            .map(|prefix| prefix.replace('.', "-"))
            .unwrap_or_default();

        Ok(Self {
            api_hosts,
            sample_rate,
            num_workers,
            scheduler: SchedulerConfig {
                throttle,
                start_jitter: Duration::from_millis(args.start_jitter_ms),
                dispatch,
            },
            statsd_addr: args.statsd_addr,
            metrics_prefix,
            subscription_stats_log: file.subscription_stats_log.or(args.subscription_stats_log),
            request_timeout: Duration::from_millis(args.request_timeout_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}

impl TryFrom<CliArgs> for RunnerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }
}
