use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::workload::IdStrategy;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_VUS: usize = 5;
pub const DEFAULT_DURATION: &str = "30s";
pub const DEFAULT_PAUSE_MS: u64 = 1000;
pub const DEFAULT_MAX_ID: u32 = 500;
pub const DEFAULT_MAX_ERROR_RATE: f64 = 1.0;
/// default log level. Can use this argument or LOADTEST_LOG env var
pub const DEFAULT_LOG: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Standard,
    Json,
    Pretty,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "book-loadtest",
    about = "Virtual-user load generator for the book catalog HTTP API"
)]
pub struct Cli {
    /// root of the target API
    #[arg(long, env = "LOADTEST_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
    /// number of concurrent virtual users
    #[arg(long, env = "LOADTEST_VUS", default_value_t = DEFAULT_VUS)]
    pub vus: usize,
    /// total run length, e.g. `30s`, `2m`, `500ms`. A bare number is seconds
    #[arg(long, env = "LOADTEST_DURATION", default_value = DEFAULT_DURATION)]
    pub duration: String,
    /// stop each virtual user after this many iterations
    #[arg(long, env = "LOADTEST_ITERATIONS")]
    pub iterations: Option<u64>,
    /// pause between iterations of one virtual user
    #[arg(long, env = "LOADTEST_PAUSE_MS", default_value_t = DEFAULT_PAUSE_MS)]
    pub pause_ms: u64,
    /// per-request timeout, the HTTP client default applies when unset
    #[arg(long, env = "LOADTEST_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,
    /// virtual users started per second, 0 starts them all at once
    #[arg(long, env = "LOADTEST_RAMP_PER_SEC", default_value_t = 0)]
    pub ramp_per_sec: usize,

    /// upper bound of the generated book id range `[1, max_id]`
    #[arg(long, env = "LOADTEST_MAX_ID", default_value_t = DEFAULT_MAX_ID)]
    pub max_id: u32,
    #[arg(long, env = "LOADTEST_ID_STRATEGY", value_enum, default_value_t = IdStrategy::Shared)]
    pub id_strategy: IdStrategy,
    #[arg(long, env = "LOADTEST_SEED")]
    pub seed: Option<u64>,
    /// also exercise the title/author/category search endpoints
    #[arg(long, env = "LOADTEST_EXTENDED")]
    pub extended: bool,

    #[arg(long, env = "LOADTEST_MAX_ERROR_RATE", default_value_t = DEFAULT_MAX_ERROR_RATE)]
    pub max_error_rate: f64,
    #[arg(long)]
    pub json: bool,
    #[arg(long)]
    pub dry_run: bool,

    /// set the log level. All valid RUST_LOG arguments are accepted
    #[arg(long, env = "LOADTEST_LOG", default_value = DEFAULT_LOG)]
    pub log: String,
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Standard)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestConfig {
    pub base_url: String,
    pub vus: usize,
    pub duration_ms: u64,
    pub iterations: Option<u64>,
    pub pause_ms: u64,
    pub timeout_ms: Option<u64>,
    pub ramp_per_sec: usize,
    pub max_id: u32,
    pub id_strategy: IdStrategy,
    pub seed: Option<u64>,
    pub extended: bool,
    pub max_error_rate: f64,
    pub dry_run: bool,
}

impl LoadTestConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl TryFrom<Cli> for LoadTestConfig {
    type Error = anyhow::Error;

    fn try_from(args: Cli) -> Result<Self> {
        if args.vus == 0 {
            bail!("--vus must be greater than 0");
        }
        if args.iterations == Some(0) {
            bail!("--iterations must be greater than 0");
        }
        if args.timeout_ms == Some(0) {
            bail!("--timeout-ms must be greater than 0");
        }
        if args.max_id == 0 {
            bail!("--max-id must be greater than 0");
        }
        if !(0.0..=1.0).contains(&args.max_error_rate) {
            bail!("--max-error-rate must be between 0.0 and 1.0");
        }
        if args.id_strategy == IdStrategy::Partitioned && args.vus > args.max_id as usize {
            bail!(
                "--id-strategy partitioned needs --vus ({}) <= --max-id ({})",
                args.vus,
                args.max_id
            );
        }

        let duration = parse_duration(&args.duration)
            .with_context(|| format!("invalid --duration `{}`", args.duration))?;
        if duration.is_zero() {
            bail!("--duration must be greater than 0");
        }

        let base_url = normalize_base_url(&args.base_url)
            .with_context(|| format!("invalid --base-url `{}`", args.base_url))?;

        Ok(Self {
            base_url,
            vus: args.vus,
            duration_ms: duration.as_millis() as u64,
            iterations: args.iterations,
            pause_ms: args.pause_ms,
            timeout_ms: args.timeout_ms,
            ramp_per_sec: args.ramp_per_sec,
            max_id: args.max_id,
            id_strategy: args.id_strategy,
            seed: args.seed,
            extended: args.extended,
            max_error_rate: args.max_error_rate,
            dry_run: args.dry_run,
        })
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim()).context("not an absolute URL")?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("scheme must be http or https, got `{}`", url.scheme());
    }
    if url.host_str().is_none() {
        bail!("URL has no host");
    }
    if url.query().is_some() {
        bail!("URL must not carry a query string");
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Parse a duration string with an optional unit.
/// Accepts: "1500ms", "30", "30s", "2m", "1h". A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        bail!("empty duration string");
    }

    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, unit) = s.split_at(end);
    let num = num.parse::<u64>().context("invalid number")?;

    let millis_per_unit = match unit.trim() {
        "ms" => 1,
        "" | "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => bail!("unknown time unit '{other}', only 'ms', 's', 'm' or 'h' are supported"),
    };

    num.checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .context("duration value overflow")
}
