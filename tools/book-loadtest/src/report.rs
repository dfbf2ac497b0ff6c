use serde::{Deserialize, Serialize};

use crate::config::LoadTestConfig;
use crate::scenario::Step;
use crate::workload::IdStrategy;

/// Error samples kept per virtual user, the counters still see every error.
pub const MAX_ERROR_SAMPLES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    UnexpectedStatus,
    Timeout,
    Connect,
    Transport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub category: ErrorCategory,
    pub step: Step,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorCounts {
    pub unexpected_status: usize,
    pub timeout: usize,
    pub connect: usize,
    pub transport: usize,
}

impl ErrorCounts {
    pub fn record(&mut self, category: ErrorCategory) {
        match category {
            ErrorCategory::UnexpectedStatus => self.unexpected_status += 1,
            ErrorCategory::Timeout => self.timeout += 1,
            ErrorCategory::Connect => self.connect += 1,
            ErrorCategory::Transport => self.transport += 1,
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.unexpected_status += other.unexpected_status;
        self.timeout += other.timeout;
        self.connect += other.connect;
        self.transport += other.transport;
    }

    pub fn transport_total(&self) -> usize {
        self.timeout + self.connect + self.transport
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSummary {
    pub step: Step,
    pub name: String,
    pub passes: usize,
    pub fails: usize,
}

impl CheckSummary {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            name: step.check_name().to_string(),
            passes: 0,
            fails: 0,
        }
    }

    pub fn attempts(&self) -> usize {
        self.passes + self.fails
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VuResult {
    pub vu_index: usize,
    pub id_min: u32,
    pub id_max: u32,
    pub iterations: u64,
    pub interrupted_iterations: u64,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub error_counts: ErrorCounts,
    pub errors: Vec<ErrorRecord>,
    /// per-step pass/fail counts, in step-table order
    pub checks: Vec<CheckSummary>,
    #[serde(skip)]
    pub latencies_ms: Vec<u128>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub passed: bool,
    pub checks: Vec<ValidationCheck>,
}

impl ValidationSummary {
    pub fn dry_run() -> Self {
        Self {
            passed: true,
            checks: vec![ValidationCheck {
                name: "dry_run".to_string(),
                passed: true,
                details: "No requests sent; config and id planning only.".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfigSnapshot {
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
    pub dry_run: bool,
    pub max_error_rate: f64,
}

impl From<&LoadTestConfig> for RunConfigSnapshot {
    fn from(config: &LoadTestConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            vus: config.vus,
            duration_ms: config.duration_ms,
            iterations: config.iterations,
            pause_ms: config.pause_ms,
            timeout_ms: config.timeout_ms,
            ramp_per_sec: config.ramp_per_sec,
            max_id: config.max_id,
            id_strategy: config.id_strategy,
            seed: config.seed,
            extended: config.extended,
            dry_run: config.dry_run,
            max_error_rate: config.max_error_rate,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Totals {
    pub planned_vus: usize,
    pub completed_vus: usize,
    pub iterations: u64,
    pub interrupted_iterations: u64,
    pub requests: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub errors: ErrorCounts,
}

impl Totals {
    pub fn checks(&self) -> usize {
        self.checks_passed + self.checks_failed
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeStats {
    pub duration_ms: u128,
    pub iterations_per_sec: f64,
    pub requests_per_sec: f64,
    pub latency_p50_ms: Option<u128>,
    pub latency_p95_ms: Option<u128>,
    pub latency_p99_ms: Option<u128>,
    pub check_failure_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestReport {
    pub config: RunConfigSnapshot,
    pub dry_run: bool,
    pub passed: bool,
    pub totals: Totals,
    pub stats: RuntimeStats,
    pub checks: Vec<CheckSummary>,
    pub validation: ValidationSummary,
    pub vus: Vec<VuResult>,
}

impl LoadTestReport {
    pub fn check(&self, step: Step) -> Option<&CheckSummary> {
        self.checks.iter().find(|check| check.step == step)
    }

    pub fn human_summary(&self) -> String {
        let mut output = String::new();
        output.push_str("Book catalog load test report\n");
        output.push_str(&format!(
            "status: {}\n",
            if self.passed { "PASS" } else { "FAIL" }
        ));
        output.push_str(&format!(
            "target: {} (vus={}, duration={}ms, ids={:?} 1..={})\n",
            self.config.base_url,
            self.config.vus,
            self.config.duration_ms,
            self.config.id_strategy,
            self.config.max_id
        ));
        output.push_str(&format!(
            "vus: planned={}, completed={}\n",
            self.totals.planned_vus, self.totals.completed_vus
        ));
        output.push_str(&format!(
            "iterations: completed={}, interrupted={} | requests={}\n",
            self.totals.iterations, self.totals.interrupted_iterations, self.totals.requests
        ));
        output.push_str(&format!(
            "checks: passed={}, failed={} (rate {:.2}%)\n",
            self.totals.checks_passed,
            self.totals.checks_failed,
            self.stats.check_failure_rate * 100.0
        ));
        let errors = &self.totals.errors;
        output.push_str(&format!(
            "errors: status={}, timeout={}, connect={}, transport={}\n",
            errors.unexpected_status, errors.timeout, errors.connect, errors.transport
        ));
        output.push_str(&format!(
            "timing: duration={}ms iterations={:.2}/s requests={:.2}/s p50={:?}ms p95={:?}ms p99={:?}ms\n",
            self.stats.duration_ms,
            self.stats.iterations_per_sec,
            self.stats.requests_per_sec,
            self.stats.latency_p50_ms,
            self.stats.latency_p95_ms,
            self.stats.latency_p99_ms
        ));

        for check in &self.checks {
            let mark = if check.fails == 0 { "✓" } else { "✗" };
            output.push_str(&format!(
                "  {mark} {}: {} passed, {} failed\n",
                check.name, check.passes, check.fails
            ));
        }

        for check in &self.validation.checks {
            output.push_str(&format!(
                "check [{}] {}: {}\n",
                if check.passed { "PASS" } else { "FAIL" },
                check.name,
                check.details
            ));
        }
        output
    }
}
