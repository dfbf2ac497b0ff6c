use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::CatalogClient;
use crate::config::LoadTestConfig;
use crate::report::{
    CheckSummary, ErrorCounts, LoadTestReport, MAX_ERROR_SAMPLES, RunConfigSnapshot,
    RuntimeStats, Totals, ValidationSummary, VuResult,
};
use crate::scenario::{self, Step, StepResult};
use crate::validation;
use crate::workload::{IdGenerator, id_range};

/// Run virtual users until the configured duration elapses, every VU hits
/// its iteration cap, or `shutdown` is cancelled.
pub async fn run(config: LoadTestConfig, shutdown: CancellationToken) -> Result<LoadTestReport> {
    let started = Instant::now();

    if config.dry_run {
        return Ok(build_dry_run_report(&config));
    }

    let client =
        CatalogClient::new(&config.base_url, config.timeout()).context("build http client")?;
    let steps = scenario::steps(config.extended);

    let stop = shutdown.child_token();
    let deadline = tokio::spawn({
        let stop = stop.clone();
        let duration = config.duration();
        async move {
            tokio::time::sleep(duration).await;
            debug!("run duration elapsed");
            stop.cancel();
        }
    });

    info!(
        base_url = %config.base_url,
        vus = config.vus,
        duration_ms = config.duration_ms,
        extended = config.extended,
        "starting load test"
    );

    let ramp_delay = ramp_delay(config.ramp_per_sec);
    let mut tasks = JoinSet::new();
    for vu_index in 0..config.vus {
        if stop.is_cancelled() {
            debug!(vu_index, "run stopped before all virtual users started");
            break;
        }

        let vu = VirtualUser {
            vu_index,
            ids: IdGenerator::for_vu(
                config.id_strategy,
                config.max_id,
                config.vus,
                vu_index,
                config.seed,
            ),
            client: client.clone(),
            steps,
            pause: config.pause(),
            max_iterations: config.iterations,
            stop: stop.clone(),
        };
        tasks.spawn(vu.run());

        if let Some(delay) = ramp_delay {
            tokio::select! {
                _ = stop.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    let mut vus = Vec::with_capacity(config.vus);
    while let Some(joined) = tasks.join_next().await {
        let result = joined.context("virtual user task join failed")?;
        vus.push(result);
    }
    deadline.abort();
    vus.sort_by_key(|vu| vu.vu_index);

    let checks = merge_checks(&vus, steps);
    let totals = compute_totals(&vus, config.vus);
    let stats = compute_stats(&vus, started.elapsed(), &totals);
    let validation = validation::run_validations(&checks, &totals, &config);
    let passed = validation.passed;

    info!(
        passed,
        iterations = totals.iterations,
        checks_failed = totals.checks_failed,
        "load test finished"
    );

    Ok(LoadTestReport {
        config: RunConfigSnapshot::from(&config),
        dry_run: false,
        passed,
        totals,
        stats,
        checks,
        validation,
        vus,
    })
}

struct VirtualUser {
    vu_index: usize,
    ids: IdGenerator,
    client: CatalogClient,
    steps: &'static [Step],
    pause: Duration,
    max_iterations: Option<u64>,
    stop: CancellationToken,
}

impl VirtualUser {
    async fn run(mut self) -> VuResult {
        let range = self.ids.range();
        let mut result = VuResult {
            vu_index: self.vu_index,
            id_min: *range.start(),
            id_max: *range.end(),
            checks: self.steps.iter().copied().map(CheckSummary::new).collect(),
            ..VuResult::default()
        };
        debug!(vu_index = self.vu_index, ?range, "virtual user started");

        loop {
            if self.stop.is_cancelled() {
                break;
            }

            let id = self.ids.next_id();
            let mut done = Vec::with_capacity(self.steps.len());
            // the steps are polled first, so an interrupted iteration has
            // always put its first request on the wire
            let finished = tokio::select! {
                biased;
                _ = scenario::run_steps(&self.client, self.steps, id, &mut done) => true,
                _ = self.stop.cancelled() => false,
            };
            record_steps(&mut result, done);
            if !finished {
                // whatever the completed steps did stays on the server
                result.interrupted_iterations += 1;
                break;
            }
            result.iterations += 1;

            if self
                .max_iterations
                .is_some_and(|max| result.iterations >= max)
            {
                break;
            }

            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(self.pause) => {}
            }
        }

        debug!(
            vu_index = self.vu_index,
            iterations = result.iterations,
            interrupted = result.interrupted_iterations,
            "virtual user finished"
        );
        result
    }
}

/// Fold completed steps into the VU's counters. `steps` is a prefix of the
/// step table when the iteration was cut short.
fn record_steps(result: &mut VuResult, steps: Vec<StepResult>) {
    for (summary, step) in result.checks.iter_mut().zip(steps) {
        if step.passed {
            summary.passes += 1;
            result.checks_passed += 1;
        } else {
            summary.fails += 1;
            result.checks_failed += 1;
        }
        if let Some(latency) = step.latency_ms {
            result.latencies_ms.push(latency);
        }
        if let Some(error) = step.error {
            result.error_counts.record(error.category);
            if result.errors.len() < MAX_ERROR_SAMPLES {
                result.errors.push(error);
            }
        }
    }
}

fn build_dry_run_report(config: &LoadTestConfig) -> LoadTestReport {
    let steps = scenario::steps(config.extended);
    let vus = (0..config.vus)
        .map(|vu_index| {
            let range = id_range(config.id_strategy, config.max_id, config.vus, vu_index);
            VuResult {
                vu_index,
                id_min: *range.start(),
                id_max: *range.end(),
                checks: steps.iter().copied().map(CheckSummary::new).collect(),
                ..VuResult::default()
            }
        })
        .collect::<Vec<_>>();

    LoadTestReport {
        config: RunConfigSnapshot::from(config),
        dry_run: true,
        passed: true,
        totals: Totals {
            planned_vus: config.vus,
            ..Totals::default()
        },
        stats: RuntimeStats::default(),
        checks: steps.iter().copied().map(CheckSummary::new).collect(),
        validation: ValidationSummary::dry_run(),
        vus,
    }
}

fn ramp_delay(ramp_per_sec: usize) -> Option<Duration> {
    if ramp_per_sec == 0 {
        None
    } else {
        Some(Duration::from_secs_f64(1.0 / ramp_per_sec as f64))
    }
}

fn merge_checks(vus: &[VuResult], steps: &[Step]) -> Vec<CheckSummary> {
    let mut checks = steps
        .iter()
        .copied()
        .map(CheckSummary::new)
        .collect::<Vec<_>>();
    for vu in vus {
        for (total, check) in checks.iter_mut().zip(&vu.checks) {
            total.passes += check.passes;
            total.fails += check.fails;
        }
    }
    checks
}

fn compute_totals(vus: &[VuResult], planned_vus: usize) -> Totals {
    let mut errors = ErrorCounts::default();
    for vu in vus {
        errors.merge(&vu.error_counts);
    }

    let checks_passed = vus.iter().map(|vu| vu.checks_passed).sum::<usize>();
    let checks_failed = vus.iter().map(|vu| vu.checks_failed).sum::<usize>();

    Totals {
        planned_vus,
        completed_vus: vus.len(),
        iterations: vus.iter().map(|vu| vu.iterations).sum(),
        interrupted_iterations: vus.iter().map(|vu| vu.interrupted_iterations).sum(),
        // every check is one request
        requests: checks_passed + checks_failed,
        checks_passed,
        checks_failed,
        errors,
    }
}

fn compute_stats(vus: &[VuResult], duration: Duration, totals: &Totals) -> RuntimeStats {
    let duration_ms = duration.as_millis();
    let duration_secs = duration.as_secs_f64().max(1e-9);

    let check_failure_rate = if totals.checks() == 0 {
        0.0
    } else {
        totals.checks_failed as f64 / totals.checks() as f64
    };

    let mut latencies = vus
        .iter()
        .flat_map(|vu| vu.latencies_ms.iter().copied())
        .collect::<Vec<_>>();
    latencies.sort_unstable();

    RuntimeStats {
        duration_ms,
        iterations_per_sec: totals.iterations as f64 / duration_secs,
        requests_per_sec: totals.requests as f64 / duration_secs,
        latency_p50_ms: percentile(&latencies, 0.50),
        latency_p95_ms: percentile(&latencies, 0.95),
        latency_p99_ms: percentile(&latencies, 0.99),
        check_failure_rate,
    }
}

fn percentile(values: &[u128], p: f64) -> Option<u128> {
    if values.is_empty() {
        return None;
    }
    let index = ((values.len() - 1) as f64 * p).round() as usize;
    values.get(index).copied()
}
