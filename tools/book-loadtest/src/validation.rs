use crate::config::LoadTestConfig;
use crate::report::{CheckSummary, Totals, ValidationCheck, ValidationSummary};

pub fn run_validations(
    checks: &[CheckSummary],
    totals: &Totals,
    config: &LoadTestConfig,
) -> ValidationSummary {
    let mut results = Vec::new();

    let total = totals.checks();
    let error_rate = if total == 0 {
        0.0
    } else {
        totals.checks_failed as f64 / total as f64
    };
    results.push(ValidationCheck {
        name: "check_failure_rate".to_string(),
        passed: error_rate <= config.max_error_rate,
        details: format!(
            "{}/{} checks failed, rate {:.4} (threshold {:.4})",
            totals.checks_failed, total, error_rate, config.max_error_rate
        ),
    });

    let missing = checks
        .iter()
        .filter(|check| check.attempts() == 0)
        .map(|check| check.name.as_str())
        .collect::<Vec<_>>();
    results.push(ValidationCheck {
        name: "all_steps_exercised".to_string(),
        passed: missing.is_empty(),
        details: if missing.is_empty() {
            format!(
                "{} steps ran across {} iterations",
                checks.len(),
                totals.iterations
            )
        } else {
            format!("never completed: {}", missing.join(", "))
        },
    });

    // informational, the failed checks already count these
    let errors = &totals.errors;
    results.push(ValidationCheck {
        name: "transport_errors".to_string(),
        passed: true,
        details: format!(
            "{} transport errors (timeout={}, connect={}, other={}) vs {} unexpected statuses",
            errors.transport_total(),
            errors.timeout,
            errors.connect,
            errors.transport,
            errors.unexpected_status
        ),
    });

    let passed = results.iter().all(|check| check.passed);
    ValidationSummary {
        passed,
        checks: results,
    }
}
