//! Validate command implementation.

use anyhow::Result;
use hub_evaluator::validate_endpoint;
use tracing::{error, info, warn};

/// Runs the validate command.
pub fn run(policy_path: &str, strict: bool) -> Result<()> {
    info!("Validating policies: {}", policy_path);
    let document = super::load(policy_path)?;

    let mut violations = 0;
    let mut warnings = 0;
    for endpoint in &document.endpoints {
        let report = validate_endpoint(endpoint);
        info!(
            "{}: checks passed {}/{}",
            endpoint.path, report.checks_passed, report.checks_total
        );

        for violation in &report.violations {
            error!("[{}] {}: {}", violation.level, violation.check, violation.message);
        }
        for warning in &report.warnings {
            warn!("[{}] {}: {}", warning.level, warning.check, warning.message);
        }

        violations += report.violations.len();
        warnings += report.warnings.len();
    }

    if violations > 0 {
        anyhow::bail!("Validation failed with {violations} violation(s)");
    }
    if strict && warnings > 0 {
        anyhow::bail!("Validation failed with {warnings} warning(s) (strict mode)");
    }

    info!("Validation passed!");
    Ok(())
}
