use serde::Deserialize;
use strum::Display;

/// Three-level classification of a run's cluster health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum HealthScore {
    Red,
    Yellow,
    Green,
}

/// One alert attached to a run.
#[derive(Debug, Clone, Deserialize)]
pub struct Alert {
    pub severity: String,
}

impl HealthScore {
    /// Score a run from its alert list.
    ///
    /// A failed run or any error-severity alert is Red; otherwise any
    /// warning-severity alert makes it Yellow, and a clean run is Green.
    #[must_use]
    pub fn from_alerts(alerts: &[Alert], passed: bool) -> Self {
        if !passed || alerts.iter().any(|a| a.severity.eq_ignore_ascii_case("error")) {
            Self::Red
        } else if alerts.iter().any(|a| a.severity.eq_ignore_ascii_case("warning")) {
            Self::Yellow
        } else {
            Self::Green
        }
    }

    /// Score a run from its pass flag and accumulated execution-error text.
    #[must_use]
    pub fn from_execution_errors(passed: bool, execution_errors: &str) -> Self {
        if !passed {
            Self::Red
        } else if execution_errors.is_empty() {
            Self::Green
        } else {
            Self::Yellow
        }
    }
}
