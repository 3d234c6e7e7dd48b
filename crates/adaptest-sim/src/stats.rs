//! Simulation reports: per-session outcomes, aggregate recovery
//! statistics, and JSON persistence.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adaptest_core::estimator::Method;
use adaptest_core::session::FinalResult;
use adaptest_core::stopping::StopReason;

/// Final state of one simulated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimOutcome {
    /// Position in the batch queue.
    pub index: usize,
    pub session_id: Uuid,
    /// The generating θ the respondent answered from.
    pub true_theta: f64,
    /// Final ability estimate.
    pub theta: f64,
    pub se: f64,
    pub method: Method,
    pub items_used: usize,
    pub stop_reason: Option<StopReason>,
}

impl SimOutcome {
    pub fn new(index: usize, true_theta: f64, result: FinalResult) -> Self {
        Self {
            index,
            session_id: result.session_id,
            true_theta,
            theta: result.theta,
            se: result.se,
            method: result.method,
            items_used: result.administered.len(),
            stop_reason: result.stop_reason,
        }
    }

    /// Signed estimation error for this session.
    pub fn error(&self) -> f64 {
        self.theta - self.true_theta
    }
}

/// Aggregate recovery statistics over a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSummary {
    pub sessions: usize,
    /// Mean signed error of θ̂ against the generating θ.
    pub bias: f64,
    /// Root mean squared error of θ̂.
    pub rmse: f64,
    /// Mean reported standard error at stop.
    pub mean_se: f64,
    /// Mean number of items administered.
    pub mean_items: f64,
}

/// A complete simulation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub outcomes: Vec<SimOutcome>,
    pub summary: SimSummary,
    pub duration_ms: u64,
}

impl SimReport {
    pub fn from_outcomes(outcomes: Vec<SimOutcome>, duration: Duration) -> Self {
        let summary = summarize(&outcomes);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            outcomes,
            summary,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Save the report as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }
}

fn summarize(outcomes: &[SimOutcome]) -> SimSummary {
    let n = outcomes.len();
    if n == 0 {
        return SimSummary {
            sessions: 0,
            bias: 0.0,
            rmse: 0.0,
            mean_se: 0.0,
            mean_items: 0.0,
        };
    }

    let count = n as f64;
    let bias = outcomes.iter().map(SimOutcome::error).sum::<f64>() / count;
    let mse = outcomes
        .iter()
        .map(|o| o.error() * o.error())
        .sum::<f64>()
        / count;
    let mean_se = outcomes.iter().map(|o| o.se).sum::<f64>() / count;
    let mean_items = outcomes.iter().map(|o| o.items_used as f64).sum::<f64>() / count;

    SimSummary {
        sessions: n,
        bias,
        rmse: mse.sqrt(),
        mean_se,
        mean_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, true_theta: f64, theta: f64, se: f64, items: usize) -> SimOutcome {
        SimOutcome {
            index,
            session_id: Uuid::nil(),
            true_theta,
            theta,
            se,
            method: Method::Eap,
            items_used: items,
            stop_reason: Some(StopReason::PrecisionReached),
        }
    }

    #[test]
    fn summary_statistics() {
        let outcomes = vec![
            outcome(0, 0.0, 0.5, 0.3, 10),
            outcome(1, 1.0, 0.5, 0.2, 20),
        ];
        let report = SimReport::from_outcomes(outcomes, Duration::from_millis(12));

        assert_eq!(report.summary.sessions, 2);
        assert!((report.summary.bias - 0.0).abs() < 1e-12);
        assert!((report.summary.rmse - (0.25f64).sqrt()).abs() < 1e-12);
        assert!((report.summary.mean_se - 0.25).abs() < 1e-12);
        assert!((report.summary.mean_items - 15.0).abs() < 1e-12);
        assert_eq!(report.duration_ms, 12);
    }

    #[test]
    fn empty_batch_summary() {
        let report = SimReport::from_outcomes(vec![], Duration::ZERO);
        assert_eq!(report.summary.sessions, 0);
        assert_eq!(report.summary.rmse, 0.0);
    }

    #[test]
    fn json_roundtrip() {
        let report = SimReport::from_outcomes(
            vec![outcome(0, -0.5, -0.4, 0.28, 12)],
            Duration::from_millis(5),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("sim.json");

        report.save_json(&path).unwrap();
        let loaded = SimReport::load_json(&path).unwrap();

        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.outcomes.len(), 1);
        assert!((loaded.outcomes[0].theta + 0.4).abs() < 1e-12);
    }
}
