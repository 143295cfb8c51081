use colored::Colorize;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::{
    eligibility::engine::EligibilityEngine,
    error::PlanError,
};

/// Applies several status changes with a bounded number of requests in
/// flight. One failure never stops the rest of the batch.
pub struct BatchToggler<'a> {
    engine: &'a EligibilityEngine,
    max_in_flight: usize,
}

impl<'a> BatchToggler<'a> {
    pub fn new(engine: &'a EligibilityEngine, max_in_flight: usize) -> Self {
        Self {
            engine,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub async fn apply(&self, doc_id: &str, changes: Vec<(String, bool)>) -> BatchSummary {
        info!(
            "Applying {} status changes to {} ({} in flight)",
            changes.len(),
            doc_id,
            self.max_in_flight
        );

        let mut summary = BatchSummary {
            total: changes.len(),
            ..Default::default()
        };

        let results: Vec<(String, bool, Result<(), PlanError>)> = stream::iter(changes)
            .map(|(code, passed)| async move {
                let result = self
                    .engine
                    .toggle_status(doc_id, &code, passed)
                    .await
                    .map(|_| ());
                (code, passed, result)
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        for (code, passed, result) in results {
            match &result {
                Ok(()) => summary.successful += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!("Failed to set {}: {}", code, e);
                }
            }
            summary.results.push(ToggleOutcome { code, passed, result });
        }

        info!(
            "Batch complete: {} successful, {} failed",
            summary.successful, summary.failed
        );
        summary
    }
}

#[derive(Debug)]
pub struct ToggleOutcome {
    pub code: String,
    pub passed: bool,
    pub result: Result<(), PlanError>,
}

/// Summary of batch processing results
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<ToggleOutcome>,
}

impl BatchSummary {
    pub fn print_summary(&self) {
        println!("{}", self.render());
    }

    fn render(&self) -> String {
        let mut lines = vec![
            format!("\n{}", "=== Status Update Summary ===".cyan().bold()),
            format!("Total Changes:   {}", self.total),
            format!("{}", format!("Successful:      {} ✓", self.successful).green()),
        ];
        let failed = format!("Failed:          {} ✗", self.failed);
        lines.push(if self.failed > 0 {
            failed.red().to_string()
        } else {
            failed
        });
        for outcome in &self.results {
            if let Err(e) = &outcome.result {
                lines.push(format!("  {} -> {}", outcome.code.yellow(), e));
            }
        }
        lines.push("=============================".cyan().to_string());
        lines.join("\n")
    }

    /// Get success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total as f64) * 100.0
        }
    }
}
