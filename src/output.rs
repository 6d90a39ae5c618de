//! Rendering of finished runs.

use crate::analysis::{RunOutcome, RunSummary};
use crate::board::ReadOnlyView;
use crate::fitness::best_proposal;
use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Everything the report renders, in a serialization-friendly shape.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub rounds: usize,
    pub contribution_passes: usize,
    pub dropped_events: usize,
    pub outcome: RunOutcome,
    pub converged: bool,
    pub elements: Vec<ElementReport>,
}

#[derive(Debug, Serialize)]
pub struct ElementReport {
    pub id: String,
    pub kind: String,
    pub results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_fitness: Option<f64>,
}

impl AnalysisReport {
    pub fn from_summary(summary: &RunSummary) -> Self {
        let board = ReadOnlyView::new(summary.board.clone());
        let fitness = board.fitness();
        let mut elements = Vec::new();
        for element in board.universe() {
            let results = board.results_for(&element).unwrap_or_default();
            let proposals = board.proposals_for(&element).unwrap_or_default();
            let best = best_proposal(fitness.as_ref(), &proposals, &results);
            elements.push(ElementReport {
                id: element.id(),
                kind: element.kind().to_string(),
                results: results.len(),
                best_expression: best.as_ref().map(|(expr, _)| expr.to_string()),
                best_fitness: best.map(|(_, grade)| grade),
            });
        }
        Self {
            generated_at: Utc::now(),
            rounds: summary.rounds,
            contribution_passes: summary.contribution_passes,
            dropped_events: summary.dropped_events,
            outcome: summary.outcome,
            converged: summary.outcome.converged(),
            elements,
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Table => Ok(self.render_table()),
        }
    }

    fn render_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Element", "Kind", "Results", "Best model", "Fitness"]);
        for element in &self.elements {
            table.add_row(vec![
                Cell::new(&element.id),
                Cell::new(&element.kind),
                Cell::new(element.results),
                Cell::new(element.best_expression.as_deref().unwrap_or("-")),
                Cell::new(
                    element
                        .best_fitness
                        .map(|grade| format!("{grade:.4}"))
                        .unwrap_or_else(|| "-".into()),
                ),
            ]);
        }

        let status = match self.outcome {
            RunOutcome::AllQuestionsClosed => "converged".green().bold(),
            RunOutcome::FitnessPlateaued => "converged (fitness plateau)".green().bold(),
            RunOutcome::TimeBudgetExhausted => "time budget exhausted".yellow().bold(),
            RunOutcome::CeilingExceeded => "hard ceiling exceeded".yellow().bold(),
            RunOutcome::RoundLimitHit => "round limit hit".yellow().bold(),
        };
        let mut rendered = format!(
            "{} after {} round(s), {} contribution pass(es)\n",
            status, self.rounds, self.contribution_passes
        );
        if self.dropped_events > 0 {
            rendered.push_str(&format!(
                "{} malformed event(s) dropped\n",
                self.dropped_events.to_string().red()
            ));
        }
        rendered.push_str(&table.to_string());
        rendered.push('\n');
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RunSummary;
    use crate::board::views::share;
    use crate::board::{Board, ReadWriteView};
    use crate::expression::constant;
    use crate::measurement::results::{MeasurementResult, ResourceType};
    use crate::measurement::{CodeSection, MeasurableElement};
    use pretty_assertions::assert_eq;

    fn summary() -> RunSummary {
        let element = MeasurableElement::ResourceDemand {
            section: CodeSection::new("src/lib.rs", 0, 9),
            resource: ResourceType::Cpu,
        };
        let board = share(Board::new(vec![element.clone()]));
        let writer = ReadWriteView::new(board.clone());
        writer
            .add_results(
                &element,
                vec![MeasurementResult::resource_demand(5.0, ResourceType::Cpu).unwrap()],
            )
            .unwrap();
        writer.add_proposal(&element, constant(5.0)).unwrap();
        RunSummary {
            rounds: 2,
            contribution_passes: 3,
            dropped_events: 0,
            outcome: RunOutcome::AllQuestionsClosed,
            board,
        }
    }

    #[test]
    fn report_carries_the_best_model_per_element() {
        let report = AnalysisReport::from_summary(&summary());
        assert_eq!(report.elements.len(), 1);
        let element = &report.elements[0];
        assert_eq!(element.results, 1);
        assert_eq!(element.best_expression.as_deref(), Some("5"));
        assert_eq!(element.best_fitness, Some(0.0));
    }

    #[test]
    fn json_rendering_is_valid_json() {
        let report = AnalysisReport::from_summary(&summary());
        let rendered = report.render(OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["converged"], serde_json::Value::Bool(true));
        assert_eq!(parsed["outcome"], "all_questions_closed");
    }

    #[test]
    fn a_timed_out_run_is_not_reported_as_converged() {
        let mut cut_short = summary();
        cut_short.outcome = RunOutcome::TimeBudgetExhausted;
        let report = AnalysisReport::from_summary(&cut_short);
        assert!(!report.converged);
        let rendered = report.render(OutputFormat::Table).unwrap();
        assert!(rendered.contains("time budget exhausted"));
        assert!(!rendered.contains("converged"));
    }

    #[test]
    fn table_rendering_mentions_every_element() {
        let report = AnalysisReport::from_summary(&summary());
        let rendered = report.render(OutputFormat::Table).unwrap();
        assert!(rendered.contains("rdseff"));
        assert!(rendered.contains("2 round(s)"));
    }
}
