//! Table output formatting for CLI commands
//!
//! Formatted table output for run listings and comparison matrices using
//! comfy-table. Color-coded status cells with a plain fallback for dumb
//! terminals.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::cli::output::truncate;
use crate::domain::models::{Run, RunStatus};
use crate::services::ComparisonResult;

/// Failure details get a single list column; the full text is on `run show`.
const DETAILS_WIDTH: usize = 40;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format a list of runs as a table
    pub fn format_runs(&self, runs: &[Run]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Workspace").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Score").add_attribute(Attribute::Bold),
            Cell::new("Confidence").add_attribute(Attribute::Bold),
            Cell::new("Created").add_attribute(Attribute::Bold),
            Cell::new("Details").add_attribute(Attribute::Bold),
        ]);

        for run in runs {
            let id_short = &run.id.to_string()[..8];
            let ws_short = &run.workspace_id.to_string()[..8];

            let status_cell = if self.use_colors {
                Cell::new(run.status.to_string()).fg(status_color(run.status))
            } else {
                Cell::new(format!("{} {}", status_icon(run.status), run.status))
            };

            let score = run
                .scorecard
                .as_ref()
                .map(|card| format!("{:.1}", card.overall_score))
                .unwrap_or_else(|| "-".to_string());
            let confidence = run
                .scorecard
                .as_ref()
                .map(|card| format!("{:.2}", card.confidence))
                .unwrap_or_else(|| "-".to_string());

            table.add_row(vec![
                Cell::new(id_short),
                Cell::new(ws_short),
                status_cell,
                Cell::new(&score),
                Cell::new(&confidence),
                Cell::new(run.created_at.format("%Y-%m-%d %H:%M").to_string()),
                Cell::new(
                    run.failure_details
                        .as_deref()
                        .map(|details| truncate(details, DETAILS_WIDTH))
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ]);
        }

        table.to_string()
    }

    /// Format a comparison result as two tables: dimensions, then metrics.
    /// Column order follows the caller's run ordering; the first run is the
    /// baseline and deltas are shown next to each non-baseline value.
    pub fn format_comparison(&self, run_ids: &[String], result: &ComparisonResult) -> String {
        let mut dim_table = self.create_base_table();

        let mut header = vec![Cell::new("Dimension").add_attribute(Attribute::Bold)];
        for (i, id) in run_ids.iter().enumerate() {
            let label = if i == 0 {
                format!("{} (base)", &id[..8.min(id.len())])
            } else {
                id[..8.min(id.len())].to_string()
            };
            header.push(Cell::new(label).add_attribute(Attribute::Bold));
        }
        dim_table.set_header(header.clone());

        for (dimension, comparison) in &result.dimension_comparison {
            let mut row = vec![Cell::new(dimension)];
            for entry in &comparison.scores {
                row.push(self.delta_cell(
                    entry.score.map(|s| format!("{s:.1}")),
                    entry.delta,
                ));
            }
            dim_table.add_row(row);
        }

        let mut metric_table = self.create_base_table();
        header[0] = Cell::new("Metric").add_attribute(Attribute::Bold);
        metric_table.set_header(header);

        for (metric, entries) in &result.metric_comparison {
            let mut row = vec![Cell::new(metric)];
            for entry in entries {
                row.push(self.delta_cell(
                    entry.value.map(|v| v.to_string()),
                    entry.delta.map(|d| d as f64),
                ));
            }
            metric_table.add_row(row);
        }

        format!("{dim_table}\n\n{metric_table}")
    }

    fn delta_cell(&self, value: Option<String>, delta: Option<f64>) -> Cell {
        let Some(value) = value else {
            return Cell::new("-");
        };
        let Some(delta) = delta else {
            return Cell::new(value);
        };

        let text = format!("{value} ({delta:+.1})");
        if !self.use_colors {
            return Cell::new(text);
        }
        if delta >= 0.0 {
            Cell::new(text).fg(Color::Green)
        } else {
            Cell::new(text).fg(Color::Red)
        }
    }

    /// Create a base table with common settings
    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width as u16);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

fn status_color(status: RunStatus) -> Color {
    match status {
        RunStatus::Completed => Color::Green,
        RunStatus::CompletedLowConfidence => Color::Yellow,
        RunStatus::Failed => Color::Red,
        RunStatus::Judging | RunStatus::Parsing | RunStatus::Uploading => Color::Cyan,
        RunStatus::ReadyForJudging => Color::Yellow,
        RunStatus::Pending | RunStatus::Created | RunStatus::Uploaded => Color::White,
    }
}

fn status_icon(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Completed => "✓",
        RunStatus::CompletedLowConfidence => "⚠",
        RunStatus::Failed => "✗",
        RunStatus::Judging | RunStatus::Parsing | RunStatus::Uploading => "⟳",
        RunStatus::ReadyForJudging => "●",
        RunStatus::Pending | RunStatus::Created | RunStatus::Uploaded => "○",
    }
}
