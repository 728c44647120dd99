//! Table output for persisted run state using comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{AttemptOutcome, RepairHistory, RunState};

use super::{first_line, truncate};

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(cells: &[&str]) -> Vec<Cell> {
    cells
        .iter()
        .map(|c| Cell::new(c).add_attribute(Attribute::Bold))
        .collect()
}

/// One row per task: id, status, dependencies and declared outputs.
pub fn tasks_table(state: &RunState) -> Table {
    let mut table = base_table();
    table.set_header(header(&["Task", "Status", "Depends on", "Outputs"]));

    for task in state.plan.graph.tasks() {
        let status = if state.completed.contains(&task.id) {
            Cell::new("completed").fg(Color::Green)
        } else {
            Cell::new("pending").fg(Color::Yellow)
        };
        let deps = if task.depends_on.is_empty() {
            "-".to_string()
        } else {
            task.depends_on.join(", ")
        };
        table.add_row(vec![
            Cell::new(&task.id),
            status,
            Cell::new(deps),
            Cell::new(truncate(&task.output_paths.join(", "), 60)),
        ]);
    }
    table
}

/// One row per repair attempt.
pub fn repair_table(history: &RepairHistory) -> Table {
    let mut table = base_table();
    table.set_header(header(&["#", "Strategy", "Outcome", "Files", "Detail", "ms"]));

    for attempt in history.records() {
        let outcome = match attempt.outcome {
            AttemptOutcome::Success => Cell::new("success").fg(Color::Green),
            AttemptOutcome::NoFixProposed => Cell::new("no fix").fg(Color::Yellow),
            AttemptOutcome::FixAppliedFailed => Cell::new("still failing").fg(Color::Red),
        };
        let files = attempt
            .proposed_fix
            .as_ref()
            .map_or(0, |plan| plan.all_fixes().len());
        let detail = match (&attempt.note, &attempt.verification) {
            (Some(note), _) => note.clone(),
            (None, Some(v)) if !v.is_success() => first_line(&v.stderr).to_string(),
            _ => String::new(),
        };
        table.add_row(vec![
            Cell::new(attempt.attempt_number),
            Cell::new(format!("S{} {}", attempt.strategy.index(), attempt.strategy.label())),
            outcome,
            Cell::new(files),
            Cell::new(truncate(&detail, 50)),
            Cell::new(attempt.duration_ms),
        ]);
    }
    table
}
