//! Tabular views of scheduling results as polars `DataFrame`s.

use crate::auto_schedule::AutoScheduleOutcome;
use crate::calculations::CriticalPathReport;
use crate::project::ProjectSnapshot;
use chrono::NaiveDate;
use polars::prelude::*;

/// Days since the Unix epoch, the physical representation of a polars `Date`.
fn date_to_i32(date: NaiveDate) -> i32 {
    (date - NaiveDate::default()).num_days() as i32
}

fn date_series(name: &'static str, values: Vec<Option<NaiveDate>>) -> PolarsResult<Series> {
    let days: Vec<Option<i32>> = values.into_iter().map(|d| d.map(date_to_i32)).collect();
    Series::new(PlSmallStr::from_static(name), days).cast(&DataType::Date)
}

impl CriticalPathReport {
    /// One row per task in topological order.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let timings: Vec<_> = self
            .order
            .iter()
            .filter_map(|id| self.per_task.get(id))
            .collect();

        let ids: Vec<i64> = timings.iter().map(|t| t.task_id.0).collect();
        let durations: Vec<i64> = timings.iter().map(|t| t.duration).collect();
        let es_offsets: Vec<i64> = timings.iter().map(|t| t.earliest_start_offset).collect();
        let ef_offsets: Vec<i64> = timings.iter().map(|t| t.earliest_finish_offset).collect();
        let slack: Vec<i64> = timings.iter().map(|t| t.slack).collect();
        let critical: Vec<bool> = timings.iter().map(|t| t.is_critical).collect();

        DataFrame::new(vec![
            Series::new(PlSmallStr::from_static("task_id"), ids).into(),
            Series::new(PlSmallStr::from_static("duration"), durations).into(),
            Series::new(PlSmallStr::from_static("es_offset"), es_offsets).into(),
            Series::new(PlSmallStr::from_static("ef_offset"), ef_offsets).into(),
            date_series(
                "earliest_start",
                timings.iter().map(|t| Some(t.earliest_start)).collect(),
            )?
            .into(),
            date_series(
                "earliest_finish",
                timings.iter().map(|t| Some(t.earliest_finish)).collect(),
            )?
            .into(),
            date_series(
                "latest_start",
                timings.iter().map(|t| Some(t.latest_start)).collect(),
            )?
            .into(),
            date_series(
                "latest_finish",
                timings.iter().map(|t| Some(t.latest_finish)).collect(),
            )?
            .into(),
            Series::new(PlSmallStr::from_static("slack"), slack).into(),
            Series::new(PlSmallStr::from_static("is_critical"), critical).into(),
        ])
    }
}

impl AutoScheduleOutcome {
    pub fn changes_dataframe(&self) -> PolarsResult<DataFrame> {
        let ids: Vec<i64> = self.changes.iter().map(|c| c.task_id.0).collect();
        DataFrame::new(vec![
            Series::new(PlSmallStr::from_static("task_id"), ids).into(),
            date_series("old_start", self.changes.iter().map(|c| c.old_start).collect())?.into(),
            date_series("old_end", self.changes.iter().map(|c| c.old_end).collect())?.into(),
            date_series(
                "new_start",
                self.changes.iter().map(|c| Some(c.new_start)).collect(),
            )?
            .into(),
            date_series(
                "new_end",
                self.changes.iter().map(|c| Some(c.new_end)).collect(),
            )?
            .into(),
        ])
    }

    pub fn conflicts_dataframe(&self) -> PolarsResult<DataFrame> {
        let task_a: Vec<i64> = self.conflicts.iter().map(|c| c.task_a.0).collect();
        let task_b: Vec<i64> = self.conflicts.iter().map(|c| c.task_b.0).collect();
        let assignees: Vec<&str> = self
            .conflicts
            .iter()
            .map(|c| c.assignee_id.as_str())
            .collect();
        DataFrame::new(vec![
            Series::new(PlSmallStr::from_static("task_a"), task_a).into(),
            Series::new(PlSmallStr::from_static("task_b"), task_b).into(),
            Series::new(PlSmallStr::from_static("assignee_id"), assignees).into(),
            date_series(
                "overlap_start",
                self.conflicts.iter().map(|c| Some(c.overlap_start)).collect(),
            )?
            .into(),
            date_series(
                "overlap_end",
                self.conflicts.iter().map(|c| Some(c.overlap_end)).collect(),
            )?
            .into(),
        ])
    }
}

impl ProjectSnapshot {
    /// Stored task fields, one row per task in id order.
    pub fn tasks_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut tasks: Vec<_> = self.tasks.iter().collect();
        tasks.sort_by_key(|t| t.id);

        let ids: Vec<i64> = tasks.iter().map(|t| t.id.0).collect();
        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        let parents: Vec<Option<i64>> = tasks.iter().map(|t| t.parent_id.map(|p| p.0)).collect();
        let durations: Vec<Option<i64>> = tasks.iter().map(|t| t.estimated_duration).collect();
        let progress: Vec<i64> = tasks
            .iter()
            .map(|t| i64::from(t.progress_percentage))
            .collect();
        let assignees: Vec<Option<&str>> =
            tasks.iter().map(|t| t.assignee_id.as_deref()).collect();

        DataFrame::new(vec![
            Series::new(PlSmallStr::from_static("id"), ids).into(),
            Series::new(PlSmallStr::from_static("name"), names).into(),
            Series::new(PlSmallStr::from_static("parent_id"), parents).into(),
            Series::new(PlSmallStr::from_static("duration"), durations).into(),
            date_series("start_date", tasks.iter().map(|t| t.start_date).collect())?.into(),
            date_series("due_date", tasks.iter().map(|t| t.due_date).collect())?.into(),
            Series::new(PlSmallStr::from_static("progress"), progress).into(),
            Series::new(PlSmallStr::from_static("assignee_id"), assignees).into(),
        ])
    }
}

fn cell_text(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::Boolean(v) => v.to_string(),
        AnyValue::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// Render a frame as a boxed ASCII table.
pub fn render_df_as_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let cells: Vec<Vec<String>> = (0..df.height())
        .map(|row| {
            columns
                .iter()
                .map(|col| col.get(row).map(|av| cell_text(&av)).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = names.iter().map(String::len).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(w + 2));
        sep.push('+');
    }

    let line = |values: &[String]| {
        let mut out = String::from("|");
        for (value, width) in values.iter().zip(widths.iter().copied()) {
            out.push_str(&format!(" {value:<width$} |"));
        }
        out
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&line(&names));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}
