use crate::error::CliError;
use engine_core::progress::ProgressStatus;
use engine_runtime::driver::DriverReport;
use serde::Serialize;
use serde_json::Value;
use workspace_client::sql::QueryHistory;

const MAX_CELL: usize = 40;

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_progress_table(status: &ProgressStatus) {
    println!("Progress at '{}':", status.location);
    println!("-----------------------------");
    println!("{:<16} {}", "Stage", status.stage);
    println!("{:<16} {}", "Current offset", status.current);
    println!(
        "{:<16} {}",
        "Version",
        status.version.as_deref().unwrap_or("n/a")
    );
}

pub fn stream_summary(report: &DriverReport) -> String {
    format!(
        "{} batch(es), {} row(s), offsets [{}, {}), stopped: {:?}",
        report.batches, report.rows, report.start, report.end, report.reason
    )
}

pub fn print_query_history(history: &QueryHistory, as_json: bool) -> Result<(), CliError> {
    if as_json {
        for row in &history.rows {
            println!("{}", serde_json::to_string(row)?);
        }
        return Ok(());
    }

    let columns = history.columns();
    let cells: Vec<Vec<String>> = history
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(*c).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain([c.len()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{v:<width$}", width = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(columns.clone()));
    for row in &cells {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
    println!("({} queries)", history.len());
    Ok(())
}

fn cell(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_CELL {
        let cut: String = text.chars().take(MAX_CELL - 3).collect();
        format!("{cut}...")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn long_cells_are_truncated() {
        let long = "x".repeat(100);
        let out = cell(&json!(long));
        assert_eq!(out.chars().count(), MAX_CELL);
        assert!(out.ends_with("..."));
        assert_eq!(cell(&json!(3)), "3");
        assert_eq!(cell(&Value::Null), "");
    }
}
