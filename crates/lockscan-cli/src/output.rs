//! Plain-text table rendering for command output.

use serde_json::Value;

/// Render a titled table with left-aligned columns sized to their content.
pub fn render_table(title: &str, headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.len()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx < widths.len() {
                widths[idx] = widths[idx].max(cell.len());
            }
        }
    }

    println!("{title}");
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| format!("{:<width$}", header, width = widths[idx]))
        .collect();
    println!("{}", header_line.join("  "));
    let total: usize = widths.iter().sum::<usize>() + 2 * (widths.len().saturating_sub(1));
    println!("{}", "-".repeat(total));

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(idx, cell)| format!("{:<width$}", cell, width = widths.get(idx).copied().unwrap_or(0)))
            .collect();
        println!("{}", line.join("  ").trim_end());
    }
}

/// Flatten the summary payload into `(entry, count)` rows.
///
/// Top-level timestamps are bookkeeping, not metrics, and are skipped; one
/// level of nesting becomes dotted keys (`advisories.critical`).
pub fn summary_rows(data: &Value) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let Some(map) = data.as_object() else {
        return rows;
    };

    for (key, value) in map {
        if key == "createdAt" || key == "finishedAt" {
            continue;
        }
        match value {
            Value::Object(nested) => {
                for (name, count) in nested {
                    rows.push(vec![format!("{key}.{name}"), scalar_to_string(count)]);
                }
            }
            other => rows.push(vec![key.clone(), scalar_to_string(other)]),
        }
    }
    rows
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "n/a".to_string(),
        other => other.to_string(),
    }
}

/// Format an RFC 3339 timestamp as a date, or pass the raw value through.
pub fn format_date(value: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| value.to_string())
}
