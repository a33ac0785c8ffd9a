//! Plotly chart spec builders for the chart agent.
//!
//! The model only chooses chart type and columns. Row data always comes from
//! the query that ran earlier in the same pipeline, never from model output.

use serde::Deserialize;
use serde_json::{json, Value};

use cs_domain::database::Row;

#[derive(Debug, Clone, Deserialize)]
pub struct ChartArgs {
    pub chart_type: String,
    pub x_column: String,
    pub y_column: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiSeriesArgs {
    pub chart_type: String,
    pub x_column: String,
    pub y_columns: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub x_label: Option<String>,
}

/// A generated chart plus the tool-result summary.
#[derive(Debug, Clone)]
pub struct Chart {
    pub spec: Value,
    pub chart_type: String,
    pub data_points: usize,
    pub series_count: usize,
}

impl Chart {
    pub fn to_tool_result(&self) -> Value {
        json!({
            "status": "success",
            "chart_spec": self.spec,
            "chart_type": self.chart_type,
            "series_count": self.series_count,
            "data_points": self.data_points,
        })
    }
}

pub fn build_chart(args: &ChartArgs, rows: &[Row]) -> Result<Chart, String> {
    require_column(rows, &args.x_column)?;
    require_column(rows, &args.y_column)?;

    let y_name = args.y_label.as_deref().unwrap_or(&args.y_column);
    let spec = json!({
        "data": [{
            "type": args.chart_type,
            "x": column(rows, &args.x_column),
            "y": column(rows, &args.y_column),
            "name": y_name,
        }],
        "layout": {
            "title": { "text": args.title.clone().unwrap_or_else(|| format!("{} by {}", args.y_column, args.x_column)) },
            "xaxis": { "title": args.x_label.as_deref().unwrap_or(&args.x_column) },
            "yaxis": { "title": y_name },
            "template": "plotly_white",
        },
    });

    Ok(Chart {
        spec,
        chart_type: args.chart_type.clone(),
        data_points: rows.len(),
        series_count: 1,
    })
}

pub fn build_multi_series_chart(args: &MultiSeriesArgs, rows: &[Row]) -> Result<Chart, String> {
    if args.y_columns.is_empty() {
        return Err("y_columns must name at least one column".into());
    }
    require_column(rows, &args.x_column)?;
    for y in &args.y_columns {
        require_column(rows, y)?;
    }

    let x = column(rows, &args.x_column);
    let traces: Vec<Value> = args
        .y_columns
        .iter()
        .map(|y| {
            json!({
                "type": args.chart_type,
                "x": x,
                "y": column(rows, y),
                "name": y,
            })
        })
        .collect();

    let mut layout = json!({
        "title": { "text": args.title.clone().unwrap_or_else(|| format!("Comparison by {}", args.x_column)) },
        "xaxis": { "title": args.x_label.as_deref().unwrap_or(&args.x_column) },
        "yaxis": { "title": "Values" },
        "template": "plotly_white",
    });
    if args.chart_type == "bar" {
        layout["barmode"] = json!("group");
    }

    Ok(Chart {
        spec: json!({ "data": traces, "layout": layout }),
        chart_type: args.chart_type.clone(),
        data_points: rows.len(),
        series_count: args.y_columns.len(),
    })
}

fn column(rows: &[Row], name: &str) -> Vec<Value> {
    rows.iter()
        .map(|row| row.get(name).cloned().unwrap_or(Value::Null))
        .collect()
}

fn require_column(rows: &[Row], name: &str) -> Result<(), String> {
    match rows.first() {
        None => Err("no query results to chart".into()),
        Some(row) if !row.contains_key(name) => {
            let available: Vec<&str> = row.keys().map(String::as_str).collect();
            Err(format!(
                "unknown column '{name}'; available columns: {}",
                available.join(", ")
            ))
        }
        Some(_) => Ok(()),
    }
}
