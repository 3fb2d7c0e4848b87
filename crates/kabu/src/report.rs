use anyhow::Result;
use kabu_core::table::DATE_COLUMN;
use kabu_core::{Chart, ChartKind, FlatTable, Presentation};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::debug;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// A plotly `scatter` trace.
#[derive(Serialize, Debug)]
struct Trace<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    mode: &'static str,
    name: &'a str,
    x: Vec<String>,
    y: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stackgroup: Option<&'static str>,
}

enum Section {
    Message { class: &'static str, text: String },
    Table { html: String },
    Figure { heading: String, id: String, spec: serde_json::Value },
}

/// Collects a render cycle into a standalone HTML page.
#[derive(Default)]
pub struct HtmlReport {
    sections: Vec<Section>,
}

impl HtmlReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&self) -> String {
        let mut body = String::new();
        for section in &self.sections {
            match section {
                Section::Message { class, text } => {
                    body.push_str(&format!("<p class=\"{class}\">{}</p>\n", escape(text)));
                }
                Section::Table { html } => body.push_str(html),
                Section::Figure { heading, id, spec } => {
                    let spec = script_safe(&spec.to_string());
                    body.push_str(&format!(
                        "<h2>{}</h2>\n<div id=\"{id}\" class=\"chart\"></div>\n<script>(function () {{ const fig = {spec}; Plotly.newPlot(\"{id}\", fig.data, fig.layout, {{responsive: true}}); }})();</script>\n",
                        escape(heading)
                    ));
                }
            }
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Stock Market Dashboard</title>
<script src="{PLOTLY_CDN}"></script>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; font-size: 0.85rem; }}
th, td {{ border: 1px solid #ddd; padding: 0.25rem 0.5rem; text-align: right; }}
.chart {{ width: 100%; height: 480px; }}
.warning {{ color: #a66b00; }}
.error {{ color: #b00020; font-weight: bold; }}
</style>
</head>
<body>
<h1>Stock Market Dashboard</h1>
<p>Closing trends, trading volume, and moving averages.</p>
{body}</body>
</html>
"#
        )
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())?;
        debug!("Dashboard written to {}", path.display());
        Ok(())
    }
}

impl Presentation for HtmlReport {
    fn selection_required(&mut self, message: &str) {
        self.sections.push(Section::Message {
            class: "warning",
            text: message.to_string(),
        });
    }

    fn failure(&mut self, message: &str) {
        self.sections.push(Section::Message {
            class: "error",
            text: message.to_string(),
        });
    }

    fn preview(&mut self, table: &FlatTable, rows: usize) {
        let mut html = String::from("<h2>Raw Data Preview</h2>\n<table>\n<tr>");
        html.push_str(&format!("<th>{DATE_COLUMN}</th>"));
        for name in table.column_names() {
            html.push_str(&format!("<th>{}</th>", escape(name)));
        }
        html.push_str("</tr>\n");
        for row in table.head(rows) {
            html.push_str(&format!("<tr><td>{}</td>", row.date()));
            for (_, value) in row.values() {
                match value {
                    Some(v) => html.push_str(&format!("<td>{v}</td>")),
                    None => html.push_str("<td>NaN</td>"),
                }
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>\n");
        self.sections.push(Section::Table { html });
    }

    fn chart(&mut self, heading: &str, chart: &Chart) {
        let stackgroup = (chart.kind == ChartKind::StackedArea).then_some("one");
        let data: Vec<Trace> = chart
            .series
            .iter()
            .map(|series| Trace {
                kind: "scatter",
                mode: "lines",
                name: &series.label,
                x: series.points.iter().map(|(d, _)| d.to_string()).collect(),
                y: series.points.iter().map(|(_, v)| *v).collect(),
                stackgroup,
            })
            .collect();

        let spec = json!({
            "data": data,
            "layout": {
                "title": { "text": chart.title },
                "xaxis": { "title": { "text": chart.x_title } },
                "yaxis": { "title": { "text": chart.y_title } },
            },
        });
        let id = format!("chart-{}", self.sections.len());
        self.sections.push(Section::Figure {
            heading: heading.to_string(),
            id,
            spec,
        });
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// JSON embedded in a `<script>` must never contain a closing tag.
fn script_safe(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}
